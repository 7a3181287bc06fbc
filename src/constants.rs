//! # System Constants
//!
//! Enums and identifiers shared by every orchestration component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved prerequisite token satisfied by the system prerequisite check
pub const BOOTSTRAP_PHASE: &str = "system-check";

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Longest cache TTL accepted from configuration (30 days)
pub const MAX_CACHE_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Catalog phase identifiers
pub mod phases {
    pub const ERROR_RESOLUTION: &str = "error-resolution";
    pub const TYPE_FIXING: &str = "type-fixing";
    pub const IMPORT_REWRITING: &str = "import-rewriting";
    pub const VERIFICATION: &str = "verification";
}

/// Error codes attached to phase failures
pub mod error_codes {
    pub const EXECUTOR_FAILED: &str = "PHASE_EXECUTOR_FAILED";
    pub const EXECUTOR_NOT_REGISTERED: &str = "EXECUTOR_NOT_REGISTERED";
    pub const PREREQUISITE_NOT_MET: &str = "PHASE_PREREQUISITE_NOT_MET";
    pub const PHASE_TIMEOUT: &str = "PHASE_TIMEOUT";
}

/// Workflow lifecycle log operations
pub mod events {
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
    pub const WORKFLOW_FAILED: &str = "workflow.failed";
    pub const PHASE_STARTED: &str = "phase.started";
    pub const PHASE_COMPLETED: &str = "phase.completed";
    pub const PHASE_FAILED: &str = "phase.failed";
    pub const CHECKPOINT_TAKEN: &str = "workflow.checkpoint";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Weight used when averaging operation risk
    pub fn score(&self) -> f64 {
        match self {
            Self::Critical => 1.0,
            Self::High => 0.8,
            Self::Medium => 0.6,
            Self::Low => 0.3,
            Self::None => 0.0,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationLevel {
    Basic,
    #[default]
    Strict,
    Exhaustive,
}

impl std::str::FromStr for ValidationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BASIC" => Ok(Self::Basic),
            "STRICT" => Ok(Self::Strict),
            "EXHAUSTIVE" => Ok(Self::Exhaustive),
            _ => Err(format!("Invalid validation level: {s}")),
        }
    }
}

/// Which phase catalog the planner assembles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    #[default]
    FullMigration,
    TypeFixOnly,
    ImportRewriteOnly,
    VerifyOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Completed,
    Failed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    Info,
    #[default]
    Warning,
    Error,
    Critical,
}
