//! # Orchestration Types
//!
//! Data shared across orchestration components: phases and plans, the per-run
//! context handed to executors, executor outputs, and the final workflow result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::PipelineParams;
use crate::constants::{IssueSeverity, PhaseStatus, RiskLevel, WorkflowStatus};
use crate::orchestration::metrics::OperationMetricsSnapshot;
use crate::state_machine::StateTransition;

/// A named unit of workflow execution with declared prerequisites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    pub prerequisites: Vec<String>,
    pub estimated_duration_ms: u64,
    pub risk_level: RiskLevel,
}

impl Phase {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            prerequisites: Vec::new(),
            estimated_duration_ms: 0,
            risk_level: RiskLevel::Low,
        }
    }

    pub fn with_prerequisites(mut self, prerequisites: &[&str]) -> Self {
        self.prerequisites = prerequisites.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_estimated_duration_ms(mut self, estimated_duration_ms: u64) -> Self {
        self.estimated_duration_ms = estimated_duration_ms;
        self
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: String,
    pub phases: Vec<Phase>,
    pub estimated_duration_ms: u64,
    /// Highest risk level among the phases
    pub risk_level: RiskLevel,
}

impl ExecutionPlan {
    pub fn new(phases: Vec<Phase>) -> Self {
        let estimated_duration_ms = phases
            .iter()
            .map(|p| p.estimated_duration_ms)
            .fold(0u64, u64::saturating_add);
        let risk_level = phases
            .iter()
            .map(|p| p.risk_level)
            .max()
            .unwrap_or_default();

        Self {
            id: format!("plan_{}", Uuid::new_v4()),
            phases,
            estimated_duration_ms,
            risk_level,
        }
    }

    pub fn phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }
}

/// Published once at run start and shared read-only with every phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub session_id: String,
    pub operation_id: String,
    pub project_root: PathBuf,
    pub params: PipelineParams,
    pub timestamp: DateTime<Utc>,
    /// `None` when the project scan failed
    pub source_file_count: Option<usize>,
}

impl WorkflowContext {
    pub fn new(params: PipelineParams, project_root: impl Into<PathBuf>) -> Self {
        Self {
            session_id: format!("session_{}", Uuid::new_v4()),
            operation_id: format!("op_{}", Uuid::new_v4()),
            project_root: project_root.into(),
            params,
            timestamp: Utc::now(),
            source_file_count: None,
        }
    }

    pub fn with_source_file_count(mut self, count: Option<usize>) -> Self {
        self.source_file_count = count;
        self
    }
}

/// Non-fatal problem reported by a phase executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedIssue {
    pub code: String,
    pub message: String,
    pub severity: IssueSeverity,
}

impl ReportedIssue {
    pub fn new(code: &str, message: impl Into<String>, severity: IssueSeverity) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity,
        }
    }
}

/// What a phase executor hands back on success
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutput {
    pub summary: serde_json::Value,
    pub warnings: Vec<String>,
    pub issues: Vec<ReportedIssue>,
}

impl PhaseOutput {
    pub fn new(summary: serde_json::Value) -> Self {
        Self {
            summary,
            ..Default::default()
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_issue(mut self, issue: ReportedIssue) -> Self {
        self.issues.push(issue);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_id: String,
    pub phase_name: String,
    pub status: PhaseStatus,
    pub output: Option<PhaseOutput>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// An error entry on the final result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowError {
    pub phase_id: Option<String>,
    pub code: String,
    pub message: String,
    pub severity: IssueSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor_type: String,
    pub weight: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Always within `[0, 10]`
    pub score: f64,
    pub factors: Vec<RiskFactor>,
    /// Always within `[0, 1]`
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub operations: OperationMetricsSnapshot,
    pub phases_total: usize,
    pub phases_completed: usize,
    pub total_duration_ms: u64,
    pub estimated_duration_ms: u64,
    pub peak_concurrency: usize,
    pub checkpoints_taken: u32,
}

/// Assembled once when a run completes or fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub session_id: String,
    pub status: WorkflowStatus,
    pub plan_id: String,
    pub execution_order: Vec<String>,
    pub per_phase_results: Vec<PhaseResult>,
    pub overall_metrics: OverallMetrics,
    pub risk_assessment: RiskAssessment,
    pub risk_mitigation_score: f64,
    pub errors: Vec<WorkflowError>,
    pub warnings: Vec<String>,
    /// Timestamped lifecycle transitions of the run, ending in its terminal state
    #[serde(default)]
    pub state_transitions: Vec<StateTransition>,
    pub timestamp: DateTime<Utc>,
}

impl WorkflowResult {
    pub fn is_completed(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn phase_result(&self, phase_id: &str) -> Option<&PhaseResult> {
        self.per_phase_results.iter().find(|r| r.phase_id == phase_id)
    }
}
