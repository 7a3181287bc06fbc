//! # Error Types
//!
//! Every component returns an explicit `Result`; the orchestrator converts any
//! failure that escapes a run into a [`StructuredError`] so callers never see an
//! uncategorized error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    /// Bad params or a plan that failed validation. Non-retryable.
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// A plan rejected by the planner; reported as a validation error
    #[error("Validation error: invalid plan: {0}")]
    InvalidPlan(#[from] InvalidPlanError),
    /// Missing system dependency. Non-retryable.
    #[error("Prerequisite error: {0}")]
    PrerequisiteError(String),
    #[error("Phase {phase_id} failed: {reason}")]
    PhaseExecutionError {
        phase_id: String,
        reason: String,
        code: String,
    },
    #[error("Limiter configuration error: {0}")]
    LimiterConfigError(String),
    #[error("Cache error: {0}")]
    CacheError(String),
    #[error("Risk assessment error: {0}")]
    RiskAssessmentError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("State transition error: {from} -> {to}")]
    StateTransitionError { from: String, to: String },
    #[error("Completion invariant violated: {0}")]
    CompletionInvariantError(String),
}

/// Reasons a plan is rejected by [`crate::orchestration::PhasePlanner::validate_plan`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPlanError {
    #[error("plan contains no phases")]
    EmptyPlan,
    #[error("duplicate phase id '{0}'")]
    DuplicatePhase(String),
    #[error("phase '{phase_id}' depends on unknown phase '{prerequisite}'")]
    UnknownPrerequisite {
        phase_id: String,
        prerequisite: String,
    },
    #[error("dependency cycle between phases {0:?}")]
    Cycle(Vec<String>),
}

impl InvalidPlanError {
    pub fn violation(&self) -> &'static str {
        match self {
            Self::EmptyPlan => "empty_plan",
            Self::DuplicatePhase(_) => "duplicate_phase",
            Self::UnknownPrerequisite { .. } => "unknown_prerequisite",
            Self::Cycle(_) => "cycle",
        }
    }
}

impl OrchestratorError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &str {
        match self {
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidPlan(_) => "VALIDATION_ERROR",
            Self::PrerequisiteError(_) => "PREREQUISITE_ERROR",
            Self::PhaseExecutionError { code, .. } => code,
            Self::LimiterConfigError(_) => "LIMITER_CONFIG_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::RiskAssessmentError(_) => "RISK_ASSESSMENT_ERROR",
            Self::ConfigurationError(_) => "CONFIGURATION_ERROR",
            Self::StateTransitionError { .. } => "STATE_TRANSITION_ERROR",
            Self::CompletionInvariantError(_) => "COMPLETION_INVARIANT_ERROR",
        }
    }

    /// Whether the orchestrator may log this error and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CacheError(_) | Self::RiskAssessmentError(_))
    }

    pub fn phase_failed(phase_id: &str, reason: impl Into<String>, code: &str) -> Self {
        Self::PhaseExecutionError {
            phase_id: phase_id.to_string(),
            reason: reason.into(),
            code: code.to_string(),
        }
    }

    pub fn to_structured(&self) -> StructuredError {
        let mut context = HashMap::new();
        match self {
            Self::PhaseExecutionError { phase_id, .. } => {
                context.insert("phase_id".to_string(), Value::String(phase_id.clone()));
            }
            Self::InvalidPlan(plan_error) => {
                context.insert(
                    "violation".to_string(),
                    Value::String(plan_error.violation().to_string()),
                );
                match plan_error {
                    InvalidPlanError::UnknownPrerequisite {
                        phase_id,
                        prerequisite,
                    } => {
                        context.insert("phase_id".to_string(), Value::String(phase_id.clone()));
                        context.insert(
                            "prerequisite".to_string(),
                            Value::String(prerequisite.clone()),
                        );
                    }
                    InvalidPlanError::DuplicatePhase(phase_id) => {
                        context.insert("phase_id".to_string(), Value::String(phase_id.clone()));
                    }
                    InvalidPlanError::Cycle(members) => {
                        context.insert("cycle".to_string(), serde_json::json!(members));
                    }
                    InvalidPlanError::EmptyPlan => {}
                }
            }
            Self::StateTransitionError { from, to } => {
                context.insert("from".to_string(), Value::String(from.clone()));
                context.insert("to".to_string(), Value::String(to.clone()));
            }
            _ => {}
        }
        context.insert(
            "recoverable".to_string(),
            Value::Bool(self.is_recoverable()),
        );

        StructuredError {
            code: self.code().to_string(),
            message: self.to_string(),
            context,
        }
    }
}

impl From<ConfigurationError> for OrchestratorError {
    fn from(error: ConfigurationError) -> Self {
        OrchestratorError::ConfigurationError(error.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(error: serde_json::Error) -> Self {
        OrchestratorError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

/// Caller-facing error shape: `{code, message, context}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredError {
    pub code: String,
    pub message: String,
    pub context: HashMap<String, Value>,
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for StructuredError {}

impl From<OrchestratorError> for StructuredError {
    fn from(error: OrchestratorError) -> Self {
        error.to_structured()
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
