//! Per-run pipeline parameters supplied by the caller.

use serde::{Deserialize, Serialize};

use crate::constants::{ValidationLevel, WorkflowType, DEFAULT_MAX_CONCURRENCY};
use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub validation_level: ValidationLevel,
    pub max_concurrency: usize,
    pub enable_rollback: bool,
    pub dry_run: bool,
    /// Zero disables checkpoint events
    pub checkpoint_interval_minutes: u32,
    pub workflow_type: WorkflowType,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            validation_level: ValidationLevel::Strict,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            enable_rollback: true,
            dry_run: false,
            checkpoint_interval_minutes: 0,
            workflow_type: WorkflowType::FullMigration,
        }
    }
}

impl PipelineParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(OrchestratorError::ValidationError(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_validation_level(mut self, level: ValidationLevel) -> Self {
        self.validation_level = level;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_rollback(mut self, enable_rollback: bool) -> Self {
        self.enable_rollback = enable_rollback;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_checkpoint_interval(mut self, minutes: u32) -> Self {
        self.checkpoint_interval_minutes = minutes;
        self
    }

    pub fn with_workflow_type(mut self, workflow_type: WorkflowType) -> Self {
        self.workflow_type = workflow_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let params = PipelineParams::default().with_max_concurrency(0);
        let err = params.validate().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_deserializes_partial_params() {
        let params: PipelineParams = serde_json::from_value(serde_json::json!({
            "validation_level": "BASIC",
            "enable_rollback": false
        }))
        .unwrap();

        assert_eq!(params.validation_level, ValidationLevel::Basic);
        assert!(!params.enable_rollback);
        assert_eq!(params.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(params.workflow_type, WorkflowType::FullMigration);
    }
}
