//! # Risk Assessor
//!
//! Heuristic risk scoring. Before a run, [`RiskAssessor::assess_workflow_risk`]
//! scores the workflow from project size, validation strictness, and rollback
//! availability. After a run, [`RiskAssessor::calculate_risk_mitigation_score`]
//! turns error/warning counts and the final status into a 0-10 health score.
//!
//! Weights and thresholds come from [`RiskPolicy`] and [`MitigationPolicy`].

use tracing::{debug, warn};

use crate::config::{MitigationPolicy, PipelineParams, RiskPolicy};
use crate::constants::{RiskLevel, ValidationLevel, WorkflowStatus};
use crate::error::{OrchestratorError, Result};
use crate::orchestration::types::{RiskAssessment, RiskFactor, WorkflowContext, WorkflowResult};

const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Default)]
pub struct RiskAssessor {
    policy: RiskPolicy,
    mitigation: MitigationPolicy,
}

impl RiskAssessor {
    pub fn new(policy: RiskPolicy, mitigation: MitigationPolicy) -> Self {
        Self { policy, mitigation }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Score workflow risk, degrading to a low-confidence `LOW` assessment when
    /// an input is unavailable. Never fails.
    pub fn assess_workflow_risk(&self, context: &WorkflowContext) -> RiskAssessment {
        match self.try_assess_workflow_risk(context) {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(
                    session_id = %context.session_id,
                    error = %e,
                    "Risk assessment incomplete, using fallback"
                );
                self.fallback_assessment(&e.to_string())
            }
        }
    }

    pub fn try_assess_workflow_risk(&self, context: &WorkflowContext) -> Result<RiskAssessment> {
        let file_count = context.source_file_count.ok_or_else(|| {
            OrchestratorError::RiskAssessmentError(
                "source file count unavailable for project".to_string(),
            )
        })?;

        let (points, factors) = self.score_inputs(file_count, &context.params);
        let level = self.level_for_points(points);
        let assessment = RiskAssessment {
            level,
            score: (points as f64).clamp(0.0, MAX_SCORE),
            factors,
            confidence: self.policy.confidence.clamp(0.0, 1.0),
        };

        debug!(
            session_id = %context.session_id,
            file_count,
            points,
            level = %level,
            "Workflow risk assessed"
        );

        Ok(assessment)
    }

    /// Additive points and the factors that contributed them
    pub fn score_inputs(&self, file_count: usize, params: &PipelineParams) -> (u32, Vec<RiskFactor>) {
        let mut factors = Vec::new();

        if let Some(tier) = self
            .policy
            .file_count_tiers
            .iter()
            .filter(|tier| file_count > tier.above)
            .max_by_key(|tier| tier.points)
        {
            factors.push(RiskFactor {
                factor_type: "file_count".to_string(),
                weight: tier.points as f64,
                description: format!("{file_count} source files (more than {})", tier.above),
            });
        }

        let validation_points = match params.validation_level {
            ValidationLevel::Basic => self.policy.basic_validation_points,
            ValidationLevel::Strict => self.policy.strict_validation_points,
            ValidationLevel::Exhaustive => self.policy.exhaustive_validation_points,
        };
        if validation_points > 0 {
            factors.push(RiskFactor {
                factor_type: "validation_level".to_string(),
                weight: validation_points as f64,
                description: format!("validation level {:?}", params.validation_level),
            });
        }

        if !params.enable_rollback && self.policy.rollback_disabled_points > 0 {
            factors.push(RiskFactor {
                factor_type: "rollback_disabled".to_string(),
                weight: self.policy.rollback_disabled_points as f64,
                description: "rollback is disabled".to_string(),
            });
        }

        let points = factors.iter().map(|f| f.weight as u32).sum();
        (points, factors)
    }

    pub fn level_for_points(&self, points: u32) -> RiskLevel {
        if points >= self.policy.high_threshold {
            RiskLevel::High
        } else if points >= self.policy.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn fallback_assessment(&self, reason: &str) -> RiskAssessment {
        RiskAssessment {
            level: RiskLevel::Low,
            score: 0.0,
            factors: vec![RiskFactor {
                factor_type: "assessment_incomplete".to_string(),
                weight: 0.0,
                description: reason.to_string(),
            }],
            confidence: self.policy.fallback_confidence.clamp(0.0, 1.0),
        }
    }

    /// Post-hoc 0-10 health score for a finished run
    pub fn calculate_risk_mitigation_score(&self, result: &WorkflowResult) -> f64 {
        self.mitigation_score(result.errors.len(), result.warnings.len(), result.status)
    }

    pub fn mitigation_score(
        &self,
        error_count: usize,
        warning_count: usize,
        status: WorkflowStatus,
    ) -> f64 {
        let m = &self.mitigation;
        let mut score = m.base_score;
        score -= (error_count as f64 * m.error_penalty).min(m.max_error_penalty);
        score -= (warning_count as f64 * m.warning_penalty).min(m.max_warning_penalty);
        if status == WorkflowStatus::Completed {
            score += m.completion_bonus;
        }
        score.clamp(0.0, MAX_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(file_count: Option<usize>, params: PipelineParams) -> WorkflowContext {
        WorkflowContext::new(params, "/tmp/project").with_source_file_count(file_count)
    }

    #[test]
    fn test_small_strict_project_is_low() {
        let assessor = RiskAssessor::default();
        let assessment = assessor.assess_workflow_risk(&context(Some(50), PipelineParams::default()));

        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.score, 1.0);
        assert_eq!(assessment.factors.len(), 1);
        assert_eq!(assessment.confidence, 0.8);
    }

    #[test]
    fn test_large_basic_project_without_rollback_is_high() {
        let assessor = RiskAssessor::default();
        let params = PipelineParams::default()
            .with_validation_level(ValidationLevel::Basic)
            .with_rollback(false);
        let assessment = assessor.assess_workflow_risk(&context(Some(1500), params));

        assert_eq!(assessment.score, 7.0);
        assert_eq!(assessment.level, RiskLevel::High);
        let types: Vec<_> = assessment.factors.iter().map(|f| f.factor_type.as_str()).collect();
        assert_eq!(types, vec!["file_count", "validation_level", "rollback_disabled"]);
    }

    #[test]
    fn test_medium_threshold() {
        let assessor = RiskAssessor::default();
        let params = PipelineParams::default().with_validation_level(ValidationLevel::Basic);
        let assessment = assessor.assess_workflow_risk(&context(Some(600), params));
        assert_eq!(assessment.score, 4.0);
        assert_eq!(assessment.level, RiskLevel::Medium);
    }

    #[test]
    fn test_tier_boundaries_are_exclusive() {
        let assessor = RiskAssessor::default();
        let params = PipelineParams::default().with_validation_level(ValidationLevel::Exhaustive);
        let (at_100, _) = assessor.score_inputs(100, &params);
        let (at_101, _) = assessor.score_inputs(101, &params);
        let (at_1001, _) = assessor.score_inputs(1001, &params);
        assert_eq!(at_100, 0);
        assert_eq!(at_101, 1);
        assert_eq!(at_1001, 3);
    }

    #[test]
    fn test_missing_file_count_falls_back_to_low() {
        let assessor = RiskAssessor::default();
        let params = PipelineParams::default()
            .with_validation_level(ValidationLevel::Basic)
            .with_rollback(false);
        let ctx = context(None, params);

        assert_eq!(
            assessor.try_assess_workflow_risk(&ctx).unwrap_err().code(),
            "RISK_ASSESSMENT_ERROR"
        );

        let assessment = assessor.assess_workflow_risk(&ctx);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.confidence, 0.3);
    }

    #[test]
    fn test_mitigation_score() {
        let assessor = RiskAssessor::default();
        assert_eq!(assessor.mitigation_score(0, 0, WorkflowStatus::Completed), 10.0);
        assert_eq!(assessor.mitigation_score(1, 0, WorkflowStatus::Failed), 8.0);
        assert_eq!(assessor.mitigation_score(10, 0, WorkflowStatus::Failed), 5.0);
        assert_eq!(assessor.mitigation_score(0, 3, WorkflowStatus::Completed), 9.5);
        assert_eq!(assessor.mitigation_score(0, 3, WorkflowStatus::Failed), 8.5);
        assert_eq!(assessor.mitigation_score(100, 100, WorkflowStatus::Failed), 3.0);
    }

    #[test]
    fn test_mitigation_score_is_clamped() {
        let assessor = RiskAssessor::new(
            RiskPolicy::default(),
            MitigationPolicy {
                base_score: 10.0,
                error_penalty: 20.0,
                max_error_penalty: 50.0,
                ..MitigationPolicy::default()
            },
        );
        assert_eq!(assessor.mitigation_score(3, 0, WorkflowStatus::Failed), 0.0);
    }
}
