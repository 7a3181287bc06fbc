//! # Orchestrator Configuration
//!
//! Policy knobs for the orchestrator (concurrency defaults, cache TTLs, risk and
//! mitigation scoring) and the per-run [`PipelineParams`].
//!
//! ## Layering
//!
//! [`ConfigManager`] merges, lowest precedence first:
//!
//! 1. Built-in defaults ([`OrchestratorConfig::default`])
//! 2. An optional TOML file (`config/migrator.toml` unless a path is given)
//! 3. Environment overrides: `MIGRATOR__<SECTION>__<FIELD>`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use migrator_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let ttl = manager.config().cache.ttl();
//! let max = manager.config().execution.default_max_concurrency;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;
pub mod pipeline_params;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_MAX_CONCURRENCY, MAX_CACHE_TTL_SECONDS};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;
pub use pipeline_params::PipelineParams;

/// Root configuration structure mirroring `migrator.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub execution: ExecutionConfig,
    pub cache: CacheConfig,
    pub risk: RiskPolicy,
    pub mitigation: MitigationPolicy,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Used until a run supplies its own `max_concurrency`
    pub default_max_concurrency: usize,
    /// Zero disables the per-phase timeout
    pub phase_timeout_seconds: u64,
    /// Stop admitting sub-operations after the first failure in a batch
    pub fail_fast_batches: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_max_concurrency: DEFAULT_MAX_CONCURRENCY,
            phase_timeout_seconds: 0,
            fail_fast_batches: true,
        }
    }
}

impl ExecutionConfig {
    pub fn phase_timeout(&self) -> Option<Duration> {
        (self.phase_timeout_seconds > 0).then(|| Duration::from_secs(self.phase_timeout_seconds))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Additive workflow risk scoring weights and thresholds.
///
/// The defaults are illustrative and expected to be tuned per deployment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Only the highest-scoring tier the file count exceeds contributes
    pub file_count_tiers: Vec<FileCountTier>,
    pub basic_validation_points: u32,
    pub strict_validation_points: u32,
    pub exhaustive_validation_points: u32,
    pub rollback_disabled_points: u32,
    pub high_threshold: u32,
    pub medium_threshold: u32,
    /// Confidence reported when every input was available
    pub confidence: f64,
    /// Confidence reported with the fallback assessment
    pub fallback_confidence: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            file_count_tiers: vec![
                FileCountTier::new(1000, 3),
                FileCountTier::new(500, 2),
                FileCountTier::new(100, 1),
            ],
            basic_validation_points: 2,
            strict_validation_points: 1,
            exhaustive_validation_points: 0,
            rollback_disabled_points: 2,
            high_threshold: 6,
            medium_threshold: 4,
            confidence: 0.8,
            fallback_confidence: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileCountTier {
    /// Applies when the source file count is strictly greater than this
    pub above: usize,
    pub points: u32,
}

impl FileCountTier {
    pub fn new(above: usize, points: u32) -> Self {
        Self { above, points }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MitigationPolicy {
    pub base_score: f64,
    pub error_penalty: f64,
    pub max_error_penalty: f64,
    pub warning_penalty: f64,
    pub max_warning_penalty: f64,
    pub completion_bonus: f64,
}

impl Default for MitigationPolicy {
    fn default() -> Self {
        Self {
            base_score: 10.0,
            error_penalty: 2.0,
            max_error_penalty: 5.0,
            warning_penalty: 0.5,
            max_warning_penalty: 2.0,
            completion_bonus: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl OrchestratorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.execution.default_max_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.default_max_concurrency",
                0,
                "concurrency must be at least 1",
            ));
        }

        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.ttl_seconds",
                0,
                "an enabled cache needs a positive TTL",
            ));
        }

        if self.cache.ttl_seconds > MAX_CACHE_TTL_SECONDS {
            return Err(ConfigurationError::invalid_value(
                "cache.ttl_seconds",
                self.cache.ttl_seconds,
                "must not exceed 30 days",
            ));
        }

        if self.risk.medium_threshold > self.risk.high_threshold {
            return Err(ConfigurationError::invalid_value(
                "risk.medium_threshold",
                self.risk.medium_threshold,
                "must not exceed risk.high_threshold",
            ));
        }

        for (field, value) in [
            ("risk.confidence", self.risk.confidence),
            ("risk.fallback_confidence", self.risk.fallback_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    "confidence must be within [0, 1]",
                ));
            }
        }

        let m = &self.mitigation;
        for (field, value) in [
            ("mitigation.error_penalty", m.error_penalty),
            ("mitigation.max_error_penalty", m.max_error_penalty),
            ("mitigation.warning_penalty", m.warning_penalty),
            ("mitigation.max_warning_penalty", m.max_warning_penalty),
            ("mitigation.completion_bonus", m.completion_bonus),
        ] {
            if value < 0.0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    "penalties and bonuses must be non-negative",
                ));
            }
        }

        Ok(())
    }
}
