//! Configuration Loader
//!
//! Environment-aware loading: defaults, then `migrator.toml`, then
//! `migrator.<environment>.toml`, then `MIGRATOR__*` environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::{OrchestratorConfig, PipelineParams};
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const ENV_PREFIX: &str = "MIGRATOR";
const DEFAULT_CONFIG_DIR: &str = "config";
const CONFIG_FILE_STEM: &str = "migrator";

pub struct ConfigManager {
    config: OrchestratorConfig,
    environment: String,
    config_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection from `./config`
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_env_prefix(None, ENV_PREFIX)
    }

    /// Load configuration from an explicit file; the file must exist
    pub fn load_from_file(path: impl Into<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_env_prefix(Some(path.into()), ENV_PREFIX)
    }

    /// Load with a custom environment-variable prefix.
    /// Tests use this to avoid sharing process-wide variables.
    pub fn load_with_env_prefix(
        config_file: Option<PathBuf>,
        env_prefix: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();

        if let Some(path) = &config_file {
            if !path.exists() {
                return Err(ConfigurationError::ConfigFileNotFound { path: path.clone() });
            }
        }

        let base_file = config_file
            .clone()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_DIR).join(format!("{CONFIG_FILE_STEM}.toml")));
        let env_file = Self::environment_override_path(&base_file, &environment);

        debug!(
            environment = %environment,
            base_file = %base_file.display(),
            env_file = %env_file.display(),
            "Loading orchestrator configuration"
        );

        let config: OrchestratorConfig = Config::builder()
            .add_source(Config::try_from(&OrchestratorConfig::default())?)
            .add_source(File::from(base_file.clone()).required(config_file.is_some()))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = %environment,
            default_max_concurrency = config.execution.default_max_concurrency,
            cache_enabled = config.cache.enabled,
            cache_ttl_seconds = config.cache.ttl_seconds,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_file: base_file.exists().then_some(base_file),
        }))
    }

    /// Read [`PipelineParams`] from a TOML or JSON file
    pub fn load_pipeline_params(path: &Path) -> ConfigResult<PipelineParams> {
        if !path.exists() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }

        let params: PipelineParams = Config::builder()
            .add_source(Config::try_from(&PipelineParams::default())?)
            .add_source(File::from(path.to_path_buf()))
            .build()?
            .try_deserialize()?;

        if params.max_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_concurrency",
                0,
                "concurrency must be at least 1",
            ));
        }

        Ok(params)
    }

    pub fn detect_environment() -> String {
        env::var("MIGRATOR_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn environment_override_path(base_file: &Path, environment: &str) -> PathBuf {
        let stem = base_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(CONFIG_FILE_STEM);
        base_file.with_file_name(format!("{stem}.{environment}.toml"))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }
}
