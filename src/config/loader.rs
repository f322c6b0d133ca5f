//! Configuration loading: defaults, then an optional file, then
//! `DISPATCHQ_*` environment overrides (double underscore separates
//! sections, e.g. `DISPATCHQ_DISPATCH__WORKERS=8`).

use std::env;
use std::path::Path;

use config::{Config, Environment, File};
use tracing::info;

use crate::config::DispatchqConfig;
use crate::error::{DispatchError, Result};

/// Loads and holds the validated configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: DispatchqConfig,
    environment: String,
}

impl ConfigManager {
    /// Load configuration with the file path taken from
    /// `DISPATCHQ_CONFIG_PATH` when set
    pub fn load() -> Result<Self> {
        let path = env::var("DISPATCHQ_CONFIG_PATH").ok();
        Self::load_from_path(path.as_deref().map(Path::new))
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from_path(path: Option<&Path>) -> Result<Self> {
        let environment = detect_environment();

        let mut builder = Config::builder().add_source(
            Config::try_from(&DispatchqConfig::default())
                .map_err(|e| DispatchError::Configuration(e.to_string()))?,
        );
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix("DISPATCHQ").separator("__"));

        let config: DispatchqConfig = builder
            .build()
            .map_err(|e| DispatchError::Configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| DispatchError::Configuration(e.to_string()))?;

        config.validate().map_err(DispatchError::Configuration)?;

        info!(
            environment = %environment,
            workers = config.dispatch.workers,
            failure_threshold = config.circuit_breaker.failure_threshold,
            "⚙️ Configuration loaded"
        );

        Ok(Self {
            config,
            environment,
        })
    }

    pub fn config(&self) -> &DispatchqConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }
}

/// Detect the runtime environment from environment variables
fn detect_environment() -> String {
    env::var("DISPATCHQ_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults_without_file() {
        let manager = ConfigManager::load_from_path(None).unwrap();
        assert_eq!(manager.config().dispatch.workers, 4);
        assert_eq!(manager.config().backoff.base_delay_seconds, 60);
    }

    #[test]
    fn test_environment_detection_defaults_to_development() {
        // Only meaningful when the variables are unset in the test runner
        if env::var("DISPATCHQ_ENV").is_err() && env::var("APP_ENV").is_err() {
            assert_eq!(detect_environment(), "development");
        }
    }
}
