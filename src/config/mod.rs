//! Layered configuration
//!
//! Settings are loaded from, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use fleetreport::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Batch ceiling: {}", config.run.parallelism);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `FLEETREPORT__<section>__<key>`:
//! - `FLEETREPORT__RUN__PARALLELISM=10`
//! - `FLEETREPORT__STORAGE__ROOT=/srv/fleetreport`
//! - `FLEETREPORT__API__BASE_URL=https://reports.internal`
//!
//! The API token is only ever read from `FLEETREPORT_API_TOKEN`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/fleetreport.toml`.
//! This can be overridden using the `FLEETREPORT_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    AccountSource, AccountsConfig, ApiConfig, Config, LockConfig, MAX_PARALLELISM,
    RetentionConfig, RunConfig, SheetsConfig, StorageConfig, StorageProvider,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to render configuration: {0}")]
    RenderError(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(sources::default_path())
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Effective configuration as TOML. The API token is never included.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[accounts]
ids = ["A", "B", "C"]

[api]
base_url = "http://localhost:8080"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.accounts.ids.len(), 3);
        assert_eq!(config.run.parallelism, MAX_PARALLELISM);
    }

    #[test]
    fn test_validation_rejects_parallelism_over_cap() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[run]
parallelism = 200
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidParallelism { value: 200, .. })
        ));
    }

    #[test]
    fn test_missing_base_url_rejected_at_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[accounts]\nids = [\"A\"]\n").unwrap();

        assert!(matches!(
            Config::load_from_path(config_path),
            Err(ConfigError::ValidationError(ValidationError::MissingApiBaseUrl))
        ));
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[run\nparallelism = ").unwrap();

        assert!(matches!(
            Config::load_from_path(config_path),
            Err(ConfigError::LoadError(_))
        ));
    }

    #[test]
    fn test_to_toml_omits_token() {
        let mut config = Config::default();
        config.api.base_url = Some("https://reports.internal".to_string());
        config.api.token = Some("secret".to_string());

        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[run]"));
        assert!(rendered.contains("parallelism = 50"));
        assert!(rendered.contains("max_region_bytes = \"16MB\""));
        assert!(rendered.contains("https://reports.internal"));
        assert!(!rendered.contains("secret"));
    }
}
