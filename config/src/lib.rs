//! # Configuration Management for rowbus
//!
//! This crate provides the configuration structures shared by the rowbus
//! workspace: where the row store lives and how the storage layer behaves.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{AppConfig, DatabaseConfig, StorageConfig};
//!
//! let config = AppConfig {
//!     database: DatabaseConfig::new("sqlite://app.db".to_string(), true, 5000, true),
//!     storage: StorageConfig::new(true, true),
//! };
//! assert_eq!(config.database.url, "sqlite://app.db");
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [database]
//! url = "sqlite://app.db"
//! create_if_missing = true
//! busy_timeout_ms = 5000
//! foreign_keys = true
//!
//! [storage]
//! log_operations = true
//! use_transactions_by_default = true
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from rowbus.toml (or the path in ROWBUS_CONFIG)
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{env, path::Path};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./rowbus.toml";
const CONFIG_PATH_VAR: &str = "ROWBUS_CONFIG";

/// URL of a private in-memory SQLite database.
pub const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Row store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
}

/// Storage layer behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Register the logging interceptor on every storage built from this config
    #[serde(default)]
    pub log_operations: bool,
    /// Whether collection writes run inside one transaction unless told otherwise
    #[serde(default = "default_true")]
    pub use_transactions_by_default: bool,
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout() -> u64 {
    5000
}

impl AppConfig {
    /// Load configuration from the TOML file named in `.env` / the environment, or the default path
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is fine, the variable may come from the real environment
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let config = if let Ok(config_path) = env::var(CONFIG_PATH_VAR) {
            Self::from_file(&config_path)
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Err(ConfigError::Invalid(format!(
                "Config path must be specified as {} (environment or .env file) or in {} file",
                CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH
            )))
        }?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for a private in-memory database, mostly for tests
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Database url cannot be empty".to_string(),
            ));
        }
        if !self.database.url.starts_with("sqlite:") {
            return Err(ConfigError::Invalid(format!(
                "Database url must use the sqlite: scheme, got '{}'",
                self.database.url
            )));
        }
        if self.database.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Database busy_timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Create a new database configuration
    pub fn new(url: String, create_if_missing: bool, busy_timeout_ms: u64, foreign_keys: bool) -> Self {
        Self {
            url,
            create_if_missing,
            busy_timeout_ms,
            foreign_keys,
        }
    }

    /// Whether the url points at an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new(IN_MEMORY_URL.to_string(), true, default_busy_timeout(), true)
    }
}

impl StorageConfig {
    /// Create a new storage configuration
    pub fn new(log_operations: bool, use_transactions_by_default: bool) -> Self {
        Self {
            log_operations,
            use_transactions_by_default,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(false, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_in_memory() {
        let config = AppConfig::in_memory();
        assert!(config.database.is_in_memory());
        assert!(config.storage.use_transactions_by_default);
        assert!(!config.storage.log_operations);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [database]
            url = "sqlite://app.db"
            create_if_missing = false
            busy_timeout_ms = 250
            foreign_keys = false

            [storage]
            log_operations = true
            use_transactions_by_default = false
            "#,
        )
        .expect("valid config");

        assert_eq!(config.database.url, "sqlite://app.db");
        assert!(!config.database.create_if_missing);
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert!(config.storage.log_operations);
        assert!(!config.storage.use_transactions_by_default);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [database]
            url = "sqlite::memory:"
            "#,
        )
        .expect("valid config");

        assert!(config.database.create_if_missing);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_rejects_non_sqlite_url() {
        let result = AppConfig::from_toml_str(
            r#"
            [database]
            url = "postgresql://localhost/app"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_busy_timeout() {
        let mut config = AppConfig::in_memory();
        config.database.busy_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[database]\nurl = \"sqlite://data/app.db\"").expect("write config");

        let config = AppConfig::from_file(file.path()).expect("valid config");
        assert_eq!(config.database.url, "sqlite://data/app.db");
        assert!(!config.database.is_in_memory());
    }
}
