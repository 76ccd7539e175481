//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across the sonar workspace.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sonar_common::config::{ConfigLoader, SharedConfig, ConfigError};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct MyAppConfig {
//!     shared: SharedConfig,
//!     port: u16,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = MyAppConfig::load(Path::new("config.toml"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::SERVICE_NAME;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, per-edge tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Common configuration fields shared across sonar applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "sonar-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    SERVICE_NAME.to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration, falling back to `Default` when the file is absent.
    ///
    /// Parse errors are still reported; only a missing file is tolerated.
    fn load_or_default(path: &Path) -> Result<Self, ConfigError>
    where
        Self: Default,
    {
        match Self::load(path) {
            Err(ConfigError::FileNotFound) => {
                tracing::info!("No config at {:?}, using defaults", path);
                Ok(Self::default())
            }
            other => other,
        }
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize, Default)]
    struct TestConfig {
        #[serde(default)]
        shared: SharedConfig,
        #[serde(default)]
        value: u32,
    }

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"trace\"").unwrap().level,
            LogLevel::Trace
        );
        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"warn\"").unwrap().level,
            LogLevel::Warn
        );
        assert!(toml::from_str::<TestWrapper>("level = \"loud\"").is_err());
    }

    #[test]
    fn test_log_level_into_tracing() {
        assert_eq!(tracing::Level::from(LogLevel::Debug), tracing::Level::DEBUG);
        assert_eq!(tracing::Level::from(LogLevel::Error), tracing::Level::ERROR);
    }

    #[test]
    fn test_shared_config_defaults() {
        let config = SharedConfig::default();
        assert_eq!(config.service_name, SERVICE_NAME);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: String::new(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "value = 7\n[shared]\nlog_level = \"debug\"").unwrap();

        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.value, 7);
        assert_eq!(config.shared.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_load_missing_file() {
        let result = TestConfig::load(Path::new("/nonexistent/sonar.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = TestConfig::load_or_default(Path::new("/nonexistent/sonar.toml")).unwrap();
        assert_eq!(config.value, 0);
    }

    #[test]
    fn test_load_or_default_reports_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "value = [not toml").unwrap();

        let result = TestConfig::load_or_default(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
