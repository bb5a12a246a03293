//! Configuration module for filedrop.

use serde::Deserialize;
use std::path::Path;

use crate::{FiledropError, Result};

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory for uploaded files. An empty string selects a fresh
    /// temporary directory.
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Create the directory when it does not exist yet.
    #[serde(default)]
    pub create_if_missing: bool,
}

fn default_directory() -> String {
    ".".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            create_if_missing: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file, appended to. Empty logs to stdout only.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/filedrop.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FiledropError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FiledropError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEDROP_DIRECTORY`: Override the storage directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(directory) = std::env::var("FILEDROP_DIRECTORY") {
            if !directory.is_empty() {
                self.storage.directory = directory;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the log level is not one of the known levels.
    pub fn validate(&self) -> Result<()> {
        let level = self.logging.level.to_lowercase();
        if !matches!(
            level.as_str(),
            "trace" | "debug" | "info" | "warn" | "warning" | "error"
        ) {
            return Err(FiledropError::Config(format!(
                "unknown log level {:?}",
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.storage.directory, ".");
        assert!(!config.storage.create_if_missing);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/filedrop.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[storage]
directory = "/srv/drop"
create_if_missing = true

[logging]
level = "debug"
file = "custom/logs/drop.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.storage.directory, "/srv/drop");
        assert!(config.storage.create_if_missing);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/logs/drop.log");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[storage]
directory = ""
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.storage.directory, "");
        assert!(!config.storage.create_if_missing);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        if let Err(FiledropError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(FiledropError::Io(_))));
    }

    #[test]
    fn test_apply_env_overrides_directory() {
        let original = std::env::var("FILEDROP_DIRECTORY").ok();

        std::env::set_var("FILEDROP_DIRECTORY", "/tmp/from-env");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.storage.directory, "/tmp/from-env");

        std::env::set_var("FILEDROP_DIRECTORY", "");
        let mut config = Config::default();
        config.storage.directory = "kept".to_string();
        config.apply_env_overrides();
        assert_eq!(config.storage.directory, "kept");

        if let Some(val) = original {
            std::env::set_var("FILEDROP_DIRECTORY", val);
        } else {
            std::env::remove_var("FILEDROP_DIRECTORY");
        }
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.logging.level = "WARNING".to_string();
        assert!(config.validate().is_ok());

        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(FiledropError::Config(_))));
    }
}
