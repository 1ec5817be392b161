//! Engine configuration
//!
//! Loaded from an optional JSON file; every field has a default. The
//! configuration is validated once, before a session is built from it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::EngineError;
use crate::observability::Severity;
use crate::types::ObjectType;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("{0}")]
    Invalid(String),
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Read { .. } => EngineError::resource(err.to_string()),
            _ => EngineError::invalid_argument(err.to_string()),
        }
    }
}

/// Engine configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Partitions used when a source does not say otherwise
    #[serde(default = "default_partitions")]
    pub default_partitions: usize,

    /// Size of the worker pool; 0 uses one thread per core
    #[serde(default)]
    pub worker_threads: usize,

    /// Most items one distributed-to-local crossing may pull (unbounded if unset)
    #[serde(default)]
    pub materialization_cap: Option<usize>,

    /// Minimum log severity: trace, info, warn, error or fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// User object types registered at session start
    #[serde(default)]
    pub type_declarations: Vec<ObjectType>,
}

fn default_partitions() -> usize {
    4
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_partitions: default_partitions(),
            worker_threads: 0,
            materialization_cap: None,
            log_level: default_log_level(),
            type_declarations: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: EngineConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate field ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_partitions == 0 {
            return Err(ConfigError::Invalid("default_partitions must be > 0".into()));
        }

        if self.materialization_cap == Some(0) {
            return Err(ConfigError::Invalid(
                "materialization_cap must be > 0 when set".into(),
            ));
        }

        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level: '{}'. Must be one of trace, info, warn, error, fatal.",
                self.log_level
            )));
        }

        Ok(())
    }

    /// The configured minimum log severity
    pub fn severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_partitions, 4);
        assert_eq!(config.severity(), Severity::Info);
    }

    #[test]
    fn test_rejects_zero_partitions() {
        let err = EngineConfig::from_json(r#"{"default_partitions": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_cap() {
        assert!(EngineConfig::from_json(r#"{"materialization_cap": 0}"#).is_err());
        let config = EngineConfig::from_json(r#"{"materialization_cap": 10}"#).unwrap();
        assert_eq!(config.materialization_cap, Some(10));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        assert!(EngineConfig::from_json(r#"{"log_level": "loud"}"#).is_err());
    }

    #[test]
    fn test_type_declarations() {
        let config = EngineConfig::from_json(
            r#"{"type_declarations": [{"name": "person", "fields": {"name": {"type": "string", "required": true}}}]}"#,
        )
        .unwrap();
        assert_eq!(config.type_declarations.len(), 1);
        assert!(config.type_declarations[0].fields["name"].required);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"worker_threads": 2, "log_level": "warn"}}"#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.severity(), Severity::Warn);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load(Path::new("/no/such/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
