//! CLI errors
//!
//! Engine failures keep their engine code; everything the CLI itself can
//! get wrong is reported under a `TQ_CLI_*` code.

use std::io;

use thiserror::Error;

use crate::errors::EngineError;
use crate::session::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file or flag override
    #[error("TQ_CLI_CONFIG_ERROR: {0}")]
    Config(String),

    /// stdin/stdout or module file
    #[error("TQ_CLI_IO_ERROR: {0}")]
    Io(String),

    /// The query was rejected by `explain`
    #[error("TQ_CLI_QUERY_REJECTED: {0}")]
    Rejected(String),

    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl CliError {
    /// The stable code written in error responses
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "TQ_CLI_CONFIG_ERROR",
            CliError::Io(_) => "TQ_CLI_IO_ERROR",
            CliError::Rejected(_) => "TQ_CLI_QUERY_REJECTED",
            CliError::Engine(e) => e.code().code(),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Io(format!("Malformed JSON: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_keeps_engine_code() {
        let err: CliError = EngineError::undefined_function("f", 1).into();
        assert_eq!(err.code(), "TQ_UNDEFINED_FUNCTION");
        assert!(matches!(err, CliError::Engine(_)));
    }

    #[test]
    fn test_config_error_display() {
        let err: CliError = ConfigError::Invalid("default_partitions must be > 0".into()).into();
        assert_eq!(err.code(), "TQ_CLI_CONFIG_ERROR");
        assert_eq!(
            err.to_string(),
            "TQ_CLI_CONFIG_ERROR: default_partitions must be > 0"
        );
    }

    #[test]
    fn test_io_error_code() {
        let err: CliError = io::Error::new(io::ErrorKind::UnexpectedEof, "closed").into();
        assert_eq!(err.code(), "TQ_CLI_IO_ERROR");
    }
}
