//! Cluster errors

use thiserror::Error;

use crate::errors::EngineError;

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors raised by the in-process collection engine
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    #[error("File {0} not found.")]
    NotFound(String),

    #[error("Unsupported scheme in {0}; only local paths and file:// are readable")]
    UnsupportedScheme(String),

    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Partition count must be greater than zero")]
    InvalidPartitions,

    #[error("Worker pool error: {0}")]
    Pool(String),
}

impl From<ClusterError> for EngineError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::InvalidPartitions => EngineError::invalid_argument(err.to_string()),
            ClusterError::UnsupportedScheme(location) => {
                EngineError::unsupported(format!("remote source {}", location))
            }
            _ => EngineError::resource(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_not_found_is_resource_error() {
        let err: EngineError = ClusterError::NotFound("data.json".into()).into();
        assert_eq!(err.code(), ErrorCode::ResourceUnavailable);
        assert_eq!(err.message(), "File data.json not found.");
    }

    #[test]
    fn test_remote_scheme_is_unsupported() {
        let err: EngineError = ClusterError::UnsupportedScheme("hdfs://nn/data.json".into()).into();
        assert_eq!(err.code(), ErrorCode::UnsupportedFeature);
        assert_eq!(err.message(), "Unsupported feature: remote source hdfs://nn/data.json");
    }

    #[test]
    fn test_invalid_partitions_is_argument_error() {
        let err: EngineError = ClusterError::InvalidPartitions.into();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }
}
