//! Type catalogue errors

use thiserror::Error;

use crate::errors::EngineError;

/// Result type for catalogue operations
pub type CatalogueResult<T> = Result<T, CatalogueError>;

/// Type catalogue errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogueError {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Type {0} clashes with a built-in type")]
    BuiltinClash(String),

    #[error("Type {0} is already declared")]
    DuplicateType(String),

    #[error("Field {field} of type {type_name} has unknown type {field_type}")]
    UnknownFieldType {
        type_name: String,
        field: String,
        field_type: String,
    },

    #[error("Invalid sequence type: {0}")]
    InvalidSequenceType(String),

    #[error("Cannot promote {found} to {target}")]
    Promotion { found: String, target: String },

    #[error("Expected {expected}, found a sequence of {found} items")]
    Cardinality { expected: String, found: usize },

    #[error("Cannot cast '{value}' to {target}")]
    Cast { value: String, target: String },
}

impl CatalogueError {
    /// Returns true for errors about a declaration rather than a value
    pub fn is_schema_error(&self) -> bool {
        !matches!(
            self,
            CatalogueError::Promotion { .. }
                | CatalogueError::Cardinality { .. }
                | CatalogueError::Cast { .. }
        )
    }
}

impl From<CatalogueError> for EngineError {
    fn from(err: CatalogueError) -> Self {
        if err.is_schema_error() {
            EngineError::invalid_schema(err.to_string())
        } else {
            EngineError::type_mismatch(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_conversion_codes() {
        let schema: EngineError = CatalogueError::DuplicateType("person".into()).into();
        assert_eq!(schema.code(), ErrorCode::InvalidSchema);

        let promotion: EngineError = CatalogueError::Promotion {
            found: "string".into(),
            target: "integer".into(),
        }
        .into();
        assert_eq!(promotion.code(), ErrorCode::TypeMismatch);
        assert!(promotion.message().contains("Cannot promote string to integer"));
    }
}
