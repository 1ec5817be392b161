//! Engine error types
//!
//! Every failure during analysis or evaluation surfaces as an [`EngineError`].
//! All errors are fatal to the current evaluation and none are retried.
//!
//! Error codes:
//! - TQ_ARITY_MISMATCH (ERROR)
//! - TQ_TYPE_MISMATCH (ERROR)
//! - TQ_ITERATOR_FLOW (FATAL)
//! - TQ_INVALID_SCHEMA (ERROR)
//! - TQ_NON_GROUPABLE_TYPE (ERROR)
//! - TQ_UNSUPPORTED_FEATURE (ERROR)
//! - TQ_RESOURCE_UNAVAILABLE (ERROR)
//! - TQ_UNDEFINED_FUNCTION (ERROR)
//! - TQ_UNDEFINED_VARIABLE (ERROR)
//! - TQ_INVALID_ARGUMENT (ERROR)
//! - TQ_MATERIALIZATION_LIMIT (ERROR)

mod metadata;

pub use metadata::SourcePosition;

use std::fmt;

/// Severity levels for engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The query is wrong or its data is; the engine is healthy
    Error,
    /// The engine itself violated its protocol
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Engine error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Argument count does not match the callee's parameter count
    ArityMismatch,
    /// Static or dynamic promotion failure
    TypeMismatch,
    /// Iterator protocol violation, or an unset execution mode was read
    IteratorFlow,
    /// Malformed type declaration
    InvalidSchema,
    /// Grouping key is not a single atomic or an empty sequence
    NonGroupableType,
    /// Recognized construct that is not implemented
    UnsupportedFeature,
    /// External resource is unreachable or invalid
    ResourceUnavailable,
    /// No function with this name and arity
    UndefinedFunction,
    /// Variable not in scope
    UndefinedVariable,
    /// Dynamic error raised by an operator or built-in
    InvalidArgument,
    /// Too many items crossed from a distributed to a local representation
    MaterializationLimit,
}

impl ErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::ArityMismatch => "TQ_ARITY_MISMATCH",
            ErrorCode::TypeMismatch => "TQ_TYPE_MISMATCH",
            ErrorCode::IteratorFlow => "TQ_ITERATOR_FLOW",
            ErrorCode::InvalidSchema => "TQ_INVALID_SCHEMA",
            ErrorCode::NonGroupableType => "TQ_NON_GROUPABLE_TYPE",
            ErrorCode::UnsupportedFeature => "TQ_UNSUPPORTED_FEATURE",
            ErrorCode::ResourceUnavailable => "TQ_RESOURCE_UNAVAILABLE",
            ErrorCode::UndefinedFunction => "TQ_UNDEFINED_FUNCTION",
            ErrorCode::UndefinedVariable => "TQ_UNDEFINED_VARIABLE",
            ErrorCode::InvalidArgument => "TQ_INVALID_ARGUMENT",
            ErrorCode::MaterializationLimit => "TQ_MATERIALIZATION_LIMIT",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::IteratorFlow => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Engine error with the position of the node that raised it
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    code: ErrorCode,
    message: String,
    position: Option<SourcePosition>,
}

impl EngineError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            position: None,
        }
    }

    /// Argument count mismatch at a call site
    pub fn arity(function: &str, expected: usize, found: usize) -> Self {
        let name = if function.is_empty() {
            String::new()
        } else {
            format!("{} ", function)
        };
        Self::new(
            ErrorCode::ArityMismatch,
            format!(
                "Dynamic function {}invoked with incorrect number of arguments. Expected: {}, Found: {}",
                name, expected, found
            ),
        )
    }

    /// Promotion failure
    pub fn type_mismatch(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::TypeMismatch, reason)
    }

    /// Protocol violation inside the engine
    pub fn flow(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::IteratorFlow, reason)
    }

    /// `next()` was called with no pending result
    pub fn exhausted(iterator: &str) -> Self {
        Self::flow(format!(
            "Invalid next() call; no more items in {}",
            iterator
        ))
    }

    /// Malformed type declaration
    pub fn invalid_schema(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidSchema, reason)
    }

    /// Grouping key of the wrong shape
    pub fn non_groupable(variable: &str, found: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::NonGroupableType,
            format!(
                "Group by variable ${} must evaluate to a single atomic or an empty sequence, found {}",
                variable,
                found.into()
            ),
        )
    }

    /// Construct that is recognized but not implemented
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UnsupportedFeature,
            format!("Unsupported feature: {}", feature.into()),
        )
    }

    /// External resource is unreachable or invalid
    pub fn resource(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceUnavailable, reason)
    }

    /// Unknown function name or arity
    pub fn undefined_function(name: &str, arity: usize) -> Self {
        Self::new(
            ErrorCode::UndefinedFunction,
            format!("Undefined function {}#{}", name, arity),
        )
    }

    /// Variable is not bound in any enclosing scope
    pub fn undefined_variable(name: &str) -> Self {
        Self::new(
            ErrorCode::UndefinedVariable,
            format!("Variable ${} is not in scope", name),
        )
    }

    /// Dynamic error raised by an operator or built-in
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, reason)
    }

    /// Materialization cap exceeded
    pub fn materialization_limit(cap: usize) -> Self {
        Self::new(
            ErrorCode::MaterializationLimit,
            format!(
                "More than {} items would be materialized from a distributed collection",
                cap
            ),
        )
    }

    /// Attach a position unless one is already set
    pub fn at(mut self, position: &SourcePosition) -> Self {
        if self.position.is_none() {
            self.position = Some(position.clone());
        }
        self
    }

    /// Returns the error code
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the originating position, if known
    pub fn position(&self) -> Option<&SourcePosition> {
        self.position.as_ref()
    }

    /// Returns whether this is an engine defect
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(position) = &self.position {
            write!(f, " (at {})", position)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Attach a node position to the error side of a result
pub trait WithPosition<T> {
    fn at(self, position: &SourcePosition) -> EngineResult<T>;
}

impl<T> WithPosition<T> for EngineResult<T> {
    fn at(self, position: &SourcePosition) -> EngineResult<T> {
        self.map_err(|e| e.at(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ErrorCode::ArityMismatch.code(), "TQ_ARITY_MISMATCH");
        assert_eq!(ErrorCode::NonGroupableType.code(), "TQ_NON_GROUPABLE_TYPE");
        assert_eq!(ErrorCode::IteratorFlow.code(), "TQ_ITERATOR_FLOW");
    }

    #[test]
    fn test_flow_errors_are_fatal() {
        assert!(EngineError::exhausted("literal").is_fatal());
        assert!(!EngineError::type_mismatch("bad").is_fatal());
    }

    #[test]
    fn test_first_position_wins() {
        let inner = SourcePosition::new(3, 7);
        let outer = SourcePosition::new(1, 1);
        let err = EngineError::resource("missing").at(&inner).at(&outer);
        assert_eq!(err.position(), Some(&inner));
    }

    #[test]
    fn test_arity_message_names_function() {
        let err = EngineError::arity("add", 2, 3);
        assert!(err.message().contains("add"));
        assert!(err.message().contains("Expected: 2, Found: 3"));

        let anonymous = EngineError::arity("", 1, 0);
        assert!(anonymous.message().starts_with("Dynamic function invoked"));
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::resource("File data.json not found.").at(&SourcePosition::new(4, 2));
        let display = format!("{}", err);
        assert!(display.contains("TQ_RESOURCE_UNAVAILABLE"));
        assert!(display.contains("ERROR"));
        assert!(display.contains("line 4"));
    }
}
