//! Error types for mt-core

use thiserror::Error;

/// Classification shared by every Modeltable error type.
///
/// Each crate keeps its own error enum; `kind()` on those enums maps onto this
/// taxonomy so callers can decide how to react without knowing which layer
/// raised the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown model, version, job, view or relation
    EntityNotExists,
    /// The operation would violate a lifecycle invariant
    OperationForbidden,
    /// The model version has not finished training
    ModelNotReady,
    /// A scalar subquery produced more than one row or column
    SubqueryCardinality,
    /// A view refers back to itself
    CyclicView,
    /// A data-source adapter or ML engine failed
    Adapter,
    /// A caller-supplied deadline elapsed
    Timeout,
    /// Malformed input: bad SQL, bad schedule, rejected options
    Validation,
    /// Storage or internal failure
    Internal,
}

impl ErrorKind {
    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::ModelNotReady | ErrorKind::Adapter | ErrorKind::Timeout
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::EntityNotExists => "entity not exists",
            ErrorKind::OperationForbidden => "operation forbidden",
            ErrorKind::ModelNotReady => "model not ready",
            ErrorKind::SubqueryCardinality => "subquery cardinality",
            ErrorKind::CyclicView => "cyclic view",
            ErrorKind::Adapter => "adapter",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Core error type for Modeltable
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Invalid recurrence expression
    #[error("[E004] Invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    /// E005: Invalid name
    #[error("[E005] Invalid {kind} name: '{name}'")]
    InvalidName { kind: &'static str, name: String },

    /// E006: IO error
    #[error("[E006] IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Map this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Io(_) => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
