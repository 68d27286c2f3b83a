//! Error types for mt-db

use mt_core::ErrorKind;
use thiserror::Error;

/// Data-source adapter errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Relation not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    TableNotFound(String),

    /// Unsupported file type (D004)
    #[error("[D004] Unsupported file type '{file}'. Allowed extensions: {allowed}")]
    UnsupportedFileType { file: String, allowed: String },

    /// Filesystem error (D005)
    #[error("[D005] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Mutex poisoned (D006)
    #[error("[D006] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Internal error (D007)
    #[error("[D007] Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Map this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::TableNotFound(_) => ErrorKind::EntityNotExists,
            DbError::UnsupportedFileType { .. } => ErrorKind::Validation,
            DbError::MutexPoisoned(_) | DbError::Internal(_) => ErrorKind::Internal,
            DbError::ConnectionError(_) | DbError::ExecutionError(_) | DbError::Io(_) => {
                ErrorKind::Adapter
            }
        }
    }
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error carries no structured variants; classify by message.
        let msg = err.to_string();
        if msg.contains("Table with name")
            || msg.contains("View with name")
            || msg.contains("Table or view with name")
            || (msg.contains("Catalog Error") && msg.contains("Table") && msg.contains("not found"))
        {
            DbError::TableNotFound(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}
