//! Error types for the metadata store.

use mt_core::ErrorKind;
use thiserror::Error;

/// Metadata store errors.
#[derive(Error, Debug)]
pub enum MetaError {
    /// Failed to open or create the meta database (M001).
    #[error("[M001] Meta database connection failed: {0}")]
    ConnectionError(String),

    /// Schema migration failed (M002).
    #[error("[M002] Meta database migration failed: {0}")]
    MigrationError(String),

    /// SQL execution error inside the meta database (M003).
    #[error("[M003] Meta database query failed: {0}")]
    QueryError(String),

    /// Transaction management error (M004).
    #[error("[M004] Meta database transaction failed: {0}")]
    TransactionError(String),

    /// A row with the same identity already exists (M005).
    #[error("[M005] {entity} '{name}' already exists")]
    AlreadyExists { entity: &'static str, name: String },

    /// The row to update does not exist (M006).
    #[error("[M006] {entity} '{name}' is not found")]
    NotFound { entity: &'static str, name: String },

    /// A stored row could not be decoded (M007).
    #[error("[M007] Corrupt meta row: {0}")]
    CorruptRow(String),

    /// Store lock poisoned by a panicking writer (M008).
    #[error("[M008] Meta store lock poisoned: {0}")]
    MutexPoisoned(String),

    /// DuckDB driver error with preserved source chain (M009).
    #[error("[M009] DuckDB error: {0}")]
    DuckDb(#[source] duckdb::Error),
}

impl MetaError {
    /// Map this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetaError::AlreadyExists { .. } => ErrorKind::OperationForbidden,
            MetaError::NotFound { .. } => ErrorKind::EntityNotExists,
            _ => ErrorKind::Internal,
        }
    }
}

/// Result type alias for [`MetaError`].
pub type MetaResult<T> = Result<T, MetaError>;

impl From<duckdb::Error> for MetaError {
    fn from(err: duckdb::Error) -> Self {
        MetaError::DuckDb(err)
    }
}

/// Attach a short description of the failing operation to driver errors.
pub(crate) trait MetaResultExt<T> {
    fn query_context(self, what: &str) -> MetaResult<T>;
}

impl<T> MetaResultExt<T> for Result<T, duckdb::Error> {
    fn query_context(self, what: &str) -> MetaResult<T> {
        self.map_err(|e| MetaError::QueryError(format!("{what}: {e}")))
    }
}
