//! Error types for mt-jobs

use mt_core::{CoreError, ErrorKind};
use mt_exec::ExecError;
use mt_meta::MetaError;
use mt_sql::SqlError;
use thiserror::Error;

/// Job definition and scheduling errors
#[derive(Error, Debug)]
pub enum JobError {
    /// Job not found (J001)
    #[error("[J001] Job '{0}' is not found")]
    NotFound(String),

    /// A job with this name exists (J002)
    #[error("[J002] Job '{0}' already exists")]
    AlreadyExists(String),

    /// Job definition rejected (J003)
    #[error("[J003] Invalid job '{name}': {reason}")]
    Invalid { name: String, reason: String },

    /// Query template or SQL error (J004)
    #[error("[J004] {0}")]
    Sql(#[from] SqlError),

    /// Query execution failed (J005)
    #[error("[J005] {0}")]
    Exec(#[from] ExecError),

    /// Metadata store error (J006)
    #[error("[J006] {0}")]
    Meta(#[from] MetaError),

    /// Name or schedule error (J007)
    #[error("[J007] {0}")]
    Core(#[from] CoreError),
}

impl JobError {
    /// Map this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::NotFound(_) => ErrorKind::EntityNotExists,
            JobError::AlreadyExists(_) => ErrorKind::OperationForbidden,
            JobError::Invalid { .. } => ErrorKind::Validation,
            JobError::Sql(e) => e.kind(),
            JobError::Exec(e) => e.kind(),
            JobError::Meta(e) => e.kind(),
            JobError::Core(e) => e.kind(),
        }
    }
}

/// Result type alias for JobError
pub type JobResult<T> = Result<T, JobError>;
