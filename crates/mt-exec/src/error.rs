//! Error types for mt-exec

use mt_core::{CoreError, ErrorKind};
use mt_db::DbError;
use mt_meta::MetaError;
use mt_models::ModelError;
use mt_sql::SqlError;
use std::time::Duration;
use thiserror::Error;

/// Query planning and execution errors
#[derive(Error, Debug)]
pub enum ExecError {
    /// SQL parse or template error (X001)
    #[error("[X001] {0}")]
    Sql(#[from] SqlError),

    /// Data-source adapter error (X002)
    #[error("[X002] {0}")]
    Db(#[from] DbError),

    /// Model lifecycle or prediction error (X003)
    #[error("[X003] {0}")]
    Model(#[from] ModelError),

    /// Metadata store error (X004)
    #[error("[X004] {0}")]
    Meta(#[from] MetaError),

    /// Unknown relation (X005)
    #[error("[X005] Table '{0}' not found")]
    RelationNotFound(String),

    /// Unknown column (X006)
    #[error("[X006] Column '{0}' not found")]
    ColumnNotFound(String),

    /// Column reference matches several columns (X007)
    #[error("[X007] Column reference '{0}' is ambiguous")]
    AmbiguousColumn(String),

    /// Scalar subquery returned more than one value (X008)
    #[error("[X008] Scalar subquery returned {rows} rows and {columns} columns, expected at most one value")]
    SubqueryCardinality { rows: usize, columns: usize },

    /// A view refers back to itself (X009)
    #[error("[X009] Cyclic view reference: {0}")]
    CyclicView(String),

    /// SQL construct outside the supported subset (X010)
    #[error("[X010] Unsupported SQL: {0}")]
    Unsupported(String),

    /// Operator applied to incompatible values (X011)
    #[error("[X011] Type error: {0}")]
    TypeError(String),

    /// UNION branches of different width (X012)
    #[error("[X012] Each UNION query must have the same number of columns: {left} != {right}")]
    UnionArity { left: usize, right: usize },

    /// Adapter fetch exceeded its deadline (X013)
    #[error("[X013] Fetching '{relation}' timed out after {after:?}")]
    Timeout { relation: String, after: Duration },

    /// A view with this name exists (X014)
    #[error("[X014] View '{0}' already exists")]
    ViewExists(String),

    /// Unknown view (X015)
    #[error("[X015] View '{0}' is not found")]
    ViewNotFound(String),

    /// Invalid name (X016)
    #[error("[X016] {0}")]
    Core(#[from] CoreError),

    /// Internal invariant broken (X017)
    #[error("[X017] Internal execution error: {0}")]
    Internal(String),
}

impl ExecError {
    /// Map this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::Sql(e) => e.kind(),
            ExecError::Db(e) => e.kind(),
            ExecError::Model(e) => e.kind(),
            ExecError::Meta(e) => e.kind(),
            ExecError::Core(e) => e.kind(),
            ExecError::RelationNotFound(_) | ExecError::ViewNotFound(_) => {
                ErrorKind::EntityNotExists
            }
            ExecError::SubqueryCardinality { .. } => ErrorKind::SubqueryCardinality,
            ExecError::CyclicView(_) => ErrorKind::CyclicView,
            ExecError::Timeout { .. } => ErrorKind::Timeout,
            ExecError::ViewExists(_) => ErrorKind::OperationForbidden,
            ExecError::ColumnNotFound(_)
            | ExecError::AmbiguousColumn(_)
            | ExecError::Unsupported(_)
            | ExecError::TypeError(_)
            | ExecError::UnionArity { .. } => ErrorKind::Validation,
            ExecError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for ExecError
pub type ExecResult<T> = Result<T, ExecError>;
