//! Error types for mt-sql

use mt_core::ErrorKind;
use thiserror::Error;

/// SQL parsing and templating errors
#[derive(Error, Debug)]
pub enum SqlError {
    /// SQL parse error (S001)
    #[error("[S001] SQL parse error at line {line}, column {column}: {message}")]
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },

    /// Empty SQL (S002)
    #[error("[S002] SQL is empty")]
    EmptySql,

    /// Template render error (S003)
    #[error("[S003] Query template error: {0}")]
    TemplateError(String),
}

impl SqlError {
    /// Map this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;

impl From<minijinja::Error> for SqlError {
    fn from(err: minijinja::Error) -> Self {
        SqlError::TemplateError(err.to_string())
    }
}
