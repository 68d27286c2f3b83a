//! Error types for mt-models

use mt_core::{CoreError, ErrorKind, VersionStatus};
use mt_meta::MetaError;
use std::time::Duration;
use thiserror::Error;

/// Model lifecycle and prediction errors
#[derive(Error, Debug)]
pub enum ModelError {
    /// Model not found (MV001)
    #[error("[MV001] Model '{0}' is not found")]
    ModelNotFound(String),

    /// Model version not found (MV002)
    #[error("[MV002] Version {version} of model '{model}' is not found")]
    VersionNotFound { model: String, version: u32 },

    /// Model already exists (MV003)
    #[error("[MV003] Model '{0}' already exists")]
    AlreadyExists(String),

    /// Attempt to delete the active version (MV004)
    #[error("[MV004] Can't remove active version: {model}.{version}")]
    ActiveVersionDelete { model: String, version: u32 },

    /// Attempt to delete a version that is still training (MV005)
    #[error("[MV005] Can't remove version {model}.{version} while it is generating")]
    VersionGenerating { model: String, version: u32 },

    /// Version not yet usable (MV006)
    #[error("[MV006] Model '{model}' version {version} is not ready: status is {status}")]
    NotReady {
        model: String,
        version: u32,
        status: VersionStatus,
    },

    /// No engine registered under that name (MV007)
    #[error("[MV007] Unknown ML engine '{0}'")]
    UnknownEngine(String),

    /// Engine rejected the training options (MV008)
    #[error("[MV008] Invalid training options: {0}")]
    InvalidOptions(String),

    /// Engine failure during training or prediction (MV009)
    #[error("[MV009] ML engine error: {0}")]
    Engine(String),

    /// Training data query failed (MV010)
    #[error("[MV010] Failed to load training data: {0}")]
    TrainingData(String),

    /// Predictor broke the one-output-row-per-input-row contract (MV011)
    #[error("[MV011] Predictor returned {actual} rows for {expected} input rows")]
    RowCountMismatch { expected: usize, actual: usize },

    /// Prediction exceeded its deadline (MV012)
    #[error("[MV012] Prediction timed out after {0:?}")]
    PredictTimeout(Duration),

    /// Synchronous wait for training exceeded its bound (MV013)
    #[error("[MV013] Training of {model}.{version} did not finish within {waited:?}")]
    WaitTimeout {
        model: String,
        version: u32,
        waited: Duration,
    },

    /// Training finished in error while the caller waited (MV014)
    #[error("[MV014] Training of {model}.{version} failed: {message}")]
    TrainingFailed {
        model: String,
        version: u32,
        message: String,
    },

    /// Metadata store error (MV015)
    #[error("[MV015] {0}")]
    Meta(#[from] MetaError),

    /// Name or config error (MV016)
    #[error("[MV016] {0}")]
    Core(#[from] CoreError),
}

impl ModelError {
    /// Map this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::ModelNotFound(_) | ModelError::VersionNotFound { .. } => {
                ErrorKind::EntityNotExists
            }
            ModelError::AlreadyExists(_)
            | ModelError::ActiveVersionDelete { .. }
            | ModelError::VersionGenerating { .. } => ErrorKind::OperationForbidden,
            ModelError::NotReady { .. } => ErrorKind::ModelNotReady,
            ModelError::UnknownEngine(_) | ModelError::InvalidOptions(_) => ErrorKind::Validation,
            ModelError::Engine(_)
            | ModelError::TrainingData(_)
            | ModelError::RowCountMismatch { .. }
            | ModelError::TrainingFailed { .. } => ErrorKind::Adapter,
            ModelError::PredictTimeout(_) | ModelError::WaitTimeout { .. } => ErrorKind::Timeout,
            ModelError::Meta(e) => e.kind(),
            ModelError::Core(e) => e.kind(),
        }
    }
}

/// Result type alias for ModelError
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = ModelError::ActiveVersionDelete {
            model: "proj.m".to_string(),
            version: 2,
        };
        assert_eq!(err.kind(), ErrorKind::OperationForbidden);
        assert!(err.to_string().contains("Can't remove active version"));

        let err = ModelError::Meta(MetaError::NotFound {
            entity: "Model",
            name: "proj.m".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::EntityNotExists);
        assert!(ModelError::PredictTimeout(Duration::from_millis(5))
            .kind()
            .is_retryable());
    }
}
