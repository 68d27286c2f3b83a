//! mt-models - Model lifecycle for Modeltable
//!
//! Owns the version state machine of every model: allocating version
//! numbers, running training in the background, moving the active-version
//! pointer and guarding deletion. Predictions are produced through the
//! [`MlEngine`] trait and merged onto their input rows by the
//! [`PredictorAdapter`].

pub mod dummy;
pub mod engine;
pub mod error;
pub mod manager;
pub mod predictor;

pub use dummy::DummyEngine;
pub use engine::{EngineRegistry, MlEngine, TrainingDataLoader};
pub use error::{ModelError, ModelResult};
pub use manager::ModelVersionManager;
pub use predictor::PredictorAdapter;
