//! ML engine trait and registry

use crate::error::{ModelError, ModelResult};
use async_trait::async_trait;
use mt_core::{ModelVersion, ProjectName, RowBatch, ScalarType, TrainingParams};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A training and prediction backend.
///
/// `predict` returns only the prediction columns, one row per input row in
/// input order; merging onto the input is the caller's job.
#[async_trait]
pub trait MlEngine: Send + Sync {
    /// Name used in `USING engine = ...`
    fn name(&self) -> &str;

    /// Reject bad parameters before a version number is allocated
    fn validate(&self, params: &TrainingParams) -> ModelResult<()>;

    /// Train a version. `data` is the materialized training query, if any.
    async fn train(&self, version: &ModelVersion, data: Option<&RowBatch>) -> ModelResult<()>;

    /// Produce predictions for every input row
    async fn predict(&self, version: &ModelVersion, input: &RowBatch) -> ModelResult<RowBatch>;

    /// Shape of the prediction columns
    fn output_columns(&self, version: &ModelVersion) -> Vec<(String, ScalarType)>;
}

/// Runs training queries on behalf of the version manager
#[async_trait]
pub trait TrainingDataLoader: Send + Sync {
    async fn load(&self, project: &ProjectName, query: &str) -> ModelResult<RowBatch>;
}

/// Engines available to the manager, keyed by lower-cased name
pub struct EngineRegistry {
    engines: BTreeMap<String, Arc<dyn MlEngine>>,
    default_engine: String,
}

impl EngineRegistry {
    /// An empty registry whose default engine is `default_engine`
    pub fn new(default_engine: impl Into<String>) -> Self {
        Self {
            engines: BTreeMap::new(),
            default_engine: default_engine.into().to_ascii_lowercase(),
        }
    }

    /// Register an engine under its own name
    pub fn register(&mut self, engine: Arc<dyn MlEngine>) {
        self.engines
            .insert(engine.name().to_ascii_lowercase(), engine);
    }

    pub fn with_engine(mut self, engine: Arc<dyn MlEngine>) -> Self {
        self.register(engine);
        self
    }

    /// Look up an engine by name
    pub fn get(&self, name: &str) -> ModelResult<Arc<dyn MlEngine>> {
        self.engines
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ModelError::UnknownEngine(name.to_string()))
    }

    pub fn default_engine(&self) -> &str {
        &self.default_engine
    }

    pub fn names(&self) -> Vec<&str> {
        self.engines.keys().map(String::as_str).collect()
    }
}

impl Default for EngineRegistry {
    /// Registry with the built-in dummy engine as default
    fn default() -> Self {
        EngineRegistry::new(crate::dummy::DUMMY_ENGINE)
            .with_engine(Arc::new(crate::dummy::DummyEngine::new()))
    }
}
