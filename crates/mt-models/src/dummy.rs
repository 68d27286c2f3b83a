//! Deterministic engine for tests and demos

use crate::engine::MlEngine;
use crate::error::{ModelError, ModelResult};
use async_trait::async_trait;
use mt_core::{ModelVersion, RowBatch, ScalarType, TrainingParams, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DUMMY_ENGINE: &str = "dummy";

/// Value of every prediction
pub const PREDICTED_VALUE: i64 = 42;

/// Makes training fail with the option value as message
const FAIL_OPTION: &str = "fail";
/// Milliseconds to sleep during training
const DELAY_OPTION: &str = "train_delay_ms";
/// Always rejected at validation
const REJECTED_OPTION: &str = "error";

/// Predicts a constant and tags each row with the serving version.
///
/// Output columns: `predicted`, `predictor_version`, `predictor_tag`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyEngine;

impl DummyEngine {
    pub fn new() -> Self {
        Self
    }
}

fn train_delay(options: &BTreeMap<String, String>) -> ModelResult<Option<Duration>> {
    match options.get(DELAY_OPTION) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| {
                ModelError::InvalidOptions(format!(
                    "{DELAY_OPTION} must be a non-negative integer, got '{raw}'"
                ))
            }),
    }
}

#[async_trait]
impl MlEngine for DummyEngine {
    fn name(&self) -> &str {
        DUMMY_ENGINE
    }

    fn validate(&self, params: &TrainingParams) -> ModelResult<()> {
        if params.options.contains_key(REJECTED_OPTION) {
            return Err(ModelError::InvalidOptions(format!(
                "engine '{DUMMY_ENGINE}' does not accept option '{REJECTED_OPTION}'"
            )));
        }
        train_delay(&params.options)?;
        Ok(())
    }

    async fn train(&self, version: &ModelVersion, data: Option<&RowBatch>) -> ModelResult<()> {
        if let Some(delay) = train_delay(&version.options)? {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = version.options.get(FAIL_OPTION) {
            return Err(ModelError::Engine(message.clone()));
        }
        log::debug!(
            "Dummy training of {}.{} on {} rows",
            version.model,
            version.version,
            data.map_or(0, RowBatch::len)
        );
        Ok(())
    }

    async fn predict(&self, version: &ModelVersion, input: &RowBatch) -> ModelResult<RowBatch> {
        let tag = Value::from(version.tag.clone());
        let rows = (0..input.len())
            .map(|_| {
                vec![
                    Value::Integer(PREDICTED_VALUE),
                    Value::from(version.version),
                    tag.clone(),
                ]
            })
            .collect();
        let names: Vec<String> = self
            .output_columns(version)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        Ok(RowBatch::from_named(&names, rows))
    }

    fn output_columns(&self, _version: &ModelVersion) -> Vec<(String, ScalarType)> {
        vec![
            ("predicted".to_string(), ScalarType::Integer),
            ("predictor_version".to_string(), ScalarType::Integer),
            ("predictor_tag".to_string(), ScalarType::Text),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        let engine = DummyEngine::new();
        assert!(engine.validate(&TrainingParams::default()).is_ok());
        assert!(matches!(
            engine.validate(&TrainingParams::default().option("error", "1")),
            Err(ModelError::InvalidOptions(_))
        ));
        assert!(engine
            .validate(&TrainingParams::default().option("train_delay_ms", "soon"))
            .is_err());
    }
}
