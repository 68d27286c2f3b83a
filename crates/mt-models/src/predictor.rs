//! Predictor Invocation Adapter

use crate::engine::EngineRegistry;
use crate::error::{ModelError, ModelResult};
use mt_core::{ColumnId, ModelVersion, RowBatch, ScalarType, Value};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// Turns an input batch and a resolved version into input-plus-prediction
/// rows. Has no effect on model state.
pub struct PredictorAdapter {
    engines: Arc<EngineRegistry>,
    timeout: Option<Duration>,
}

impl PredictorAdapter {
    pub fn new(engines: Arc<EngineRegistry>, timeout: Option<Duration>) -> Self {
        Self { engines, timeout }
    }

    /// Run the version's engine over `input`.
    ///
    /// The output has one row per input row: every input column that the
    /// prediction does not overwrite, followed by the prediction columns. An
    /// empty input is replaced by a single all-null row, so a predictor with
    /// nothing joined to it still produces a result.
    pub async fn invoke(&self, input: &RowBatch, version: &ModelVersion) -> ModelResult<RowBatch> {
        let input = if input.is_empty() {
            Cow::Owned(RowBatch::new(
                input.columns.clone(),
                vec![vec![Value::Null; input.width()]],
            ))
        } else {
            Cow::Borrowed(input)
        };
        let predicted = self.predict(&input, version).await?;
        Ok(merge(&input, predicted))
    }

    /// Prediction columns only, row `i` predicted from input row `i`
    pub async fn predict(&self, input: &RowBatch, version: &ModelVersion) -> ModelResult<RowBatch> {
        self.check_ready(version)?;
        let engine = self.engines.get(&version.engine)?;

        let predicted = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, engine.predict(version, input))
                .await
                .map_err(|_| ModelError::PredictTimeout(limit))??,
            None => engine.predict(version, input).await?,
        };

        if predicted.len() != input.len() {
            return Err(ModelError::RowCountMismatch {
                expected: input.len(),
                actual: predicted.len(),
            });
        }
        log::debug!(
            "Predicted {} rows with {}.{}",
            predicted.len(),
            version.model,
            version.version
        );
        Ok(predicted)
    }

    /// Fails with `NotReady` unless the version finished training
    pub fn check_ready(&self, version: &ModelVersion) -> ModelResult<()> {
        if version.is_complete() {
            Ok(())
        } else {
            Err(ModelError::NotReady {
                model: version.model.to_string(),
                version: version.version,
                status: version.status,
            })
        }
    }

    /// Names and types of the columns `predict` returns
    pub fn output_columns(&self, version: &ModelVersion) -> ModelResult<Vec<(String, ScalarType)>> {
        Ok(self.engines.get(&version.engine)?.output_columns(version))
    }
}

/// Input columns not shadowed by a prediction column, then the predictions
fn merge(input: &RowBatch, predicted: RowBatch) -> RowBatch {
    let kept: Vec<usize> = input
        .columns
        .iter()
        .enumerate()
        .filter(|(_, col)| {
            !predicted
                .columns
                .iter()
                .any(|p| p.name.eq_ignore_ascii_case(&col.name))
        })
        .map(|(idx, _)| idx)
        .collect();

    let mut columns: Vec<ColumnId> = kept
        .iter()
        .map(|&idx| ColumnId::bare(input.columns[idx].name.clone()))
        .collect();
    columns.extend(predicted.columns.iter().map(|c| ColumnId::bare(c.name.clone())));

    let rows = input
        .rows
        .iter()
        .zip(predicted.rows)
        .map(|(row, mut prediction)| {
            let mut out: Vec<Value> = kept.iter().map(|&idx| row[idx].clone()).collect();
            out.append(&mut prediction);
            out
        })
        .collect();
    RowBatch::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use mt_core::{ErrorKind, ModelId, ModelName, ProjectName, VersionStatus};
    use std::collections::BTreeMap;

    fn version(status: VersionStatus) -> ModelVersion {
        ModelVersion {
            model: ModelId::new(ProjectName::new("proj"), ModelName::new("task_model")),
            version: 2,
            status,
            engine: "dummy".to_string(),
            predict: Some("b".to_string()),
            tag: Some("second".to_string()),
            training_query: None,
            options: BTreeMap::new(),
            activate_on_complete: true,
            error: None,
            created_at: NaiveDateTime::default(),
            completed_at: None,
        }
    }

    fn adapter() -> PredictorAdapter {
        PredictorAdapter::new(Arc::new(EngineRegistry::default()), None)
    }

    #[tokio::test]
    async fn test_not_ready() {
        let err = adapter()
            .invoke(&RowBatch::default(), &version(VersionStatus::Generating))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelNotReady);
    }

    #[test]
    fn test_check_ready_by_status() {
        let adapter = adapter();
        assert!(adapter.check_ready(&version(VersionStatus::Complete)).is_ok());
        for status in [VersionStatus::Generating, VersionStatus::Error] {
            let err = adapter.check_ready(&version(status)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ModelNotReady);
        }
    }

    #[tokio::test]
    async fn test_preserves_input_and_appends_predictions() {
        let input = RowBatch::new(
            vec![ColumnId::qualified("t", "a"), ColumnId::qualified("t", "predicted")],
            vec![vec![1.into(), 0.into()], vec![2.into(), 0.into()]],
        );
        let out = adapter()
            .invoke(&input, &version(VersionStatus::Complete))
            .await
            .unwrap();
        assert_eq!(
            out.column_names(),
            vec!["a", "predicted", "predictor_version", "predictor_tag"]
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(1, "a"), Some(&Value::Integer(2)));
        assert_eq!(out.get(0, "predicted"), Some(&Value::Integer(42)));
        assert_eq!(out.get(0, "predictor_tag"), Some(&Value::from("second")));
    }

    #[tokio::test]
    async fn test_predict_returns_prediction_columns_only() {
        let input = RowBatch::from_named(&["a"], vec![vec![1.into()], vec![2.into()]]);
        let adapter = adapter();
        let v2 = version(VersionStatus::Complete);
        let out = adapter.predict(&input, &v2).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.index_of("a").is_none());
        let names: Vec<String> = adapter
            .output_columns(&v2)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(out.column_names(), names);
    }

    #[tokio::test]
    async fn test_empty_input_yields_one_row() {
        let input = RowBatch::from_named(&["a"], vec![]);
        let out = adapter()
            .invoke(&input, &version(VersionStatus::Complete))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.get(0, "a"), Some(&Value::Null));
        assert_eq!(out.get(0, "predictor_version"), Some(&Value::Integer(2)));
    }
}
