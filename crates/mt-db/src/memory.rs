//! In-process data source of registered batches

use crate::error::{DbError, DbResult};
use crate::traits::DataSource;
use async_trait::async_trait;
use mt_core::{ColumnId, RowBatch, ScalarType};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Relations held in memory, keyed by lower-cased name
pub struct MemorySource {
    name: String,
    tables: RwLock<BTreeMap<String, RowBatch>>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register (or replace) a relation
    pub fn register(&self, relation: &str, batch: RowBatch) -> DbResult<()> {
        let batch = batch.requalify(None);
        self.tables
            .write()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))?
            .insert(relation.to_ascii_lowercase(), batch);
        Ok(())
    }

    /// Builder-style registration for test fixtures
    pub fn with_table(self, relation: &str, batch: RowBatch) -> DbResult<Self> {
        self.register(relation, batch)?;
        Ok(self)
    }

    fn get(&self, relation: &str) -> DbResult<RowBatch> {
        self.tables
            .read()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))?
            .get(&relation.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(format!("{}.{}", self.name, relation)))
    }
}

#[async_trait]
impl DataSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> &'static str {
        "memory"
    }

    async fn list_relations(&self) -> DbResult<Vec<String>> {
        Ok(self
            .tables
            .read()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))?
            .keys()
            .cloned()
            .collect())
    }

    async fn fetch(&self, relation: &str, columns: &[String]) -> DbResult<RowBatch> {
        let batch = self.get(relation)?;
        if columns.is_empty() {
            return Ok(batch);
        }

        let mut indices = Vec::with_capacity(columns.len());
        for col in columns {
            let idx = batch.index_of(col).ok_or_else(|| {
                DbError::ExecutionError(format!("column '{}' not found in {}", col, relation))
            })?;
            indices.push(idx);
        }
        let projected: Vec<ColumnId> = indices.iter().map(|&i| batch.columns[i].clone()).collect();
        let rows = batch
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(RowBatch::new(projected, rows))
    }

    async fn describe(&self, relation: &str) -> DbResult<Vec<(String, ScalarType)>> {
        Ok(self.get(relation)?.infer_types())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_core::Value;

    fn source() -> MemorySource {
        MemorySource::new("mem")
            .with_table(
                "Tasks",
                RowBatch::from_named(
                    &["a", "c"],
                    vec![vec![1.into(), 1.into()], vec![2.into(), Value::Null]],
                ),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_case_insensitive() {
        let src = source();
        assert_eq!(src.fetch("TASKS", &[]).await.unwrap().len(), 2);
        assert_eq!(src.list_relations().await.unwrap(), vec!["tasks"]);
    }

    #[tokio::test]
    async fn test_projection() {
        let src = source();
        let batch = src.fetch("tasks", &["c".to_string()]).await.unwrap();
        assert_eq!(batch.column_names(), vec!["c"]);
        assert_eq!(batch.rows[1][0], Value::Null);
        assert!(src.fetch("tasks", &["zz".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_and_describe() {
        let src = source();
        assert!(matches!(
            src.fetch("other", &[]).await,
            Err(DbError::TableNotFound(_))
        ));
        let cols = src.describe("tasks").await.unwrap();
        assert_eq!(cols[0], ("a".to_string(), ScalarType::Integer));
    }
}
