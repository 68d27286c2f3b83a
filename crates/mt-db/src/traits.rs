//! Data-source adapter trait

use crate::error::DbResult;
use async_trait::async_trait;
use mt_core::{RowBatch, ScalarType};

/// A named source of physical relations.
///
/// Relation names are matched case-insensitively. `fetch` returns unqualified
/// columns; the executor qualifies them with the relation alias.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Namespace under which this source's relations are addressed
    fn name(&self) -> &str;

    /// Adapter type identifier for logging
    fn source_type(&self) -> &'static str;

    /// Names of every relation this source can fetch
    async fn list_relations(&self) -> DbResult<Vec<String>>;

    /// Materialize a relation. An empty `columns` slice means all columns.
    async fn fetch(&self, relation: &str, columns: &[String]) -> DbResult<RowBatch>;

    /// Column names and types of a relation
    async fn describe(&self, relation: &str) -> DbResult<Vec<(String, ScalarType)>>;

    /// Whether the source has a relation with this name
    async fn has_relation(&self, relation: &str) -> DbResult<bool> {
        Ok(self
            .list_relations()
            .await?
            .iter()
            .any(|r| r.eq_ignore_ascii_case(relation)))
    }
}
