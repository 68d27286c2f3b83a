//! DuckDB data source

use crate::convert::{describe_select, projection, query_batch, quote_ident};
use crate::error::{DbError, DbResult};
use crate::traits::DataSource;
use async_trait::async_trait;
use duckdb::Connection;
use mt_core::{RowBatch, ScalarType};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Tables and views of a DuckDB database, addressed as `<source>.<table>`
/// or `<source>.<schema>.<table>` for non-`main` schemas.
pub struct DuckDbSource {
    name: String,
    conn: Mutex<Connection>,
}

impl DuckDbSource {
    /// Create a source over a new in-memory database
    pub fn in_memory(name: impl Into<String>) -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            conn: Mutex::new(conn),
        })
    }

    /// Open a database file
    pub fn from_path(name: impl Into<String>, path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(name: impl Into<String>, path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory(name)
        } else {
            Self::from_path(name, Path::new(path))
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Execute setup SQL (DDL, inserts) against the underlying database
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(e.to_string()))
    }

    fn list_relations_sync(&self) -> DbResult<Vec<String>> {
        let conn = self.lock()?;
        let batch = query_batch(
            &conn,
            "SELECT CASE WHEN table_schema = 'main' THEN table_name \
                    ELSE table_schema || '.' || table_name END AS relation \
             FROM information_schema.tables \
             WHERE table_schema NOT IN ('information_schema', 'pg_catalog') \
             ORDER BY relation",
        )?;
        Ok(batch.rows.iter().map(|r| r[0].to_string()).collect())
    }

    /// Resolve a requested name to the stored spelling, or fail
    fn canonical(&self, relation: &str) -> DbResult<String> {
        self.list_relations_sync()?
            .into_iter()
            .find(|r| r.eq_ignore_ascii_case(relation))
            .ok_or_else(|| DbError::TableNotFound(format!("{}.{}", self.name, relation)))
    }

    fn qualified(relation: &str) -> String {
        relation
            .split('.')
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[async_trait]
impl DataSource for DuckDbSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> &'static str {
        "duckdb"
    }

    async fn list_relations(&self) -> DbResult<Vec<String>> {
        self.list_relations_sync()
    }

    async fn fetch(&self, relation: &str, columns: &[String]) -> DbResult<RowBatch> {
        let relation = self.canonical(relation)?;
        let sql = format!(
            "SELECT {} FROM {}",
            projection(columns),
            Self::qualified(&relation)
        );
        let conn = self.lock()?;
        let batch = query_batch(&conn, &sql)?;
        log::debug!(
            "Fetched {} rows from {}.{}",
            batch.len(),
            self.name,
            relation
        );
        Ok(batch)
    }

    async fn describe(&self, relation: &str) -> DbResult<Vec<(String, ScalarType)>> {
        let relation = self.canonical(relation)?;
        let conn = self.lock()?;
        describe_select(
            &conn,
            &format!("SELECT * FROM {}", Self::qualified(&relation)),
        )
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
