//! Query execution seam between the scheduler and the executor

use crate::error::JobResult;
use async_trait::async_trait;
use mt_core::{ProjectName, RowBatch};
use mt_exec::QueryEngine;

/// Executes a rendered job query in the job's project
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, project: &ProjectName, query: &str) -> JobResult<RowBatch>;
}

#[async_trait]
impl QueryRunner for QueryEngine {
    async fn run_query(&self, project: &ProjectName, query: &str) -> JobResult<RowBatch> {
        Ok(self.execute_sql(project, query).await?)
    }
}
