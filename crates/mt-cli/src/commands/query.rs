//! Query command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, OutputFormat, QueryArgs};
use crate::commands::common::{batch_to_json, print_batch};
use crate::context::RuntimeContext;

/// Execute the query command
pub async fn execute(args: &QueryArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let project = ctx.project(args.project.as_deref())?;

    let batch = ctx
        .engine
        .execute_sql(&project, &args.sql)
        .await
        .context("Query failed")?;

    match args.output {
        OutputFormat::Table => print_batch(&batch),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&batch_to_json(&batch))?
        ),
    }
    Ok(())
}
