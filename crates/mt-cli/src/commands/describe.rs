//! Describe command implementation

use anyhow::{Context, Result};

use crate::cli::{DescribeArgs, GlobalArgs};
use crate::commands::common::print_table;
use crate::context::RuntimeContext;

/// Execute the describe command
pub async fn execute(args: &DescribeArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let project = ctx.project(args.project.as_deref())?;

    let columns = ctx
        .engine
        .describe_relation(&project, &args.relation)
        .await
        .with_context(|| format!("Cannot describe '{}'", args.relation))?;

    let rows: Vec<Vec<String>> = columns
        .iter()
        .map(|(name, ty)| vec![name.clone(), ty.to_string()])
        .collect();
    print_table(&["COLUMN", "TYPE"], &rows);
    Ok(())
}
