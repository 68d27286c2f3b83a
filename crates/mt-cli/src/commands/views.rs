//! Views command implementation

use anyhow::Result;
use mt_meta::ViewStore;

use crate::cli::{GlobalArgs, ProjectFilterArgs, ViewCommands, ViewsArgs};
use crate::commands::common::{format_timestamp, print_table};
use crate::context::RuntimeContext;

/// Execute the views command
pub async fn execute(args: &ViewsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    match &args.command {
        ViewCommands::List(sub) => list(&ctx, sub),
        ViewCommands::Create(sub) => {
            let project = ctx.project(sub.project.as_deref())?;
            ctx.engine.create_view(&project, &sub.name, &sub.query)?;
            println!("Created view {}.{}", project, sub.name);
            Ok(())
        }
        ViewCommands::Drop(sub) => {
            let project = ctx.project(sub.project.as_deref())?;
            ctx.engine.drop_view(&project, &sub.name)?;
            println!("Dropped view {}.{}", project, sub.name);
            Ok(())
        }
    }
}

fn list(ctx: &RuntimeContext, args: &ProjectFilterArgs) -> Result<()> {
    let project = ctx.project_filter(args.project.as_deref())?;
    let views = ctx.store.list_views(project.as_ref())?;
    if views.is_empty() {
        println!("No views found.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = views
        .iter()
        .map(|v| {
            vec![
                v.project.to_string(),
                v.name.to_string(),
                format_timestamp(&v.created_at),
                v.query.split_whitespace().collect::<Vec<_>>().join(" "),
            ]
        })
        .collect();
    print_table(&["PROJECT", "NAME", "CREATED_AT", "QUERY"], &rows);
    Ok(())
}
