//! Jobs command implementation

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use mt_core::{parse_timestamp, Job, JobHistoryEntry, Schedule};
use mt_jobs::JobSpec;

use crate::cli::{
    GlobalArgs, JobCommands, JobCreateArgs, JobHistoryArgs, JobNameArgs, JobsArgs,
    ProjectFilterArgs,
};
use crate::commands::common::{format_optional_timestamp, format_timestamp, print_table};
use crate::context::RuntimeContext;

/// Execute the jobs command
pub async fn execute(args: &JobsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    match &args.command {
        JobCommands::List(sub) => list(&ctx, sub),
        JobCommands::History(sub) => history(&ctx, sub),
        JobCommands::Create(sub) => create(&ctx, sub),
        JobCommands::Drop(sub) => {
            let project = ctx.project(sub.project.as_deref())?;
            ctx.jobs.drop_job(&project, &sub.name)?;
            println!("Dropped job {}.{}", project, sub.name);
            Ok(())
        }
        JobCommands::Activate(sub) => set_active(&ctx, sub, true),
        JobCommands::Deactivate(sub) => set_active(&ctx, sub, false),
    }
}

fn list(ctx: &RuntimeContext, args: &ProjectFilterArgs) -> Result<()> {
    let project = ctx.project_filter(args.project.as_deref())?;
    let jobs = ctx.jobs.list_jobs(project.as_ref())?;
    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = jobs.iter().map(job_row).collect();
    print_table(
        &[
            "PROJECT", "NAME", "START_AT", "END_AT", "NEXT_RUN_AT", "SCHEDULE", "ACTIVE", "QUERY",
        ],
        &rows,
    );
    Ok(())
}

fn history(ctx: &RuntimeContext, args: &JobHistoryArgs) -> Result<()> {
    let project = ctx.project_filter(args.project.as_deref())?;
    let history = ctx.jobs.history(project.as_ref(), args.name.as_deref())?;
    if history.is_empty() {
        println!("No job runs recorded.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = history.iter().map(history_row).collect();
    print_table(
        &["PROJECT", "NAME", "STARTED_AT", "FINISHED_AT", "ERROR"],
        &rows,
    );
    Ok(())
}

fn create(ctx: &RuntimeContext, args: &JobCreateArgs) -> Result<()> {
    let project = ctx.project(args.project.as_deref())?;
    let mut spec = JobSpec::new(args.name.as_str(), args.query.as_str());
    if let Some(at) = &args.start_at {
        spec = spec.starting_at(timestamp_arg("--start-at", at)?);
    }
    if let Some(at) = &args.end_at {
        spec = spec.ending_at(timestamp_arg("--end-at", at)?);
    }
    if let Some(every) = &args.every {
        spec = spec.every(every.as_str());
    }

    let job = ctx.jobs.create_job(&project, spec)?;
    println!(
        "Created job {} (next run {})",
        job.id,
        format_optional_timestamp(job.next_run_at.as_ref())
    );
    Ok(())
}

fn set_active(ctx: &RuntimeContext, args: &JobNameArgs, active: bool) -> Result<()> {
    let project = ctx.project(args.project.as_deref())?;
    ctx.jobs.set_active(&project, &args.name, active)?;
    println!(
        "Job {}.{} {}",
        project,
        args.name,
        if active { "activated" } else { "deactivated" }
    );
    Ok(())
}

fn timestamp_arg(flag: &str, raw: &str) -> Result<NaiveDateTime> {
    parse_timestamp(raw)
        .with_context(|| format!("{flag} expects 'YYYY-MM-DD HH:MM:SS', got '{raw}'"))
}

fn job_row(job: &Job) -> Vec<String> {
    vec![
        job.id.project.to_string(),
        job.id.name.to_string(),
        format_timestamp(&job.start_at),
        format_optional_timestamp(job.end_at.as_ref()),
        format_optional_timestamp(job.next_run_at.as_ref()),
        job.schedule
            .as_ref()
            .map(Schedule::as_str)
            .unwrap_or("once")
            .to_string(),
        job.active.to_string(),
        single_line(&job.query),
    ]
}

fn history_row(entry: &JobHistoryEntry) -> Vec<String> {
    vec![
        entry.project.to_string(),
        entry.job_name.to_string(),
        format_timestamp(&entry.started_at),
        format_timestamp(&entry.finished_at),
        entry.error.as_deref().map(single_line).unwrap_or_default(),
    ]
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
