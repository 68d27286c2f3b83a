//! Scheduler command implementation

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{GlobalArgs, SchedulerArgs};
use crate::context::RuntimeContext;

/// Execute the scheduler command
pub async fn execute(args: &SchedulerArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let scheduler = ctx.scheduler();

    if args.once {
        let report = scheduler
            .check_timetable()
            .await
            .context("Scheduler tick failed")?;
        println!("{} job(s) ran, {} failed", report.ran, report.failed);
        return Ok(());
    }

    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.scheduler.interval());
    if interval.is_zero() {
        anyhow::bail!("--interval must be greater than zero");
    }

    println!(
        "Scheduler for '{}' running every {}s, Ctrl-C to stop",
        ctx.config.name,
        interval.as_secs()
    );
    let handle = Arc::new(scheduler).start(interval);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    handle.stop().await;
    println!("Scheduler stopped");
    Ok(())
}
