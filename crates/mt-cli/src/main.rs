//! Modeltable CLI - query and manage tables, views, models and jobs, and
//! run the job scheduler

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod context;

use cli::Cli;
use commands::{describe, jobs, models, query, scheduler, views};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match &cli.command {
        cli::Commands::Query(args) => query::execute(args, &cli.global).await,
        cli::Commands::Describe(args) => describe::execute(args, &cli.global).await,
        cli::Commands::Models(args) => models::execute(args, &cli.global).await,
        cli::Commands::Jobs(args) => jobs::execute(args, &cli.global).await,
        cli::Commands::Views(args) => views::execute(args, &cli.global).await,
        cli::Commands::Scheduler(args) => scheduler::execute(args, &cli.global).await,
    }
}

/// Route `log` records to stderr; `RUST_LOG` wins over `--verbose`
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
