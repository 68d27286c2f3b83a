//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Modeltable - query tables, views and versioned models as one relational surface
#[derive(Parser, Debug)]
#[command(name = "mt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory containing modeltable.yml
    #[arg(short = 'd', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true, env = "MT_CONFIG")]
    pub config: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run SQL and print the result of the last statement
    Query(QueryArgs),

    /// Show the columns of a table, view, predictor or system table
    Describe(DescribeArgs),

    /// Manage models and their versions
    Models(ModelsArgs),

    /// Manage scheduled jobs
    Jobs(JobsArgs),

    /// Manage views
    Views(ViewsArgs),

    /// Run the job scheduler
    Scheduler(SchedulerArgs),
}

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// SQL text; several statements may be separated by `;`
    pub sql: String,

    /// Project for unqualified identifiers (default: config default_project)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the describe command
#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Relation name, e.g. `files.orders`, `my_model.2` or `models`
    pub relation: String,

    /// Project for unqualified identifiers (default: config default_project)
    #[arg(short, long)]
    pub project: Option<String>,
}

/// Result output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table
    Table,
    /// JSON array of row objects
    Json,
}

/// Arguments for the models command
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelCommands,
}

/// Model subcommands
#[derive(Subcommand, Debug)]
pub enum ModelCommands {
    /// List models, or every version with --versions
    List(ModelListArgs),

    /// Create a model and train its first version
    Create(ModelTrainArgs),

    /// Train a new version; unset settings come from the active version
    Retrain(ModelTrainArgs),

    /// Make a completed version the active one
    Activate(ModelVersionArgs),

    /// Delete a version that is neither active nor training
    DeleteVersion(ModelVersionArgs),

    /// Drop a model with all of its versions
    Drop(ModelNameArgs),
}

/// Arguments for models list
#[derive(Args, Debug)]
pub struct ModelListArgs {
    /// Only models of this project
    #[arg(short, long)]
    pub project: Option<String>,

    /// Show every version instead of one line per model
    #[arg(long)]
    pub versions: bool,
}

/// Arguments for models create and retrain
#[derive(Args, Debug)]
pub struct ModelTrainArgs {
    /// Model name
    pub name: String,

    /// Project of the model (default: config default_project)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Column to predict
    #[arg(long)]
    pub predict: Option<String>,

    /// ML engine (default: the registry default)
    #[arg(long)]
    pub engine: Option<String>,

    /// Query producing the training data
    #[arg(long = "from")]
    pub training_query: Option<String>,

    /// Free-text tag stored on the version
    #[arg(long)]
    pub tag: Option<String>,

    /// Engine option as KEY=VALUE; repeatable
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,

    /// Keep the current active version when training completes
    #[arg(long)]
    pub no_activate: bool,
}

/// A model version
#[derive(Args, Debug)]
pub struct ModelVersionArgs {
    /// Model name
    pub name: String,

    /// Version number
    pub version: u32,

    /// Project of the model (default: config default_project)
    #[arg(short, long)]
    pub project: Option<String>,
}

/// A model
#[derive(Args, Debug)]
pub struct ModelNameArgs {
    /// Model name
    pub name: String,

    /// Project of the model (default: config default_project)
    #[arg(short, long)]
    pub project: Option<String>,
}

/// Arguments for the jobs command
#[derive(Args, Debug)]
pub struct JobsArgs {
    #[command(subcommand)]
    pub command: JobCommands,
}

/// Job subcommands
#[derive(Subcommand, Debug)]
pub enum JobCommands {
    /// List job definitions
    List(ProjectFilterArgs),

    /// Show the run history
    History(JobHistoryArgs),

    /// Create a job
    Create(JobCreateArgs),

    /// Drop a job; its history is kept
    Drop(JobNameArgs),

    /// Resume scheduling a job
    Activate(JobNameArgs),

    /// Stop scheduling a job without dropping it
    Deactivate(JobNameArgs),
}

/// Optional project narrowing for listing commands
#[derive(Args, Debug)]
pub struct ProjectFilterArgs {
    /// Only entries of this project
    #[arg(short, long)]
    pub project: Option<String>,
}

/// Arguments for jobs history
#[derive(Args, Debug)]
pub struct JobHistoryArgs {
    /// Only runs of this job
    pub name: Option<String>,

    /// Only runs in this project
    #[arg(short, long)]
    pub project: Option<String>,
}

/// Arguments for jobs create
#[derive(Args, Debug)]
pub struct JobCreateArgs {
    /// Job name
    pub name: String,

    /// SQL to run; may use {{START_DATETIME}} and {{PREVIOUS_START_DATETIME}}
    pub query: String,

    /// Project of the job (default: config default_project)
    #[arg(short, long)]
    pub project: Option<String>,

    /// First run, `YYYY-MM-DD HH:MM:SS` (default: now)
    #[arg(long)]
    pub start_at: Option<String>,

    /// No runs after this time
    #[arg(long)]
    pub end_at: Option<String>,

    /// Recurrence such as "every 2 hours"; omit to run once
    #[arg(long)]
    pub every: Option<String>,
}

/// A job
#[derive(Args, Debug)]
pub struct JobNameArgs {
    /// Job name
    pub name: String,

    /// Project of the job (default: config default_project)
    #[arg(short, long)]
    pub project: Option<String>,
}

/// Arguments for the views command
#[derive(Args, Debug)]
pub struct ViewsArgs {
    #[command(subcommand)]
    pub command: ViewCommands,
}

/// View subcommands
#[derive(Subcommand, Debug)]
pub enum ViewCommands {
    /// List views
    List(ProjectFilterArgs),

    /// Create a view from a query
    Create(ViewCreateArgs),

    /// Drop a view
    Drop(ViewNameArgs),
}

/// Arguments for views create
#[derive(Args, Debug)]
pub struct ViewCreateArgs {
    /// View name
    pub name: String,

    /// Defining query
    pub query: String,

    /// Project of the view (default: config default_project)
    #[arg(short, long)]
    pub project: Option<String>,
}

/// A view
#[derive(Args, Debug)]
pub struct ViewNameArgs {
    /// View name
    pub name: String,

    /// Project of the view (default: config default_project)
    #[arg(short, long)]
    pub project: Option<String>,
}

/// Arguments for the scheduler command
#[derive(Args, Debug)]
pub struct SchedulerArgs {
    /// Check the timetable once and exit
    #[arg(long)]
    pub once: bool,

    /// Seconds between ticks (default: config scheduler.interval_secs)
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Split `KEY=VALUE`
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
