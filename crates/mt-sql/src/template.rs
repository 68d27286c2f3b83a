//! Template rendering for scheduled job queries
//!
//! Job queries may reference `{{PREVIOUS_START_DATETIME}}` (start of the last
//! successful run) and `{{START_DATETIME}}` (start of the current run).
//! Unknown variables are rejected so typos surface when the job is created.

use crate::error::SqlResult;
use chrono::NaiveDateTime;
use minijinja::{context, Environment, UndefinedBehavior};
use mt_core::TIMESTAMP_FORMAT;

/// Rendered when a job has never completed successfully
pub const EPOCH_TEXT: &str = "1970-01-01 00:00:00";

/// Values substituted into a job query
#[derive(Debug, Clone, Copy, Default)]
pub struct JobTemplateVars {
    pub previous_start: Option<NaiveDateTime>,
    pub start: Option<NaiveDateTime>,
}

/// Render a job query with the given run timestamps
pub fn render_job_query(query: &str, vars: JobTemplateVars) -> SqlResult<String> {
    if !query.contains("{{") && !query.contains("{%") {
        return Ok(query.to_string());
    }

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);

    let previous = vars
        .previous_start
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| EPOCH_TEXT.to_string());
    let start = vars
        .start
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| EPOCH_TEXT.to_string());

    let rendered = env.render_str(
        query,
        context! {
            PREVIOUS_START_DATETIME => previous,
            START_DATETIME => start,
        },
    )?;
    log::debug!("Rendered job query: {}", rendered);
    Ok(rendered)
}
