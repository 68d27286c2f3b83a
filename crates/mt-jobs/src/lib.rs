//! mt-jobs - Scheduled jobs for Modeltable
//!
//! [`JobService`] validates and stores job definitions. The [`Scheduler`]
//! runs every due job once per tick: it claims the run by advancing
//! `next_run_at` in the store, renders the job's query template, executes it
//! through a [`QueryRunner`] and appends the outcome to the job history.

pub mod error;
pub mod runner;
pub mod scheduler;
pub mod service;

pub use error::{JobError, JobResult};
pub use runner::QueryRunner;
pub use scheduler::{Scheduler, SchedulerHandle, TickReport};
pub use service::{JobService, JobSpec};
