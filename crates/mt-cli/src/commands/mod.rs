//! CLI command implementations

pub(crate) mod common;
pub(crate) mod describe;
pub(crate) mod jobs;
pub(crate) mod models;
pub(crate) mod query;
pub(crate) mod scheduler;
pub(crate) mod views;
