//! Store traits for models, jobs and views.
//!
//! All operations are single-statement atomic. Callers that need a
//! read-then-write to be atomic with respect to other callers either use a
//! dedicated primitive ([`ModelStore::allocate_version`],
//! [`JobStore::claim_run`]) or serialize on their own per-key lock.
//!
//! Project and entity names match case-insensitively.

use crate::error::MetaResult;
use chrono::NaiveDateTime;
use mt_core::{
    Job, JobHistoryEntry, JobId, JobName, ModelId, ModelRecord, ModelVersion, ProjectName,
    VersionStatus, ViewName,
};

/// A stored view definition
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRecord {
    pub project: ProjectName,
    pub name: ViewName,
    /// Defining SQL, parsed on every resolution
    pub query: String,
    pub created_at: NaiveDateTime,
}

/// Model and model-version rows
pub trait ModelStore: Send + Sync {
    fn get_model(&self, id: &ModelId) -> MetaResult<Option<ModelRecord>>;

    /// Models of one project, or of all projects, ordered by identity
    fn list_models(&self, project: Option<&ProjectName>) -> MetaResult<Vec<ModelRecord>>;

    /// Insert a new model row. Fails with `AlreadyExists` if present.
    fn create_model(&self, record: &ModelRecord) -> MetaResult<()>;

    /// Atomically increment the model's version counter and return the new
    /// number. Numbers are never reused, even after deletion.
    fn allocate_version(&self, id: &ModelId) -> MetaResult<u32>;

    fn insert_version(&self, version: &ModelVersion) -> MetaResult<()>;

    fn get_version(&self, id: &ModelId, version: u32) -> MetaResult<Option<ModelVersion>>;

    /// Versions of a model in ascending order
    fn list_versions(&self, id: &ModelId) -> MetaResult<Vec<ModelVersion>>;

    /// Record the outcome of training
    fn set_version_status(
        &self,
        id: &ModelId,
        version: u32,
        status: VersionStatus,
        error: Option<&str>,
        completed_at: Option<NaiveDateTime>,
    ) -> MetaResult<()>;

    /// Replace the active-version pointer in a single write
    fn set_active_version(&self, id: &ModelId, version: Option<u32>) -> MetaResult<()>;

    /// Returns whether a row was removed
    fn delete_version(&self, id: &ModelId, version: u32) -> MetaResult<bool>;

    /// Remove a model and all of its versions. Returns whether it existed.
    fn delete_model(&self, id: &ModelId) -> MetaResult<bool>;
}

/// Job and job-history rows
pub trait JobStore: Send + Sync {
    /// Fails with `AlreadyExists` if a job with the same identity exists
    fn insert_job(&self, job: &Job) -> MetaResult<()>;

    fn get_job(&self, id: &JobId) -> MetaResult<Option<Job>>;

    fn list_jobs(&self, project: Option<&ProjectName>) -> MetaResult<Vec<Job>>;

    /// Removes the job only; its history stays queryable
    fn delete_job(&self, id: &JobId) -> MetaResult<bool>;

    fn set_job_active(&self, id: &JobId, active: bool) -> MetaResult<bool>;

    /// Compare-and-set on `next_run_at`: succeeds only if the job is active
    /// and its `next_run_at` still equals `expected`.
    fn claim_run(
        &self,
        id: &JobId,
        expected: NaiveDateTime,
        next: Option<NaiveDateTime>,
    ) -> MetaResult<bool>;

    /// Unconditionally set `next_run_at` (rescheduling, reactivation)
    fn update_next_run(&self, id: &JobId, next: Option<NaiveDateTime>) -> MetaResult<bool>;

    fn append_history(&self, entry: &JobHistoryEntry) -> MetaResult<()>;

    /// History ordered by start time, optionally narrowed to a project/job
    fn list_history(
        &self,
        project: Option<&ProjectName>,
        job: Option<&JobName>,
    ) -> MetaResult<Vec<JobHistoryEntry>>;

    /// Start of the most recent run that finished without error
    fn last_successful_start(&self, id: &JobId) -> MetaResult<Option<NaiveDateTime>>;
}

/// Stored view definitions
pub trait ViewStore: Send + Sync {
    /// Fails with `AlreadyExists` if the name is taken
    fn create_view(&self, view: &ViewRecord) -> MetaResult<()>;

    fn get_view(&self, project: &ProjectName, name: &str) -> MetaResult<Option<ViewRecord>>;

    fn list_views(&self, project: Option<&ProjectName>) -> MetaResult<Vec<ViewRecord>>;

    fn drop_view(&self, project: &ProjectName, name: &str) -> MetaResult<bool>;
}

/// Everything the services need from one backing store
pub trait MetaStore: ModelStore + JobStore + ViewStore {}

impl<T: ModelStore + JobStore + ViewStore> MetaStore for T {}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
