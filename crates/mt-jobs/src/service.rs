//! Job definitions: create, drop, (de)activate and inspect

use crate::error::{JobError, JobResult};
use chrono::NaiveDateTime;
use mt_core::{Clock, Job, JobHistoryEntry, JobId, JobName, ProjectName, Schedule};
use mt_meta::{MetaError, MetaStore};
use mt_sql::{render_job_query, JobTemplateVars, SqlParser};
use std::sync::Arc;

/// User-supplied definition of a new job
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    pub name: String,
    pub query: String,
    /// Defaults to the current time
    pub start_at: Option<NaiveDateTime>,
    pub end_at: Option<NaiveDateTime>,
    /// Recurrence such as `every 2 hours`; `None` runs once
    pub schedule: Option<String>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn starting_at(mut self, at: NaiveDateTime) -> Self {
        self.start_at = Some(at);
        self
    }

    pub fn ending_at(mut self, at: NaiveDateTime) -> Self {
        self.end_at = Some(at);
        self
    }

    pub fn every(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }
}

/// Validates and stores job definitions
pub struct JobService {
    store: Arc<dyn MetaStore>,
    parser: SqlParser,
    clock: Arc<dyn Clock>,
}

impl JobService {
    pub fn new(store: Arc<dyn MetaStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            parser: SqlParser::duckdb(),
            clock,
        }
    }

    pub fn create_job(&self, project: &ProjectName, spec: JobSpec) -> JobResult<Job> {
        let name = JobName::try_new(spec.name.as_str())?;
        let id = JobId::new(project.clone(), name);
        if self.store.get_job(&id)?.is_some() {
            return Err(JobError::AlreadyExists(id.to_string()));
        }

        let invalid = |reason: String| JobError::Invalid {
            name: id.to_string(),
            reason,
        };

        let query = spec.query.trim();
        if query.is_empty() {
            return Err(invalid("query is empty".to_string()));
        }
        let now = self.clock.now();
        let rendered = render_job_query(
            query,
            JobTemplateVars {
                previous_start: None,
                start: Some(now),
            },
        )?;
        self.parser.parse(&rendered)?;

        let schedule = spec.schedule.as_deref().map(Schedule::parse).transpose()?;
        let start_at = spec.start_at.unwrap_or(now);
        if let Some(end_at) = spec.end_at {
            if end_at < start_at {
                return Err(invalid(format!(
                    "end_at {} is before start_at {}",
                    end_at, start_at
                )));
            }
        }

        let job = Job {
            id,
            query: query.to_string(),
            start_at,
            end_at: spec.end_at,
            next_run_at: Some(start_at),
            schedule,
            active: true,
            created_at: now,
        };
        match self.store.insert_job(&job) {
            Ok(()) => {}
            Err(MetaError::AlreadyExists { .. }) => {
                return Err(JobError::AlreadyExists(job.id.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        log::info!(
            "Created job {} (first run {}, schedule {})",
            job.id,
            start_at,
            job.schedule
                .as_ref()
                .map(Schedule::as_str)
                .unwrap_or("once")
        );
        Ok(job)
    }

    /// Remove a job definition. Its history is kept.
    pub fn drop_job(&self, project: &ProjectName, name: &str) -> JobResult<()> {
        let id = self.job_id(project, name)?;
        if !self.store.delete_job(&id)? {
            return Err(JobError::NotFound(id.to_string()));
        }
        log::info!("Dropped job {}", id);
        Ok(())
    }

    /// Include or exclude a job from scheduling. A reactivated job resumes
    /// at its next slot instead of catching up on the ones it missed.
    pub fn set_active(&self, project: &ProjectName, name: &str, active: bool) -> JobResult<()> {
        let id = self.job_id(project, name)?;
        let job = self
            .store
            .get_job(&id)?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if active && !job.active {
            let resumed = job.resumed_run(self.clock.now());
            if resumed != job.next_run_at {
                log::debug!("Job {} resumes at {:?}", id, resumed);
                self.store.update_next_run(&id, resumed)?;
            }
        }
        if !self.store.set_job_active(&id, active)? {
            return Err(JobError::NotFound(id.to_string()));
        }
        log::info!(
            "Job {} {}",
            id,
            if active { "activated" } else { "deactivated" }
        );
        Ok(())
    }

    pub fn get_job(&self, project: &ProjectName, name: &str) -> JobResult<Job> {
        let id = self.job_id(project, name)?;
        self.store
            .get_job(&id)?
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub fn list_jobs(&self, project: Option<&ProjectName>) -> JobResult<Vec<Job>> {
        Ok(self.store.list_jobs(project)?)
    }

    /// History rows of one job, or of every job when `name` is `None`
    pub fn history(
        &self,
        project: Option<&ProjectName>,
        name: Option<&str>,
    ) -> JobResult<Vec<JobHistoryEntry>> {
        let name = name.map(JobName::try_new).transpose()?;
        Ok(self.store.list_history(project, name.as_ref())?)
    }

    fn job_id(&self, project: &ProjectName, name: &str) -> JobResult<JobId> {
        Ok(JobId::new(project.clone(), JobName::try_new(name)?))
    }
}
