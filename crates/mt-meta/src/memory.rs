//! In-memory metadata store for tests and ephemeral sessions.

use crate::error::{MetaError, MetaResult};
use crate::store::{JobStore, ModelStore, ViewRecord, ViewStore};
use chrono::NaiveDateTime;
use mt_core::{
    Job, JobHistoryEntry, JobId, JobName, ModelId, ModelRecord, ModelVersion, ProjectName,
    VersionStatus,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

type Key = (String, String);

fn key(project: &str, name: &str) -> Key {
    (project.to_ascii_lowercase(), name.to_ascii_lowercase())
}

#[derive(Default)]
struct State {
    models: BTreeMap<Key, ModelRecord>,
    versions: BTreeMap<Key, BTreeMap<u32, ModelVersion>>,
    views: BTreeMap<Key, ViewRecord>,
    jobs: BTreeMap<Key, Job>,
    history: Vec<JobHistoryEntry>,
}

/// A [`MetaStore`](crate::MetaStore) kept entirely in process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MetaResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| MetaError::MutexPoisoned(e.to_string()))
    }
}

fn matches_project(project: Option<&ProjectName>, candidate: &ProjectName) -> bool {
    project.map_or(true, |p| p.eq_ignore_ascii_case(candidate))
}

impl ModelStore for MemoryStore {
    fn get_model(&self, id: &ModelId) -> MetaResult<Option<ModelRecord>> {
        Ok(self.state()?.models.get(&key(&id.project, &id.name)).cloned())
    }

    fn list_models(&self, project: Option<&ProjectName>) -> MetaResult<Vec<ModelRecord>> {
        Ok(self
            .state()?
            .models
            .values()
            .filter(|m| matches_project(project, &m.id.project))
            .cloned()
            .collect())
    }

    fn create_model(&self, record: &ModelRecord) -> MetaResult<()> {
        let mut state = self.state()?;
        let k = key(&record.id.project, &record.id.name);
        if state.models.contains_key(&k) {
            return Err(MetaError::AlreadyExists {
                entity: "Model",
                name: record.id.to_string(),
            });
        }
        state.models.insert(k, record.clone());
        Ok(())
    }

    fn allocate_version(&self, id: &ModelId) -> MetaResult<u32> {
        let mut state = self.state()?;
        let model = state
            .models
            .get_mut(&key(&id.project, &id.name))
            .ok_or_else(|| MetaError::NotFound {
                entity: "Model",
                name: id.to_string(),
            })?;
        model.last_version += 1;
        Ok(model.last_version)
    }

    fn insert_version(&self, version: &ModelVersion) -> MetaResult<()> {
        let mut state = self.state()?;
        let versions = state
            .versions
            .entry(key(&version.model.project, &version.model.name))
            .or_default();
        if versions.contains_key(&version.version) {
            return Err(MetaError::AlreadyExists {
                entity: "Model version",
                name: format!("{}.{}", version.model, version.version),
            });
        }
        versions.insert(version.version, version.clone());
        Ok(())
    }

    fn get_version(&self, id: &ModelId, version: u32) -> MetaResult<Option<ModelVersion>> {
        Ok(self
            .state()?
            .versions
            .get(&key(&id.project, &id.name))
            .and_then(|v| v.get(&version))
            .cloned())
    }

    fn list_versions(&self, id: &ModelId) -> MetaResult<Vec<ModelVersion>> {
        Ok(self
            .state()?
            .versions
            .get(&key(&id.project, &id.name))
            .map(|v| v.values().cloned().collect())
            .unwrap_or_default())
    }

    fn set_version_status(
        &self,
        id: &ModelId,
        version: u32,
        status: VersionStatus,
        error: Option<&str>,
        completed_at: Option<NaiveDateTime>,
    ) -> MetaResult<()> {
        let mut state = self.state()?;
        let row = state
            .versions
            .get_mut(&key(&id.project, &id.name))
            .and_then(|v| v.get_mut(&version))
            .ok_or_else(|| MetaError::NotFound {
                entity: "Model version",
                name: format!("{}.{}", id, version),
            })?;
        row.status = status;
        row.error = error.map(str::to_string);
        row.completed_at = completed_at;
        Ok(())
    }

    fn set_active_version(&self, id: &ModelId, version: Option<u32>) -> MetaResult<()> {
        let mut state = self.state()?;
        let model = state
            .models
            .get_mut(&key(&id.project, &id.name))
            .ok_or_else(|| MetaError::NotFound {
                entity: "Model",
                name: id.to_string(),
            })?;
        model.active_version = version;
        Ok(())
    }

    fn delete_version(&self, id: &ModelId, version: u32) -> MetaResult<bool> {
        Ok(self
            .state()?
            .versions
            .get_mut(&key(&id.project, &id.name))
            .and_then(|v| v.remove(&version))
            .is_some())
    }

    fn delete_model(&self, id: &ModelId) -> MetaResult<bool> {
        let mut state = self.state()?;
        let k = key(&id.project, &id.name);
        state.versions.remove(&k);
        Ok(state.models.remove(&k).is_some())
    }
}

impl JobStore for MemoryStore {
    fn insert_job(&self, job: &Job) -> MetaResult<()> {
        let mut state = self.state()?;
        let k = key(&job.id.project, &job.id.name);
        if state.jobs.contains_key(&k) {
            return Err(MetaError::AlreadyExists {
                entity: "Job",
                name: job.id.to_string(),
            });
        }
        state.jobs.insert(k, job.clone());
        Ok(())
    }

    fn get_job(&self, id: &JobId) -> MetaResult<Option<Job>> {
        Ok(self.state()?.jobs.get(&key(&id.project, &id.name)).cloned())
    }

    fn list_jobs(&self, project: Option<&ProjectName>) -> MetaResult<Vec<Job>> {
        Ok(self
            .state()?
            .jobs
            .values()
            .filter(|j| matches_project(project, &j.id.project))
            .cloned()
            .collect())
    }

    fn delete_job(&self, id: &JobId) -> MetaResult<bool> {
        Ok(self
            .state()?
            .jobs
            .remove(&key(&id.project, &id.name))
            .is_some())
    }

    fn set_job_active(&self, id: &JobId, active: bool) -> MetaResult<bool> {
        let mut state = self.state()?;
        match state.jobs.get_mut(&key(&id.project, &id.name)) {
            Some(job) => {
                job.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn claim_run(
        &self,
        id: &JobId,
        expected: NaiveDateTime,
        next: Option<NaiveDateTime>,
    ) -> MetaResult<bool> {
        let mut state = self.state()?;
        match state.jobs.get_mut(&key(&id.project, &id.name)) {
            Some(job) if job.active && job.next_run_at == Some(expected) => {
                job.next_run_at = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn update_next_run(&self, id: &JobId, next: Option<NaiveDateTime>) -> MetaResult<bool> {
        let mut state = self.state()?;
        match state.jobs.get_mut(&key(&id.project, &id.name)) {
            Some(job) => {
                job.next_run_at = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn append_history(&self, entry: &JobHistoryEntry) -> MetaResult<()> {
        self.state()?.history.push(entry.clone());
        Ok(())
    }

    fn list_history(
        &self,
        project: Option<&ProjectName>,
        job: Option<&JobName>,
    ) -> MetaResult<Vec<JobHistoryEntry>> {
        let mut entries: Vec<JobHistoryEntry> = self
            .state()?
            .history
            .iter()
            .filter(|h| matches_project(project, &h.project))
            .filter(|h| job.map_or(true, |j| j.eq_ignore_ascii_case(&h.job_name)))
            .cloned()
            .collect();
        entries.sort_by_key(|h| h.started_at);
        Ok(entries)
    }

    fn last_successful_start(&self, id: &JobId) -> MetaResult<Option<NaiveDateTime>> {
        Ok(self
            .state()?
            .history
            .iter()
            .filter(|h| h.succeeded())
            .filter(|h| {
                h.project.eq_ignore_ascii_case(&id.project)
                    && h.job_name.eq_ignore_ascii_case(&id.name)
            })
            .map(|h| h.started_at)
            .max())
    }
}

impl ViewStore for MemoryStore {
    fn create_view(&self, view: &ViewRecord) -> MetaResult<()> {
        let mut state = self.state()?;
        let k = key(&view.project, &view.name);
        if state.views.contains_key(&k) {
            return Err(MetaError::AlreadyExists {
                entity: "View",
                name: format!("{}.{}", view.project, view.name),
            });
        }
        state.views.insert(k, view.clone());
        Ok(())
    }

    fn get_view(&self, project: &ProjectName, name: &str) -> MetaResult<Option<ViewRecord>> {
        Ok(self.state()?.views.get(&key(project, name)).cloned())
    }

    fn list_views(&self, project: Option<&ProjectName>) -> MetaResult<Vec<ViewRecord>> {
        Ok(self
            .state()?
            .views
            .values()
            .filter(|v| matches_project(project, &v.project))
            .cloned()
            .collect())
    }

    fn drop_view(&self, project: &ProjectName, name: &str) -> MetaResult<bool> {
        Ok(self.state()?.views.remove(&key(project, name)).is_some())
    }
}
