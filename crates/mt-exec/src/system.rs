//! Project system tables served from the metadata store

use crate::error::ExecResult;
use mt_core::{ModelVersion, ProjectName, RowBatch, Value};
use mt_meta::MetaStore;

/// Pseudo-project whose system tables span every project
pub const INFORMATION_SCHEMA: &str = "information_schema";

/// Read-only relation describing a project's metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTable {
    /// One row per model, describing its active (or latest) version
    Models,
    /// One row per model version
    ModelsVersions,
    Jobs,
    JobsHistory,
    Views,
}

impl SystemTable {
    pub const ALL: [SystemTable; 5] = [
        SystemTable::Models,
        SystemTable::ModelsVersions,
        SystemTable::Jobs,
        SystemTable::JobsHistory,
        SystemTable::Views,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SystemTable::Models => "models",
            SystemTable::ModelsVersions => "models_versions",
            SystemTable::Jobs => "jobs",
            SystemTable::JobsHistory => "jobs_history",
            SystemTable::Views => "views",
        }
    }

    /// Look a system table up by relation name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            SystemTable::Models => &[
                "NAME",
                "PROJECT",
                "ENGINE",
                "VERSION",
                "STATUS",
                "ACTIVE",
                "PREDICT",
                "TAG",
                "ERROR",
                "CREATED_AT",
            ],
            SystemTable::ModelsVersions => &[
                "NAME",
                "PROJECT",
                "VERSION",
                "STATUS",
                "ACTIVE",
                "PREDICT",
                "TAG",
                "ENGINE",
                "ERROR",
                "CREATED_AT",
                "COMPLETED_AT",
            ],
            SystemTable::Jobs => &[
                "NAME",
                "PROJECT",
                "START_AT",
                "END_AT",
                "NEXT_RUN_AT",
                "SCHEDULE_STR",
                "QUERY",
                "ACTIVE",
            ],
            SystemTable::JobsHistory => &[
                "NAME",
                "PROJECT",
                "RUN_START",
                "RUN_END",
                "ERROR",
                "QUERY",
            ],
            SystemTable::Views => &["NAME", "PROJECT", "QUERY"],
        }
    }

    /// Materialize the table. `None` lists every project.
    pub fn scan(&self, store: &dyn MetaStore, project: Option<&ProjectName>) -> ExecResult<RowBatch> {
        let rows = match self {
            SystemTable::Models => models_rows(store, project)?,
            SystemTable::ModelsVersions => versions_rows(store, project)?,
            SystemTable::Jobs => store
                .list_jobs(project)?
                .into_iter()
                .map(|job| {
                    vec![
                        Value::from(job.id.name.as_str()),
                        Value::from(job.id.project.as_str()),
                        Value::from(job.start_at),
                        Value::from(job.end_at),
                        Value::from(job.next_run_at),
                        Value::from(job.schedule.as_ref().map(|s| s.as_str().to_string())),
                        Value::from(job.query),
                        Value::from(job.active),
                    ]
                })
                .collect(),
            SystemTable::JobsHistory => store
                .list_history(project, None)?
                .into_iter()
                .map(|h| {
                    vec![
                        Value::from(h.job_name.as_str()),
                        Value::from(h.project.as_str()),
                        Value::from(h.started_at),
                        Value::from(h.finished_at),
                        Value::from(h.error),
                        Value::from(h.query),
                    ]
                })
                .collect(),
            SystemTable::Views => store
                .list_views(project)?
                .into_iter()
                .map(|v| {
                    vec![
                        Value::from(v.name.as_str()),
                        Value::from(v.project.as_str()),
                        Value::from(v.query),
                    ]
                })
                .collect(),
        };
        Ok(RowBatch::from_named(self.columns(), rows))
    }
}

fn models_rows(store: &dyn MetaStore, project: Option<&ProjectName>) -> ExecResult<Vec<Vec<Value>>> {
    let mut rows = Vec::new();
    for model in store.list_models(project)? {
        let versions = store.list_versions(&model.id)?;
        let shown = model
            .active_version
            .and_then(|active| versions.iter().find(|v| v.version == active))
            .or_else(|| versions.last());
        let mut row = vec![
            Value::from(model.id.name.as_str()),
            Value::from(model.id.project.as_str()),
            Value::from(model.engine.as_str()),
        ];
        match shown {
            Some(v) => {
                row.extend([
                    Value::from(v.version),
                    Value::from(v.status.as_str()),
                    Value::from(model.is_active(v.version)),
                    Value::from(v.predict.clone()),
                    Value::from(v.tag.clone()),
                    Value::from(v.error.clone()),
                ]);
            }
            None => row.extend(std::iter::repeat(Value::Null).take(6)),
        }
        row.push(Value::from(model.created_at));
        rows.push(row);
    }
    Ok(rows)
}

fn versions_rows(
    store: &dyn MetaStore,
    project: Option<&ProjectName>,
) -> ExecResult<Vec<Vec<Value>>> {
    let mut rows = Vec::new();
    for model in store.list_models(project)? {
        for v in store.list_versions(&model.id)? {
            rows.push(version_row(&v, model.is_active(v.version)));
        }
    }
    Ok(rows)
}

fn version_row(v: &ModelVersion, active: bool) -> Vec<Value> {
    vec![
        Value::from(v.model.name.as_str()),
        Value::from(v.model.project.as_str()),
        Value::from(v.version),
        Value::from(v.status.as_str()),
        Value::from(active),
        Value::from(v.predict.clone()),
        Value::from(v.tag.clone()),
        Value::from(v.engine.as_str()),
        Value::from(v.error.clone()),
        Value::from(v.created_at),
        Value::from(v.completed_at),
    ]
}
