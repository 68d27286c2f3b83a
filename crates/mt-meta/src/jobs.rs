//! `JobStore` over the meta database.

use crate::connection::MetaDb;
use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::{from_micros, opt_from_micros, to_micros};
use crate::store::JobStore;
use chrono::NaiveDateTime;
use duckdb::Connection;
use mt_core::{Job, JobHistoryEntry, JobId, JobName, ProjectName, Schedule};

const JOB_COLUMNS: &str =
    "project, name, query, start_at, end_at, next_run_at, schedule_str, active, created_at";

struct RawJob {
    project: String,
    name: String,
    query: String,
    start_at: i64,
    end_at: Option<i64>,
    next_run_at: Option<i64>,
    schedule_str: Option<String>,
    active: bool,
    created_at: i64,
}

fn read_job(row: &duckdb::Row<'_>) -> duckdb::Result<RawJob> {
    Ok(RawJob {
        project: row.get(0)?,
        name: row.get(1)?,
        query: row.get(2)?,
        start_at: row.get(3)?,
        end_at: row.get(4)?,
        next_run_at: row.get(5)?,
        schedule_str: row.get(6)?,
        active: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn decode_job(raw: RawJob) -> MetaResult<Job> {
    let corrupt = |e: mt_core::CoreError| MetaError::CorruptRow(e.to_string());
    Ok(Job {
        id: JobId::new(
            ProjectName::try_new(raw.project).map_err(corrupt)?,
            JobName::try_new(raw.name).map_err(corrupt)?,
        ),
        query: raw.query,
        start_at: from_micros(raw.start_at)?,
        end_at: opt_from_micros(raw.end_at)?,
        next_run_at: opt_from_micros(raw.next_run_at)?,
        schedule: raw
            .schedule_str
            .as_deref()
            .map(Schedule::parse)
            .transpose()
            .map_err(corrupt)?,
        active: raw.active,
        created_at: from_micros(raw.created_at)?,
    })
}

type RawHistory = (String, String, String, i64, i64, Option<String>);

fn decode_history(raw: RawHistory) -> MetaResult<JobHistoryEntry> {
    let (project, job_name, query, started_at, finished_at, error) = raw;
    let corrupt = |e: mt_core::CoreError| MetaError::CorruptRow(e.to_string());
    Ok(JobHistoryEntry {
        project: ProjectName::try_new(project).map_err(corrupt)?,
        job_name: JobName::try_new(job_name).map_err(corrupt)?,
        query,
        started_at: from_micros(started_at)?,
        finished_at: from_micros(finished_at)?,
        error,
    })
}

fn fetch_job(conn: &Connection, id: &JobId) -> MetaResult<Option<Job>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM mt_meta.jobs \
             WHERE lower(project) = lower(?) AND lower(name) = lower(?)"
        ))
        .query_context("prepare get_job")?;
    let mut rows = stmt
        .query_map(duckdb::params![id.project.as_str(), id.name.as_str()], read_job)
        .query_context("query get_job")?;
    match rows.next() {
        Some(raw) => Ok(Some(decode_job(raw.query_context("row get_job")?)?)),
        None => Ok(None),
    }
}

impl JobStore for MetaDb {
    fn insert_job(&self, job: &Job) -> MetaResult<()> {
        self.transaction(|conn| {
            if fetch_job(conn, &job.id)?.is_some() {
                return Err(MetaError::AlreadyExists {
                    entity: "Job",
                    name: job.id.to_string(),
                });
            }
            conn.execute(
                &format!(
                    "INSERT INTO mt_meta.jobs ({JOB_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                duckdb::params![
                    job.id.project.as_str(),
                    job.id.name.as_str(),
                    job.query,
                    to_micros(job.start_at),
                    job.end_at.map(to_micros),
                    job.next_run_at.map(to_micros),
                    job.schedule.as_ref().map(|s| s.as_str().to_string()),
                    job.active,
                    to_micros(job.created_at),
                ],
            )
            .query_context("insert job")?;
            Ok(())
        })
    }

    fn get_job(&self, id: &JobId) -> MetaResult<Option<Job>> {
        let conn = self.conn()?;
        fetch_job(&conn, id)
    }

    fn list_jobs(&self, project: Option<&ProjectName>) -> MetaResult<Vec<Job>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM mt_meta.jobs \
                 WHERE CAST(? AS VARCHAR) IS NULL OR lower(project) = lower(CAST(? AS VARCHAR)) \
                 ORDER BY project, name"
            ))
            .query_context("prepare list_jobs")?;
        let filter = project.map(|p| p.as_str());
        let rows = stmt
            .query_map(duckdb::params![filter, filter], read_job)
            .query_context("query list_jobs")?;
        rows.map(|r| decode_job(r.query_context("row list_jobs")?))
            .collect()
    }

    fn delete_job(&self, id: &JobId) -> MetaResult<bool> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM mt_meta.jobs WHERE lower(project) = lower(?) AND lower(name) = lower(?)",
                duckdb::params![id.project.as_str(), id.name.as_str()],
            )
            .query_context("delete job")?;
        Ok(deleted > 0)
    }

    fn set_job_active(&self, id: &JobId, active: bool) -> MetaResult<bool> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE mt_meta.jobs SET active = ? \
                 WHERE lower(project) = lower(?) AND lower(name) = lower(?)",
                duckdb::params![active, id.project.as_str(), id.name.as_str()],
            )
            .query_context("update job active")?;
        Ok(updated > 0)
    }

    fn claim_run(
        &self,
        id: &JobId,
        expected: NaiveDateTime,
        next: Option<NaiveDateTime>,
    ) -> MetaResult<bool> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE mt_meta.jobs SET next_run_at = ? \
                 WHERE lower(project) = lower(?) AND lower(name) = lower(?) \
                   AND active AND next_run_at = ?",
                duckdb::params![
                    next.map(to_micros),
                    id.project.as_str(),
                    id.name.as_str(),
                    to_micros(expected),
                ],
            )
            .query_context("claim job run")?;
        Ok(updated == 1)
    }

    fn update_next_run(&self, id: &JobId, next: Option<NaiveDateTime>) -> MetaResult<bool> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE mt_meta.jobs SET next_run_at = ? \
                 WHERE lower(project) = lower(?) AND lower(name) = lower(?)",
                duckdb::params![next.map(to_micros), id.project.as_str(), id.name.as_str()],
            )
            .query_context("update job next_run_at")?;
        Ok(updated > 0)
    }

    fn append_history(&self, entry: &JobHistoryEntry) -> MetaResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO mt_meta.jobs_history (project, job_name, query, started_at, finished_at, error) \
             VALUES (?, ?, ?, ?, ?, ?)",
            duckdb::params![
                entry.project.as_str(),
                entry.job_name.as_str(),
                entry.query,
                to_micros(entry.started_at),
                to_micros(entry.finished_at),
                entry.error,
            ],
        )
        .query_context("insert job history")?;
        Ok(())
    }

    fn list_history(
        &self,
        project: Option<&ProjectName>,
        job: Option<&JobName>,
    ) -> MetaResult<Vec<JobHistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT project, job_name, query, started_at, finished_at, error \
                 FROM mt_meta.jobs_history \
                 WHERE (CAST(? AS VARCHAR) IS NULL OR lower(project) = lower(CAST(? AS VARCHAR))) \
                   AND (CAST(? AS VARCHAR) IS NULL OR lower(job_name) = lower(CAST(? AS VARCHAR))) \
                 ORDER BY started_at, history_id",
            )
            .query_context("prepare list_history")?;
        let project = project.map(|p| p.as_str());
        let job = job.map(|j| j.as_str());
        let rows = stmt
            .query_map(duckdb::params![project, project, job, job], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .query_context("query list_history")?;
        rows.map(|r| decode_history(r.query_context("row list_history")?))
            .collect()
    }

    fn last_successful_start(&self, id: &JobId) -> MetaResult<Option<NaiveDateTime>> {
        let conn = self.conn()?;
        let latest: Option<i64> = conn
            .query_row(
                "SELECT MAX(started_at) FROM mt_meta.jobs_history \
                 WHERE lower(project) = lower(?) AND lower(job_name) = lower(?) AND error IS NULL",
                duckdb::params![id.project.as_str(), id.name.as_str()],
                |row| row.get(0),
            )
            .query_context("query last successful start")?;
        opt_from_micros(latest)
    }
}
