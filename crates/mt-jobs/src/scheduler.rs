//! The job scheduler: runs every due job once per tick

use crate::error::JobResult;
use crate::runner::QueryRunner;
use mt_core::{Clock, Job, JobHistoryEntry, KeyedLocks};
use mt_meta::MetaStore;
use mt_sql::{render_job_query, JobTemplateVars};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Outcome counts of one [`Scheduler::check_timetable`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Jobs executed this tick, failed ones included
    pub ran: usize,
    pub failed: usize,
}

enum RunOutcome {
    Skipped,
    Succeeded,
    Failed,
}

pub struct Scheduler {
    store: Arc<dyn MetaStore>,
    runner: Arc<dyn QueryRunner>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<(String, String)>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn MetaStore>,
        runner: Arc<dyn QueryRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            runner,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Run every active job whose `next_run_at` has passed.
    ///
    /// Each due job runs at most once per call. A job that fell several
    /// periods behind catches up one period per tick.
    pub async fn check_timetable(&self) -> JobResult<TickReport> {
        let now = self.clock.now();
        let due: Vec<Job> = self
            .store
            .list_jobs(None)?
            .into_iter()
            .filter(|job| job.is_due(now))
            .collect();

        let mut report = TickReport::default();
        for job in due {
            match self.run_job(&job).await {
                Ok(RunOutcome::Skipped) => {}
                Ok(RunOutcome::Succeeded) => report.ran += 1,
                Ok(RunOutcome::Failed) => {
                    report.ran += 1;
                    report.failed += 1;
                }
                Err(e) => {
                    log::error!("Job {} could not be scheduled: {}", job.id, e);
                    report.failed += 1;
                }
            }
        }
        if report.ran > 0 || report.failed > 0 {
            log::info!(
                "Scheduler tick: {} job(s) ran, {} failed",
                report.ran,
                report.failed
            );
        }
        Ok(report)
    }

    async fn run_job(&self, candidate: &Job) -> JobResult<RunOutcome> {
        let key = (
            candidate.id.project.to_ascii_lowercase(),
            candidate.id.name.to_ascii_lowercase(),
        );
        let _guard = self.locks.lock(&key).await;

        // A concurrent tick may have run it while we waited
        let Some(job) = self.store.get_job(&candidate.id)? else {
            return Ok(RunOutcome::Skipped);
        };
        if !job.is_due(self.clock.now()) {
            return Ok(RunOutcome::Skipped);
        }
        let Some(expected) = job.next_run_at else {
            return Ok(RunOutcome::Skipped);
        };
        let next = job.following_run(expected);
        if !self.store.claim_run(&job.id, expected, next)? {
            log::debug!("Job {} was claimed elsewhere", job.id);
            return Ok(RunOutcome::Skipped);
        }

        let started_at = self.clock.now();
        let previous_start = self.store.last_successful_start(&job.id)?;
        let vars = JobTemplateVars {
            previous_start,
            start: Some(started_at),
        };

        let (query, result) = match render_job_query(&job.query, vars) {
            Ok(query) => {
                let result = self.runner.run_query(&job.id.project, &query).await;
                (query, result.map(|batch| batch.len()))
            }
            Err(e) => (job.query.clone(), Err(e.into())),
        };

        let error = match result {
            Ok(rows) => {
                log::info!("Job {} finished ({} rows)", job.id, rows);
                None
            }
            Err(e) => {
                log::warn!("Job {} failed: {}", job.id, e);
                Some(e.to_string())
            }
        };
        let failed = error.is_some();
        self.store.append_history(&JobHistoryEntry {
            project: job.id.project.clone(),
            job_name: job.id.name.clone(),
            query,
            started_at,
            finished_at: self.clock.now(),
            error,
        })?;

        match next {
            Some(at) => log::debug!("Job {} next run at {}", job.id, at),
            None => log::debug!("Job {} has no further runs", job.id),
        }
        Ok(if failed {
            RunOutcome::Failed
        } else {
            RunOutcome::Succeeded
        })
    }

    /// Spawn the periodic timer task. The first tick fires after one
    /// `interval`.
    pub fn start(self: Arc<Self>, interval: Duration) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            timer.tick().await;
            log::info!("Scheduler started (interval {:?})", interval);

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = timer.tick() => {
                        if let Err(e) = self.check_timetable().await {
                            log::error!("Scheduler tick failed: {}", e);
                        }
                    }
                }
            }
            log::info!("Scheduler stopped");
        });
        SchedulerHandle { shutdown_tx, task }
    }
}

/// Handle to a running scheduler task
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the timer task and wait for an in-flight tick to finish
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            log::warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
