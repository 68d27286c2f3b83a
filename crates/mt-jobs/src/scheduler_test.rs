use super::*;
use crate::error::JobError;
use crate::service::{JobService, JobSpec};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use mt_core::{parse_timestamp, ManualClock, ProjectName, RowBatch, Value};
use mt_meta::{JobStore, MemoryStore};
use std::sync::Mutex;

fn ts(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap()
}

/// Records every query it is asked to run; queries mentioning `boom` fail
#[derive(Default)]
struct RecordingRunner {
    queries: Mutex<Vec<String>>,
    delay_ms: u64,
}

#[async_trait]
impl QueryRunner for RecordingRunner {
    async fn run_query(&self, _project: &ProjectName, query: &str) -> JobResult<RowBatch> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        if query.contains("boom") {
            return Err(JobError::Invalid {
                name: "runner".to_string(),
                reason: "boom".to_string(),
            });
        }
        Ok(RowBatch::from_named(&["x"], vec![vec![Value::Integer(1)]]))
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    runner: Arc<RecordingRunner>,
    scheduler: Arc<Scheduler>,
    jobs: JobService,
}

fn fixture_with(runner: RecordingRunner) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(ts("2024-01-01 00:00:00")));
    let runner = Arc::new(runner);
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        runner.clone(),
        clock.clone(),
    ));
    let jobs = JobService::new(store.clone(), clock.clone());
    Fixture {
        store,
        clock,
        runner,
        scheduler,
        jobs,
    }
}

fn fixture() -> Fixture {
    fixture_with(RecordingRunner::default())
}

fn proj() -> ProjectName {
    ProjectName::new("proj")
}

impl Fixture {
    fn history(&self) -> Vec<JobHistoryEntry> {
        self.store.list_history(None, None).unwrap()
    }

    fn queries(&self) -> Vec<String> {
        self.runner.queries.lock().unwrap().clone()
    }

    fn next_run(&self, name: &str) -> Option<NaiveDateTime> {
        self.jobs.get_job(&proj(), name).unwrap().next_run_at
    }
}

#[tokio::test]
async fn test_repeated_tick_runs_job_once() {
    let f = fixture();
    f.jobs
        .create_job(&proj(), JobSpec::new("j1", "select 1").every("every hour"))
        .unwrap();

    let first = f.scheduler.check_timetable().await.unwrap();
    let second = f.scheduler.check_timetable().await.unwrap();

    assert_eq!(first, TickReport { ran: 1, failed: 0 });
    assert_eq!(second, TickReport::default());
    assert_eq!(f.history().len(), 1);
    assert_eq!(f.next_run("j1"), Some(ts("2024-01-01 01:00:00")));
}

#[tokio::test]
async fn test_inactive_job_is_skipped() {
    let f = fixture();
    f.jobs
        .create_job(&proj(), JobSpec::new("j1", "select 1").every("every hour"))
        .unwrap();
    f.jobs.set_active(&proj(), "j1", false).unwrap();

    let report = f.scheduler.check_timetable().await.unwrap();
    assert_eq!(report.ran, 0);
    assert!(f.history().is_empty());

    f.jobs.set_active(&proj(), "j1", true).unwrap();
    assert_eq!(f.scheduler.check_timetable().await.unwrap().ran, 1);
}

#[tokio::test]
async fn test_failure_is_recorded_and_does_not_block_other_jobs() {
    let f = fixture();
    f.jobs
        .create_job(&proj(), JobSpec::new("bad", "select 'boom'"))
        .unwrap();
    f.jobs
        .create_job(&proj(), JobSpec::new("good", "select 1"))
        .unwrap();

    let report = f.scheduler.check_timetable().await.unwrap();
    assert_eq!(report, TickReport { ran: 2, failed: 1 });

    let history = f.history();
    let bad = history.iter().find(|h| h.job_name == "bad").unwrap();
    let good = history.iter().find(|h| h.job_name == "good").unwrap();
    assert!(bad.error.as_deref().unwrap().contains("boom"));
    assert!(good.succeeded());

    // one-shot jobs are finished either way
    assert_eq!(f.next_run("bad"), None);
    assert_eq!(f.next_run("good"), None);
}

#[tokio::test]
async fn test_next_run_advances_from_previous_next_run() {
    let f = fixture();
    f.jobs
        .create_job(&proj(), JobSpec::new("j1", "select 1").every("every hour"))
        .unwrap();

    f.clock.set(ts("2024-01-01 00:20:00"));
    f.scheduler.check_timetable().await.unwrap();
    assert_eq!(f.next_run("j1"), Some(ts("2024-01-01 01:00:00")));
}

#[tokio::test]
async fn test_late_job_catches_up_one_period_per_tick() {
    let f = fixture();
    f.jobs
        .create_job(&proj(), JobSpec::new("j1", "select 1").every("every hour"))
        .unwrap();

    f.clock.set(ts("2024-01-01 02:30:00"));
    for expected in ["01:00:00", "02:00:00", "03:00:00"] {
        assert_eq!(f.scheduler.check_timetable().await.unwrap().ran, 1);
        assert_eq!(
            f.next_run("j1"),
            Some(ts(&format!("2024-01-01 {}", expected)))
        );
    }
    assert_eq!(f.scheduler.check_timetable().await.unwrap().ran, 0);
    assert_eq!(f.history().len(), 3);
}

#[tokio::test]
async fn test_reactivated_job_resumes_at_next_slot() {
    let f = fixture();
    f.jobs
        .create_job(&proj(), JobSpec::new("j1", "select 1").every("every hour"))
        .unwrap();
    f.scheduler.check_timetable().await.unwrap();
    f.jobs.set_active(&proj(), "j1", false).unwrap();

    f.clock.set(ts("2024-01-03 05:20:00"));
    f.jobs.set_active(&proj(), "j1", true).unwrap();
    assert_eq!(f.next_run("j1"), Some(ts("2024-01-03 06:00:00")));
    assert_eq!(f.scheduler.check_timetable().await.unwrap().ran, 0);

    f.clock.set(ts("2024-01-03 06:00:00"));
    assert_eq!(f.scheduler.check_timetable().await.unwrap().ran, 1);
    assert_eq!(f.history().len(), 2);

    // activating an active job leaves its timetable alone
    f.clock.set(ts("2024-01-04 00:00:00"));
    f.jobs.set_active(&proj(), "j1", true).unwrap();
    assert_eq!(f.next_run("j1"), Some(ts("2024-01-03 07:00:00")));
}

#[tokio::test]
async fn test_far_future_schedule_runs_once() {
    let f = fixture();
    let err = f
        .jobs
        .create_job(
            &proj(),
            JobSpec::new("j0", "select 1").every("every 20000000000 weeks"),
        )
        .unwrap_err();
    assert!(err.to_string().contains("every 20000000000 weeks"), "{}", err);

    f.jobs
        .create_job(
            &proj(),
            JobSpec::new("j1", "select 1").every("every 2000000000 weeks"),
        )
        .unwrap();
    assert_eq!(f.scheduler.check_timetable().await.unwrap().ran, 1);
    assert_eq!(f.next_run("j1"), None);
    assert_eq!(f.scheduler.check_timetable().await.unwrap().ran, 0);
}

#[tokio::test]
async fn test_end_at_finishes_job() {
    let f = fixture();
    f.jobs
        .create_job(
            &proj(),
            JobSpec::new("j1", "select 1")
                .every("every hour")
                .ending_at(ts("2024-01-01 01:30:00")),
        )
        .unwrap();

    f.scheduler.check_timetable().await.unwrap();
    assert_eq!(f.next_run("j1"), Some(ts("2024-01-01 01:00:00")));

    f.clock.advance(ChronoDuration::hours(1));
    f.scheduler.check_timetable().await.unwrap();
    assert_eq!(f.next_run("j1"), None);

    f.clock.advance(ChronoDuration::hours(5));
    assert_eq!(f.scheduler.check_timetable().await.unwrap().ran, 0);
    assert_eq!(f.history().len(), 2);
}

#[tokio::test]
async fn test_previous_start_renders_last_successful_run() {
    let f = fixture();
    f.jobs
        .create_job(
            &proj(),
            JobSpec::new(
                "j1",
                "select * from t where ts > '{{PREVIOUS_START_DATETIME}}' and ts <= '{{START_DATETIME}}'",
            )
            .every("every hour"),
        )
        .unwrap();

    f.scheduler.check_timetable().await.unwrap();
    f.clock.advance(ChronoDuration::hours(1));
    f.scheduler.check_timetable().await.unwrap();

    let queries = f.queries();
    assert_eq!(
        queries[0],
        "select * from t where ts > '1970-01-01 00:00:00' and ts <= '2024-01-01 00:00:00'"
    );
    assert_eq!(
        queries[1],
        "select * from t where ts > '2024-01-01 00:00:00' and ts <= '2024-01-01 01:00:00'"
    );
    // history stores the rendered text
    assert_eq!(f.history()[1].query, queries[1]);
}

#[tokio::test]
async fn test_failed_run_does_not_move_previous_start() {
    let f = fixture();
    f.jobs
        .create_job(
            &proj(),
            JobSpec::new("j1", "select '{{PREVIOUS_START_DATETIME}}'").every("every hour"),
        )
        .unwrap();
    f.scheduler.check_timetable().await.unwrap();

    // a failing run in between
    f.store
        .append_history(&JobHistoryEntry {
            project: proj(),
            job_name: mt_core::JobName::new("j1"),
            query: "select 'boom'".to_string(),
            started_at: ts("2024-01-01 00:30:00"),
            finished_at: ts("2024-01-01 00:30:01"),
            error: Some("boom".to_string()),
        })
        .unwrap();

    f.clock.advance(ChronoDuration::hours(1));
    f.scheduler.check_timetable().await.unwrap();
    assert_eq!(f.queries()[1], "select '2024-01-01 00:00:00'");
}

#[tokio::test]
async fn test_history_survives_drop_job() {
    let f = fixture();
    f.jobs
        .create_job(&proj(), JobSpec::new("j1", "select 1"))
        .unwrap();
    f.scheduler.check_timetable().await.unwrap();
    f.jobs.drop_job(&proj(), "j1").unwrap();

    assert!(f.jobs.get_job(&proj(), "j1").is_err());
    let history = f.jobs.history(Some(&proj()), Some("j1")).unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_concurrent_ticks_do_not_duplicate_runs() {
    let f = fixture_with(RecordingRunner {
        delay_ms: 50,
        ..RecordingRunner::default()
    });
    f.jobs
        .create_job(&proj(), JobSpec::new("j1", "select 1").every("every hour"))
        .unwrap();

    let (a, b) = tokio::join!(
        f.scheduler.check_timetable(),
        f.scheduler.check_timetable()
    );
    assert_eq!(a.unwrap().ran + b.unwrap().ran, 1);
    assert_eq!(f.history().len(), 1);
    assert_eq!(f.queries().len(), 1);
}

#[tokio::test]
async fn test_future_job_is_not_due() {
    let f = fixture();
    f.jobs
        .create_job(
            &proj(),
            JobSpec::new("j1", "select 1").starting_at(ts("2024-01-02 00:00:00")),
        )
        .unwrap();
    assert_eq!(f.scheduler.check_timetable().await.unwrap().ran, 0);

    f.clock.set(ts("2024-01-02 00:00:00"));
    assert_eq!(f.scheduler.check_timetable().await.unwrap().ran, 1);
}

#[tokio::test]
async fn test_start_and_stop_timer_task() {
    let f = fixture();
    f.jobs
        .create_job(&proj(), JobSpec::new("j1", "select 1"))
        .unwrap();

    let handle = Arc::clone(&f.scheduler).start(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());
    handle.stop().await;

    assert_eq!(f.history().len(), 1);
}
