//! Scheduled jobs, their history and recurrence schedules

use crate::error::{CoreError, CoreResult};
use crate::names::{JobName, ProjectName};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// Identity of a job: `(project, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId {
    pub project: ProjectName,
    pub name: JobName,
}

impl JobId {
    pub fn new(project: ProjectName, name: JobName) -> Self {
        Self { project, name }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.name)
    }
}

/// A fixed-period recurrence such as `every hour` or `every 15 minutes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    expression: String,
    period: Duration,
}

impl Schedule {
    /// Parse `every [N] minute(s)|hour(s)|day(s)|week(s)`
    pub fn parse(expression: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidSchedule {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let lowered = expression.trim().to_ascii_lowercase();
        let mut words = lowered.split_whitespace();
        if words.next() != Some("every") {
            return Err(invalid("expected 'every'"));
        }
        let rest: Vec<&str> = words.collect();
        let (count, unit) = match rest.as_slice() {
            [unit] => (1i64, *unit),
            [n, unit] => {
                let n: i64 = n
                    .parse()
                    .map_err(|_| invalid("period count must be a positive integer"))?;
                (n, *unit)
            }
            _ => return Err(invalid("expected 'every [N] <unit>'")),
        };
        if count <= 0 {
            return Err(invalid("period count must be a positive integer"));
        }

        let unit_period = match unit.trim_end_matches('s') {
            "minute" | "min" => Duration::minutes(1),
            "hour" => Duration::hours(1),
            "day" => Duration::days(1),
            "week" => Duration::weeks(1),
            _ => return Err(invalid("unit must be minute, hour, day or week")),
        };

        let period = i32::try_from(count)
            .ok()
            .and_then(|n| unit_period.checked_mul(n))
            .ok_or_else(|| invalid("period is too long"))?;

        Ok(Self {
            expression: expression.trim().to_string(),
            period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl Serialize for Schedule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expression)
    }
}

/// A stored recurring (or one-shot) query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    /// Unparsed query text, possibly containing template variables
    pub query: String,
    pub start_at: NaiveDateTime,
    pub end_at: Option<NaiveDateTime>,
    /// `None` once no further runs are due
    pub next_run_at: Option<NaiveDateTime>,
    pub schedule: Option<Schedule>,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

impl Job {
    /// Whether the job should run at `now`
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.active && self.next_run_at.is_some_and(|at| at <= now)
    }

    /// The run time following `from`: one period later for recurring jobs,
    /// `None` for one-shot jobs, once `end_at` would be passed, or past the
    /// last representable timestamp.
    pub fn following_run(&self, from: NaiveDateTime) -> Option<NaiveDateTime> {
        let next = from.checked_add_signed(self.schedule.as_ref()?.period())?;
        match self.end_at {
            Some(end) if next > end => None,
            _ => Some(next),
        }
    }
}

impl Job {
    /// Where a job resumes at `now`: the first slot of its timetable at or
    /// after `now`, skipping the ones missed while it was inactive. One-shot
    /// jobs stay due.
    pub fn resumed_run(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let next = self.next_run_at?;
        let Some(schedule) = &self.schedule else {
            return Some(next);
        };
        if next >= now {
            return Some(next);
        }
        let period = schedule.period().num_seconds();
        let missed = (now - next).num_seconds();
        let steps = missed / period + i64::from(missed % period != 0);
        let resumed = steps
            .checked_mul(period)
            .and_then(Duration::try_seconds)
            .and_then(|skip| next.checked_add_signed(skip))?;
        match self.end_at {
            Some(end) if resumed > end => None,
            _ => Some(resumed),
        }
    }
}

/// One executed tick of a job. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobHistoryEntry {
    pub project: ProjectName,
    pub job_name: JobName,
    /// The query as executed, after template rendering
    pub query: String,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub error: Option<String>,
}

impl JobHistoryEntry {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::parse_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_parse_schedules() {
        assert_eq!(Schedule::parse("every hour").unwrap().period(), Duration::hours(1));
        assert_eq!(
            Schedule::parse("every 15 minutes").unwrap().period(),
            Duration::minutes(15)
        );
        assert_eq!(Schedule::parse("Every 2 Days").unwrap().period(), Duration::days(2));
        assert_eq!(Schedule::parse("every week").unwrap().period(), Duration::weeks(1));
    }

    #[test]
    fn test_reject_bad_schedules() {
        for bad in ["hourly", "every", "every 0 hours", "every -1 day", "every fortnight", "every two hours"] {
            assert!(Schedule::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_reject_periods_out_of_range() {
        for huge in [
            "every 4294967297 minutes",
            "every 20000000000 weeks",
            "every 99999999999999999999 days",
        ] {
            assert!(
                matches!(Schedule::parse(huge), Err(CoreError::InvalidSchedule { .. })),
                "{huge} should be rejected"
            );
        }
    }

    #[test]
    fn test_following_run_past_calendar_end() {
        let j = job(Some("every 2000000000 weeks"), None);
        assert_eq!(j.following_run(ts("2024-01-01 00:00:00")), None);
    }

    fn job(schedule: Option<&str>, end_at: Option<&str>) -> Job {
        Job {
            id: JobId::new(ProjectName::new("proj"), JobName::new("j1")),
            query: "select 1".to_string(),
            start_at: ts("2024-01-01 00:00:00"),
            end_at: end_at.map(ts),
            next_run_at: Some(ts("2024-01-01 00:00:00")),
            schedule: schedule.map(|s| Schedule::parse(s).unwrap()),
            active: true,
            created_at: ts("2024-01-01 00:00:00"),
        }
    }

    #[test]
    fn test_following_run_adds_period_to_previous() {
        let j = job(Some("every hour"), None);
        assert_eq!(
            j.following_run(ts("2024-01-01 00:00:00")),
            Some(ts("2024-01-01 01:00:00"))
        );
    }

    #[test]
    fn test_resumed_run_skips_missed_slots() {
        let mut j = job(Some("every hour"), None);
        assert_eq!(
            j.resumed_run(ts("2024-01-03 05:20:00")),
            Some(ts("2024-01-03 06:00:00"))
        );
        assert_eq!(
            j.resumed_run(ts("2024-01-03 05:00:00")),
            Some(ts("2024-01-03 05:00:00"))
        );
        // not behind
        assert_eq!(
            j.resumed_run(ts("2023-12-31 00:00:00")),
            Some(ts("2024-01-01 00:00:00"))
        );

        j.end_at = Some(ts("2024-01-02 00:00:00"));
        assert_eq!(j.resumed_run(ts("2024-01-03 05:20:00")), None);

        let once = job(None, None);
        assert_eq!(
            once.resumed_run(ts("2024-06-01 00:00:00")),
            Some(ts("2024-01-01 00:00:00"))
        );
    }

    #[test]
    fn test_one_shot_and_end_at() {
        assert_eq!(job(None, None).following_run(ts("2024-01-01 00:00:00")), None);
        let bounded = job(Some("every hour"), Some("2024-01-01 01:30:00"));
        assert!(bounded.following_run(ts("2024-01-01 00:00:00")).is_some());
        assert_eq!(bounded.following_run(ts("2024-01-01 01:00:00")), None);
    }

    #[test]
    fn test_is_due() {
        let mut j = job(Some("every hour"), None);
        assert!(j.is_due(ts("2024-01-01 00:00:00")));
        assert!(!j.is_due(ts("2023-12-31 23:59:59")));
        j.active = false;
        assert!(!j.is_due(ts("2024-01-02 00:00:00")));
        j.active = true;
        j.next_run_at = None;
        assert!(!j.is_due(ts("2024-01-02 00:00:00")));
    }
}
