//! Once-a-day jobs for processes that own a schedule cache.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// A job that runs once per local day at a fixed time
#[derive(Debug, Clone)]
pub struct DailyJob {
    pub name: String,
    pub at: NaiveTime,
    last_run: Option<NaiveDate>,
}

impl DailyJob {
    pub fn new(name: impl Into<String>, at: NaiveTime) -> Self {
        Self {
            name: name.into(),
            at,
            last_run: None,
        }
    }

    /// Due once `at` has passed today and the job has not run today.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now.time() >= self.at && self.last_run != Some(now.date())
    }

    pub fn mark_run(&mut self, now: NaiveDateTime) {
        self.last_run = Some(now.date());
    }

    pub fn last_run(&self) -> Option<NaiveDate> {
        self.last_run
    }
}

impl std::fmt::Display for DailyJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} daily at {}", self.name, self.at.format("%H:%M"))
    }
}
