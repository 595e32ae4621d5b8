use std::{sync::Mutex, time::Duration};

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone};

/// Source of the current local time
pub trait Clock: Send + Sync {
    /// Current local wall-clock time.
    fn now(&self) -> NaiveDateTime;

    /// Whether daylight-saving time is active right now.
    fn is_dst(&self) -> bool;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Host clock in the system time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn is_dst(&self) -> bool {
        let now = Local::now();
        let current = now.offset().fix().local_minus_utc();
        match standard_offset(now.year()) {
            Some(standard) => current > standard,
            None => false,
        }
    }
}

/// The smaller of the January and July offsets is the zone's standard time.
fn standard_offset(year: i32) -> Option<i32> {
    let offset_at = |month: u32| {
        Local
            .with_ymd_and_hms(year, month, 1, 12, 0, 0)
            .single()
            .map(|dt| dt.offset().fix().local_minus_utc())
    };
    Some(offset_at(1)?.min(offset_at(7)?))
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    state: Mutex<(NaiveDateTime, bool)>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            state: Mutex::new((now, false)),
        }
    }

    pub fn with_dst(self, dst: bool) -> Self {
        self.set_dst(dst);
        self
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.lock().0 = now;
    }

    pub fn set_dst(&self, dst: bool) {
        self.lock().1 = dst;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut state = self.lock();
        state.0 += delta;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, (NaiveDateTime, bool)> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.lock().0
    }

    fn is_dst(&self) -> bool {
        self.lock().1
    }
}

/// Time left until the next wall-clock occurrence of `at`.
///
/// Returns a full day when `now` is exactly `at`.
pub fn until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let mut next = now.date().and_time(at);
    if next <= now {
        next += TimeDelta::days(1);
    }
    (next - now).to_std().unwrap_or_default()
}
