use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::CalendarEvent;

/// Heads-up for a lesson, due `alarm` before it begins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub body: String,
    pub date: NaiveDate,
    /// Adjusted begin time
    pub time: NaiveTime,
    pub location: String,
    /// Lead time in minutes
    pub alarm_minutes: i64,
}

impl Reminder {
    pub fn from_event(event: &CalendarEvent, alarm: TimeDelta) -> Self {
        Self {
            body: event.name.clone(),
            date: event.date(),
            time: event.begin.adjusted,
            location: event.location.clone(),
            alarm_minutes: alarm.num_minutes(),
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Clamped to the earliest representable time for very long leads.
    pub fn alarm_at(&self) -> NaiveDateTime {
        TimeDelta::try_minutes(self.alarm_minutes)
            .and_then(|lead| self.starts_at().checked_sub_signed(lead))
            .unwrap_or(NaiveDateTime::MIN)
    }

    /// Due between the alarm and the start of the lesson.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.alarm_at() && now < self.starts_at()
    }

    pub fn message(&self) -> String {
        format!(
            "{} starts at {} in {}",
            crate::calendar::short_name(&self.body),
            self.time.format("%H:%M"),
            self.location
        )
    }
}
