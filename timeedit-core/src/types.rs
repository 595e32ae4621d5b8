use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::calendar;

/// A feed timestamp paired with its display time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTime {
    /// Timestamp as provided by the feed
    pub at: NaiveDateTime,
    /// Time of day corrected for the daylight-saving offset
    pub adjusted: NaiveTime,
}

impl EventTime {
    /// Unadjusted time: the display time equals the feed time.
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            at,
            adjusted: at.time(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.at.date()
    }

    /// `HH:MM` of the adjusted time
    pub fn display(&self) -> String {
        self.adjusted.format("%H:%M").to_string()
    }
}

/// One lesson from the schedule feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Display label, scrubbed to `"<first>,<last>"` on ingestion
    pub name: String,
    pub begin: EventTime,
    pub end: EventTime,
    /// Classroom or venue
    pub location: String,
    pub uid: Option<String>,
}

impl CalendarEvent {
    /// Nominal begin date from the feed.
    pub fn date(&self) -> NaiveDate {
        self.begin.date()
    }

    /// Last comma segment of the name, e.g. the course code.
    pub fn short_name(&self) -> &str {
        calendar::short_name(&self.name)
    }

    pub fn begin_display(&self) -> String {
        self.begin.display()
    }

    pub fn end_display(&self) -> String {
        self.end.display()
    }

    /// `"<short name>, <HH:MM>-<HH:MM> at <location>"`
    pub fn lesson_line(&self) -> String {
        format!(
            "{}, {}-{} at {}",
            self.short_name(),
            self.begin_display(),
            self.end_display(),
            self.location
        )
    }
}

/// How `next_lesson` compares today's lessons against the current time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Compare hours only; a lesson in the current hour is never "next".
    #[default]
    Hour,
    /// Compare the full time of day.
    Minute,
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Granularity::Hour),
            "minute" => Ok(Granularity::Minute),
            other => Err(format!(
                "Unknown granularity '{}', expected 'hour' or 'minute'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 10, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn lesson_line_uses_adjusted_times_and_short_name() {
        let mut begin = EventTime::new(at(9, 0));
        let mut end = EventTime::new(at(10, 0));
        begin.adjusted = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        end.adjusted = NaiveTime::from_hms_opt(11, 0, 0).unwrap();

        let event = CalendarEvent {
            name: "Doe, Math".to_string(),
            begin,
            end,
            location: "Sal A".to_string(),
            uid: None,
        };

        assert_eq!(event.short_name(), "Math");
        assert_eq!(event.lesson_line(), "Math, 10:00-11:00 at Sal A");
    }

    #[test]
    fn granularity_parses_case_insensitively() {
        assert_eq!("Hour".parse::<Granularity>(), Ok(Granularity::Hour));
        assert_eq!(" minute ".parse::<Granularity>(), Ok(Granularity::Minute));
        assert!("second".parse::<Granularity>().is_err());
    }
}
