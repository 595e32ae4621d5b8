use std::{env, str::FromStr, time::Duration};

use chrono::NaiveTime;

use crate::{Error, Granularity, Result};

pub const URL_VAR: &str = "TIMEEDIT_URL";

/// Schedule cache settings
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// ICS feed URL
    pub url: String,
    /// Age after which a read triggers a purge
    pub max_age: Duration,
    /// UTC offset of the local zone outside daylight-saving time, in hours
    pub standard_offset_hours: i64,
    pub granularity: Granularity,
    /// HTTP request timeout
    pub timeout: Duration,
    pub user_agent: String,
}

impl ScheduleConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_age: Duration::from_secs(24 * 3600),
            standard_offset_hours: 1,
            granularity: Granularity::default(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("timeedit-schedule/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Read settings from the environment, loading `.env` first.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(None)
    }

    /// Like [`Self::from_env`], with `url` taking precedence over `TIMEEDIT_URL`.
    pub fn from_env_with(url: Option<String>) -> Result<Self> {
        dotenv::dotenv().ok();

        let url = url.or_else(|| env_value(URL_VAR)).ok_or_else(|| {
            Error::Config(format!("{} environment variable is required", URL_VAR))
        })?;
        let mut config = Self::new(url);

        if let Some(hours) = env_parse::<u64>("TIMEEDIT_MAX_AGE_HOURS")? {
            config.max_age = max_age_from_hours(hours)?;
        }
        if let Some(offset) = env_parse::<i64>("TIMEEDIT_STANDARD_OFFSET")? {
            config.standard_offset_hours = offset;
        }
        if let Some(granularity) = env_parse::<Granularity>("TIMEEDIT_GRANULARITY")? {
            config.granularity = granularity;
        }
        if let Some(secs) = env_parse::<u64>("TIMEEDIT_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Hours added to feed times: the standard offset, plus one during DST.
    pub fn hour_delta(&self, dst: bool) -> i64 {
        self.standard_offset_hours + i64::from(dst)
    }
}

/// When the owning process runs its daily jobs
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Daily forced purge
    pub purge_at: NaiveTime,
    /// Daily announcement of today's lessons
    pub announce_at: NaiveTime,
    /// Lead time of lesson reminders
    pub reminder_lead: chrono::TimeDelta,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            purge_at: NaiveTime::from_hms_opt(0, 10, 0).unwrap_or(NaiveTime::MIN),
            announce_at: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            reminder_lead: chrono::TimeDelta::hours(1),
        }
    }
}

impl JobsConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();
        if let Some(at) = env_time("TIMEEDIT_PURGE_AT")? {
            config.purge_at = at;
        }
        if let Some(at) = env_time("TIMEEDIT_ANNOUNCE_AT")? {
            config.announce_at = at;
        }
        if let Some(minutes) = env_parse::<i64>("TIMEEDIT_REMINDER_MINUTES")? {
            config.reminder_lead = reminder_lead(minutes)?;
        }
        Ok(config)
    }
}

fn max_age_from_hours(hours: u64) -> Result<Duration> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("TIMEEDIT_MAX_AGE_HOURS {} is out of range", hours)))
}

/// Reminder lead time from a minute count.
pub fn reminder_lead(minutes: i64) -> Result<chrono::TimeDelta> {
    if minutes < 0 {
        return Err(Error::Config(format!(
            "reminder lead must not be negative, got {} minutes",
            minutes
        )));
    }
    chrono::TimeDelta::try_minutes(minutes).ok_or_else(|| {
        Error::Config(format!("reminder lead of {} minutes is out of range", minutes))
    })
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_value(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| Error::Config(format!("Invalid {} '{}': {}", name, raw, e)))
        })
        .transpose()
}

fn env_time(name: &str) -> Result<Option<NaiveTime>> {
    env_value(name)
        .map(|raw| {
            parse_clock_time(&raw).map_err(|e| Error::Config(format!("Invalid {}: {}", name, e)))
        })
        .transpose()
}

/// Parse `HH:MM` (or `HH:MM:SS`).
pub fn parse_clock_time(raw: &str) -> std::result::Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| format!("'{}' is not a HH:MM time: {}", raw, e))
}
