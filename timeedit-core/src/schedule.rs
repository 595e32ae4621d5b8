use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use tokio::sync::{Mutex, RwLock};

use crate::{
    CalendarEvent, Error, Granularity, Result,
    calendar::{parse_calendar, truncate_name},
    clock::{Clock, SystemClock},
    config::ScheduleConfig,
    feed::{FeedSource, feed_for},
    reminder::Reminder,
};

/// One complete, sorted generation of the feed
#[derive(Debug)]
struct Snapshot {
    events: Arc<Vec<CalendarEvent>>,
    refreshed_at: NaiveDateTime,
}

/// In-memory view of a schedule feed, refreshed once a day.
///
/// Every read checks the age of the cached snapshot first and purges it when
/// it is older than [`ScheduleConfig::max_age`]. Purges are serialized and
/// replace the snapshot in one swap, so readers never see a half-loaded feed.
/// A failed purge keeps the previous snapshot.
pub struct ScheduleCache {
    feed: Box<dyn FeedSource>,
    clock: Arc<dyn Clock>,
    config: ScheduleConfig,
    snapshot: RwLock<Arc<Snapshot>>,
    refresh_guard: Mutex<()>,
}

impl ScheduleCache {
    /// Build the cache and perform the initial load.
    pub async fn new(
        feed: Box<dyn FeedSource>,
        clock: Arc<dyn Clock>,
        config: ScheduleConfig,
    ) -> Result<Self> {
        let snapshot = load(feed.as_ref(), clock.as_ref(), &config).await?;
        Ok(Self {
            feed,
            clock,
            config,
            snapshot: RwLock::new(Arc::new(snapshot)),
            refresh_guard: Mutex::new(()),
        })
    }

    /// Cache over the configured feed location and the host clock.
    pub async fn from_config(config: ScheduleConfig) -> Result<Self> {
        let feed = feed_for(&config)?;
        Self::new(feed, Arc::new(SystemClock), config).await
    }

    pub fn source_url(&self) -> &str {
        self.feed.url()
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Reload the feed: fetch, parse, scrub names, adjust hours, swap.
    ///
    /// Returns the number of cached events.
    pub async fn refresh(&self) -> Result<usize> {
        let _guard = self.refresh_guard.lock().await;
        self.reload().await
    }

    /// Force a refresh regardless of the cache age.
    pub async fn purge(&self) -> Result<usize> {
        tracing::info!("Purging schedule cache for {}", self.feed.url());
        self.refresh().await
    }

    /// Shift every cached event's display time by `hour_delta` hours.
    ///
    /// Shifts accumulate across calls. The pass is all-or-nothing: on
    /// error the cached events are left as they were.
    pub async fn adjust_event_hours(&self, hour_delta: i64) -> Result<()> {
        let _guard = self.refresh_guard.lock().await;
        let current = self.snapshot.read().await.clone();
        let adjusted = adjust_events(&current.events, self.clock.today(), hour_delta)?;
        self.swap(adjusted, current.refreshed_at).await;
        Ok(())
    }

    /// Scrub lecturer names from the cached events. Idempotent.
    pub async fn truncate_names(&self) {
        let _guard = self.refresh_guard.lock().await;
        let current = self.snapshot.read().await.clone();
        let truncated = truncate_events(current.events.iter().cloned().collect());
        self.swap(truncated, current.refreshed_at).await;
    }

    /// When the cached events were fetched.
    pub async fn refreshed_at(&self) -> NaiveDateTime {
        self.snapshot.read().await.refreshed_at
    }

    pub async fn is_stale(&self) -> bool {
        let refreshed_at = self.refreshed_at().await;
        is_stale(refreshed_at, self.clock.now(), &self.config)
    }

    /// All cached events, sorted by begin.
    pub async fn events(&self) -> Result<Vec<CalendarEvent>> {
        Ok(self.current().await?.events.to_vec())
    }

    /// Events beginning on the current local date.
    pub async fn todays_events(&self) -> Result<Vec<CalendarEvent>> {
        let today = self.clock.today();
        self.events_on(today).await
    }

    /// Events beginning on the day after the current local date.
    pub async fn tomorrows_events(&self) -> Result<Vec<CalendarEvent>> {
        let tomorrow = self.clock.today() + TimeDelta::days(1);
        self.events_on(tomorrow).await
    }

    pub async fn events_on(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        let snapshot = self.current().await?;
        Ok(snapshot
            .events
            .iter()
            .filter(|event| event.date() == date)
            .cloned()
            .collect())
    }

    /// Today's lessons as display lines, `None` when there are none.
    pub async fn todays_lessons(&self) -> Result<Option<Vec<String>>> {
        Ok(lesson_lines(&self.todays_events().await?))
    }

    pub async fn tomorrows_lessons(&self) -> Result<Option<Vec<String>>> {
        Ok(lesson_lines(&self.tomorrows_events().await?))
    }

    /// The upcoming lesson.
    ///
    /// Looks for a lesson later today first, then for the first lesson on a
    /// later date. `None` when the feed has nothing ahead.
    pub async fn next_lesson(&self) -> Result<Option<CalendarEvent>> {
        let snapshot = self.current().await?;
        let now = self.clock.now();
        Ok(find_next_lesson(&snapshot.events, now, self.config.granularity).cloned())
    }

    /// Reminders for today's lessons, firing `lead` before each begins.
    pub async fn todays_reminders(&self, lead: TimeDelta) -> Result<Vec<Reminder>> {
        Ok(self
            .todays_events()
            .await?
            .iter()
            .map(|event| Reminder::from_event(event, lead))
            .collect())
    }

    /// Current snapshot, purging first when it has gone stale.
    async fn current(&self) -> Result<Arc<Snapshot>> {
        let snapshot = self.snapshot.read().await.clone();
        if !is_stale(snapshot.refreshed_at, self.clock.now(), &self.config) {
            return Ok(snapshot);
        }

        let _guard = self.refresh_guard.lock().await;
        // another reader may have refreshed while we waited
        let snapshot = self.snapshot.read().await.clone();
        if !is_stale(snapshot.refreshed_at, self.clock.now(), &self.config) {
            return Ok(snapshot);
        }

        tracing::info!(
            "Schedule cache from {} is stale, refreshing",
            snapshot.refreshed_at
        );
        self.reload().await?;
        Ok(self.snapshot.read().await.clone())
    }

    /// Caller must hold `refresh_guard`.
    async fn reload(&self) -> Result<usize> {
        let snapshot = load(self.feed.as_ref(), self.clock.as_ref(), &self.config).await?;
        let count = snapshot.events.len();
        *self.snapshot.write().await = Arc::new(snapshot);
        Ok(count)
    }

    async fn swap(&self, events: Vec<CalendarEvent>, refreshed_at: NaiveDateTime) {
        *self.snapshot.write().await = Arc::new(Snapshot {
            events: Arc::new(events),
            refreshed_at,
        });
    }
}

async fn load(
    feed: &dyn FeedSource,
    clock: &dyn Clock,
    config: &ScheduleConfig,
) -> Result<Snapshot> {
    let payload = feed.fetch().await?;
    let events = truncate_events(parse_calendar(feed.url(), &payload)?);

    // evaluated once per load, not per event
    let hour_delta = config.hour_delta(clock.is_dst());
    let mut events = adjust_events(&events, clock.today(), hour_delta)?;
    events.sort_by_key(|event| event.begin.at);

    tracing::info!(
        "Loaded {} events from {} (hour delta {})",
        events.len(),
        feed.url(),
        hour_delta
    );

    Ok(Snapshot {
        events: Arc::new(events),
        refreshed_at: clock.now(),
    })
}

fn is_stale(refreshed_at: NaiveDateTime, now: NaiveDateTime, config: &ScheduleConfig) -> bool {
    (now - refreshed_at)
        .to_std()
        .map(|age| age >= config.max_age)
        .unwrap_or(false)
}

fn truncate_events(mut events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
    for event in &mut events {
        event.name = truncate_name(&event.name);
    }
    events
}

/// Shift the display times of `events` by `hour_delta` hours.
///
/// Each time of day is placed on `today` before shifting, so the result
/// wraps around midnight like a wall clock.
pub fn adjust_events(
    events: &[CalendarEvent],
    today: NaiveDate,
    hour_delta: i64,
) -> Result<Vec<CalendarEvent>> {
    let delta = TimeDelta::try_hours(hour_delta).ok_or_else(|| {
        Error::TimezoneAdjustment(format!("hour delta {} is out of range", hour_delta))
    })?;

    let shift = |event: &CalendarEvent, time: NaiveTime| {
        today
            .and_time(time)
            .checked_add_signed(delta)
            .map(|shifted| shifted.time())
            .ok_or_else(|| {
                Error::TimezoneAdjustment(format!(
                    "Could not adjust {} with {} hrs",
                    event.name, hour_delta
                ))
            })
    };

    events
        .iter()
        .map(|event| -> Result<CalendarEvent> {
            let mut adjusted = event.clone();
            adjusted.begin.adjusted = shift(event, event.begin.adjusted)?;
            adjusted.end.adjusted = shift(event, event.end.adjusted)?;
            Ok(adjusted)
        })
        .collect()
}

/// Next lesson in `events` (sorted by begin) as seen at `now`.
pub fn find_next_lesson(
    events: &[CalendarEvent],
    now: NaiveDateTime,
    granularity: Granularity,
) -> Option<&CalendarEvent> {
    let today = now.date();
    events
        .iter()
        .filter(|event| event.date() == today)
        .find(|event| match granularity {
            Granularity::Hour => event.begin.adjusted.hour() > now.hour(),
            Granularity::Minute => event.begin.adjusted > now.time(),
        })
        .or_else(|| events.iter().find(|event| event.date() > today))
}

fn lesson_lines(events: &[CalendarEvent]) -> Option<Vec<String>> {
    if events.is_empty() {
        return None;
    }
    Some(events.iter().map(CalendarEvent::lesson_line).collect())
}

#[cfg(test)]
mod tests;
