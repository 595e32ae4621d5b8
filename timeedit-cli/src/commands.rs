use std::{collections::HashSet, time::Duration};

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime, TimeDelta};
use timeedit_core::{CalendarEvent, prelude::*};

/// Today's events
pub async fn today_command(cache: &ScheduleCache, json: bool) -> Result<()> {
    let events = cache.todays_events().await?;
    print_events(&events, json, "No events today")
}

/// Today's lessons
pub async fn lessons_command(cache: &ScheduleCache) -> Result<()> {
    match cache.todays_lessons().await? {
        Some(lines) => lines.iter().for_each(|line| println!("{}", line)),
        None => println!("No lessons today"),
    }
    Ok(())
}

/// The next lesson
pub async fn next_command(cache: &ScheduleCache) -> Result<()> {
    match cache.next_lesson().await? {
        Some(lesson) => println!("{}", describe_next(&lesson, cache.clock().today())),
        None => println!("No upcoming lessons"),
    }
    Ok(())
}

/// Tomorrow's lessons
pub async fn tomorrow_command(cache: &ScheduleCache) -> Result<()> {
    match cache.tomorrows_lessons().await? {
        Some(lines) => lines.iter().for_each(|line| println!("{}", line)),
        None => println!("No lessons tomorrow"),
    }
    Ok(())
}

/// Every cached event
pub async fn events_command(cache: &ScheduleCache, json: bool) -> Result<()> {
    let events = cache.events().await?;
    print_events(&events, json, "The schedule is empty")
}

/// Reminders for today's lessons
pub async fn reminders_command(cache: &ScheduleCache, lead_minutes: i64) -> Result<()> {
    let reminders = cache.todays_reminders(reminder_lead(lead_minutes)?).await?;

    if reminders.is_empty() {
        println!("No reminders today");
    }
    for reminder in reminders {
        println!(
            "{}  {}",
            reminder.alarm_at().format("%H:%M"),
            reminder.message()
        );
    }
    Ok(())
}

/// Long-running loop driving the daily jobs
pub async fn watch_command(cache: ScheduleCache, jobs: JobsConfig, tick_secs: u64) -> Result<()> {
    let mut watcher = Watcher::new(&jobs, cache.clock().now());
    tracing::info!(
        "Watching {}: {}, {}",
        cache.source_url(),
        watcher.purge,
        watcher.announce
    );

    let mut interval = tokio::time::interval(Duration::from_secs(tick_secs.max(1)));
    loop {
        interval.tick().await;
        for message in watcher.tick(&cache).await {
            println!("{}", message);
        }
    }
}

fn print_events(events: &[CalendarEvent], json: bool, empty: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(events)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("{}", empty);
    }
    for event in events {
        println!("{}  {}", event.date(), event.lesson_line());
    }
    Ok(())
}

fn describe_next(lesson: &CalendarEvent, today: NaiveDate) -> String {
    if lesson.date() == today {
        format!(
            "Next: {} at {} in {}",
            lesson.short_name(),
            lesson.begin_display(),
            lesson.location
        )
    } else {
        format!(
            "Next: {} on {} at {} in {}",
            lesson.short_name(),
            lesson.date(),
            lesson.begin_display(),
            lesson.location
        )
    }
}

/// State of the watch loop between ticks
pub struct Watcher {
    purge: DailyJob,
    announce: DailyJob,
    lead: TimeDelta,
    fired: HashSet<(NaiveDate, NaiveTime, String)>,
}

impl Watcher {
    /// Jobs whose time already passed today wait for tomorrow.
    pub fn new(jobs: &JobsConfig, now: chrono::NaiveDateTime) -> Self {
        let mut purge = DailyJob::new("purge", jobs.purge_at);
        let mut announce = DailyJob::new("announce", jobs.announce_at);
        for job in [&mut purge, &mut announce] {
            if job.is_due(now) {
                job.mark_run(now);
            }
        }

        Self {
            purge,
            announce,
            lead: jobs.reminder_lead,
            fired: HashSet::new(),
        }
    }

    /// Run whatever is due and return the messages to publish.
    pub async fn tick(&mut self, cache: &ScheduleCache) -> Vec<String> {
        let now = cache.clock().now();
        let mut messages = Vec::new();

        if self.purge.is_due(now) {
            match cache.purge().await {
                Ok(count) => tracing::info!("Daily purge loaded {} events", count),
                Err(e) => tracing::warn!("Daily purge failed, skipping this cycle: {}", e),
            }
            self.purge.mark_run(now);
            self.fired.retain(|(date, _, _)| *date >= now.date());
        }

        if self.announce.is_due(now) {
            match cache.todays_lessons().await {
                Ok(Some(lines)) => messages.push(format!("Today's lessons:\n{}", lines.join("\n"))),
                Ok(None) => messages.push("No lessons today".to_string()),
                Err(e) => tracing::warn!("Cannot announce today's lessons: {}", e),
            }
            self.announce.mark_run(now);
        }

        match cache.todays_reminders(self.lead).await {
            Ok(reminders) => {
                for reminder in reminders.into_iter().filter(|r| r.is_due(now)) {
                    let key = (reminder.date, reminder.time, reminder.body.clone());
                    if self.fired.insert(key) {
                        messages.push(reminder.message());
                    }
                }
            }
            Err(e) => tracing::warn!("Cannot check reminders: {}", e),
        }

        messages
    }
}
