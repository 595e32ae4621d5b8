use super::*;
use crate::{
    EventTime,
    clock::FixedClock,
    feed::FeedSource,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::{
    Mutex as StdMutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

#[derive(Default)]
struct FeedState {
    body: StdMutex<String>,
    fail: AtomicBool,
    fetches: AtomicUsize,
}

/// Feed whose payload and availability the test controls
struct SharedFeed(Arc<FeedState>);

#[async_trait]
impl FeedSource for SharedFeed {
    fn url(&self) -> &str {
        "test://timeedit"
    }

    async fn fetch(&self) -> Result<String> {
        self.0.fetches.fetch_add(1, Ordering::SeqCst);
        if self.0.fail.load(Ordering::SeqCst) {
            return Err(Error::feed(self.url(), "HTTP 503 Service Unavailable"));
        }
        Ok(self.0.body.lock().unwrap().clone())
    }
}

fn vevent(start: &str, end: &str, summary: &str, location: &str) -> String {
    format!(
        "BEGIN:VEVENT\r\nDTSTART:{start}\r\nDTEND:{end}\r\nSUMMARY:{summary}\r\nLOCATION:{location}\r\nEND:VEVENT\r\n"
    )
}

fn ics(events: &[String]) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//TimeEdit//SV\r\n{}END:VCALENDAR\r\n",
        events.concat()
    )
}

/// Two lessons today (2019-10-01), one tomorrow, one on Friday, one past,
/// deliberately out of order.
fn week_feed() -> String {
    ics(&[
        vevent("20191004T100000Z", "20191004T110000Z", "Berg\\, Olof\\, History", "Sal C"),
        vevent("20191001T130000Z", "20191001T140000Z", "Lee\\, Ann\\, Physics", "Sal B"),
        vevent("20190930T080000Z", "20190930T090000Z", "Old\\, Xi\\, Art", "Ateljé"),
        vevent("20191002T080000Z", "20191002T090000Z", "Kim\\, Bo\\, Chemistry", "Lab 1"),
        vevent("20191001T090000Z", "20191001T100000Z", "Doe\\, John\\, Math", "Sal A"),
    ])
}

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 10, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

struct Harness {
    cache: ScheduleCache,
    clock: Arc<FixedClock>,
    feed: Arc<FeedState>,
}

async fn harness_with(body: String, now: NaiveDateTime, config: ScheduleConfig) -> Harness {
    let feed = Arc::new(FeedState::default());
    *feed.body.lock().unwrap() = body;
    let clock = Arc::new(FixedClock::new(now));
    let cache = ScheduleCache::new(Box::new(SharedFeed(feed.clone())), clock.clone(), config)
        .await
        .expect("initial load should succeed");
    Harness { cache, clock, feed }
}

async fn harness(now: NaiveDateTime) -> Harness {
    harness_with(week_feed(), now, ScheduleConfig::new("test://timeedit")).await
}

fn names(events: &[CalendarEvent]) -> Vec<&str> {
    events.iter().map(|e| e.name.as_str()).collect()
}

#[tokio::test]
async fn todays_events_are_sorted_and_scrubbed() {
    let h = harness(at(1, 7, 0)).await;

    let today = h.cache.todays_events().await.unwrap();
    assert_eq!(names(&today), ["Doe,Math", "Lee,Physics"]);

    let all = h.cache.events().await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|w| w[0].begin.at <= w[1].begin.at));
}

#[tokio::test]
async fn todays_lessons_shift_by_one_hour_outside_dst() {
    let h = harness(at(1, 7, 0)).await;

    let lessons = h.cache.todays_lessons().await.unwrap();
    assert_eq!(
        lessons,
        Some(vec![
            "Math, 10:00-11:00 at Sal A".to_string(),
            "Physics, 14:00-15:00 at Sal B".to_string(),
        ])
    );
}

#[tokio::test]
async fn todays_lessons_shift_by_two_hours_during_dst() {
    let feed = Arc::new(FeedState::default());
    *feed.body.lock().unwrap() = week_feed();
    let clock = Arc::new(FixedClock::new(at(1, 7, 0)).with_dst(true));
    let cache = ScheduleCache::new(
        Box::new(SharedFeed(feed)),
        clock,
        ScheduleConfig::new("test://timeedit"),
    )
    .await
    .unwrap();

    let lessons = cache.todays_lessons().await.unwrap().unwrap();
    assert_eq!(lessons[0], "Math, 11:00-12:00 at Sal A");
}

#[tokio::test]
async fn todays_lessons_is_none_without_lessons() {
    let h = harness(at(3, 9, 0)).await;
    assert_eq!(h.cache.todays_lessons().await.unwrap(), None);
    assert!(h.cache.todays_events().await.unwrap().is_empty());
}

#[tokio::test]
async fn next_lesson_later_today() {
    let h = harness(at(1, 10, 30)).await;
    let next = h.cache.next_lesson().await.unwrap().expect("a lesson is ahead");
    assert_eq!(next.name, "Lee,Physics");
    assert_eq!(next.begin_display(), "14:00");
}

#[tokio::test]
async fn next_lesson_falls_through_to_next_day() {
    let h = harness(at(1, 15, 0)).await;
    let next = h.cache.next_lesson().await.unwrap().unwrap();
    assert_eq!(next.name, "Kim,Chemistry");
}

#[tokio::test]
async fn next_lesson_skips_empty_days() {
    let h = harness(at(3, 9, 0)).await;
    let next = h.cache.next_lesson().await.unwrap().unwrap();
    assert_eq!(next.name, "Berg,History");
    assert_eq!(next.date(), NaiveDate::from_ymd_opt(2019, 10, 4).unwrap());
}

#[tokio::test]
async fn next_lesson_is_none_after_last_event() {
    let h = harness(at(5, 9, 0)).await;
    assert_eq!(h.cache.next_lesson().await.unwrap(), None);
}

#[tokio::test]
async fn next_lesson_granularity() {
    let body = ics(&[
        vevent("20191001T095500Z", "20191001T104000Z", "Ek\\, Eva\\, Swedish", "Sal D"),
        vevent("20191002T080000Z", "20191002T090000Z", "Kim\\, Bo\\, Chemistry", "Lab 1"),
    ]);

    // 10:55 local while it is 10:30: same hour
    let hourly = harness_with(body.clone(), at(1, 10, 30), ScheduleConfig::new("t")).await;
    let next = hourly.cache.next_lesson().await.unwrap().unwrap();
    assert_eq!(next.name, "Kim,Chemistry");

    let mut config = ScheduleConfig::new("t");
    config.granularity = Granularity::Minute;
    let precise = harness_with(body, at(1, 10, 30), config).await;
    let next = precise.cache.next_lesson().await.unwrap().unwrap();
    assert_eq!(next.name, "Ek,Swedish");
}

#[tokio::test]
async fn tomorrows_events_are_the_next_calendar_day() {
    let h = harness(at(1, 7, 0)).await;
    let tomorrow = h.cache.tomorrows_events().await.unwrap();
    assert_eq!(names(&tomorrow), ["Kim,Chemistry"]);
    assert_eq!(
        h.cache.tomorrows_lessons().await.unwrap(),
        Some(vec!["Chemistry, 09:00-10:00 at Lab 1".to_string()])
    );

    h.clock.set(at(2, 7, 0));
    assert!(h.cache.tomorrows_events().await.unwrap().is_empty());
    assert_eq!(h.cache.tomorrows_lessons().await.unwrap(), None);
}

#[tokio::test]
async fn stale_cache_refreshes_exactly_once() {
    let h = harness(at(1, 7, 0)).await;
    assert_eq!(h.feed.fetches.load(Ordering::SeqCst), 1);

    h.clock.advance(TimeDelta::hours(23));
    h.cache.todays_events().await.unwrap();
    assert_eq!(h.feed.fetches.load(Ordering::SeqCst), 1);

    h.clock.advance(TimeDelta::hours(2));
    assert!(h.cache.is_stale().await);
    let (a, b, c) = tokio::join!(
        h.cache.todays_events(),
        h.cache.next_lesson(),
        h.cache.tomorrows_events(),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(h.feed.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(h.cache.refreshed_at().await, at(2, 8, 0));
    assert!(!h.cache.is_stale().await);
}

#[tokio::test]
async fn stale_read_serves_new_payload() {
    let h = harness(at(1, 7, 0)).await;
    *h.feed.body.lock().unwrap() = ics(&[vevent(
        "20191002T120000Z",
        "20191002T130000Z",
        "Doe\\, John\\, Math",
        "Sal A",
    )]);

    assert_eq!(h.cache.events().await.unwrap().len(), 5);

    h.clock.set(at(2, 7, 0));
    let today = h.cache.todays_events().await.unwrap();
    assert_eq!(names(&today), ["Doe,Math"]);
    assert_eq!(h.cache.events().await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_purge_keeps_previous_events() {
    let h = harness(at(1, 7, 0)).await;
    h.feed.fail.store(true, Ordering::SeqCst);

    let err = h.cache.purge().await.unwrap_err();
    assert!(matches!(err, Error::FeedUnavailable { .. }));
    assert_eq!(h.cache.events().await.unwrap().len(), 5);
    assert_eq!(h.cache.refreshed_at().await, at(1, 7, 0));
}

#[tokio::test]
async fn failed_stale_refresh_surfaces_error() {
    let h = harness(at(1, 7, 0)).await;
    h.feed.fail.store(true, Ordering::SeqCst);
    h.clock.advance(TimeDelta::hours(24));

    assert!(h.cache.todays_events().await.is_err());
    assert!(h.cache.is_stale().await);

    h.feed.fail.store(false, Ordering::SeqCst);
    assert_eq!(h.cache.purge().await.unwrap(), 5);
    assert!(!h.cache.is_stale().await);
}

#[tokio::test]
async fn initial_load_failure_is_reported() {
    let feed = Arc::new(FeedState::default());
    feed.fail.store(true, Ordering::SeqCst);
    let result = ScheduleCache::new(
        Box::new(SharedFeed(feed)),
        Arc::new(FixedClock::new(at(1, 7, 0))),
        ScheduleConfig::new("test://timeedit"),
    )
    .await;
    assert!(matches!(result, Err(Error::FeedUnavailable { .. })));
}

#[tokio::test]
async fn adjust_event_hours_compounds() {
    let h = harness(at(1, 7, 0)).await;
    let baseline = h.cache.todays_events().await.unwrap();
    assert_eq!(baseline[0].begin.adjusted, time(10, 0));

    h.cache.adjust_event_hours(1).await.unwrap();
    h.cache.adjust_event_hours(1).await.unwrap();

    let shifted = h.cache.todays_events().await.unwrap();
    assert_eq!(shifted[0].begin.adjusted, time(12, 0));
    assert_eq!(shifted[0].end.adjusted, time(13, 0));
    assert_eq!(shifted[0].begin.at, baseline[0].begin.at);
}

#[tokio::test]
async fn failed_adjustment_leaves_events_untouched() {
    let h = harness(at(1, 7, 0)).await;
    let before = h.cache.events().await.unwrap();

    let err = h.cache.adjust_event_hours(i64::MAX).await.unwrap_err();
    assert!(matches!(err, Error::TimezoneAdjustment(_)));
    assert_eq!(h.cache.events().await.unwrap(), before);
}

#[tokio::test]
async fn truncate_names_is_idempotent_on_cache() {
    let h = harness(at(1, 7, 0)).await;
    let before = h.cache.events().await.unwrap();

    h.cache.truncate_names().await;
    h.cache.truncate_names().await;
    assert_eq!(h.cache.events().await.unwrap(), before);
}

#[tokio::test]
async fn reminders_cover_todays_lessons() {
    let h = harness(at(1, 7, 0)).await;
    let reminders = h.cache.todays_reminders(TimeDelta::hours(1)).await.unwrap();

    assert_eq!(reminders.len(), 2);
    assert_eq!(reminders[0].time, time(10, 0));
    assert_eq!(reminders[0].alarm_at(), at(1, 9, 0));
    assert_eq!(reminders[1].message(), "Physics starts at 14:00 in Sal B");
}

#[test]
fn adjust_events_wraps_midnight() {
    let day = NaiveDate::from_ymd_opt(2019, 10, 1).unwrap();
    let event = CalendarEvent {
        name: "Late,Lab".to_string(),
        begin: EventTime::new(day.and_hms_opt(23, 30, 0).unwrap()),
        end: EventTime::new(day.and_hms_opt(23, 45, 0).unwrap()),
        location: String::new(),
        uid: None,
    };

    let adjusted = adjust_events(&[event], day, 1).unwrap();
    assert_eq!(adjusted[0].begin.adjusted, time(0, 30));
    assert_eq!(adjusted[0].end.adjusted, time(0, 45));
}

#[test]
fn adjust_events_rejects_unrepresentable_shift() {
    let day = NaiveDate::from_ymd_opt(2019, 10, 1).unwrap();
    let event = CalendarEvent {
        name: "Doe,Math".to_string(),
        begin: EventTime::new(day.and_hms_opt(9, 0, 0).unwrap()),
        end: EventTime::new(day.and_hms_opt(10, 0, 0).unwrap()),
        location: String::new(),
        uid: None,
    };

    let err = adjust_events(&[event], day, 10_000_000_000).unwrap_err();
    assert!(matches!(err, Error::TimezoneAdjustment(_)));
}
