use std::io::{BufReader, Cursor};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use ical::parser::ical::{IcalParser, component::IcalEvent};

use crate::{CalendarEvent, Error, EventTime, Result};

/// Parse an ICS document into calendar events.
///
/// `source` only labels errors. Events come back in feed order with their
/// names untouched; scrubbing and sorting belong to the schedule cache.
pub fn parse_calendar(source: &str, payload: &str) -> Result<Vec<CalendarEvent>> {
    let parser = IcalParser::new(BufReader::new(Cursor::new(payload.as_bytes())));
    let mut events = Vec::new();
    let mut calendars = 0usize;

    for calendar in parser {
        let calendar =
            calendar.map_err(|err| Error::feed(source, format!("ICS parsing failed: {}", err)))?;
        calendars += 1;

        for event in calendar.events {
            events.push(convert_event(source, &event)?);
        }
    }

    if calendars == 0 {
        return Err(Error::feed(source, "payload contains no VCALENDAR"));
    }

    tracing::debug!("Parsed {} events from {}", events.len(), source);
    Ok(events)
}

fn convert_event(source: &str, event: &IcalEvent) -> Result<CalendarEvent> {
    let start_raw = event_property(event, "DTSTART")
        .ok_or_else(|| Error::feed(source, "event is missing DTSTART"))?;
    let begin = parse_timestamp(start_raw)
        .map_err(|err| Error::feed(source, format!("invalid DTSTART {}: {}", start_raw, err)))?;

    let end = match event_property(event, "DTEND") {
        Some(raw) => parse_timestamp(raw)
            .map_err(|err| Error::feed(source, format!("invalid DTEND {}: {}", raw, err)))?,
        None => begin,
    };

    Ok(CalendarEvent {
        name: event_property(event, "SUMMARY")
            .map(unescape_text)
            .unwrap_or_default(),
        begin: EventTime::new(begin),
        end: EventTime::new(end),
        location: event_property(event, "LOCATION")
            .map(unescape_text)
            .unwrap_or_default(),
        uid: event_property(event, "UID").map(|uid| uid.to_string()),
    })
}

fn event_property<'a>(event: &'a IcalEvent, name: &str) -> Option<&'a str> {
    event
        .properties
        .iter()
        .find(|prop| prop.name.eq_ignore_ascii_case(name))
        .and_then(|prop| prop.value.as_deref())
}

/// Feed timestamps are kept nominal: a trailing `Z` is dropped, not converted.
fn parse_timestamp(value: &str) -> std::result::Result<NaiveDateTime, chrono::ParseError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y%m%d").map(|date| date.and_time(NaiveTime::MIN))
        })
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.naive_utc()))
}

fn unescape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Keep only the first and last comma-separated field of a name.
///
/// Drops the lecturer names TimeEdit puts between them, so
/// `"Doe, John, Math101"` becomes `"Doe,Math101"`. Names with at most one
/// comma are returned unchanged and the result is stable under reapplication.
pub fn truncate_name(name: &str) -> String {
    if name.matches(',').count() <= 1 {
        return name.to_string();
    }
    match (name.split(',').next(), name.rsplit(',').next()) {
        (Some(first), Some(last)) => format!("{},{}", first.trim(), last.trim()),
        _ => name.to_string(),
    }
}

/// Last comma-separated field of a name, trimmed.
pub fn short_name(name: &str) -> &str {
    name.rsplit(',').next().unwrap_or(name).trim()
}
