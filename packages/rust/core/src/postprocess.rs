//! Turn merged extraction candidates into the final, ordered event list.
//!
//! Steps, in order: date normalization, event-type filter, incomplete/past
//! drop with `(event_name, date)` dedup, then a stable chronological sort with
//! undated events last. Every step builds new records; nothing is mutated in place.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDate};
use eventfinder_normalize::parse_date_relative;
use eventfinder_shared::{Event, EventCandidate, EventTypeFilter};
use tracing::{debug, info, warn};

/// Run the whole post-processing chain.
pub fn post_process(
    candidates: Vec<EventCandidate>,
    filter: Option<EventTypeFilter>,
    today: NaiveDate,
) -> Vec<Event> {
    let events = normalize_dates(candidates, today);
    let events = filter_by_type(events, filter);
    let events = drop_past_and_duplicates(events, today);
    sort_by_date(events)
}

/// Parse each candidate's raw date and build a validated [`Event`].
pub fn normalize_dates(candidates: Vec<EventCandidate>, today: NaiveDate) -> Vec<Event> {
    candidates
        .into_iter()
        .map(|candidate| {
            let date = parse_date_relative(candidate.date.as_deref(), today);
            Event::from_candidate(candidate, date)
        })
        .collect()
}

/// Keep only events of the requested type. `None` keeps everything.
pub fn filter_by_type(events: Vec<Event>, filter: Option<EventTypeFilter>) -> Vec<Event> {
    let Some(filter) = filter else {
        return events;
    };
    let before = events.len();
    let kept: Vec<Event> = events
        .into_iter()
        .filter(|e| filter.matches(e.event_type))
        .collect();
    debug!(before, after = kept.len(), ?filter, "applied event type filter");
    kept
}

/// Drop events with neither a name nor a date, events before `today`
/// (by calendar day), and repeats of an earlier `(event_name, date)`.
pub fn drop_past_and_duplicates(events: Vec<Event>, today: NaiveDate) -> Vec<Event> {
    let mut seen: HashSet<(String, Option<DateTime<FixedOffset>>)> = HashSet::new();
    let mut kept = Vec::with_capacity(events.len());

    for event in events {
        if event.date.is_none() && !event.has_name() {
            warn!(url = %event.url, "skipping event with neither name nor date");
            continue;
        }
        if event.calendar_date().is_some_and(|day| day < today) {
            info!(event = %event.event_name, date = ?event.date, "skipping past event");
            continue;
        }
        if !seen.insert((event.event_name.clone(), event.date)) {
            warn!(event = %event.event_name, date = ?event.date, "skipping duplicate event");
            continue;
        }
        kept.push(event);
    }
    kept
}

/// Stable ascending sort; undated events go last in their original order.
pub fn sort_by_date(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by_key(|e| (e.date.is_none(), e.date));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventfinder_shared::{EventType, LocationCandidate, UNKNOWN_EVENT_NAME};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn candidate(name: &str, date: Option<&str>) -> EventCandidate {
        EventCandidate {
            event_name: Some(name.into()),
            date: date.map(String::from),
            url: Some(format!("https://example.com/{name}")),
            ..Default::default()
        }
    }

    fn event(name: &str, date: Option<&str>) -> Event {
        let parsed = date.and_then(|d| parse_date_relative(Some(d), today()));
        Event::from_candidate(candidate(name, date), parsed)
    }

    fn names(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.event_name.as_str()).collect()
    }

    #[test]
    fn test_date_filter_is_by_calendar_day() {
        let events = vec![
            event("yesterday", Some("2025-06-14")),
            event("today", Some("2025-06-15")),
            event("tomorrow", Some("2025-06-16")),
            event("late-today", Some("2025-06-15T23:59:00-07:00")),
            event("early-today", Some("2025-06-15T00:01:00+09:00")),
        ];
        let kept = drop_past_and_duplicates(events, today());
        assert_eq!(names(&kept), vec!["today", "tomorrow", "late-today", "early-today"]);
    }

    #[test]
    fn test_dedup_key_is_name_and_date() {
        let events = vec![
            event("RustConf", Some("2025-09-02")),
            event("RustConf", Some("2025-09-02")),
            event("RustConf", Some("2025-09-03")),
            event("RustConf Workshop", Some("2025-09-02")),
            event("Undated", None),
            event("Undated", None),
        ];
        let kept = drop_past_and_duplicates(events, today());
        assert_eq!(
            names(&kept),
            vec!["RustConf", "RustConf", "RustConf Workshop", "Undated"]
        );
        assert_eq!(kept[0].url, "https://example.com/RustConf");
    }

    #[test]
    fn test_incomplete_events_dropped_only_without_name_and_date() {
        let nameless_dated = Event::from_candidate(
            EventCandidate {
                date: Some("2025-07-01".into()),
                ..Default::default()
            },
            parse_date_relative(Some("2025-07-01"), today()),
        );
        let nameless_undated = Event::from_candidate(EventCandidate::default(), None);
        let named_undated = event("Named", None);

        let kept = drop_past_and_duplicates(
            vec![nameless_dated, nameless_undated, named_undated],
            today(),
        );
        assert_eq!(names(&kept), vec![UNKNOWN_EVENT_NAME, "Named"]);
    }

    #[test]
    fn test_sort_nulls_last_and_stable() {
        let events = vec![
            event("march", Some("2025-03-01")),
            event("null-a", None),
            event("january", Some("2025-01-01")),
            event("null-b", None),
        ];
        let sorted = sort_by_date(events);
        assert_eq!(names(&sorted), vec!["january", "march", "null-a", "null-b"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_dates() {
        let events = vec![
            event("b", Some("2025-08-01")),
            event("a", Some("2025-08-01")),
        ];
        assert_eq!(names(&sort_by_date(events)), vec!["b", "a"]);
    }

    #[test]
    fn test_type_filter() {
        let mut online = event("online", Some("2025-07-01"));
        online.event_type = EventType::Online;
        let mut in_person = event("in-person", Some("2025-07-01"));
        in_person.event_type = EventType::InPerson;
        let unknown = event("unknown-type", Some("2025-07-01"));
        let all = vec![online, in_person, unknown];

        assert_eq!(filter_by_type(all.clone(), None).len(), 3);
        assert_eq!(
            names(&filter_by_type(all.clone(), Some(EventTypeFilter::Online))),
            vec!["online"]
        );
        assert_eq!(
            names(&filter_by_type(all, Some(EventTypeFilter::InPerson))),
            vec!["in-person"]
        );
    }

    #[test]
    fn test_post_process_end_to_end() {
        let candidates = vec![
            EventCandidate {
                event_name: Some("  Data Summit ".into()),
                date: Some("July 4, 2025".into()),
                location: Some(LocationCandidate::Text("Boston".into())),
                speakers: None,
                event_type: EventType::InPerson,
                ..Default::default()
            },
            candidate("Old Meetup", Some("2024-12-01")),
            candidate("Webinar", Some("2025-06-20T17:00:00Z")),
            candidate("Someday", Some("TBA")),
            candidate("Webinar", Some("2025-06-20T17:00:00Z")),
        ];

        let events = post_process(candidates, None, today());

        assert_eq!(names(&events), vec!["Webinar", "Data Summit", "Someday"]);
        let summit = &events[1];
        assert_eq!(summit.location.name.as_deref(), Some("Boston"));
        assert!(summit.speakers.is_empty());
        assert!(events[2].date.is_none());
    }
}
