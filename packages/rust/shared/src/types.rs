//! Core domain types for EventFinder.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

use crate::error::EventFinderError;

/// Name given to events whose name the extractor could not determine.
pub const UNKNOWN_EVENT_NAME: &str = "unknown";

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// Attendance mode of an event.
///
/// Deserialization never fails: any unrecognized string (including the
/// `"N/A"` the extraction schema allows) or `null` becomes [`EventType::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "Option<String>")]
pub enum EventType {
    InPerson,
    Online,
    #[default]
    Unknown,
}

impl EventType {
    /// Coerce free text into an event type.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "in_person" | "in-person" | "in person" | "inperson" => Self::InPerson,
            "online" | "virtual" => Self::Online,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InPerson => "in_person",
            Self::Online => "online",
            Self::Unknown => "unknown",
        }
    }
}

impl From<Option<String>> for EventType {
    fn from(raw: Option<String>) -> Self {
        raw.as_deref().map(Self::parse_lenient).unwrap_or_default()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventTypeFilter
// ---------------------------------------------------------------------------

/// Caller-supplied attendance filter. Only the two concrete modes are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTypeFilter {
    InPerson,
    Online,
}

impl EventTypeFilter {
    /// Parse a filter value, treating anything invalid as "no filter".
    pub fn parse_lenient(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| value.parse().ok())
    }

    pub fn matches(&self, event_type: EventType) -> bool {
        matches!(
            (self, event_type),
            (Self::InPerson, EventType::InPerson) | (Self::Online, EventType::Online)
        )
    }
}

impl std::str::FromStr for EventTypeFilter {
    type Err = EventFinderError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "in_person" => Ok(Self::InPerson),
            "online" => Ok(Self::Online),
            other => Err(EventFinderError::validation(format!(
                "Invalid event_type '{other}': expected 'in_person' or 'online'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Where an event takes place. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Location {
    /// One-line rendering for terminal output.
    pub fn display_line(&self) -> String {
        [&self.name, &self.city, &self.country]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Location as returned by an extractor: either structured or a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationCandidate {
    Structured(Location),
    Text(String),
}

impl From<LocationCandidate> for Location {
    fn from(candidate: LocationCandidate) -> Self {
        match candidate {
            LocationCandidate::Structured(location) => location,
            LocationCandidate::Text(text) => Location {
                name: Some(text).filter(|t| !t.trim().is_empty()),
                ..Default::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// EventCandidate / Event
// ---------------------------------------------------------------------------

/// An event record as produced by the extraction collaborator, before
/// validation. Same shape as [`Event`] but every field is optional and the
/// date is still raw text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventCandidate {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub location: Option<LocationCandidate>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub speakers: Option<Vec<String>>,
    #[serde(default)]
    pub event_type: EventType,
}

/// The canonical event record returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_name: String,
    /// Parsed start; `None` when the raw date was missing or unparseable.
    pub date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub speakers: Vec<String>,
    #[serde(default)]
    pub event_type: EventType,
}

impl Event {
    /// Build a validated event from a candidate and its already-parsed date.
    pub fn from_candidate(candidate: EventCandidate, date: Option<DateTime<FixedOffset>>) -> Self {
        let event_name = candidate
            .event_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_EVENT_NAME.to_string());

        let speakers = candidate
            .speakers
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            event_name,
            date,
            location: candidate.location.map(Location::from).unwrap_or_default(),
            url: candidate.url.unwrap_or_default().trim().to_string(),
            speakers,
            event_type: candidate.event_type,
        }
    }

    /// False when the name is blank or the `unknown` sentinel.
    pub fn has_name(&self) -> bool {
        let name = self.event_name.trim();
        !name.is_empty() && name != UNKNOWN_EVENT_NAME
    }

    /// Calendar day of the event in its own offset.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        self.date.map(|d| d.date_naive())
    }
}

// ---------------------------------------------------------------------------
// SearchResult
// ---------------------------------------------------------------------------

/// One organic hit from the search collaborator. `url` is unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: String,
}

// ---------------------------------------------------------------------------
// EventsResponse
// ---------------------------------------------------------------------------

/// Output of the discovery workflow.
///
/// `count` is derived from `events` and cannot be set independently.
#[derive(Debug, Clone, PartialEq)]
pub struct EventsResponse {
    speaker: String,
    events: Vec<Event>,
}

impl EventsResponse {
    pub fn new(speaker: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            speaker: speaker.into(),
            events,
        }
    }

    pub fn empty(speaker: impl Into<String>) -> Self {
        Self::new(speaker, Vec::new())
    }

    /// The person name the response was produced for.
    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl Serialize for EventsResponse {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EventsResponse", 3)?;
        state.serialize_field("speaker", &self.speaker)?;
        state.serialize_field("count", &self.count())?;
        state.serialize_field("events", &self.events)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for EventsResponse {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Any incoming `count` is ignored and recomputed.
        #[derive(Deserialize)]
        struct Wire {
            speaker: String,
            #[serde(default)]
            events: Vec<Event>,
        }

        let wire = Wire::deserialize(deserializer)?;
        Ok(Self::new(wire.speaker, wire.events))
    }
}
