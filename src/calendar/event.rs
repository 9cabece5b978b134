use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeParseError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Parses the timestamp strings accepted at the API boundary.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM[:SS]` (read as UTC), and a
/// date-only `YYYY-MM-DD` (midnight UTC). The date-only form is what Google
/// Calendar reports for all-day events.
pub fn parse_event_time(value: &str) -> Result<DateTime<Utc>, TimeParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(TimeParseError::InvalidTimestamp(value.to_string()))
}

/// The authoritative local calendar record. Serializes camelCase, which is
/// the JSON contract the browser client consumes. `google_calendar_id` is a
/// weak back-reference to the mirrored remote event, lookup-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_calendar_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Applies a partial update in place. Present fields replace the stored
    /// value; absent fields are untouched.
    pub fn apply(&mut self, changes: &EventChanges) {
        if let Some(title) = &changes.title {
            self.title = title.clone();
        }
        if changes.description.is_some() {
            self.description = changes.description.clone();
        }
        if let Some(start) = changes.start_time {
            self.start_time = start;
        }
        if let Some(end) = changes.end_time {
            self.end_time = end;
        }
        if changes.location.is_some() {
            self.location = changes.location.clone();
        }
        if changes.all_day.is_some() {
            self.all_day = changes.all_day;
        }
        if changes.color.is_some() {
            self.color = changes.color.clone();
        }
        if changes.attendees.is_some() {
            self.attendees = changes.attendees.clone();
        }
        if changes.google_calendar_id.is_some() {
            self.google_calendar_id = changes.google_calendar_id.clone();
        }
    }
}

/// Client-submitted draft for a new event; timestamps arrive as ISO strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub all_day: Option<bool>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub attendees: Option<Vec<String>>,
    #[serde(default)]
    pub google_calendar_id: Option<String>,
}

impl EventDraft {
    pub fn into_data(self) -> Result<EventData, TimeParseError> {
        Ok(EventData {
            title: self.title,
            description: self.description,
            start_time: parse_event_time(&self.start_time)?,
            end_time: parse_event_time(&self.end_time)?,
            location: self.location,
            all_day: self.all_day,
            color: self.color,
            attendees: self.attendees,
            google_calendar_id: self.google_calendar_id,
        })
    }
}

/// A draft with its timestamps parsed; what the store persists on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub all_day: Option<bool>,
    pub color: Option<String>,
    pub attendees: Option<Vec<String>>,
    pub google_calendar_id: Option<String>,
}

/// Client-submitted partial update; any subset of the draft's fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub all_day: Option<bool>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub attendees: Option<Vec<String>>,
    #[serde(default)]
    pub google_calendar_id: Option<String>,
}

impl EventPatch {
    pub fn into_changes(self) -> Result<EventChanges, TimeParseError> {
        Ok(EventChanges {
            title: self.title,
            description: self.description,
            start_time: self.start_time.as_deref().map(parse_event_time).transpose()?,
            end_time: self.end_time.as_deref().map(parse_event_time).transpose()?,
            location: self.location,
            all_day: self.all_day,
            color: self.color,
            attendees: self.attendees,
            google_calendar_id: self.google_calendar_id,
        })
    }
}

/// A patch with its timestamps parsed; what the store merges on update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub all_day: Option<bool>,
    pub color: Option<String>,
    pub attendees: Option<Vec<String>>,
    pub google_calendar_id: Option<String>,
}

impl EventChanges {
    /// The patch `syncToGoogle` applies after a successful remote create.
    pub fn remote_link(remote_id: String) -> Self {
        Self {
            google_calendar_id: Some(remote_id),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
