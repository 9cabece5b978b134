use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::{Event, EventData};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Authentication failed")]
    AuthenticationFailed,
}

/// The forward-looking interval a bulk listing covers.
pub struct ListWindow {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

impl ListWindow {
    pub fn new(time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Self {
        Self { time_min, time_max }
    }

    /// The default reconciliation window: now to one month ahead.
    pub fn next_month() -> Self {
        let now = Utc::now();
        let max = now
            .checked_add_months(chrono::Months::new(1))
            .unwrap_or(now);
        Self::new(now, max)
    }
}

/// Either a precise instant or an all-day date, as Google reports times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl RemoteTime {
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(instant.to_rfc3339()),
            date: None,
            time_zone: Some("UTC".to_string()),
        }
    }

    /// The precise time-of-day value, falling back to the all-day date.
    pub fn effective(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAttendee {
    pub email: String,
}

/// The provider's representation of a mirrored event. Not owned by this
/// system; the local record only holds a weak back-reference to its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: RemoteTime,
    pub end: RemoteTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<RemoteAttendee>>,
}

impl RemoteEvent {
    pub fn attendee_emails(&self) -> Option<Vec<String>> {
        self.attendees
            .as_ref()
            .map(|list| list.iter().map(|a| a.email.clone()).collect())
    }
}

#[derive(Debug, Deserialize)]
struct EventListResponse {
    items: Option<Vec<RemoteEvent>>,
}

/// What the mirror sends outward for a create or update: the merged field
/// set of the local event, already parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendees: Vec<String>,
}

impl EventPayload {
    pub fn from_data(data: &EventData) -> Self {
        Self {
            title: data.title.clone(),
            description: data.description.clone(),
            location: data.location.clone(),
            start_time: data.start_time,
            end_time: data.end_time,
            attendees: data.attendees.clone().unwrap_or_default(),
        }
    }

    pub fn from_event(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            attendees: event.attendees.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatedEventInfo {
    pub id: String,
}

pub struct GoogleCalendarClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl GoogleCalendarClient {
    pub fn new(access_token: String) -> Self {
        Self {
            base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn to_remote_event(&self, payload: &EventPayload, include_attendees: bool) -> RemoteEvent {
        let attendees = if include_attendees && !payload.attendees.is_empty() {
            Some(
                payload
                    .attendees
                    .iter()
                    .map(|email| RemoteAttendee {
                        email: email.clone(),
                    })
                    .collect(),
            )
        } else {
            None
        };

        RemoteEvent {
            id: None,
            summary: Some(payload.title.clone()),
            description: payload.description.clone(),
            location: payload.location.clone(),
            start: RemoteTime::from_instant(payload.start_time),
            end: RemoteTime::from_instant(payload.end_time),
            attendees,
        }
    }

    pub async fn list_events(
        &self,
        calendar_id: &str,
        window: ListWindow,
    ) -> Result<Vec<RemoteEvent>, ApiError> {
        let url = format!("{}/calendars/{}/events", self.base_url, calendar_id);
        let time_min = window.time_min.to_rfc3339();
        let time_max = window.time_max.to_rfc3339();

        tracing::info!("Listing remote events from {} to {}", time_min, time_max);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;

        let status = response.status();

        if status == 401 {
            tracing::error!("Authentication failed when listing remote events");
            return Err(ApiError::AuthenticationFailed);
        }

        if status == 404 {
            tracing::error!("Calendar not found: {}", calendar_id);
            return Err(ApiError::NotFound(calendar_id.to_string()));
        }

        if status == 429 {
            tracing::warn!("Rate limit exceeded");
            return Err(ApiError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await?;
            tracing::error!("Failed to list remote events. Status: {}, Body: {}", status, body);
            return Err(ApiError::RequestError(format!("Status {}: {}", status, body)));
        }

        let event_list: EventListResponse = response.json().await?;
        let events = event_list.items.unwrap_or_default();

        tracing::info!("Listed {} remote events", events.len());
        Ok(events)
    }

    pub async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &EventPayload,
        include_attendees: bool,
    ) -> Result<CreatedEventInfo, ApiError> {
        let url = format!("{}/calendars/{}/events", self.base_url, calendar_id);
        let remote_event = self.to_remote_event(payload, include_attendees);

        tracing::info!("Creating remote event: {} at {}", payload.title, payload.start_time);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&remote_event)
            .send()
            .await?;

        let status = response.status();

        if status == 401 {
            tracing::error!("Authentication failed when creating remote event");
            return Err(ApiError::AuthenticationFailed);
        }

        if !status.is_success() {
            let body = response.text().await?;
            tracing::error!("Failed to create remote event. Status: {}, Body: {}", status, body);
            return Err(ApiError::RequestError(format!("Status {}: {}", status, body)));
        }

        let created: RemoteEvent = response.json().await?;
        let id = created.id.unwrap_or_default();
        tracing::info!("Remote event created with id {}", id);

        Ok(CreatedEventInfo { id })
    }

    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        payload: &EventPayload,
        include_attendees: bool,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.base_url, calendar_id, event_id
        );
        let remote_event = self.to_remote_event(payload, include_attendees);

        tracing::info!("Updating remote event {}: {}", event_id, payload.title);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(&remote_event)
            .send()
            .await?;

        let status = response.status();

        if status == 401 {
            tracing::error!("Authentication failed when updating remote event {}", event_id);
            return Err(ApiError::AuthenticationFailed);
        }

        if status == 404 {
            tracing::error!("Remote event not found: {}", event_id);
            return Err(ApiError::NotFound(event_id.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await?;
            tracing::error!(
                "Failed to update remote event {}. Status: {}, Body: {}",
                event_id,
                status,
                body
            );
            return Err(ApiError::RequestError(format!("Status {}: {}", status, body)));
        }

        Ok(())
    }

    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), ApiError> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.base_url, calendar_id, event_id
        );

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if response.status() == 401 {
            return Err(ApiError::AuthenticationFailed);
        }

        if response.status() == 404 {
            return Err(ApiError::NotFound(event_id.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(ApiError::RequestError(format!("Status {}: {}", status, body)));
        }

        Ok(())
    }
}
