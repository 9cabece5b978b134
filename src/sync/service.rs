use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::calendar::{Event, EventChanges, EventDraft, EventPatch, TimeParseError};
use crate::storage::{EventStore, StoreError};
use crate::sync::google_api::{EventPayload, RemoteEvent};
use crate::sync::mirror::{RemoteCalendar, SyncError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Event with ID {0} not found")]
    NotFound(String),
    #[error("Google Calendar sync is not enabled")]
    SyncDisabled,
    #[error(transparent)]
    InvalidTime(#[from] TimeParseError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Remote calendar error: {0}")]
    Remote(#[from] SyncError),
}

/// Auth status reported to the UI so it can set expectations about attendee
/// invitations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_service_account: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_invite_attendees: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Single authority for all event mutations. Decides when to attempt remote
/// mirroring and tolerates remote failures without failing the local
/// operation: mirror-out failures are logged and swallowed, and only
/// existence checks and the sync enablement checks fail a call.
pub struct EventService {
    store: Mutex<EventStore>,
    remote: Option<Box<dyn RemoteCalendar>>,
}

impl EventService {
    pub fn new(store: EventStore, remote: Option<Box<dyn RemoteCalendar>>) -> Self {
        Self {
            store: Mutex::new(store),
            remote,
        }
    }

    pub async fn create(&self, draft: EventDraft) -> Result<Event, ServiceError> {
        let mut data = draft.into_data()?;

        // Drafts arriving from syncFromGoogle already carry a remote id;
        // inserting them again would fork a second remote copy.
        if data.google_calendar_id.is_none() {
            if let Some(remote) = &self.remote {
                match remote.create_event(&EventPayload::from_data(&data)).await {
                    Ok(created) => data.google_calendar_id = Some(created.id),
                    Err(err) => {
                        tracing::error!("Failed to create Google Calendar event: {}", err);
                    }
                }
            }
        }

        let event = self.store.lock().await.insert(data)?;
        Ok(event)
    }

    pub async fn find_all(&self) -> Result<Vec<Event>, ServiceError> {
        Ok(self.store.lock().await.list_all()?)
    }

    pub async fn find_one(&self, id: &str) -> Result<Event, ServiceError> {
        self.store
            .lock()
            .await
            .get(id)?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    pub async fn update(&self, id: &str, patch: EventPatch) -> Result<Event, ServiceError> {
        let existing = self.find_one(id).await?;
        let changes = patch.into_changes()?;

        if let (Some(remote), Some(remote_id)) =
            (&self.remote, existing.google_calendar_id.as_deref())
        {
            let mut merged = existing.clone();
            merged.apply(&changes);
            if let Err(err) = remote
                .update_event(remote_id, &EventPayload::from_event(&merged))
                .await
            {
                tracing::error!("Failed to update Google Calendar event: {}", err);
            }
        }

        let store = self.store.lock().await;
        store.patch(id, &changes)?;
        store
            .get(id)?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    pub async fn remove(&self, id: &str) -> Result<(), ServiceError> {
        let existing = self.find_one(id).await?;

        if let (Some(remote), Some(remote_id)) =
            (&self.remote, existing.google_calendar_id.as_deref())
        {
            if let Err(err) = remote.delete_event(remote_id).await {
                tracing::error!("Failed to delete Google Calendar event: {}", err);
            }
        }

        self.store.lock().await.delete(id)?;
        Ok(())
    }

    /// Pulls the remote listing window into the local store: events with a
    /// matching back-reference are updated, unknown ones are created tagged
    /// with the remote id. Returns the touched events in remote-listing
    /// order.
    pub async fn sync_from_google(&self) -> Result<Vec<Event>, ServiceError> {
        let remote = self.remote.as_ref().ok_or(ServiceError::SyncDisabled)?;

        let remote_events = remote.list_events().await?;
        let mut synced = Vec::new();

        for remote_event in remote_events {
            let Some(remote_id) = remote_event.id.clone() else {
                continue;
            };
            let Some(start) = remote_event.start.effective() else {
                tracing::warn!("Skipping remote event {} without a start time", remote_id);
                continue;
            };
            let Some(end) = remote_event.end.effective() else {
                tracing::warn!("Skipping remote event {} without an end time", remote_id);
                continue;
            };
            let start = start.to_string();
            let end = end.to_string();

            // Linear scan; fine at this scale, revisit with an indexed
            // lookup if collections grow.
            let existing = self
                .find_all()
                .await?
                .into_iter()
                .find(|event| event.google_calendar_id.as_deref() == Some(remote_id.as_str()));

            let event = match existing {
                Some(local) => {
                    self.update(&local.id, patch_from_remote(&remote_event, start, end))
                        .await?
                }
                None => {
                    self.create(draft_from_remote(&remote_event, remote_id, start, end))
                        .await?
                }
            };
            synced.push(event);
        }

        Ok(synced)
    }

    /// Pushes every unlinked local event to the remote calendar, tagging it
    /// with the returned id. Individual failures are logged and skipped.
    pub async fn sync_to_google(&self) -> Result<(), ServiceError> {
        let remote = self.remote.as_ref().ok_or(ServiceError::SyncDisabled)?;

        let events = self.find_all().await?;
        for event in events
            .into_iter()
            .filter(|event| event.google_calendar_id.is_none())
        {
            match remote.create_event(&EventPayload::from_event(&event)).await {
                Ok(created) => {
                    self.store
                        .lock()
                        .await
                        .patch(&event.id, &EventChanges::remote_link(created.id))?;
                }
                Err(err) => {
                    tracing::error!(
                        "Failed to sync event {} to Google Calendar: {}",
                        event.id,
                        err
                    );
                }
            }
        }

        Ok(())
    }

    pub fn auth_info(&self) -> AuthInfo {
        match &self.remote {
            None => AuthInfo {
                enabled: false,
                is_service_account: None,
                can_invite_attendees: None,
                message: Some("Google Calendar sync is not enabled".to_string()),
            },
            Some(remote) => {
                let info = remote.auth_info();
                AuthInfo {
                    enabled: true,
                    is_service_account: Some(info.is_service_account),
                    can_invite_attendees: Some(info.can_invite_attendees),
                    message: Some(info.message),
                }
            }
        }
    }
}

fn draft_from_remote(
    remote_event: &RemoteEvent,
    remote_id: String,
    start: String,
    end: String,
) -> EventDraft {
    EventDraft {
        title: remote_event.summary.clone().unwrap_or_default(),
        start_time: start,
        end_time: end,
        description: remote_event.description.clone(),
        location: remote_event.location.clone(),
        all_day: None,
        color: None,
        attendees: remote_event.attendee_emails(),
        google_calendar_id: Some(remote_id),
    }
}

fn patch_from_remote(remote_event: &RemoteEvent, start: String, end: String) -> EventPatch {
    EventPatch {
        title: remote_event.summary.clone(),
        description: remote_event.description.clone(),
        start_time: Some(start),
        end_time: Some(end),
        location: remote_event.location.clone(),
        attendees: remote_event.attendee_emails(),
        ..EventPatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::google_api::{ApiError, CreatedEventInfo, RemoteAttendee, RemoteTime};
    use crate::sync::mirror::RemoteAuthInfo;
    use crate::calendar::EventData;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    /// Records mirror-out calls and serves a fixed remote listing.
    #[derive(Default)]
    struct FakeRemote {
        fail: bool,
        listing: Vec<RemoteEvent>,
        created: StdMutex<Vec<EventPayload>>,
        next_id: AtomicUsize,
    }

    impl FakeRemote {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn with_listing(listing: Vec<RemoteEvent>) -> Self {
            Self {
                listing,
                ..Self::default()
            }
        }

        fn created_count(&self) -> usize {
            self.created.lock().unwrap().len()
        }
    }

    /// Lets a test keep a handle on the fake after handing it to the service.
    struct SharedRemote(Arc<FakeRemote>);

    #[async_trait]
    impl RemoteCalendar for SharedRemote {
        async fn create_event(
            &self,
            payload: &EventPayload,
        ) -> Result<CreatedEventInfo, SyncError> {
            self.0.create_event(payload).await
        }

        async fn update_event(
            &self,
            remote_id: &str,
            payload: &EventPayload,
        ) -> Result<(), SyncError> {
            self.0.update_event(remote_id, payload).await
        }

        async fn delete_event(&self, remote_id: &str) -> Result<(), SyncError> {
            self.0.delete_event(remote_id).await
        }

        async fn list_events(&self) -> Result<Vec<RemoteEvent>, SyncError> {
            self.0.list_events().await
        }

        fn auth_info(&self) -> RemoteAuthInfo {
            self.0.auth_info()
        }
    }

    fn event_data(title: &str, google_calendar_id: Option<String>) -> EventData {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        EventData {
            title: title.to_string(),
            description: None,
            start_time: start,
            end_time: start + chrono::Duration::minutes(30),
            location: None,
            all_day: None,
            color: None,
            attendees: None,
            google_calendar_id,
        }
    }

    #[async_trait]
    impl RemoteCalendar for FakeRemote {
        async fn create_event(
            &self,
            payload: &EventPayload,
        ) -> Result<CreatedEventInfo, SyncError> {
            if self.fail {
                return Err(SyncError::ApiError(ApiError::RequestError(
                    "forced failure".to_string(),
                )));
            }
            self.created.lock().unwrap().push(payload.clone());
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(CreatedEventInfo {
                id: format!("google-{}", n),
            })
        }

        async fn update_event(
            &self,
            _remote_id: &str,
            _payload: &EventPayload,
        ) -> Result<(), SyncError> {
            if self.fail {
                return Err(SyncError::ApiError(ApiError::RequestError(
                    "forced failure".to_string(),
                )));
            }
            Ok(())
        }

        async fn delete_event(&self, _remote_id: &str) -> Result<(), SyncError> {
            if self.fail {
                return Err(SyncError::ApiError(ApiError::RequestError(
                    "forced failure".to_string(),
                )));
            }
            Ok(())
        }

        async fn list_events(&self) -> Result<Vec<RemoteEvent>, SyncError> {
            if self.fail {
                return Err(SyncError::ApiError(ApiError::RequestError(
                    "forced failure".to_string(),
                )));
            }
            Ok(self.listing.clone())
        }

        fn auth_info(&self) -> RemoteAuthInfo {
            RemoteAuthInfo {
                is_service_account: true,
                can_invite_attendees: false,
                message: "fake".to_string(),
            }
        }
    }

    fn local_service() -> EventService {
        EventService::new(EventStore::open_in_memory().unwrap(), None)
    }

    fn mirrored_service(remote: FakeRemote) -> EventService {
        EventService::new(EventStore::open_in_memory().unwrap(), Some(Box::new(remote)))
    }

    fn standup_draft() -> EventDraft {
        EventDraft {
            title: "Standup".to_string(),
            start_time: "2024-01-01T09:00".to_string(),
            end_time: "2024-01-01T09:30".to_string(),
            description: None,
            location: None,
            all_day: None,
            color: None,
            attendees: None,
            google_calendar_id: None,
        }
    }

    fn remote_listing_event(id: &str, summary: &str) -> RemoteEvent {
        RemoteEvent {
            id: Some(id.to_string()),
            summary: Some(summary.to_string()),
            description: None,
            location: None,
            start: RemoteTime {
                date_time: Some("2024-02-01T10:00:00Z".to_string()),
                date: None,
                time_zone: None,
            },
            end: RemoteTime {
                date_time: Some("2024-02-01T11:00:00Z".to_string()),
                date: None,
                time_zone: None,
            },
            attendees: Some(vec![RemoteAttendee {
                email: "guest@example.com".to_string(),
            }]),
        }
    }

    #[tokio::test]
    async fn create_then_find_one_preserves_draft_fields() {
        let service = local_service();
        let mut draft = standup_draft();
        draft.location = Some("Room 4".to_string());
        draft.attendees = Some(vec!["a@example.com".to_string()]);

        let created = service.create(draft).await.unwrap();
        let found = service.find_one(&created.id).await.unwrap();

        assert_eq!(found, created);
        assert_eq!(found.title, "Standup");
        assert_eq!(found.location.as_deref(), Some("Room 4"));
        assert_eq!(
            found.start_time,
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
        );
        assert_eq!(
            found.end_time,
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap()
        );
        assert!(found.start_time < found.end_time);
        assert_eq!(found.google_calendar_id, None);

        let all = service.find_all().await.unwrap();
        assert_eq!(all, vec![found]);
    }

    #[tokio::test]
    async fn empty_patch_only_advances_updated_at() {
        let service = local_service();
        let created = service.create(standup_draft()).await.unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let updated = service
            .update(&created.id, EventPatch::default())
            .await
            .unwrap();

        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.start_time, created.start_time);
        assert_eq!(updated.end_time, created.end_time);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn remove_then_find_one_is_not_found() {
        let service = local_service();
        let created = service.create(standup_draft()).await.unwrap();

        service.remove(&created.id).await.unwrap();

        let result = service.find_one(&created.id).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn find_one_missing_is_not_found() {
        let service = local_service();

        let result = service.find_one("no-such-id").await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let service = local_service();

        let result = service.update("no-such-id", EventPatch::default()).await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn sync_endpoints_fail_when_mirroring_disabled() {
        let service = local_service();
        service.create(standup_draft()).await.unwrap();

        let from = service.sync_from_google().await;
        let to = service.sync_to_google().await;

        assert!(matches!(from, Err(ServiceError::SyncDisabled)));
        assert!(matches!(to, Err(ServiceError::SyncDisabled)));
        // No store mutation either way.
        assert_eq!(service.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_attaches_remote_id_when_mirroring() {
        let service = mirrored_service(FakeRemote::default());

        let created = service.create(standup_draft()).await.unwrap();

        assert_eq!(created.google_calendar_id.as_deref(), Some("google-0"));
    }

    #[tokio::test]
    async fn create_succeeds_locally_when_remote_fails() {
        let service = mirrored_service(FakeRemote::failing());

        let created = service.create(standup_draft()).await.unwrap();

        assert_eq!(created.google_calendar_id, None);
        assert_eq!(service.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_and_remove_succeed_when_remote_fails() {
        let service = mirrored_service(FakeRemote::failing());
        let created = service.create(standup_draft()).await.unwrap();

        let patch = EventPatch {
            title: Some("Renamed".to_string()),
            ..EventPatch::default()
        };
        let updated = service.update(&created.id, patch).await.unwrap();
        assert_eq!(updated.title, "Renamed");

        service.remove(&created.id).await.unwrap();
        assert!(service.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_does_not_remirror_tagged_draft() {
        let remote = FakeRemote::default();
        let service = mirrored_service(remote);
        let mut draft = standup_draft();
        draft.google_calendar_id = Some("already-linked".to_string());

        let created = service.create(draft).await.unwrap();

        assert_eq!(created.google_calendar_id.as_deref(), Some("already-linked"));
    }

    #[tokio::test]
    async fn sync_from_creates_tagged_local_event() {
        let listing = vec![remote_listing_event("remote-1", "Planning")];
        let service = mirrored_service(FakeRemote::with_listing(listing));

        let synced = service.sync_from_google().await.unwrap();

        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].google_calendar_id.as_deref(), Some("remote-1"));
        assert_eq!(synced[0].title, "Planning");
        assert_eq!(
            synced[0].attendees,
            Some(vec!["guest@example.com".to_string()])
        );

        let all = service.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, synced[0].id);
    }

    #[tokio::test]
    async fn sync_from_twice_does_not_duplicate() {
        let listing = vec![remote_listing_event("remote-1", "Planning")];
        let service = mirrored_service(FakeRemote::with_listing(listing));

        let first = service.sync_from_google().await.unwrap();
        let second = service.sync_from_google().await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(service.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sync_from_updates_matching_local_event() {
        let listing = vec![remote_listing_event("remote-1", "Planning v2")];
        let service = mirrored_service(FakeRemote::with_listing(listing));
        let mut draft = standup_draft();
        draft.google_calendar_id = Some("remote-1".to_string());
        let created = service.create(draft).await.unwrap();

        let synced = service.sync_from_google().await.unwrap();

        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].id, created.id);
        assert_eq!(synced[0].title, "Planning v2");
        assert_eq!(
            synced[0].start_time,
            Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn sync_from_handles_date_only_remote_events() {
        let mut listing_event = remote_listing_event("remote-1", "Holiday");
        listing_event.start = RemoteTime {
            date_time: None,
            date: Some("2024-03-01".to_string()),
            time_zone: None,
        };
        listing_event.end = RemoteTime {
            date_time: None,
            date: Some("2024-03-02".to_string()),
            time_zone: None,
        };
        let service = mirrored_service(FakeRemote::with_listing(vec![listing_event]));

        let synced = service.sync_from_google().await.unwrap();

        assert_eq!(
            synced[0].start_time,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn sync_to_tags_each_unlinked_event() {
        let store = EventStore::open_in_memory().unwrap();
        store.insert(event_data("Standup", None)).unwrap();
        store.insert(event_data("Retro", None)).unwrap();
        store
            .insert(event_data("Planning", Some("remote-9".to_string())))
            .unwrap();

        let remote = Arc::new(FakeRemote::default());
        let service = EventService::new(store, Some(Box::new(SharedRemote(remote.clone()))));

        service.sync_to_google().await.unwrap();

        // Both unlinked events went out; the already-linked one did not.
        assert_eq!(remote.created_count(), 2);
        for event in service.find_all().await.unwrap() {
            assert!(event.google_calendar_id.is_some(), "{} unlinked", event.title);
        }
    }

    #[tokio::test]
    async fn sync_to_continues_past_remote_failures() {
        let store = EventStore::open_in_memory().unwrap();
        store.insert(event_data("Standup", None)).unwrap();
        store.insert(event_data("Retro", None)).unwrap();
        let service = EventService::new(store, Some(Box::new(FakeRemote::failing())));

        service.sync_to_google().await.unwrap();

        for event in service.find_all().await.unwrap() {
            assert_eq!(event.google_calendar_id, None);
        }
    }

    #[tokio::test]
    async fn auth_info_reports_disabled() {
        let service = local_service();

        let info = service.auth_info();

        assert!(!info.enabled);
        assert_eq!(info.is_service_account, None);
        assert!(info.message.is_some());
    }

    #[tokio::test]
    async fn auth_info_reports_remote_credential() {
        let service = mirrored_service(FakeRemote::default());

        let info = service.auth_info();

        assert!(info.enabled);
        assert_eq!(info.is_service_account, Some(true));
        assert_eq!(info.can_invite_attendees, Some(false));
    }

    #[tokio::test]
    async fn mirror_receives_full_payload_on_create() {
        let remote = Arc::new(FakeRemote::default());
        let service = EventService::new(
            EventStore::open_in_memory().unwrap(),
            Some(Box::new(SharedRemote(remote.clone()))),
        );
        let mut draft = standup_draft();
        draft.attendees = Some(vec!["a@example.com".to_string()]);

        service.create(draft).await.unwrap();

        let payloads = remote.created.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].title, "Standup");
        // The payload carries the attendee list; whether it is transmitted
        // to Google is the mirror's decision, not the service's.
        assert_eq!(payloads[0].attendees, vec!["a@example.com".to_string()]);
    }
}
