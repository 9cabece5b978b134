use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::calendar::{Event, EventChanges, EventData};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Document-style event store over sqlite. Each event is one JSON document
/// with `start_time` duplicated into an indexed column for ordering and
/// range queries. Ids and both server timestamps are assigned here.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                start_time TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_start_time ON events (start_time)",
            [],
        )?;

        Ok(())
    }

    fn save(&self, event: &Event) -> Result<(), StoreError> {
        let data = serde_json::to_string(event)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO events (id, data, start_time, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                &event.id,
                &data,
                event.start_time.to_rfc3339(),
                event.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert(&self, data: EventData) -> Result<Event, StoreError> {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4().to_string(),
            title: data.title,
            description: data.description,
            start_time: data.start_time,
            end_time: data.end_time,
            location: data.location,
            all_day: data.all_day,
            color: data.color,
            attendees: data.attendees,
            google_calendar_id: data.google_calendar_id,
            created_at: now,
            updated_at: now,
        };
        self.save(&event)?;
        Ok(event)
    }

    pub fn get(&self, id: &str) -> Result<Option<Event>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT data FROM events WHERE id = ?1")?;
        let mut rows = stmt.query([id])?;

        if let Some(row) = rows.next()? {
            let data: String = row.get(0)?;
            let event: Event = serde_json::from_str(&data)?;
            Ok(Some(event))
        } else {
            Ok(None)
        }
    }

    pub fn list_all(&self) -> Result<Vec<Event>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM events ORDER BY start_time")?;
        let mut rows = stmt.query([])?;

        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let data: String = row.get(0)?;
            events.push(serde_json::from_str(&data)?);
        }
        Ok(events)
    }

    /// Merges a partial update into an existing event and refreshes its
    /// `updated_at`. A no-op when the id is absent; existence checks belong
    /// to the caller.
    pub fn patch(&self, id: &str, changes: &EventChanges) -> Result<(), StoreError> {
        let Some(mut event) = self.get(id)? else {
            return Ok(());
        };
        event.apply(changes);
        event.updated_at = Utc::now();
        self.save(&event)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Events whose start time falls within `[start, end]`, both inclusive.
    pub fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM events
             WHERE start_time >= ?1 AND start_time <= ?2
             ORDER BY start_time",
        )?;
        let mut rows = stmt.query([start.to_rfc3339(), end.to_rfc3339()])?;

        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let data: String = row.get(0)?;
            events.push(serde_json::from_str(&data)?);
        }
        Ok(events)
    }
}
