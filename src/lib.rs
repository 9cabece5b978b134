pub mod api;
pub mod calendar;
pub mod storage;
pub mod sync;

pub use calendar::{Event, EventDraft, EventPatch};
pub use storage::{Config, EventStore};
pub use sync::{EventService, GoogleCalendarMirror, ServiceError};
