pub mod event;

pub use event::{parse_event_time, Event, EventChanges, EventData, EventDraft, EventPatch, TimeParseError};
