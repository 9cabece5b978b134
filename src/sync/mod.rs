pub mod google_api;
pub mod google_auth;
pub mod mirror;
pub mod service;

pub use mirror::{GoogleCalendarMirror, RemoteCalendar, SyncError};
pub use service::{AuthInfo, EventService, ServiceError};
