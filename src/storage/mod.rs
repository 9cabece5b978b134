pub mod config;
pub mod store;

pub use config::{Config, ConfigError, GoogleConfig};
pub use store::{EventStore, StoreError};
