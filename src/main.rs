use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::cors::{Any, CorsLayer};

use calbridge::api;
use calbridge::storage::{Config, EventStore};
use calbridge::sync::{EventService, GoogleCalendarMirror, RemoteCalendar};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let config = Config::load_or_create()?;
    let store = EventStore::open(&config.database.path)?;

    let remote: Option<Box<dyn RemoteCalendar>> = if config.google.enabled {
        let mirror = GoogleCalendarMirror::new(config.google.clone())?;
        tracing::info!("Google Calendar mirroring enabled: {}", mirror.auth_info().message);
        Some(Box::new(mirror))
    } else {
        tracing::info!("Google Calendar mirroring is disabled");
        None
    };

    let service = Arc::new(EventService::new(store, remote));

    // The SPA is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(service).layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("calbridge listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("calbridge=info,tower_http=info")),
        )
        .init();

    tracing::info!("calbridge started");
}
