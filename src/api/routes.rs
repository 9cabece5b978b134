use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::{AppError, AppState};
use crate::calendar::{Event, EventDraft, EventPatch};
use crate::sync::AuthInfo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/sync/from-google", post(sync_from_google))
        .route("/events/sync/to-google", post(sync_to_google))
        .route("/events/google-calendar/auth-info", get(auth_info))
        .route(
            "/events/{id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
}

/// POST /events
async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<EventDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let Json(draft) = payload?;
    let event = state.service.create(draft).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /events
async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, AppError> {
    let events = state.service.find_all().await?;
    Ok(Json(events))
}

/// GET /events/:id
async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Event>, AppError> {
    let event = state.service.find_one(&id).await?;
    Ok(Json(event))
}

/// PATCH /events/:id
async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<EventPatch>, JsonRejection>,
) -> Result<Json<Event>, AppError> {
    let Json(patch) = payload?;
    let event = state.service.update(&id, patch).await?;
    Ok(Json(event))
}

/// DELETE /events/:id
async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /events/sync/from-google
async fn sync_from_google(
    State(state): State<AppState>,
) -> Result<Json<Vec<Event>>, AppError> {
    let events = state.service.sync_from_google().await?;
    Ok(Json(events))
}

/// POST /events/sync/to-google
async fn sync_to_google(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.service.sync_to_google().await?;
    Ok(StatusCode::OK)
}

/// GET /events/google-calendar/auth-info
async fn auth_info(State(state): State<AppState>) -> Json<AuthInfo> {
    Json(state.service.auth_info())
}
