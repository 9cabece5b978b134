pub mod routes;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;

use crate::sync::{EventService, ServiceError};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EventService>,
}

pub fn router(service: Arc<EventService>) -> Router {
    routes::router().with_state(AppState { service })
}

/// HTTP-facing error. Everything the service can fail with maps onto a
/// status code here; handlers stay free of status logic.
#[derive(Debug)]
pub enum AppError {
    Service(ServiceError),
    BadRequest(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Service(err) => {
                let status = match &err {
                    ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                    ServiceError::SyncDisabled => StatusCode::BAD_REQUEST,
                    ServiceError::InvalidTime(_) => StatusCode::BAD_REQUEST,
                    ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    ServiceError::Remote(_) => StatusCode::BAD_GATEWAY,
                };
                if status.is_server_error() {
                    tracing::error!("Request failed: {}", err);
                }
                (status, err.to_string())
            }
        };

        let body = Json(json!({
            "statusCode": status.as_u16(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
