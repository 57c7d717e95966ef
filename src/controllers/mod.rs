pub mod events;
pub mod registrations;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::EngineError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(events::routes())
        .merge(registrations::routes())
}

impl EngineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::NotFound | EngineError::NotRegistered => StatusCode::NOT_FOUND,
            EngineError::Unauthorized => StatusCode::FORBIDDEN,
            EngineError::InvalidSchedule
            | EngineError::InvalidSeatCount(_)
            | EngineError::EventClosed
            | EngineError::EventAlreadyCompleted
            | EngineError::InsufficientSeats { .. } => StatusCode::BAD_REQUEST,
            EngineError::DuplicateRegistration => StatusCode::CONFLICT,
            EngineError::TransientStoreConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            EngineError::Store(e) => {
                tracing::error!("store failure: {:?}", e);
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}

pub(crate) fn validation_error(errors: validator::ValidationErrors) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "detail": errors.to_string() }))).into_response()
}
