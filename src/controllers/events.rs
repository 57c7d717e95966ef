use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::validation_error;
use crate::models::{Caller, EventPatch, NewEvent};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{event_id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/events/{event_id}/registrations", get(event_registrations))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub venue: String,
    #[validate(length(min = 1, max = 120))]
    pub speaker: String,
    #[serde(alias = "event_date")]
    pub starts_at: DateTime<Utc>,
    #[validate(range(min = 0))]
    pub total_seats: i32,
}

// total_seats намеренно отсутствует: вместимость после создания не меняется
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    /// `null` clears the description.
    #[validate(length(max = 2000))]
    #[serde(default, deserialize_with = "crate::models::event::double_option")]
    pub description: Option<Option<String>>,
    #[validate(length(min = 1, max = 200))]
    pub venue: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub speaker: Option<String>,
    #[serde(alias = "event_date")]
    pub starts_at: Option<DateTime<Utc>>,
}

// GET /api/events
async fn list_events(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.list_events().await {
        Ok(events) => Json(events).into_response(),
        Err(e) => e.into_response(),
    }
}

// GET /api/events/{event_id}
async fn get_event(State(state): State<Arc<AppState>>, Path(event_id): Path<i64>) -> Response {
    match state.engine.get_event(event_id).await {
        Ok(event) => Json(event).into_response(),
        Err(e) => e.into_response(),
    }
}

// POST /api/events
async fn create_event(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateEventRequest>,
) -> Response {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let new_event = NewEvent {
        title: req.title,
        description: req.description,
        venue: req.venue,
        speaker: req.speaker,
        starts_at: req.starts_at,
        total_seats: req.total_seats,
    };

    match state.engine.create_event(caller, new_event).await {
        Ok(event) => (StatusCode::CREATED, Json(event)).into_response(),
        Err(e) => e.into_response(),
    }
}

// PATCH /api/events/{event_id}
async fn update_event(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(event_id): Path<i64>,
    Json(req): Json<UpdateEventRequest>,
) -> Response {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let patch = EventPatch {
        title: req.title,
        description: req.description,
        venue: req.venue,
        speaker: req.speaker,
        starts_at: req.starts_at,
    };

    match state.engine.update_event(caller, event_id, patch).await {
        Ok(event) => Json(event).into_response(),
        Err(e) => e.into_response(),
    }
}

// DELETE /api/events/{event_id}
async fn delete_event(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(event_id): Path<i64>,
) -> Response {
    match state.engine.delete_event(caller, event_id).await {
        Ok(deletion) => Json(deletion).into_response(),
        Err(e) => e.into_response(),
    }
}

// GET /api/events/{event_id}/registrations
async fn event_registrations(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(event_id): Path<i64>,
) -> Response {
    match state.engine.event_registrations(caller, event_id).await {
        Ok(registrants) => Json(registrants).into_response(),
        Err(e) => e.into_response(),
    }
}
