use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::validation_error;
use crate::models::Caller;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{event_id}/register", post(register).delete(cancel))
        .route("/me/registrations", get(my_registrations))
}

#[derive(Debug, Deserialize, Validate)]
struct RegisterQuery {
    #[validate(range(min = 1))]
    #[serde(default = "one_seat")]
    seats: i32,
}

fn one_seat() -> i32 {
    1
}

// POST /api/events/{event_id}/register?seats=N
async fn register(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(event_id): Path<i64>,
    Query(params): Query<RegisterQuery>,
) -> Response {
    if let Err(errors) = params.validate() {
        return validation_error(errors);
    }

    match state.engine.register(caller, event_id, params.seats).await {
        Ok(booking) => (StatusCode::CREATED, Json(booking)).into_response(),
        Err(e) => e.into_response(),
    }
}

// DELETE /api/events/{event_id}/register
async fn cancel(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(event_id): Path<i64>,
) -> Response {
    match state.engine.cancel(caller, event_id).await {
        Ok(cancellation) => Json(cancellation).into_response(),
        Err(e) => e.into_response(),
    }
}

// GET /api/me/registrations
async fn my_registrations(State(state): State<Arc<AppState>>, caller: Caller) -> Response {
    match state.engine.my_registrations(caller).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => e.into_response(),
    }
}
