use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::EventStatus;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Registration {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
    pub seats_booked: i32,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub user_id: i64,
    pub event_id: i64,
    pub seats_booked: i32,
    pub registered_at: DateTime<Utc>,
}

/// Registration joined with the participant's contact details.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Registrant {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub seats_booked: i32,
    pub registered_at: DateTime<Utc>,
}

/// One row of "my registrations".
#[derive(Debug, Clone, Serialize)]
pub struct UserRegistration {
    pub event_id: i64,
    pub title: String,
    pub venue: String,
    pub speaker: String,
    pub starts_at: DateTime<Utc>,
    pub seats_booked: i32,
    pub registered_at: DateTime<Utc>,
    pub status: EventStatus,
}
