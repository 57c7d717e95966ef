use chrono::{DateTime, Duration, Utc};

use crate::models::EventStatus;

/// Classify an event against `now`. Recomputed on every read.
pub fn derive_status(starts_at: DateTime<Utc>, now: DateTime<Utc>, soon_window: Duration) -> EventStatus {
    if starts_at <= now {
        EventStatus::Completed
    } else if starts_at <= now + soon_window {
        EventStatus::Soon
    } else {
        EventStatus::Upcoming
    }
}
