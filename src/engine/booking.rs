use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::{abort, Engine};
use crate::error::{EngineError, EngineResult};
use crate::models::{Caller, Event, EventView, NewRegistration, Registration};
use crate::notify::{templates, Notification};
use crate::store::{EventStore, StoreTx};

#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub registration: Registration,
    pub event: EventView,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cancellation {
    pub event_id: i64,
    pub title: String,
    pub seats_released: i32,
    pub seats_available: i32,
}

impl<S: EventStore> Engine<S> {
    /// Book `seats` seats on an event for the calling participant.
    ///
    /// Availability, start time and duplicates are all checked against the
    /// locked row, so concurrent bookings for one event are serialized and
    /// none of them acts on a stale seat count.
    pub async fn register(&self, caller: Caller, event_id: i64, seats: i32) -> EngineResult<Booking> {
        caller.require_participant()?;
        if seats < 1 {
            return Err(EngineError::InvalidSeatCount(seats));
        }

        let mut tx = self.store.begin().await?;

        let event = match tx.lock_event(event_id).await? {
            Some(event) => event,
            None => return Err(abort(tx, EngineError::NotFound).await),
        };

        let now = self.clock.now();

        // Нет поздних регистраций
        if event.has_started(now) {
            return Err(abort(tx, EngineError::EventClosed).await);
        }

        if event.seats_available < seats {
            let err = EngineError::InsufficientSeats { requested: seats, available: event.seats_available };
            return Err(abort(tx, err).await);
        }

        if tx.find_registration(event_id, caller.user_id).await?.is_some() {
            return Err(abort(tx, EngineError::DuplicateRegistration).await);
        }

        let registration = tx
            .insert_registration(&NewRegistration {
                user_id: caller.user_id,
                event_id,
                seats_booked: seats,
                registered_at: now,
            })
            .await?;
        let seats_available = tx.adjust_seats(event_id, -seats).await?;

        tx.commit().await?;

        info!(
            "user {} booked {} seat(s) for event {}, {} left",
            caller.user_id, seats, event_id, seats_available
        );

        let event = Event { seats_available, ..event };
        self.schedule_reminder(caller.user_id, &event, now).await;

        Ok(Booking { registration, event: self.view_at(event, now) })
    }

    /// Release the caller's registration and return its seats to the pool.
    pub async fn cancel(&self, caller: Caller, event_id: i64) -> EngineResult<Cancellation> {
        caller.require_participant()?;

        let mut tx = self.store.begin().await?;
        let event = tx.lock_event(event_id).await?;

        let registration = match tx.find_registration(event_id, caller.user_id).await? {
            Some(registration) => registration,
            None => return Err(abort(tx, EngineError::NotRegistered).await),
        };
        let event = match event {
            Some(event) => event,
            None => return Err(abort(tx, EngineError::NotFound).await),
        };

        if event.has_started(self.clock.now()) {
            return Err(abort(tx, EngineError::EventAlreadyCompleted).await);
        }

        let seats_available = tx.adjust_seats(event_id, registration.seats_booked).await?;
        tx.delete_registration(registration.id).await?;

        tx.commit().await?;

        info!(
            "user {} cancelled registration for event {}, {} seat(s) released",
            caller.user_id, event_id, registration.seats_booked
        );

        Ok(Cancellation {
            event_id,
            title: event.title,
            seats_released: registration.seats_booked,
            seats_available,
        })
    }

    // Напоминание за N часов до начала; если этот момент уже прошёл - сразу.
    // Изменение даты события позже не переносит уже запланированное напоминание.
    async fn schedule_reminder(&self, user_id: i64, event: &Event, now: DateTime<Utc>) {
        let user = match self.store.fetch_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("user {} not found, reminder for event {} skipped", user_id, event.id);
                return;
            }
            Err(e) => {
                error!("failed to load user {} for reminder: {}", user_id, e);
                return;
            }
        };

        let (subject, body) = templates::reminder(&user.name, event, self.config.reminder_lead_hours);
        let remind_at = event.starts_at - Duration::hours(self.config.reminder_lead_hours);

        let notification = if remind_at > now {
            Notification::scheduled(user.email, subject, body, remind_at)
        } else {
            Notification::immediate(user.email, subject, body)
        };
        self.notify_one(notification).await;
    }
}
