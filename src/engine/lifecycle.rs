use serde::Serialize;
use tracing::info;

use super::{abort, Engine};
use crate::error::{EngineError, EngineResult};
use crate::models::{Caller, EventPatch, EventView, NewEvent};
use crate::notify::{templates, Notification};
use crate::store::{EventStore, StoreTx};

#[derive(Debug, Clone, Serialize)]
pub struct Deletion {
    pub event_id: i64,
    pub title: String,
    /// Registrants were told about the cancellation (event had not started).
    pub notified: bool,
    pub registrations_removed: u64,
}

impl<S: EventStore> Engine<S> {
    pub async fn create_event(&self, caller: Caller, new_event: NewEvent) -> EngineResult<EventView> {
        caller.require_organizer()?;
        if new_event.total_seats < 0 {
            return Err(EngineError::InvalidSeatCount(new_event.total_seats));
        }

        let now = self.clock.now();
        if new_event.starts_at <= now {
            return Err(EngineError::InvalidSchedule);
        }

        let event = self.store.insert_event(caller.user_id, &new_event).await?;
        info!(
            "organizer {} created event {} '{}' with {} seats",
            caller.user_id, event.id, event.title, event.total_seats
        );

        Ok(self.view_at(event, now))
    }

    /// Edit an event the caller owns. Registrants get the old and new
    /// schedule once the change has committed.
    pub async fn update_event(&self, caller: Caller, event_id: i64, patch: EventPatch) -> EngineResult<EventView> {
        caller.require_organizer()?;

        let mut tx = self.store.begin().await?;

        let before = match tx.lock_event(event_id).await? {
            Some(event) => event,
            None => return Err(abort(tx, EngineError::NotFound).await),
        };
        if before.organizer_id != caller.user_id {
            return Err(abort(tx, EngineError::Unauthorized).await);
        }

        let now = self.clock.now();
        if before.has_started(now) {
            return Err(abort(tx, EngineError::EventAlreadyCompleted).await);
        }
        if matches!(patch.starts_at, Some(starts_at) if starts_at <= now) {
            return Err(abort(tx, EngineError::InvalidSchedule).await);
        }

        if patch.is_empty() {
            tx.rollback().await?;
            return Ok(self.view_at(before, now));
        }

        let mut after = before.clone();
        patch.apply_to(&mut after);

        tx.update_event(&after).await?;
        let registrants = tx.registrants(event_id).await?;

        tx.commit().await?;

        info!(
            "organizer {} updated event {}, notifying {} registrant(s)",
            caller.user_id, event_id, registrants.len()
        );

        let notifications = registrants
            .iter()
            .map(|r| {
                let (subject, body) = templates::updated(&r.name, &before, &after);
                Notification::immediate(r.email.clone(), subject, body)
            })
            .collect();
        self.dispatch(notifications).await;

        Ok(self.view_at(after, now))
    }

    /// Delete an event the caller owns together with all its registrations,
    /// in one transaction.
    pub async fn delete_event(&self, caller: Caller, event_id: i64) -> EngineResult<Deletion> {
        caller.require_organizer()?;

        let mut tx = self.store.begin().await?;

        let event = match tx.lock_event(event_id).await? {
            Some(event) => event,
            None => return Err(abort(tx, EngineError::NotFound).await),
        };
        if event.organizer_id != caller.user_id {
            return Err(abort(tx, EngineError::Unauthorized).await);
        }

        let should_notify = !event.has_started(self.clock.now());

        let registrants = tx.registrants(event_id).await?;
        let removed = tx.delete_registrations(event_id).await?;
        tx.delete_event(event_id).await?;

        tx.commit().await?;

        info!(
            "organizer {} deleted event {} '{}', {} registration(s) removed",
            caller.user_id, event_id, event.title, removed
        );

        if should_notify {
            let notifications = registrants
                .iter()
                .map(|r| {
                    let (subject, body) = templates::cancelled(&r.name, &event);
                    Notification::immediate(r.email.clone(), subject, body)
                })
                .collect();
            self.dispatch(notifications).await;
        } else {
            info!("Event {} already completed, no cancellation emails sent", event_id);
        }

        Ok(Deletion {
            event_id,
            title: event.title,
            notified: should_notify,
            registrations_removed: removed,
        })
    }
}
