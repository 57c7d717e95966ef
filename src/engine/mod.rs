//! Seat inventory and registration engine.
//!
//! Every write path follows the same discipline: begin a transaction, lock
//! the event row, validate against the locked row, mutate, commit, and only
//! then hand notifications to the [`Notifier`]. Nothing read before the lock
//! is trusted after it.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::{Event, EventStatus, EventView};
use crate::notify::{Notification, Notifier};
use crate::store::{EventStore, StoreTx};

mod booking;
mod lifecycle;
mod queries;
pub mod status;

pub use booking::{Booking, Cancellation};
pub use lifecycle::Deletion;
pub use status::derive_status;

pub struct Engine<S> {
    store: S,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl<S: EventStore> Engine<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>, config: EngineConfig) -> Self {
        Self { store, clock, notifier, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn status_at(&self, event: &Event, now: DateTime<Utc>) -> EventStatus {
        derive_status(event.starts_at, now, Duration::hours(self.config.soon_window_hours))
    }

    fn view_at(&self, event: Event, now: DateTime<Utc>) -> EventView {
        let status = self.status_at(&event, now);
        EventView { event, status }
    }

    /// Deliver after commit. Failures are logged and swallowed.
    async fn dispatch(&self, notifications: Vec<Notification>) {
        join_all(notifications.into_iter().map(|n| self.notify_one(n))).await;
    }

    async fn notify_one(&self, notification: Notification) {
        let recipient = notification.recipient.clone();
        if let Err(e) = self.notifier.send(notification).await {
            error!("failed to hand notification for {} to notifier: {}", recipient, e);
        }
    }
}

/// Roll back and hand the validation error through.
async fn abort<T: StoreTx>(tx: T, err: EngineError) -> EngineError {
    if let Err(e) = tx.rollback().await {
        warn!("rollback after {:?} failed: {}", err, e);
    }
    err
}
