//! Storage contract for events, registrations and the user directory.
//!
//! Reads on [`EventStore`] see committed data only and never block writers.
//! Every mutation of seat inventory goes through a [`StoreTx`], which must
//! hold an exclusive lock on the event row from [`StoreTx::lock_event`]
//! until `commit` or `rollback`. Dropping a transaction without committing
//! rolls it back.
//!
//! Two drivers:
//! - [`postgres::PgStore`]: `SELECT ... FOR UPDATE` inside a sqlx transaction.
//! - [`reference::ReferenceStore`]: in-memory tables plus a mutex per event id.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{Event, NewEvent, NewRegistration, Registrant, Registration, User};

pub mod postgres;
pub mod reference;

pub use postgres::PgStore;
pub use reference::ReferenceStore;

#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    async fn insert_event(&self, organizer_id: i64, event: &NewEvent) -> StoreResult<Event>;

    async fn fetch_event(&self, event_id: i64) -> StoreResult<Option<Event>>;

    /// All events ordered by start time.
    async fn list_events(&self) -> StoreResult<Vec<Event>>;

    async fn fetch_user(&self, user_id: i64) -> StoreResult<Option<User>>;

    async fn registrants(&self, event_id: i64) -> StoreResult<Vec<Registrant>>;

    /// A user's registrations with their events, newest registration first.
    async fn registrations_for_user(&self, user_id: i64) -> StoreResult<Vec<(Registration, Event)>>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Take the exclusive row lock. Blocks until other holders commit or roll back.
    async fn lock_event(&mut self, event_id: i64) -> StoreResult<Option<Event>>;

    async fn find_registration(&mut self, event_id: i64, user_id: i64) -> StoreResult<Option<Registration>>;

    async fn insert_registration(&mut self, registration: &NewRegistration) -> StoreResult<Registration>;

    async fn delete_registration(&mut self, registration_id: i64) -> StoreResult<()>;

    /// Add `delta` (may be negative) to `seats_available`, returning the new value.
    async fn adjust_seats(&mut self, event_id: i64, delta: i32) -> StoreResult<i32>;

    /// Persist the editable fields of `event`. Seat counts are left untouched.
    async fn update_event(&mut self, event: &Event) -> StoreResult<()>;

    async fn registrants(&mut self, event_id: i64) -> StoreResult<Vec<Registrant>>;

    async fn delete_registrations(&mut self, event_id: i64) -> StoreResult<u64>;

    async fn delete_event(&mut self, event_id: i64) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}
