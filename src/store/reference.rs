use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use super::{EventStore, StoreTx};
use crate::error::{StoreError, StoreResult};
use crate::models::{Event, NewEvent, NewRegistration, Registrant, Registration, User};

#[derive(Default)]
struct Tables {
    users: HashMap<i64, User>,
    events: BTreeMap<i64, Event>,
    registrations: BTreeMap<i64, Registration>,
}

impl Tables {
    fn registrants(&self, event_id: i64) -> Vec<Registrant> {
        let mut rows: Vec<(i64, Registrant)> = self
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .filter_map(|r| match self.users.get(&r.user_id) {
                Some(u) => Some((
                    r.id,
                    Registrant {
                        user_id: u.id,
                        name: u.name.clone(),
                        email: u.email.clone(),
                        seats_booked: r.seats_booked,
                        registered_at: r.registered_at,
                    },
                )),
                None => {
                    warn!("registrant {} of event {} has no user record, skipped", r.user_id, event_id);
                    None
                }
            })
            .collect();
        rows.sort_by_key(|(id, r)| (r.registered_at, *id));
        rows.into_iter().map(|(_, r)| r).collect()
    }
}

/// In-memory store. Row locks are one async mutex per event id, so it
/// serializes writers exactly like `FOR UPDATE` does, but only within
/// this process.
#[derive(Clone)]
pub struct ReferenceStore {
    tables: Arc<Mutex<Tables>>,
    row_locks: Arc<std::sync::Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
    event_seq: Arc<AtomicI64>,
    registration_seq: Arc<AtomicI64>,
    lock_timeout: Duration,
}

impl Default for ReferenceStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl ReferenceStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            row_locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
            event_seq: Arc::new(AtomicI64::new(1)),
            registration_seq: Arc::new(AtomicI64::new(1)),
            lock_timeout,
        }
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    /// Snapshot of every registration, for invariant checks.
    pub async fn all_registrations(&self) -> Vec<Registration> {
        self.tables.lock().await.registrations.values().cloned().collect()
    }

    fn row_lock(&self, event_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.row_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(event_id).or_default().clone()
    }

    // Запись удаляется, когда её больше никто не держит и не ждёт
    fn release_row_lock(&self, event_id: i64) {
        let mut locks = self.row_locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(&event_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&event_id);
        }
    }
}

/// Held row lock. Dropping it releases the mutex and prunes the lock table.
struct RowGuard {
    store: ReferenceStore,
    event_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.store.release_row_lock(self.event_id);
    }
}

enum Op {
    InsertRegistration(Registration),
    DeleteRegistration(i64),
    DeleteRegistrationsFor(i64),
    DeleteEvent(i64),
}

/// Writes are staged and applied under one table lock at commit, so readers
/// never observe a half-applied transaction.
pub struct ReferenceTx {
    store: ReferenceStore,
    guards: Vec<RowGuard>,
    locked: HashMap<i64, Event>,
    dirty: HashSet<i64>,
    ops: Vec<Op>,
}

impl ReferenceTx {
    fn locked_event(&mut self, event_id: i64) -> StoreResult<&mut Event> {
        self.locked
            .get_mut(&event_id)
            .ok_or_else(|| StoreError::Constraint(format!("event {} is not locked by this transaction", event_id)))
    }
}

#[async_trait]
impl EventStore for ReferenceStore {
    type Tx = ReferenceTx;

    async fn begin(&self) -> StoreResult<ReferenceTx> {
        Ok(ReferenceTx {
            store: self.clone(),
            guards: Vec::new(),
            locked: HashMap::new(),
            dirty: HashSet::new(),
            ops: Vec::new(),
        })
    }

    async fn insert_event(&self, organizer_id: i64, event: &NewEvent) -> StoreResult<Event> {
        if event.total_seats < 0 {
            return Err(StoreError::Constraint("total_seats must be >= 0".to_string()));
        }

        let created = Event {
            id: self.event_seq.fetch_add(1, Ordering::Relaxed),
            organizer_id,
            title: event.title.clone(),
            description: event.description.clone(),
            venue: event.venue.clone(),
            speaker: event.speaker.clone(),
            starts_at: event.starts_at,
            total_seats: event.total_seats,
            seats_available: event.total_seats,
        };
        self.tables.lock().await.events.insert(created.id, created.clone());
        Ok(created)
    }

    async fn fetch_event(&self, event_id: i64) -> StoreResult<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&event_id).cloned())
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables.events.values().cloned().collect();
        events.sort_by_key(|e| (e.starts_at, e.id));
        Ok(events)
    }

    async fn fetch_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&user_id).cloned())
    }

    async fn registrants(&self, event_id: i64) -> StoreResult<Vec<Registrant>> {
        Ok(self.tables.lock().await.registrants(event_id))
    }

    async fn registrations_for_user(&self, user_id: i64) -> StoreResult<Vec<(Registration, Event)>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<(Registration, Event)> = tables
            .registrations
            .values()
            .filter(|r| r.user_id == user_id)
            .filter_map(|r| tables.events.get(&r.event_id).map(|e| (r.clone(), e.clone())))
            .collect();
        rows.sort_by(|(a, _), (b, _)| (b.registered_at, b.id).cmp(&(a.registered_at, a.id)));
        Ok(rows)
    }
}

#[async_trait]
impl StoreTx for ReferenceTx {
    async fn lock_event(&mut self, event_id: i64) -> StoreResult<Option<Event>> {
        if let Some(event) = self.locked.get(&event_id) {
            return Ok(Some(event.clone()));
        }

        let lock = self.store.row_lock(event_id);
        let acquired = tokio::time::timeout(self.store.lock_timeout, lock.lock_owned()).await;
        let guard = RowGuard {
            store: self.store.clone(),
            event_id,
            guard: acquired.ok(),
        };
        if guard.guard.is_none() {
            return Err(StoreError::Conflict(format!("lock timeout on event {}", event_id)));
        }

        let event = self.store.tables.lock().await.events.get(&event_id).cloned();
        match &event {
            Some(event) => {
                self.locked.insert(event_id, event.clone());
                self.guards.push(guard);
            }
            // строки нет: блокировать нечего, guard отпускается сразу
            None => drop(guard),
        }
        Ok(event)
    }

    async fn find_registration(&mut self, event_id: i64, user_id: i64) -> StoreResult<Option<Registration>> {
        let tables = self.store.tables.lock().await;
        Ok(tables
            .registrations
            .values()
            .find(|r| r.event_id == event_id && r.user_id == user_id)
            .cloned())
    }

    async fn insert_registration(&mut self, registration: &NewRegistration) -> StoreResult<Registration> {
        if registration.seats_booked < 1 {
            return Err(StoreError::Constraint("seats_booked must be >= 1".to_string()));
        }

        let staged_dup = self.ops.iter().any(|op| {
            matches!(op, Op::InsertRegistration(r)
                if r.event_id == registration.event_id && r.user_id == registration.user_id)
        });
        let committed_dup = self
            .store
            .tables
            .lock()
            .await
            .registrations
            .values()
            .any(|r| r.event_id == registration.event_id && r.user_id == registration.user_id);
        if staged_dup || committed_dup {
            return Err(StoreError::UniqueViolation(format!(
                "registration (user {}, event {}) already exists",
                registration.user_id, registration.event_id
            )));
        }

        let created = Registration {
            id: self.store.registration_seq.fetch_add(1, Ordering::Relaxed),
            user_id: registration.user_id,
            event_id: registration.event_id,
            seats_booked: registration.seats_booked,
            registered_at: registration.registered_at,
        };
        self.ops.push(Op::InsertRegistration(created.clone()));
        Ok(created)
    }

    async fn delete_registration(&mut self, registration_id: i64) -> StoreResult<()> {
        self.ops.push(Op::DeleteRegistration(registration_id));
        Ok(())
    }

    async fn adjust_seats(&mut self, event_id: i64, delta: i32) -> StoreResult<i32> {
        let event = self.locked_event(event_id)?;
        let seats = event.seats_available + delta;
        if seats < 0 || seats > event.total_seats {
            return Err(StoreError::Constraint(format!(
                "seats_available {} out of bounds for event {}",
                seats, event_id
            )));
        }
        event.seats_available = seats;
        self.dirty.insert(event_id);
        Ok(seats)
    }

    async fn update_event(&mut self, event: &Event) -> StoreResult<()> {
        let locked = self.locked_event(event.id)?;
        locked.title = event.title.clone();
        locked.description = event.description.clone();
        locked.venue = event.venue.clone();
        locked.speaker = event.speaker.clone();
        locked.starts_at = event.starts_at;
        self.dirty.insert(event.id);
        Ok(())
    }

    async fn registrants(&mut self, event_id: i64) -> StoreResult<Vec<Registrant>> {
        Ok(self.store.tables.lock().await.registrants(event_id))
    }

    async fn delete_registrations(&mut self, event_id: i64) -> StoreResult<u64> {
        let count = self
            .store
            .tables
            .lock()
            .await
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .count() as u64;
        self.ops.push(Op::DeleteRegistrationsFor(event_id));
        Ok(count)
    }

    async fn delete_event(&mut self, event_id: i64) -> StoreResult<()> {
        self.dirty.remove(&event_id);
        self.ops.push(Op::DeleteEvent(event_id));
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        let ReferenceTx { store, guards, locked, dirty, ops } = self;
        let mut tables = store.tables.lock().await;

        for op in ops {
            match op {
                Op::InsertRegistration(r) => {
                    tables.registrations.insert(r.id, r);
                }
                Op::DeleteRegistration(id) => {
                    tables.registrations.remove(&id);
                }
                Op::DeleteRegistrationsFor(event_id) => {
                    tables.registrations.retain(|_, r| r.event_id != event_id);
                }
                Op::DeleteEvent(event_id) => {
                    tables.events.remove(&event_id);
                    // FK ON DELETE CASCADE
                    tables.registrations.retain(|_, r| r.event_id != event_id);
                }
            }
        }

        for event_id in dirty {
            if let Some(event) = locked.get(&event_id) {
                tables.events.insert(event_id, event.clone());
            }
        }

        drop(tables);
        drop(guards);
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}
