#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use eventhub::clock::ManualClock;
use eventhub::config::EngineConfig;
use eventhub::engine::Engine;
use eventhub::models::{Caller, Event, NewEvent, Role, User};
use eventhub::notify::{Notification, Notifier, NotifyError};
use eventhub::store::{EventStore, ReferenceStore};

pub const ORGANIZER: i64 = 1;
pub const OTHER_ORGANIZER: i64 = 2;
pub const FIRST_PARTICIPANT: i64 = 100;
pub const PARTICIPANTS: i64 = 200;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap()
}

/// Two organizers and `PARTICIPANTS` participants with predictable emails.
pub async fn seed_directory(store: &ReferenceStore) {
    for (id, name) in [(ORGANIZER, "Olga"), (OTHER_ORGANIZER, "Oscar")] {
        store
            .insert_user(User { id, name: name.into(), email: format!("{}@org.example", name.to_lowercase()), role: Role::Organizer })
            .await;
    }
    for id in FIRST_PARTICIPANT..FIRST_PARTICIPANT + PARTICIPANTS {
        store
            .insert_user(User {
                id,
                name: format!("Participant {}", id),
                email: format!("p{}@example.com", id),
                role: Role::Participant,
            })
            .await;
    }
}

/// Records every notification handed to it; can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification);
        if self.failing.load(Ordering::SeqCst) {
            Err(NotifyError::Rejected { status: 503 })
        } else {
            Ok(())
        }
    }
}

pub struct Harness {
    pub engine: Arc<Engine<ReferenceStore>>,
    pub clock: ManualClock,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_store(ReferenceStore::default()).await
    }

    pub async fn with_store(store: ReferenceStore) -> Self {
        seed_directory(&store).await;

        let clock = ManualClock::new(base_time());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Engine::new(store, Arc::new(clock.clone()), notifier.clone(), EngineConfig::default());

        Self { engine: Arc::new(engine), clock, notifier }
    }

    pub fn store(&self) -> &ReferenceStore {
        self.engine.store()
    }

    pub fn participant(n: i64) -> Caller {
        Caller::participant(FIRST_PARTICIPANT + n)
    }

    pub async fn event(&self, total_seats: i32, starts_in: Duration) -> Event {
        self.engine
            .create_event(
                Caller::organizer(ORGANIZER),
                NewEvent {
                    title: "Async Rust Workshop".into(),
                    description: Some("Hands-on".into()),
                    venue: "Room 101".into(),
                    speaker: "Ferris".into(),
                    starts_at: self.clock_now() + starts_in,
                    total_seats,
                },
            )
            .await
            .unwrap()
            .event
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        use eventhub::clock::Clock;
        self.clock.now()
    }

    pub async fn fetch(&self, event_id: i64) -> Option<Event> {
        self.store().fetch_event(event_id).await.unwrap()
    }

    /// seats_available + sum(seats_booked) must always equal total_seats.
    pub async fn assert_conserved(&self, event_id: i64) {
        let event = self.fetch(event_id).await.expect("event exists");
        let booked: i32 = self
            .store()
            .all_registrations()
            .await
            .iter()
            .filter(|r| r.event_id == event_id)
            .map(|r| r.seats_booked)
            .sum();
        assert_eq!(event.seats_booked(), booked, "seat conservation broken for event {}", event_id);
        assert!(event.seats_available >= 0 && event.seats_available <= event.total_seats);
    }
}
