mod common;

use chrono::Duration;
use common::{base_time, Harness, ORGANIZER};
use eventhub::error::EngineError;
use eventhub::models::{Caller, EventStatus};
use eventhub::store::EventStore;

#[tokio::test]
async fn booking_decrements_inventory_and_schedules_reminder() {
    let h = Harness::new().await;
    let event = h.event(10, Duration::days(3)).await;

    let booking = h.engine.register(Harness::participant(0), event.id, 3).await.unwrap();

    assert_eq!(booking.registration.seats_booked, 3);
    assert_eq!(booking.registration.registered_at, base_time());
    assert_eq!(booking.event.event.seats_available, 7);
    assert_eq!(booking.event.status, EventStatus::Upcoming);
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, 7);
    h.assert_conserved(event.id).await;

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "p100@example.com");
    assert_eq!(sent[0].subject, "Reminder: Async Rust Workshop is happening soon!");
    assert_eq!(sent[0].send_at, Some(event.starts_at - Duration::hours(24)));
}

#[tokio::test]
async fn reminder_is_immediate_inside_last_day() {
    let h = Harness::new().await;
    let event = h.event(10, Duration::hours(10)).await;

    let booking = h.engine.register(Harness::participant(0), event.id, 1).await.unwrap();
    assert_eq!(booking.event.status, EventStatus::Soon);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].send_at, None);
}

#[tokio::test]
async fn insufficient_seats_leaves_state_untouched() {
    let h = Harness::new().await;
    let event = h.event(2, Duration::days(3)).await;

    let err = h.engine.register(Harness::participant(0), event.id, 3).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientSeats { requested: 3, available: 2 }));

    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, 2);
    assert!(h.store().registrants(event.id).await.unwrap().is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn booking_exactly_the_remaining_seats_succeeds() {
    let h = Harness::new().await;
    let event = h.event(4, Duration::days(3)).await;

    h.engine.register(Harness::participant(0), event.id, 4).await.unwrap();
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, 0);

    let err = h.engine.register(Harness::participant(1), event.id, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientSeats { .. }));
    h.assert_conserved(event.id).await;
}

#[tokio::test]
async fn second_booking_by_same_user_is_duplicate() {
    let h = Harness::new().await;
    let event = h.event(10, Duration::days(3)).await;
    let caller = Harness::participant(0);

    h.engine.register(caller, event.id, 1).await.unwrap();
    for _ in 0..3 {
        let err = h.engine.register(caller, event.id, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateRegistration));
    }

    assert_eq!(h.store().registrants(event.id).await.unwrap().len(), 1);
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, 9);
}

#[tokio::test]
async fn booking_validation_errors() {
    let h = Harness::new().await;
    let event = h.event(10, Duration::days(3)).await;

    let err = h.engine.register(Harness::participant(0), 9_999, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound));

    let err = h.engine.register(Harness::participant(0), event.id, 0).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidSeatCount(0)));

    let err = h.engine.register(Caller::organizer(ORGANIZER), event.id, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized));

    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, 10);
}

#[tokio::test]
async fn no_registration_once_event_started() {
    let h = Harness::new().await;
    let event = h.event(10, Duration::hours(2)).await;

    h.clock.set(event.starts_at);
    let err = h.engine.register(Harness::participant(0), event.id, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::EventClosed));

    h.clock.advance(Duration::minutes(1));
    let err = h.engine.register(Harness::participant(0), event.id, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::EventClosed));
}

#[tokio::test]
async fn cancel_then_rebook_round_trip() {
    let h = Harness::new().await;
    let event = h.event(5, Duration::days(3)).await;
    let caller = Harness::participant(0);

    h.engine.register(Harness::participant(1), event.id, 1).await.unwrap();
    let before = h.fetch(event.id).await.unwrap().seats_available;

    h.engine.register(caller, event.id, 3).await.unwrap();
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, before - 3);

    h.notifier.clear();
    let cancellation = h.engine.cancel(caller, event.id).await.unwrap();
    assert_eq!(cancellation.seats_released, 3);
    assert_eq!(cancellation.seats_available, before);
    assert_eq!(cancellation.title, "Async Rust Workshop");
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, before);
    assert!(h.notifier.sent().is_empty(), "cancellation sends nothing");
    h.assert_conserved(event.id).await;

    h.engine.register(caller, event.id, 2).await.unwrap();
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, before - 2);
    h.assert_conserved(event.id).await;
}

#[tokio::test]
async fn cancel_error_kinds() {
    let h = Harness::new().await;
    let event = h.event(5, Duration::days(1) + Duration::hours(1)).await;

    let err = h.engine.cancel(Harness::participant(0), event.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotRegistered));

    let err = h.engine.cancel(Harness::participant(0), 9_999).await.unwrap_err();
    assert!(matches!(err, EngineError::NotRegistered));

    h.engine.register(Harness::participant(0), event.id, 2).await.unwrap();
    h.clock.set(event.starts_at + Duration::minutes(5));

    let err = h.engine.cancel(Harness::participant(0), event.id).await.unwrap_err();
    assert!(matches!(err, EngineError::EventAlreadyCompleted));
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, 3);
    h.assert_conserved(event.id).await;
}

#[tokio::test]
async fn notifier_failure_never_fails_the_booking() {
    let h = Harness::new().await;
    let event = h.event(5, Duration::days(3)).await;
    h.notifier.fail(true);

    let booking = h.engine.register(Harness::participant(0), event.id, 1).await;
    assert!(booking.is_ok());
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, 4);
}

#[tokio::test]
async fn booking_without_directory_entry_skips_reminder() {
    let h = Harness::new().await;
    let event = h.event(5, Duration::days(3)).await;

    // participant id outside the seeded directory
    h.engine.register(Caller::participant(77_777), event.id, 1).await.unwrap();

    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, 4);
}

mod conservation {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Book { user: i64, seats: i32 },
        Cancel { user: i64 },
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0i64..8, 1i32..4).prop_map(|(user, seats)| Step::Book { user, seats }),
            (0i64..8).prop_map(|user| Step::Cancel { user }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn seats_are_conserved_over_any_sequence(total in 0i32..12, steps in prop::collection::vec(step(), 1..40)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let h = Harness::new().await;
                let event = h.event(total, Duration::days(5)).await;

                for step in steps {
                    let _ = match step {
                        Step::Book { user, seats } => {
                            h.engine.register(Harness::participant(user), event.id, seats).await.map(|_| ())
                        }
                        Step::Cancel { user } => {
                            h.engine.cancel(Harness::participant(user), event.id).await.map(|_| ())
                        }
                    };
                    h.assert_conserved(event.id).await;
                }
            });
        }
    }
}
