mod common;

use chrono::Duration;
use common::Harness;
use eventhub::error::EngineError;
use eventhub::store::{EventStore, ReferenceStore, StoreTx};
use std::time::Duration as StdDuration;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_bookings_never_overbook() {
    let h = Harness::new().await;
    let event = h.event(10, Duration::days(2)).await;
    let event_id = event.id;

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.register(Harness::participant(i), event_id, 1).await })
        })
        .collect();

    let mut booked = 0;
    let mut sold_out = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(EngineError::InsufficientSeats { .. }) => sold_out += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(booked, 10);
    assert_eq!(sold_out, 40);
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, 0);
    assert_eq!(h.store().registrants(event.id).await.unwrap().len(), 10);
    h.assert_conserved(event.id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_duplicates_create_one_row() {
    let h = Harness::new().await;
    let event = h.event(100, Duration::days(2)).await;
    let event_id = event.id;
    let caller = Harness::participant(0);

    let results = futures::future::join_all((0..20).map(|_| {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.register(caller, event_id, 2).await })
    }))
    .await;

    let ok = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    let dup = results
        .iter()
        .filter(|r| matches!(r, Ok(Err(EngineError::DuplicateRegistration))))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(dup, 19);
    assert_eq!(h.fetch(event.id).await.unwrap().seats_available, 98);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn mixed_bookings_and_cancellations_conserve_seats() {
    let h = Harness::new().await;
    let event = h.event(15, Duration::days(2)).await;
    let event_id = event.id;

    // первая волна: 30 участников по 1 месту
    let first = futures::future::join_all((0..30).map(|i| {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.register(Harness::participant(i), event_id, 1).await })
    }))
    .await;
    assert_eq!(first.iter().filter(|r| matches!(r, Ok(Ok(_)))).count(), 15);

    // вторая волна: все отменяют, остальные снова пытаются записаться
    let mut tasks = Vec::new();
    for i in 0..30 {
        let engine = h.engine.clone();
        tasks.push(tokio::spawn(async move {
            let _ = engine.cancel(Harness::participant(i), event_id).await;
        }));
        let engine = h.engine.clone();
        tasks.push(tokio::spawn(async move {
            let _ = engine.register(Harness::participant(30 + i), event_id, 1).await;
        }));
    }
    futures::future::join_all(tasks).await;

    h.assert_conserved(event.id).await;
    let event_now = h.fetch(event.id).await.unwrap();
    let registrants = h.store().registrants(event.id).await.unwrap();
    assert_eq!(registrants.len() as i32, 15 - event_now.seats_available);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lock_on_one_event_does_not_block_another() {
    let h = Harness::new().await;
    let busy = h.event(5, Duration::days(2)).await;
    let free = h.event(5, Duration::days(2)).await;

    // держим блокировку строки busy в открытой транзакции
    let mut tx = h.store().begin().await.unwrap();
    tx.lock_event(busy.id).await.unwrap().unwrap();

    let booking = tokio::time::timeout(
        StdDuration::from_secs(2),
        h.engine.register(Harness::participant(0), free.id, 1),
    )
    .await
    .expect("booking on an unrelated event must not wait");
    assert!(booking.is_ok());

    // the locked event is blocked until the holder finishes
    let engine = h.engine.clone();
    let busy_id = busy.id;
    let waiting = tokio::spawn(async move { engine.register(Harness::participant(1), busy_id, 1).await });
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert!(!waiting.is_finished());

    tx.rollback().await.unwrap();
    let result = tokio::time::timeout(StdDuration::from_secs(2), waiting).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(h.fetch(busy.id).await.unwrap().seats_available, 4);
}

#[tokio::test]
async fn lock_timeout_surfaces_as_retryable_conflict() {
    let h = Harness::with_store(ReferenceStore::new(StdDuration::from_millis(50))).await;
    let event = h.event(5, Duration::days(2)).await;

    let mut tx = h.store().begin().await.unwrap();
    tx.lock_event(event.id).await.unwrap();

    let err = h.engine.register(Harness::participant(0), event.id, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::TransientStoreConflict(_)));
    assert!(err.is_retryable());

    tx.rollback().await.unwrap();
    assert!(h.engine.register(Harness::participant(0), event.id, 1).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn delete_racing_bookings_leaves_no_orphans() {
    let h = Harness::new().await;
    let event = h.event(100, Duration::days(2)).await;
    let event_id = event.id;

    let bookings: Vec<_> = (0..30)
        .map(|i| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.register(Harness::participant(i), event_id, 1).await })
        })
        .collect();
    let engine = h.engine.clone();
    let deletion = tokio::spawn(async move {
        engine.delete_event(eventhub::models::Caller::organizer(common::ORGANIZER), event_id).await
    });

    let mut booked = 0u64;
    for handle in bookings {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(EngineError::NotFound) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    let deletion = deletion.await.unwrap().unwrap();

    // каждая успешная запись успела до удаления и была удалена каскадом
    assert_eq!(deletion.registrations_removed, booked);
    assert!(h.fetch(event_id).await.is_none());
    assert!(h.store().all_registrations().await.iter().all(|r| r.event_id != event_id));
}
