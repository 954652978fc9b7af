//! Behaviour every `EventStore` must show, written once and run against
//! each backend. Each check uses fresh aggregate ids and event types, so
//! the checks can share one store.
//!
//! ```ignore
//! #[tokio::test]
//! async fn test_store_contract() {
//!     chronicle_test_support::contract::run_all(&InMemoryEventStore::new()).await;
//! }
//! ```

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use chronicle_core::clock::Clock;
use chronicle_core::error::{ErrorKind, EventStoreError};
use chronicle_core::event::{Event, Metadata, Payload};
use chronicle_core::store::EventStore;
use serde_json::json;
use uuid::Uuid;

use crate::clock::{FixedClock, SteppingClock};

fn event_at(
    event_type: &str,
    aggregate_id: Uuid,
    version: i64,
    clock: &dyn Clock,
) -> Event {
    Event::new(
        event_type,
        aggregate_id,
        version,
        &json!({"version": version}),
        Metadata::new().with("source", "contract"),
        clock,
    )
    .unwrap()
}

fn event(event_type: &str, aggregate_id: Uuid, version: i64) -> Event {
    event_at(event_type, aggregate_id, version, &chronicle_core::clock::SystemClock)
}

fn unique_type(stem: &str) -> String {
    format!("{stem}{}", Uuid::new_v4().simple())
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn versions(events: &[Event]) -> Vec<i64> {
    events.iter().map(|e| e.version).collect()
}

fn assert_conflict(result: Result<(), EventStoreError>) {
    match result {
        Err(err) => assert_eq!(err.kind(), ErrorKind::VersionConflict, "{err}"),
        Ok(()) => panic!("expected a version conflict, the save succeeded"),
    }
}

/// A never-written aggregate has an empty history, on every read axis.
pub async fn unknown_aggregate_has_empty_history<S: EventStore + ?Sized>(store: &S) {
    let id = Uuid::new_v4();

    assert!(store.load_by_aggregate(id).await.unwrap().is_empty());
    assert!(
        store
            .load_by_aggregate_up_to_version(id, 10)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(store.load_by_type(&unique_type("Never")).await.unwrap().is_empty());
}

/// Separate saves extend the history in version order with no gaps.
pub async fn consecutive_saves_build_contiguous_history<S: EventStore + ?Sized>(store: &S) {
    let id = Uuid::new_v4();

    store.save(&[event("Opened", id, 1)]).await.unwrap();
    store
        .save(&[event("Noted", id, 2), event("Noted", id, 3)])
        .await
        .unwrap();
    store.save(&[event("Closed", id, 4)]).await.unwrap();

    let history = store.load_by_aggregate(id).await.unwrap();
    assert_eq!(versions(&history), vec![1, 2, 3, 4]);
    assert!(history.iter().all(|e| e.aggregate_id == id));
}

/// An empty group is accepted and changes nothing.
pub async fn empty_save_is_a_no_op<S: EventStore + ?Sized>(store: &S) {
    store.save(&[]).await.unwrap();
}

/// Two writers both extend version 1; only the first succeeds and the
/// loser's event never becomes visible.
pub async fn concurrent_writer_gets_version_conflict<S: EventStore + ?Sized>(store: &S) {
    // Arrange
    let id = Uuid::new_v4();
    let created = event("Created", id, 1);
    let updated = event("Updated", id, 2);
    let rival = event("Updated", id, 2);
    store.save(std::slice::from_ref(&created)).await.unwrap();

    // Act
    store.save(std::slice::from_ref(&updated)).await.unwrap();
    let result = store.save(std::slice::from_ref(&rival)).await;

    // Assert
    assert_conflict(result);
    let history = store.load_by_aggregate(id).await.unwrap();
    assert_eq!(history, vec![created, updated]);
}

/// Writers racing from the same starting point: exactly one wins.
///
/// Only for backends whose check-and-append is a single atomic step; it is
/// not part of [`run_all`].
pub async fn racing_writers_one_wins<S: EventStore + ?Sized>(store: &S) {
    let id = Uuid::new_v4();
    store.save(&[event("Created", id, 1)]).await.unwrap();
    let left = [event("Updated", id, 2)];
    let right = [event("Updated", id, 2)];

    let (a, b) = tokio::join!(store.save(&left), store.save(&right));

    assert!(a.is_ok() != b.is_ok(), "exactly one writer must win: {a:?} {b:?}");
    let loser = if a.is_err() { a } else { b };
    assert_conflict(loser);
    assert_eq!(versions(&store.load_by_aggregate(id).await.unwrap()), vec![1, 2]);
}

/// A first save must start at version 1; a group starting at 2 leaves
/// nothing behind.
pub async fn batch_skipping_version_one_is_rejected<S: EventStore + ?Sized>(store: &S) {
    let id = Uuid::new_v4();
    let batch = [event("Noted", id, 2), event("Noted", id, 3), event("Noted", id, 4)];

    assert_conflict(store.save(&batch).await);

    assert!(store.load_by_aggregate(id).await.unwrap().is_empty());
}

/// A group that re-uses persisted versions is rejected as a whole.
pub async fn overlapping_batch_is_rejected_atomically<S: EventStore + ?Sized>(store: &S) {
    let id = Uuid::new_v4();
    store
        .save(&[event("Noted", id, 1), event("Noted", id, 2)])
        .await
        .unwrap();

    assert_conflict(
        store
            .save(&[event("Noted", id, 2), event("Noted", id, 3)])
            .await,
    );

    assert_eq!(versions(&store.load_by_aggregate(id).await.unwrap()), vec![1, 2]);
}

/// Events for different aggregates may not share a group.
pub async fn mixed_aggregate_batch_is_rejected<S: EventStore + ?Sized>(store: &S) {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    let err = store
        .save(&[event("Noted", a, 1), event("Noted", b, 1)])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Serialization);
    assert!(store.load_by_aggregate(a).await.unwrap().is_empty());
    assert!(store.load_by_aggregate(b).await.unwrap().is_empty());
}

/// The truncated read is exactly the prefix with `version <= v`.
pub async fn up_to_version_returns_prefix<S: EventStore + ?Sized>(store: &S) {
    let id = Uuid::new_v4();
    let all: Vec<Event> = (1..=5).map(|v| event("Noted", id, v)).collect();
    store.save(&all).await.unwrap();

    let full = store.load_by_aggregate(id).await.unwrap();
    let prefix = store.load_by_aggregate_up_to_version(id, 3).await.unwrap();

    assert_eq!(prefix, full[..3].to_vec());
    assert!(
        store
            .load_by_aggregate_up_to_version(id, 0)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        store.load_by_aggregate_up_to_version(id, 99).await.unwrap(),
        full
    );
}

/// Type reads span aggregates; a tight closed time range isolates one event.
pub async fn type_and_time_range_reads_span_aggregates<S: EventStore + ?Sized>(store: &S) {
    // Arrange
    let event_type = unique_type("Journaled");
    let base = Utc.with_ymd_and_hms(2031, 3, 4, 5, 6, 7).unwrap()
        + Duration::milliseconds(i64::from(Uuid::new_v4().as_fields().1 % 1000));
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    let on_b = event_at(&event_type, b, 1, &FixedClock(base));
    let on_c = event_at(&event_type, c, 1, &FixedClock(base + Duration::hours(1)));
    store.save(std::slice::from_ref(&on_b)).await.unwrap();
    store.save(std::slice::from_ref(&on_c)).await.unwrap();

    // Act
    let mut by_type = store.load_by_type(&event_type).await.unwrap();
    let in_range = store
        .load_by_time_range(&rfc3339(base), &rfc3339(base))
        .await
        .unwrap();

    // Assert
    by_type.sort_by_key(|e| e.timestamp);
    assert_eq!(by_type, vec![on_b.clone(), on_c]);
    assert_eq!(in_range, vec![on_b]);
}

/// Both time bounds are inclusive.
pub async fn time_range_is_closed<S: EventStore + ?Sized>(store: &S) {
    let start = Utc.with_ymd_and_hms(2032, 7, 8, 9, 10, 11).unwrap()
        + Duration::milliseconds(i64::from(Uuid::new_v4().as_fields().1 % 1000));
    let clock = SteppingClock::new(start, Duration::seconds(1));
    let id = Uuid::new_v4();
    let events: Vec<Event> = (1..=3).map(|v| event_at("Ticked", id, v, &clock)).collect();
    store.save(&events).await.unwrap();

    let found = store
        .load_by_time_range(
            &rfc3339(start + Duration::seconds(1)),
            &rfc3339(start + Duration::seconds(2)),
        )
        .await
        .unwrap();

    let mut found: Vec<i64> = found
        .into_iter()
        .filter(|e| e.aggregate_id == id)
        .map(|e| e.version)
        .collect();
    found.sort_unstable();
    assert_eq!(found, vec![2, 3]);
}

/// Malformed bounds fail before the backend is asked anything.
pub async fn malformed_time_range_is_a_serialization_error<S: EventStore + ?Sized>(store: &S) {
    let err = store
        .load_by_time_range("not a time", "2030-01-01T00:00:00Z")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Serialization);

    let err = store
        .load_by_time_range("2030-01-01T00:00:00Z", "2030-13-01")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Serialization);
}

/// Payload bytes and metadata come back exactly as saved, including caller
/// keys that share a name with a structural field.
pub async fn payload_and_metadata_round_trip<S: EventStore + ?Sized>(store: &S) {
    let id = Uuid::new_v4();
    let mut saved = event("Noted", id, 1);
    saved.payload = Payload::from_json(r#"{ "z": 1,  "a": [true, null, 2.5] }"#.to_owned()).unwrap();
    saved.metadata = Metadata::new()
        .with("correlation_id", "c-1")
        .with("attempt", 3)
        .with("flags", json!({"dry_run": false}))
        .with("type", "audit")
        .with("aggregate_id", "external-42")
        .with("version", "v2-api")
        .with("timestamp", "client-clock");
    store.save(std::slice::from_ref(&saved)).await.unwrap();

    let loaded = store.load_by_aggregate(id).await.unwrap();

    assert_eq!(loaded, vec![saved.clone()]);
    assert_eq!(loaded[0].payload.as_bytes(), saved.payload.as_bytes());
}

/// Runs every check above, except [`racing_writers_one_wins`], against `store`.
pub async fn run_all<S: EventStore + ?Sized>(store: &S) {
    unknown_aggregate_has_empty_history(store).await;
    consecutive_saves_build_contiguous_history(store).await;
    empty_save_is_a_no_op(store).await;
    concurrent_writer_gets_version_conflict(store).await;
    batch_skipping_version_one_is_rejected(store).await;
    overlapping_batch_is_rejected_atomically(store).await;
    mixed_aggregate_batch_is_rejected(store).await;
    up_to_version_returns_prefix(store).await;
    type_and_time_range_reads_span_aggregates(store).await;
    time_range_is_closed(store).await;
    malformed_time_range_is_a_serialization_error(store).await;
    payload_and_metadata_round_trip(store).await;
}
