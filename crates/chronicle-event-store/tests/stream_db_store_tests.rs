//! `StreamDbEventStore` contract, revision mapping and read fallbacks, over
//! an in-process stream database.

mod common;

use chrono::{TimeZone, Utc};
use chronicle_core::clock::SystemClock;
use chronicle_core::error::{ErrorKind, EventStoreError};
use chronicle_core::event::{Event, Metadata};
use chronicle_core::store::EventStore;
use chronicle_event_store::{InMemoryEventStore, StreamDbEventStore};
use chronicle_test_support::{contract, init_tracing};
use common::FakeStreamClient;
use serde_json::json;
use uuid::Uuid;

fn event(event_type: &str, aggregate_id: Uuid, version: i64) -> Event {
    Event::new(
        event_type,
        aggregate_id,
        version,
        &json!({"v": version}),
        Metadata::new().with("correlation_id", "c-9"),
        &SystemClock,
    )
    .unwrap()
}

#[tokio::test]
async fn test_stream_db_store_satisfies_contract() {
    init_tracing();
    let store = StreamDbEventStore::new(FakeStreamClient::new(), "chronicle");

    contract::run_all(&store).await;
}

#[tokio::test]
async fn test_racing_writers_exactly_one_wins() {
    let store = StreamDbEventStore::new(FakeStreamClient::new(), "chronicle");

    contract::racing_writers_one_wins(&store).await;
}

#[tokio::test]
async fn test_stream_is_named_from_prefix_and_id() {
    let store = StreamDbEventStore::new(FakeStreamClient::new(), "diary");
    let id = Uuid::new_v4();

    assert_eq!(store.stream_name(id), format!("diary-{id}"));
}

#[tokio::test]
async fn test_rejected_append_reports_persisted_version() {
    // Arrange
    let store = StreamDbEventStore::new(FakeStreamClient::new(), "chronicle");
    let id = Uuid::new_v4();
    store
        .save(&[event("Noted", id, 1), event("Noted", id, 2), event("Noted", id, 3)])
        .await
        .unwrap();

    // Act
    let result = store.save(&[event("Noted", id, 2)]).await;

    // Assert
    match result {
        Err(EventStoreError::VersionConflict {
            aggregate_id,
            expected,
            actual,
        }) => {
            assert_eq!(aggregate_id, id);
            assert_eq!(expected, 1);
            assert_eq!(actual, 3);
        }
        other => panic!("expected VersionConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_first_save_past_version_one_reports_no_history() {
    let store = StreamDbEventStore::new(FakeStreamClient::new(), "chronicle");
    let id = Uuid::new_v4();

    match store.save(&[event("Noted", id, 4)]).await {
        Err(EventStoreError::VersionConflict { actual, .. }) => assert_eq!(actual, 0),
        other => panic!("expected VersionConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_entries_written_by_other_tools_fall_back_to_native_fields() {
    // Arrange
    let client = FakeStreamClient::new();
    let store = StreamDbEventStore::new(client.clone(), "chronicle");
    let id = Uuid::new_v4();
    let stream = store.stream_name(id);
    let created = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
    client
        .append_raw(&stream, "Imported", r#"{"n":1}"#, "", created)
        .await;
    client
        .append_raw(&stream, "Imported", r#"{"n":2}"#, r#"{"origin":"backfill"}"#, created)
        .await;

    // Act
    let history = store.load_by_aggregate(id).await.unwrap();

    // Assert
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.aggregate_id == id));
    assert_eq!(history[0].version, 1);
    assert_eq!(history[1].version, 2);
    assert_eq!(history[0].timestamp, created);
    assert!(history[0].metadata.is_empty());
    assert_eq!(history[1].metadata.get("origin"), Some(&json!("backfill")));
}

#[tokio::test]
async fn test_global_reads_ignore_foreign_streams() {
    let client = FakeStreamClient::new();
    let store = StreamDbEventStore::new(client.clone(), "chronicle");
    let id = Uuid::new_v4();
    store.save(&[event("Shared", id, 1)]).await.unwrap();
    client
        .append_raw("$stats-node", "Shared", "{}", "", Utc::now())
        .await;
    client
        .append_raw(&format!("billing-{}", Uuid::new_v4()), "Shared", "{}", "", Utc::now())
        .await;

    let found = store.load_by_type("Shared").await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].aggregate_id, id);
}

#[tokio::test]
async fn test_tooling_streams_under_the_prefix_are_skipped_by_global_reads() {
    // Arrange
    let client = FakeStreamClient::new();
    let store = StreamDbEventStore::new(client.clone(), "chronicle");
    let id = Uuid::new_v4();
    store.save(&[event("Shared", id, 1)]).await.unwrap();
    client
        .append_raw("chronicle-projections", "Checkpoint", "{}", "", Utc::now())
        .await;
    let nested = format!("chronicle-diary-{}", Uuid::new_v4());
    client
        .append_raw(&nested, "Shared", "{}", "", Utc::now())
        .await;

    // Act
    let by_type = store.load_by_type("Shared").await.unwrap();
    let in_range = store
        .load_by_time_range("2000-01-01T00:00:00Z", "2100-01-01T00:00:00Z")
        .await
        .unwrap();

    // Assert
    assert_eq!(by_type.len(), 1);
    assert_eq!(by_type[0].aggregate_id, id);
    assert!(in_range.iter().all(|e| e.event_type != "Checkpoint"));
}

#[tokio::test]
async fn test_caller_keys_named_like_structural_fields_match_in_memory() {
    // Arrange
    let memory = InMemoryEventStore::new();
    let stream_db = StreamDbEventStore::new(FakeStreamClient::new(), "chronicle");
    let id = Uuid::new_v4();
    let mut saved = event("Audited", id, 1);
    saved.metadata = Metadata::new()
        .with("type", "audit")
        .with("timestamp", "client-clock")
        .with("version", "v2-api");
    memory.save(std::slice::from_ref(&saved)).await.unwrap();
    stream_db.save(std::slice::from_ref(&saved)).await.unwrap();

    // Act
    let from_memory = memory.load_by_aggregate(id).await.unwrap();
    let from_stream_db = stream_db.load_by_aggregate(id).await.unwrap();

    // Assert
    assert_eq!(from_stream_db, from_memory);
    assert_eq!(from_stream_db[0].metadata.get("type"), Some(&json!("audit")));
}

#[tokio::test]
async fn test_caller_metadata_survives_and_structural_keys_do_not_leak() {
    let store = StreamDbEventStore::new(FakeStreamClient::new(), "chronicle");
    let id = Uuid::new_v4();
    store.save(&[event("Noted", id, 1)]).await.unwrap();

    let loaded = store.load_by_aggregate(id).await.unwrap();

    let metadata = &loaded[0].metadata;
    assert_eq!(metadata.correlation_id(), Some("c-9"));
    for key in ["$chronicle", "type", "aggregate_id", "version", "timestamp"] {
        assert!(metadata.get(key).is_none(), "{key} leaked into metadata");
    }
}

#[tokio::test]
async fn test_unreachable_server_is_a_connection_failure() {
    let client = FakeStreamClient::new();
    client.go_offline();
    let store = StreamDbEventStore::new(client, "chronicle");

    let save = store
        .save(&[event("Noted", Uuid::new_v4(), 1)])
        .await
        .unwrap_err();
    let load = store.load_by_aggregate(Uuid::new_v4()).await.unwrap_err();

    assert_eq!(save.kind(), ErrorKind::ConnectionFailed);
    assert_eq!(load.kind(), ErrorKind::ConnectionFailed);
}

#[tokio::test]
async fn test_up_to_version_reads_only_what_it_needs() {
    let store = StreamDbEventStore::new(FakeStreamClient::new(), "chronicle");
    let id = Uuid::new_v4();
    let all: Vec<Event> = (1..=4).map(|v| event("Noted", id, v)).collect();
    store.save(&all).await.unwrap();

    let prefix = store.load_by_aggregate_up_to_version(id, 2).await.unwrap();

    assert_eq!(prefix, all[..2].to_vec());
}
