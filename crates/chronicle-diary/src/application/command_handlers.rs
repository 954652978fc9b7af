//! Command handlers for diary entries.
//!
//! Each handler loads the entry through the repository, runs the business
//! operation and saves, returning the committed events. A version conflict
//! is returned to the caller untouched; retrying is the caller's decision.

use chronicle_core::aggregate::Aggregate;
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::event::Event;
use chronicle_core::repository::AggregateRepository;
use chronicle_core::store::EventStore;
use tracing::{info, instrument};

use crate::domain::aggregates::DiaryEntry;
use crate::domain::commands::{CreateEntry, DeleteEntry, UpdateEntry};

/// Handles `CreateEntry`.
///
/// # Errors
///
/// `DomainError::Validation` if the entry already exists or has no title,
/// or a store error from loading or saving.
#[instrument(skip_all, fields(entry_id = %command.entry_id))]
pub async fn handle_create_entry<S: EventStore>(
    command: &CreateEntry,
    clock: &dyn Clock,
    repo: &AggregateRepository<S>,
) -> Result<Vec<Event>, DomainError> {
    let mut entry: DiaryEntry = repo.load(command.entry_id).await?;
    entry.create(command, clock)?;
    let committed = repo.save(&mut entry).await?;
    info!(version = entry.version(), "diary entry created");
    Ok(committed)
}

/// Handles `UpdateEntry`.
///
/// # Errors
///
/// `DomainError::Validation` if the entry does not exist or was deleted, or
/// a store error from loading or saving.
#[instrument(skip_all, fields(entry_id = %command.entry_id))]
pub async fn handle_update_entry<S: EventStore>(
    command: &UpdateEntry,
    clock: &dyn Clock,
    repo: &AggregateRepository<S>,
) -> Result<Vec<Event>, DomainError> {
    let mut entry: DiaryEntry = repo.load(command.entry_id).await?;
    entry.update(command, clock)?;
    repo.save(&mut entry).await
}

/// Handles `DeleteEntry`.
///
/// # Errors
///
/// `DomainError::Validation` if the entry does not exist or was already
/// deleted, or a store error from loading or saving.
#[instrument(skip_all, fields(entry_id = %command.entry_id))]
pub async fn handle_delete_entry<S: EventStore>(
    command: &DeleteEntry,
    clock: &dyn Clock,
    repo: &AggregateRepository<S>,
) -> Result<Vec<Event>, DomainError> {
    let mut entry: DiaryEntry = repo.load(command.entry_id).await?;
    entry.delete(command, clock)?;
    let committed = repo.save(&mut entry).await?;
    info!(version = entry.version(), "diary entry deleted");
    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chronicle_core::error::{ErrorKind, EventStoreError};
    use chronicle_event_store::InMemoryEventStore;
    use chronicle_test_support::{
        FailingEventStore, FailingPublisher, FixedClock, RecordingEventStore, RecordingPublisher,
    };
    use std::sync::Arc;
    use uuid::Uuid;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn create(entry_id: Uuid) -> CreateEntry {
        CreateEntry {
            correlation_id: Uuid::new_v4(),
            entry_id,
            user_id: "user-1".into(),
            title: "Morning pages".into(),
            content: "Three pages, longhand.".into(),
            token_count: 120,
            session_id: "s-1".into(),
            tags: vec!["routine".into()],
        }
    }

    #[tokio::test]
    async fn test_handle_create_entry_saves_one_event_at_version_one() {
        // Arrange
        let entry_id = Uuid::new_v4();
        let repo = AggregateRepository::new(RecordingEventStore::new(Vec::new()));

        // Act
        let committed = handle_create_entry(&create(entry_id), &clock(), &repo)
            .await
            .unwrap();

        // Assert
        let saved = repo.store().saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0], committed);
        assert_eq!(committed[0].event_type, "DiaryEntryCreated");
        assert_eq!(committed[0].version, 1);
        assert_eq!(committed[0].aggregate_id, entry_id);
        assert_eq!(committed[0].timestamp, clock().0);
    }

    #[tokio::test]
    async fn test_full_lifecycle_against_in_memory_store() {
        // Arrange
        let repo = AggregateRepository::new(InMemoryEventStore::new());
        let entry_id = Uuid::new_v4();

        // Act
        handle_create_entry(&create(entry_id), &clock(), &repo)
            .await
            .unwrap();
        handle_update_entry(
            &UpdateEntry {
                entry_id,
                title: "Evening pages".into(),
                ..UpdateEntry::default()
            },
            &clock(),
            &repo,
        )
        .await
        .unwrap();
        handle_delete_entry(
            &DeleteEntry {
                entry_id,
                reason: "moved to journal".into(),
                ..DeleteEntry::default()
            },
            &clock(),
            &repo,
        )
        .await
        .unwrap();

        // Assert
        let history = repo.store().load_by_aggregate(entry_id).await.unwrap();
        let types: Vec<&str> = history.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            ["DiaryEntryCreated", "DiaryEntryUpdated", "DiaryEntryDeleted"]
        );
        let entry: DiaryEntry = repo.load(entry_id).await.unwrap();
        assert!(entry.is_deleted());
        assert_eq!(entry.title(), "Evening pages");
        assert_eq!(entry.version(), 3);
    }

    #[tokio::test]
    async fn test_create_for_existing_entry_touches_nothing() {
        let repo = AggregateRepository::new(InMemoryEventStore::new());
        let entry_id = Uuid::new_v4();
        handle_create_entry(&create(entry_id), &clock(), &repo)
            .await
            .unwrap();

        let result = handle_create_entry(&create(entry_id), &clock(), &repo).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(repo.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_update_of_unknown_entry_is_a_validation_error() {
        let repo = AggregateRepository::new(InMemoryEventStore::new());

        let result = handle_update_entry(
            &UpdateEntry {
                entry_id: Uuid::new_v4(),
                content: "orphan".into(),
                ..UpdateEntry::default()
            },
            &clock(),
            &repo,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_store_failure_propagates_with_its_kind() {
        let repo = AggregateRepository::new(FailingEventStore);

        let result = handle_create_entry(&create(Uuid::new_v4()), &clock(), &repo).await;

        match result {
            Err(DomainError::Store(err @ EventStoreError::ConnectionFailed { .. })) => {
                assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
            }
            other => panic!("expected connection failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_committed_events_are_published_under_prefixed_topic() {
        // Arrange
        let publisher = Arc::new(RecordingPublisher::new("chronicle"));
        let repo = AggregateRepository::new(InMemoryEventStore::new())
            .with_publisher(publisher.clone());

        // Act
        let committed = handle_create_entry(&create(Uuid::new_v4()), &clock(), &repo)
            .await
            .unwrap();

        // Assert
        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "chronicle.DiaryEntryCreated");
        assert_eq!(published[0].1, committed[0]);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_the_save() {
        let repo = AggregateRepository::new(InMemoryEventStore::new())
            .with_publisher(Arc::new(FailingPublisher));
        let entry_id = Uuid::new_v4();

        let result = handle_create_entry(&create(entry_id), &clock(), &repo).await;

        assert!(result.is_ok());
        assert_eq!(repo.store().len().await, 1);
    }
}
