//! Event store contract and the checks every backend shares.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EventStoreError;
use crate::event::Event;

/// Append-only, per-aggregate event ledger with optimistic concurrency.
///
/// `save` is all-or-nothing except where a backend documents otherwise, and
/// rejects any group that does not immediately follow the persisted history
/// with [`EventStoreError::VersionConflict`]. Nothing is retried internally.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a group of events for a single aggregate.
    ///
    /// An empty group is a successful no-op.
    ///
    /// # Errors
    ///
    /// `InvalidBatch` for mixed aggregates or non-positive versions,
    /// `VersionConflict` when the group does not continue the history, or a
    /// connection/storage failure from the backend.
    async fn save(&self, events: &[Event]) -> Result<(), EventStoreError>;

    /// Full history of one aggregate, ascending by version. Empty if none.
    ///
    /// # Errors
    ///
    /// Backend connection, storage or decoding failures.
    async fn load_by_aggregate(&self, aggregate_id: Uuid) -> Result<Vec<Event>, EventStoreError>;

    /// Every event of one type across all aggregates, in backend order.
    ///
    /// # Errors
    ///
    /// Backend connection, storage or decoding failures.
    async fn load_by_type(&self, event_type: &str) -> Result<Vec<Event>, EventStoreError>;

    /// History of one aggregate truncated to versions `<= version`.
    ///
    /// # Errors
    ///
    /// Backend connection, storage or decoding failures.
    async fn load_by_aggregate_up_to_version(
        &self,
        aggregate_id: Uuid,
        version: i64,
    ) -> Result<Vec<Event>, EventStoreError>;

    /// Events whose timestamp falls in the closed range `[start, end]`, both
    /// given as RFC 3339 date-times.
    ///
    /// # Errors
    ///
    /// A serialization error for malformed bounds, raised before the backend
    /// is contacted, or backend connection, storage or decoding failures.
    async fn load_by_time_range(&self, start: &str, end: &str)
    -> Result<Vec<Event>, EventStoreError>;
}

#[async_trait]
impl<S: EventStore + ?Sized> EventStore for Arc<S> {
    async fn save(&self, events: &[Event]) -> Result<(), EventStoreError> {
        (**self).save(events).await
    }

    async fn load_by_aggregate(&self, aggregate_id: Uuid) -> Result<Vec<Event>, EventStoreError> {
        (**self).load_by_aggregate(aggregate_id).await
    }

    async fn load_by_type(&self, event_type: &str) -> Result<Vec<Event>, EventStoreError> {
        (**self).load_by_type(event_type).await
    }

    async fn load_by_aggregate_up_to_version(
        &self,
        aggregate_id: Uuid,
        version: i64,
    ) -> Result<Vec<Event>, EventStoreError> {
        (**self)
            .load_by_aggregate_up_to_version(aggregate_id, version)
            .await
    }

    async fn load_by_time_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<Event>, EventStoreError> {
        (**self).load_by_time_range(start, end).await
    }
}

/// The aggregate and version span covered by a validated group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSpan {
    /// The single aggregate every event belongs to.
    pub aggregate_id: Uuid,
    /// Version of the first event.
    pub first_version: i64,
    /// Version of the last event.
    pub last_version: i64,
}

impl BatchSpan {
    /// The persisted version this group must immediately follow.
    #[must_use]
    pub fn expected_current_version(&self) -> i64 {
        self.first_version - 1
    }

    /// The conflict to report when the persisted version is `actual`.
    #[must_use]
    pub fn conflict(&self, actual: i64) -> EventStoreError {
        EventStoreError::VersionConflict {
            aggregate_id: self.aggregate_id,
            expected: self.expected_current_version(),
            actual,
        }
    }
}

/// Checks the shape of a group before any backend is touched.
///
/// Returns `None` for an empty group.
///
/// # Errors
///
/// `InvalidBatch` if events belong to different aggregates or carry a
/// non-positive version; `VersionConflict` if versions are not contiguous.
pub fn validate_batch(events: &[Event]) -> Result<Option<BatchSpan>, EventStoreError> {
    let Some(first) = events.first() else {
        return Ok(None);
    };

    if first.version < 1 {
        return Err(EventStoreError::InvalidBatch(format!(
            "event {} has non-positive version {}",
            first.id, first.version
        )));
    }

    let mut previous = first;
    for event in &events[1..] {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidBatch(format!(
                "all events must share one aggregate id: found {} and {}",
                first.aggregate_id, event.aggregate_id
            )));
        }
        if event.version != previous.version + 1 {
            return Err(EventStoreError::VersionConflict {
                aggregate_id: first.aggregate_id,
                expected: previous.version,
                actual: event.version - 1,
            });
        }
        previous = event;
    }

    Ok(Some(BatchSpan {
        aggregate_id: first.aggregate_id,
        first_version: first.version,
        last_version: previous.version,
    }))
}

/// A closed creation-time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Inclusive upper bound.
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Parses RFC 3339 bounds, normalising to UTC.
    ///
    /// # Errors
    ///
    /// A serialization error naming the malformed bound.
    pub fn parse(start: &str, end: &str) -> Result<Self, EventStoreError> {
        let parse = |raw: &str, which: &str| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    EventStoreError::serialization(
                        "load_by_time_range",
                        format!("invalid {which} time {raw:?}: {e}"),
                    )
                })
        };
        Ok(Self {
            start: parse(start, "start")?,
            end: parse(end, "end")?,
        })
    }

    /// Whether `at` lies within the range.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}
