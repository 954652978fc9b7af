//! Wide-column `EventStore`: one partition per aggregate, batch appends.
//!
//! The backing store has no compare-and-swap across rows, so `save` reads
//! the partition's current version, rejects the group if it does not follow
//! on, and only then submits every row in one logged batch. Two writers can
//! both pass the pre-check and race on the batch; that window is accepted
//! and surfaces to callers as the usual reload-and-retry. A failure after
//! the pre-check is reported as a storage error and the caller must reload
//! history to learn what was persisted.

pub mod schema;
pub mod scylla;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use chronicle_core::error::EventStoreError;
use chronicle_core::event::{Event, Metadata, Payload};
use chronicle_core::store::{EventStore, TimeRange, validate_batch};

/// Partition key of one aggregate's log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    /// Configured aggregate kind.
    pub aggregate_kind: String,
    /// The aggregate.
    pub aggregate_id: Uuid,
}

/// One row of the events table.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    /// Partition key, first half.
    pub aggregate_kind: String,
    /// Partition key, second half.
    pub aggregate_id: Uuid,
    /// Clustering column.
    pub version: i64,
    /// Event id.
    pub event_id: Uuid,
    /// Event type, secondary-indexed.
    pub event_type: String,
    /// Payload JSON text.
    pub payload: String,
    /// Metadata JSON text.
    pub metadata: String,
    /// Creation time, secondary-indexed.
    pub created_at: DateTime<Utc>,
}

/// The native operations the adapter needs from a wide-column driver.
///
/// Implementations map every driver failure into an [`EventStoreError`].
#[async_trait]
pub trait WideColumnSession: Send + Sync {
    /// Highest persisted version in `partition`, 0 when it is empty.
    async fn current_version(&self, partition: &PartitionKey) -> Result<i64, EventStoreError>;

    /// Writes every row in one atomic batch.
    async fn insert_batch(&self, rows: &[EventRow]) -> Result<(), EventStoreError>;

    /// Rows of one partition in clustering order, optionally `version <= bound`.
    async fn select_partition(
        &self,
        partition: &PartitionKey,
        up_to_version: Option<i64>,
    ) -> Result<Vec<EventRow>, EventStoreError>;

    /// Rows of one event type, in whatever order the index yields.
    async fn select_by_type(&self, event_type: &str) -> Result<Vec<EventRow>, EventStoreError>;

    /// Rows created within `range`, inclusive.
    async fn select_by_time_range(
        &self,
        range: TimeRange,
    ) -> Result<Vec<EventRow>, EventStoreError>;
}

/// [`EventStore`] over any [`WideColumnSession`].
#[derive(Debug)]
pub struct WideColumnEventStore<S> {
    session: S,
    aggregate_kind: String,
}

impl<S: WideColumnSession> WideColumnEventStore<S> {
    /// Serves every aggregate under the partition kind `aggregate_kind`.
    pub fn new(session: S, aggregate_kind: impl Into<String>) -> Self {
        Self {
            session,
            aggregate_kind: aggregate_kind.into(),
        }
    }

    /// The underlying session.
    pub fn session(&self) -> &S {
        &self.session
    }

    fn partition(&self, aggregate_id: Uuid) -> PartitionKey {
        PartitionKey {
            aggregate_kind: self.aggregate_kind.clone(),
            aggregate_id,
        }
    }

    fn to_row(&self, event: &Event) -> Result<EventRow, EventStoreError> {
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|e| EventStoreError::serialization("save", e))?;
        Ok(EventRow {
            aggregate_kind: self.aggregate_kind.clone(),
            aggregate_id: event.aggregate_id,
            version: event.version,
            event_id: event.id,
            event_type: event.event_type.clone(),
            payload: event.payload.as_str().to_owned(),
            metadata,
            created_at: event.timestamp,
        })
    }
}

fn from_row(operation: &'static str, row: EventRow) -> Result<Event, EventStoreError> {
    let metadata: Metadata = serde_json::from_str(&row.metadata).map_err(|e| {
        EventStoreError::serialization(operation, format!("metadata of event {}: {e}", row.event_id))
    })?;
    let payload = Payload::from_json(row.payload).map_err(|e| {
        EventStoreError::serialization(operation, format!("payload of event {}: {e}", row.event_id))
    })?;
    Ok(Event {
        id: row.event_id,
        event_type: row.event_type,
        aggregate_id: row.aggregate_id,
        version: row.version,
        timestamp: row.created_at,
        payload,
        metadata,
    })
}

fn from_rows(operation: &'static str, rows: Vec<EventRow>) -> Result<Vec<Event>, EventStoreError> {
    rows.into_iter().map(|row| from_row(operation, row)).collect()
}

#[async_trait]
impl<S: WideColumnSession> EventStore for WideColumnEventStore<S> {
    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn save(&self, events: &[Event]) -> Result<(), EventStoreError> {
        let Some(span) = validate_batch(events)? else {
            return Ok(());
        };
        let rows = events
            .iter()
            .map(|e| self.to_row(e))
            .collect::<Result<Vec<_>, _>>()?;

        let current = self
            .session
            .current_version(&self.partition(span.aggregate_id))
            .await?;
        if current != span.expected_current_version() {
            warn!(aggregate_id = %span.aggregate_id, current, first = span.first_version, "version conflict");
            return Err(span.conflict(current));
        }

        self.session.insert_batch(&rows).await?;
        debug!(aggregate_id = %span.aggregate_id, version = span.last_version, "batch written");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_by_aggregate(&self, aggregate_id: Uuid) -> Result<Vec<Event>, EventStoreError> {
        let rows = self
            .session
            .select_partition(&self.partition(aggregate_id), None)
            .await?;
        from_rows("load_by_aggregate", rows)
    }

    #[instrument(skip(self))]
    async fn load_by_type(&self, event_type: &str) -> Result<Vec<Event>, EventStoreError> {
        let rows = self.session.select_by_type(event_type).await?;
        from_rows("load_by_type", rows)
    }

    #[instrument(skip(self))]
    async fn load_by_aggregate_up_to_version(
        &self,
        aggregate_id: Uuid,
        version: i64,
    ) -> Result<Vec<Event>, EventStoreError> {
        if version < 1 {
            return Ok(Vec::new());
        }
        let rows = self
            .session
            .select_partition(&self.partition(aggregate_id), Some(version))
            .await?;
        from_rows("load_by_aggregate_up_to_version", rows)
    }

    #[instrument(skip(self))]
    async fn load_by_time_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<Event>, EventStoreError> {
        let range = TimeRange::parse(start, end)?;
        let rows = self.session.select_by_time_range(range).await?;
        from_rows("load_by_time_range", rows)
    }
}
