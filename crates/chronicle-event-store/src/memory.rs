//! In-memory `EventStore`, the reference realisation of the contract.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use chronicle_core::error::EventStoreError;
use chronicle_core::event::Event;
use chronicle_core::store::{EventStore, TimeRange, validate_batch};

#[derive(Debug, Default)]
struct Log {
    events: Vec<Event>,
    /// Aggregate id -> positions in `events`, in append order.
    index: HashMap<Uuid, Vec<usize>>,
}

impl Log {
    fn current_version(&self, aggregate_id: Uuid) -> i64 {
        self.index
            .get(&aggregate_id)
            .and_then(|positions| positions.iter().map(|&i| self.events[i].version).max())
            .unwrap_or(0)
    }

    fn history(&self, aggregate_id: Uuid, up_to_version: i64) -> Vec<Event> {
        let Some(positions) = self.index.get(&aggregate_id) else {
            return Vec::new();
        };
        let mut history: Vec<Event> = positions
            .iter()
            .map(|&i| &self.events[i])
            .filter(|e| e.version <= up_to_version)
            .cloned()
            .collect();
        history.sort_by_key(|e| e.version);
        history
    }
}

/// A single shared log behind one read/write lock.
///
/// `save` validates the whole group under the write lock before appending
/// anything, so a rejected group leaves no trace.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    log: RwLock<Log>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every event.
    pub async fn clear(&self) {
        let mut log = self.log.write().await;
        log.events.clear();
        log.index.clear();
    }

    /// Total number of stored events across all aggregates.
    pub async fn len(&self) -> usize {
        self.log.read().await.events.len()
    }

    /// Whether no events are stored.
    pub async fn is_empty(&self) -> bool {
        self.log.read().await.events.is_empty()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn save(&self, events: &[Event]) -> Result<(), EventStoreError> {
        let Some(span) = validate_batch(events)? else {
            return Ok(());
        };

        let mut log = self.log.write().await;
        let current = log.current_version(span.aggregate_id);
        if current != span.expected_current_version() {
            warn!(aggregate_id = %span.aggregate_id, current, first = span.first_version, "version conflict");
            return Err(span.conflict(current));
        }

        for event in events {
            log.events.push(event.clone());
            let position = log.events.len() - 1;
            log.index
                .entry(event.aggregate_id)
                .or_default()
                .push(position);
        }
        debug!(aggregate_id = %span.aggregate_id, version = span.last_version, "events appended");
        Ok(())
    }

    async fn load_by_aggregate(&self, aggregate_id: Uuid) -> Result<Vec<Event>, EventStoreError> {
        Ok(self.log.read().await.history(aggregate_id, i64::MAX))
    }

    async fn load_by_type(&self, event_type: &str) -> Result<Vec<Event>, EventStoreError> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn load_by_aggregate_up_to_version(
        &self,
        aggregate_id: Uuid,
        version: i64,
    ) -> Result<Vec<Event>, EventStoreError> {
        Ok(self.log.read().await.history(aggregate_id, version))
    }

    async fn load_by_time_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<Event>, EventStoreError> {
        let range = TimeRange::parse(start, end)?;
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| range.contains(e.timestamp))
            .cloned()
            .collect())
    }
}
