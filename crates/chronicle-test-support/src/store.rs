//! Test stores. For a store that actually enforces the contract use
//! `chronicle_event_store::InMemoryEventStore`.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::error::EventStoreError;
use chronicle_core::event::Event;
use chronicle_core::store::EventStore;
use uuid::Uuid;

/// Returns a fixed history from every aggregate read and records every
/// `save` call without checking versions.
#[derive(Debug)]
pub struct RecordingEventStore {
    history: Vec<Event>,
    saved: Mutex<Vec<Vec<Event>>>,
}

impl RecordingEventStore {
    /// Every aggregate read returns `history`.
    #[must_use]
    pub fn new(history: Vec<Event>) -> Self {
        Self {
            history,
            saved: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the groups passed to `save`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved(&self) -> Vec<Vec<Event>> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    async fn save(&self, events: &[Event]) -> Result<(), EventStoreError> {
        self.saved.lock().unwrap().push(events.to_vec());
        Ok(())
    }

    async fn load_by_aggregate(&self, _aggregate_id: Uuid) -> Result<Vec<Event>, EventStoreError> {
        Ok(self.history.clone())
    }

    async fn load_by_type(&self, event_type: &str) -> Result<Vec<Event>, EventStoreError> {
        Ok(self
            .history
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn load_by_aggregate_up_to_version(
        &self,
        _aggregate_id: Uuid,
        version: i64,
    ) -> Result<Vec<Event>, EventStoreError> {
        Ok(self
            .history
            .iter()
            .filter(|e| e.version <= version)
            .cloned()
            .collect())
    }

    async fn load_by_time_range(
        &self,
        _start: &str,
        _end: &str,
    ) -> Result<Vec<Event>, EventStoreError> {
        Ok(self.history.clone())
    }
}

/// Has no history and silently accepts every save.
#[derive(Debug)]
pub struct EmptyEventStore;

#[async_trait]
impl EventStore for EmptyEventStore {
    async fn save(&self, _events: &[Event]) -> Result<(), EventStoreError> {
        Ok(())
    }

    async fn load_by_aggregate(&self, _aggregate_id: Uuid) -> Result<Vec<Event>, EventStoreError> {
        Ok(vec![])
    }

    async fn load_by_type(&self, _event_type: &str) -> Result<Vec<Event>, EventStoreError> {
        Ok(vec![])
    }

    async fn load_by_aggregate_up_to_version(
        &self,
        _aggregate_id: Uuid,
        _version: i64,
    ) -> Result<Vec<Event>, EventStoreError> {
        Ok(vec![])
    }

    async fn load_by_time_range(
        &self,
        _start: &str,
        _end: &str,
    ) -> Result<Vec<Event>, EventStoreError> {
        Ok(vec![])
    }
}

/// Fails every operation as if the backend were unreachable.
#[derive(Debug)]
pub struct FailingEventStore;

fn refused(operation: &'static str) -> EventStoreError {
    EventStoreError::connection(operation, "connection refused")
}

#[async_trait]
impl EventStore for FailingEventStore {
    async fn save(&self, _events: &[Event]) -> Result<(), EventStoreError> {
        Err(refused("save"))
    }

    async fn load_by_aggregate(&self, _aggregate_id: Uuid) -> Result<Vec<Event>, EventStoreError> {
        Err(refused("load_by_aggregate"))
    }

    async fn load_by_type(&self, _event_type: &str) -> Result<Vec<Event>, EventStoreError> {
        Err(refused("load_by_type"))
    }

    async fn load_by_aggregate_up_to_version(
        &self,
        _aggregate_id: Uuid,
        _version: i64,
    ) -> Result<Vec<Event>, EventStoreError> {
        Err(refused("load_by_aggregate_up_to_version"))
    }

    async fn load_by_time_range(
        &self,
        _start: &str,
        _end: &str,
    ) -> Result<Vec<Event>, EventStoreError> {
        Err(refused("load_by_time_range"))
    }
}
