//! Load/save round trip between aggregates and an event store.

use std::sync::Arc;

use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::bus::EventPublisher;
use crate::error::{DomainError, EventStoreError};
use crate::event::Event;
use crate::store::EventStore;

/// Replays aggregates from a store and appends what they stage.
pub struct AggregateRepository<S> {
    store: S,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl<S: EventStore> AggregateRepository<S> {
    /// Creates a repository over `store` with no publisher attached.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            publisher: None,
        }
    }

    /// Hands every committed event to `publisher` after a successful save.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replays the full history. A never-written id yields a fresh aggregate.
    ///
    /// # Errors
    ///
    /// Store failures, or whatever the fold fails with.
    #[instrument(skip(self), fields(kind = A::KIND))]
    pub async fn load<A: Aggregate>(&self, id: Uuid) -> Result<A, DomainError> {
        let history = self.store.load_by_aggregate(id).await?;
        replay(id, &history)
    }

    /// Like [`load`](Self::load), but fails if the aggregate was never written.
    ///
    /// # Errors
    ///
    /// `EventStoreError::EventNotFound` for an empty history, plus everything
    /// `load` can fail with.
    pub async fn load_existing<A: Aggregate>(&self, id: Uuid) -> Result<A, DomainError> {
        let history = self.store.load_by_aggregate(id).await?;
        if history.is_empty() {
            return Err(EventStoreError::EventNotFound(id).into());
        }
        replay(id, &history)
    }

    /// Reconstructs state as of `version`.
    ///
    /// # Errors
    ///
    /// Store failures, or whatever the fold fails with.
    #[instrument(skip(self), fields(kind = A::KIND))]
    pub async fn load_at<A: Aggregate>(&self, id: Uuid, version: i64) -> Result<A, DomainError> {
        let history = self
            .store
            .load_by_aggregate_up_to_version(id, version)
            .await?;
        replay(id, &history)
    }

    /// Appends the staged events, then folds them into the aggregate and
    /// clears them. On a store error the aggregate is left as it was, staged
    /// events included, so the caller can inspect them before reloading.
    ///
    /// Returns the committed events.
    ///
    /// # Errors
    ///
    /// Store failures (notably `VersionConflict`), or a fold failure.
    #[instrument(skip(self, aggregate), fields(kind = A::KIND, aggregate_id = %aggregate.id()))]
    pub async fn save<A: Aggregate>(&self, aggregate: &mut A) -> Result<Vec<Event>, DomainError> {
        let events = aggregate.uncommitted_events().to_vec();
        if events.is_empty() {
            return Ok(events);
        }

        self.store.save(&events).await?;
        aggregate.confirm_uncommitted_events()?;
        debug!(count = events.len(), version = aggregate.version(), "events committed");

        if let Some(publisher) = &self.publisher {
            for event in &events {
                // The append already succeeded; a transport failure must not
                // be reported as a failed save.
                if let Err(err) = publisher.publish(event).await {
                    error!(event_id = %event.id, %err, "failed to publish committed event");
                }
            }
        }

        Ok(events)
    }
}

fn replay<A: Aggregate>(id: Uuid, history: &[Event]) -> Result<A, DomainError> {
    let mut aggregate = A::new(id);
    aggregate.load_from_history(history)?;
    Ok(aggregate)
}
