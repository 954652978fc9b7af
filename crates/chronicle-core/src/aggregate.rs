//! Aggregate root abstraction and the shared version bookkeeping.

use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::DomainError;
use crate::event::{Event, Metadata};

/// Identity, fold position and staged events common to every aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateBase {
    id: Uuid,
    version: i64,
    uncommitted_events: Vec<Event>,
}

impl AggregateBase {
    /// A fresh, unloaded aggregate at version 0.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            uncommitted_events: Vec::new(),
        }
    }

    /// Aggregate identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Version of the last applied event; 0 before any.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Advances the fold position by one. Called once per applied event.
    pub fn increment_version(&mut self) {
        self.version += 1;
    }

    pub(crate) fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    /// Appends to the uncommitted sequence without touching domain state.
    pub fn stage(&mut self, event: Event) {
        self.uncommitted_events.push(event);
    }

    /// Builds the event at `version + 1` and stages it.
    ///
    /// The version is derived from folded state only, so staging two events
    /// without confirming the first yields a pair the store will reject.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Store` if the payload cannot be encoded.
    pub fn record<T: Serialize + ?Sized>(
        &mut self,
        event_type: &str,
        payload: &T,
        metadata: impl Into<Metadata>,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let event = Event::new(
            event_type,
            self.id,
            self.version + 1,
            payload,
            metadata,
            clock,
        )?;
        self.stage(event);
        Ok(())
    }

    /// Events staged but not yet durably appended.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[Event] {
        &self.uncommitted_events
    }

    /// Drops the staged events.
    pub fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }

    fn take_uncommitted_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}

/// An entity whose state is derived entirely by folding its event history.
///
/// Implementors supply construction, access to their [`AggregateBase`] and an
/// exhaustive `apply_event`; everything else has a default.
pub trait Aggregate: Send + Sync {
    /// Name of this aggregate kind, used in error messages.
    const KIND: &'static str;

    /// A fresh, unloaded aggregate.
    fn new(id: Uuid) -> Self
    where
        Self: Sized;

    /// Shared bookkeeping.
    fn base(&self) -> &AggregateBase;

    /// Shared bookkeeping, mutably.
    fn base_mut(&mut self) -> &mut AggregateBase;

    /// Folds one event into state and increments the version.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnrecognizedEventType` for a type this kind never
    /// produces, or `DomainError::MalformedPayload` if the body does not decode.
    fn apply_event(&mut self, event: &Event) -> Result<(), DomainError>;

    /// Aggregate identifier.
    fn id(&self) -> Uuid {
        self.base().id()
    }

    /// Current fold position.
    fn version(&self) -> i64 {
        self.base().version()
    }

    /// Advances the fold position; only `apply_event` calls this.
    fn increment_version(&mut self) {
        self.base_mut().increment_version();
    }

    /// Stages an event for the next save.
    fn stage(&mut self, event: Event) {
        self.base_mut().stage(event);
    }

    /// Events staged but not yet durably appended.
    fn uncommitted_events(&self) -> &[Event] {
        self.base().uncommitted_events()
    }

    /// Drops staged events. Call only after a confirmed append.
    fn clear_uncommitted_events(&mut self) {
        self.base_mut().clear_uncommitted_events();
    }

    /// Replays history, which must already be sorted by ascending version.
    ///
    /// Every event is checked for ownership before any is applied, so a
    /// mismatched history leaves the aggregate untouched.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MismatchedAggregate` if any event belongs to
    /// another aggregate, or whatever `apply_event` fails with.
    fn load_from_history(&mut self, events: &[Event]) -> Result<(), DomainError> {
        let id = self.id();
        if let Some(foreign) = events.iter().find(|e| e.aggregate_id != id) {
            return Err(DomainError::MismatchedAggregate {
                expected: id,
                actual: foreign.aggregate_id,
            });
        }

        for event in events {
            self.apply_event(event)?;
        }

        if let Some(last) = events.last() {
            self.base_mut().set_version(last.version);
        }
        Ok(())
    }

    /// Folds the staged events into state and clears them. Call after the
    /// store has confirmed the append.
    ///
    /// # Errors
    ///
    /// Returns whatever `apply_event` fails with.
    fn confirm_uncommitted_events(&mut self) -> Result<(), DomainError> {
        let staged = self.base_mut().take_uncommitted_events();
        for event in &staged {
            self.apply_event(event)?;
        }
        Ok(())
    }
}
