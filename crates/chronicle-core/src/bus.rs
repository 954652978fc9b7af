//! Publish boundary for committed events. Transports live outside this crate.

use async_trait::async_trait;
use thiserror::Error;

use crate::event::Event;

/// A committed event could not be handed to the transport.
#[derive(Debug, Error)]
#[error("failed to publish {event_type} to {topic}: {message}")]
pub struct PublishError {
    /// Destination topic.
    pub topic: String,
    /// Type of the event being published.
    pub event_type: String,
    /// Transport-provided detail.
    pub message: String,
}

/// Fans committed events out to other processes.
///
/// Delivery is at-least-once; ordering is only promised within one
/// aggregate's version sequence.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Prefix prepended to every topic.
    fn topic_prefix(&self) -> &str;

    /// Publishes one committed event to `topic_for(prefix, event.event_type)`.
    ///
    /// # Errors
    ///
    /// `PublishError` if the transport refuses the message.
    async fn publish(&self, event: &Event) -> Result<(), PublishError>;
}

/// Topic an event of `event_type` is published under.
#[must_use]
pub fn topic_for(prefix: &str, event_type: &str) -> String {
    format!("{prefix}.{event_type}")
}
