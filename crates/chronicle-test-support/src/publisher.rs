//! Test publishers.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::bus::{EventPublisher, PublishError, topic_for};
use chronicle_core::event::Event;

/// Records every published event together with the topic it went to.
#[derive(Debug)]
pub struct RecordingPublisher {
    prefix: String,
    published: Mutex<Vec<(String, Event)>>,
}

impl RecordingPublisher {
    /// Publishes under `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of `(topic, event)` pairs in publish order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<(String, Event)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    fn topic_prefix(&self) -> &str {
        &self.prefix
    }

    async fn publish(&self, event: &Event) -> Result<(), PublishError> {
        let topic = topic_for(&self.prefix, &event.event_type);
        self.published.lock().unwrap().push((topic, event.clone()));
        Ok(())
    }
}

/// A publisher whose transport is always down.
#[derive(Debug)]
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    fn topic_prefix(&self) -> &str {
        "failing"
    }

    async fn publish(&self, event: &Event) -> Result<(), PublishError> {
        Err(PublishError {
            topic: topic_for(self.topic_prefix(), &event.event_type),
            event_type: event.event_type.clone(),
            message: "broker unreachable".into(),
        })
    }
}
