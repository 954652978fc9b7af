//! Command abstractions.

use uuid::Uuid;

use crate::event::EventMetadata;

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// The acting user, if the command carries one.
    fn user_id(&self) -> Option<&str> {
        None
    }

    /// Metadata stamped on every event this command produces. The command
    /// is its own cause, so causation and correlation coincide.
    fn event_metadata(&self) -> EventMetadata {
        let metadata = EventMetadata::new(self.correlation_id(), self.correlation_id());
        match self.user_id() {
            Some(user_id) => metadata.with_user(user_id),
            None => metadata,
        }
    }
}
