//! Commands for diary entries.

use chronicle_core::command::Command;
use uuid::Uuid;

/// Write a new entry.
#[derive(Debug, Clone)]
pub struct CreateEntry {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The entry to create.
    pub entry_id: Uuid,
    /// Author.
    pub user_id: String,
    /// Entry title. Required.
    pub title: String,
    /// Entry body.
    pub content: String,
    /// Tokens consumed producing the entry.
    pub token_count: u32,
    /// Conversation session the entry came from.
    pub session_id: String,
    /// Free-form labels.
    pub tags: Vec<String>,
}

/// Revise an existing entry. Empty or zero fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntry {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The entry to revise.
    pub entry_id: Uuid,
    /// Acting user, recorded in event metadata.
    pub user_id: Option<String>,
    /// New title.
    pub title: String,
    /// New body.
    pub content: String,
    /// New token count.
    pub token_count: u32,
    /// New tags; `None` keeps the current ones.
    pub tags: Option<Vec<String>>,
}

/// Remove an entry.
#[derive(Debug, Clone, Default)]
pub struct DeleteEntry {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The entry to remove.
    pub entry_id: Uuid,
    /// Acting user, recorded in event metadata.
    pub user_id: Option<String>,
    /// Why it is being removed.
    pub reason: String,
}

impl Command for CreateEntry {
    fn command_type(&self) -> &'static str {
        "diary.create_entry"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn user_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

impl Command for UpdateEntry {
    fn command_type(&self) -> &'static str {
        "diary.update_entry"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

impl Command for DeleteEntry {
    fn command_type(&self) -> &'static str {
        "diary.delete_entry"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}
