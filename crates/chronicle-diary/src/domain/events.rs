//! Domain events for diary entries.

use chronicle_core::aggregate::Aggregate;
use chronicle_core::error::DomainError;
use chronicle_core::event::Event;
use serde::{Deserialize, Serialize};

use super::aggregates::DiaryEntry;

/// Event type of [`DiaryEntryCreated`].
pub const DIARY_ENTRY_CREATED: &str = "DiaryEntryCreated";
/// Event type of [`DiaryEntryUpdated`].
pub const DIARY_ENTRY_UPDATED: &str = "DiaryEntryUpdated";
/// Event type of [`DiaryEntryDeleted`].
pub const DIARY_ENTRY_DELETED: &str = "DiaryEntryDeleted";

/// Emitted when an entry is first written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntryCreated {
    /// Author.
    pub user_id: String,
    /// Entry title.
    pub title: String,
    /// Entry body.
    pub content: String,
    /// Tokens consumed producing the entry.
    pub token_count: u32,
    /// Conversation session the entry came from.
    pub session_id: String,
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Emitted when an entry is revised. Empty or zero fields are omitted on
/// the wire and leave the current value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntryUpdated {
    /// Replacement title, if non-empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Replacement body, if non-empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// Replacement token count, if non-zero.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub token_count: u32,
    /// Replacement tags, if present. `Some(vec![])` clears them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Emitted when an entry is removed. The history is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntryDeleted {
    /// Why it was removed.
    #[serde(default)]
    pub reason: String,
}

/// Every event a diary entry can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiaryEvent {
    /// The entry was written.
    Created(DiaryEntryCreated),
    /// The entry was revised.
    Updated(DiaryEntryUpdated),
    /// The entry was removed.
    Deleted(DiaryEntryDeleted),
}

impl DiaryEvent {
    /// The stored event type.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => DIARY_ENTRY_CREATED,
            Self::Updated(_) => DIARY_ENTRY_UPDATED,
            Self::Deleted(_) => DIARY_ENTRY_DELETED,
        }
    }

    /// Decodes a stored event by its type tag.
    ///
    /// # Errors
    ///
    /// `UnrecognizedEventType` for a type no diary entry produces, or
    /// `MalformedPayload` if the body does not match the type.
    pub fn decode(event: &Event) -> Result<Self, DomainError> {
        match event.event_type.as_str() {
            DIARY_ENTRY_CREATED => event.decode_payload().map(Self::Created),
            DIARY_ENTRY_UPDATED => event.decode_payload().map(Self::Updated),
            DIARY_ENTRY_DELETED => event.decode_payload().map(Self::Deleted),
            other => Err(DomainError::UnrecognizedEventType {
                aggregate_kind: DiaryEntry::KIND,
                event_type: other.to_owned(),
            }),
        }
    }
}
