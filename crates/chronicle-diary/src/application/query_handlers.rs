//! Query handlers for diary entries.
//!
//! Reconstitute the entry from its history and return a read-only view.

use chrono::{DateTime, Utc};
use chronicle_core::aggregate::Aggregate;
use chronicle_core::error::{DomainError, EventStoreError};
use chronicle_core::repository::AggregateRepository;
use chronicle_core::store::EventStore;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::DiaryEntry;

/// Read-only view of a diary entry.
#[derive(Debug, Serialize)]
pub struct DiaryEntryView {
    /// The entry identifier.
    pub entry_id: Uuid,
    /// Author.
    pub user_id: String,
    /// Title.
    pub title: String,
    /// Body.
    pub content: String,
    /// Tokens consumed producing the entry.
    pub token_count: u32,
    /// Originating session.
    pub session_id: String,
    /// Labels.
    pub tags: Vec<String>,
    /// Whether the entry was deleted.
    pub deleted: bool,
    /// Why it was deleted.
    pub deleted_reason: Option<String>,
    /// When it was written.
    pub created_at: Option<DateTime<Utc>>,
    /// When it last changed.
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of events folded.
    pub version: i64,
}

impl From<&DiaryEntry> for DiaryEntryView {
    fn from(entry: &DiaryEntry) -> Self {
        Self {
            entry_id: entry.id(),
            user_id: entry.user_id.clone(),
            title: entry.title.clone(),
            content: entry.content.clone(),
            token_count: entry.token_count,
            session_id: entry.session_id.clone(),
            tags: entry.tags.clone(),
            deleted: entry.deleted,
            deleted_reason: entry.deleted_reason.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            version: entry.version(),
        }
    }
}

/// Retrieves an entry by id.
///
/// # Errors
///
/// `EventStoreError::EventNotFound` (wrapped) if the entry has no history,
/// or any load or fold failure.
pub async fn get_entry_by_id<S: EventStore>(
    entry_id: Uuid,
    repo: &AggregateRepository<S>,
) -> Result<DiaryEntryView, DomainError> {
    let entry: DiaryEntry = repo.load_existing(entry_id).await?;
    Ok(DiaryEntryView::from(&entry))
}

/// Retrieves an entry as it stood at `version`.
///
/// # Errors
///
/// `EventStoreError::EventNotFound` (wrapped) if nothing existed at that
/// version, or any load or fold failure.
pub async fn get_entry_at_version<S: EventStore>(
    entry_id: Uuid,
    version: i64,
    repo: &AggregateRepository<S>,
) -> Result<DiaryEntryView, DomainError> {
    let entry: DiaryEntry = repo.load_at(entry_id, version).await?;
    if entry.version() == 0 {
        return Err(EventStoreError::EventNotFound(entry_id).into());
    }
    Ok(DiaryEntryView::from(&entry))
}
