//! Aggregate root for diary entries.

use chrono::{DateTime, Utc};
use chronicle_core::aggregate::{Aggregate, AggregateBase};
use chronicle_core::clock::Clock;
use chronicle_core::command::Command;
use chronicle_core::error::DomainError;
use chronicle_core::event::Event;
use uuid::Uuid;

use super::commands::{CreateEntry, DeleteEntry, UpdateEntry};
use super::events::{DiaryEntryCreated, DiaryEntryDeleted, DiaryEntryUpdated, DiaryEvent};

/// A single diary entry.
///
/// Business operations check the folded state, stage one event at
/// `version + 1` and change nothing else; fields move only when the event is
/// applied after a successful save.
#[derive(Debug)]
pub struct DiaryEntry {
    base: AggregateBase,
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) token_count: u32,
    pub(crate) session_id: String,
    pub(crate) tags: Vec<String>,
    pub(crate) deleted: bool,
    pub(crate) deleted_reason: Option<String>,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl DiaryEntry {
    /// Whether a creation event has been applied.
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.title.is_empty()
    }

    /// Whether the entry has been deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Author.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Body.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Stages `DiaryEntryCreated`.
    ///
    /// # Errors
    ///
    /// `DomainError::Validation` if the entry already exists or the title is
    /// empty.
    pub fn create(&mut self, command: &CreateEntry, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.exists() {
            return Err(DomainError::Validation(format!(
                "diary entry {} already exists",
                self.id()
            )));
        }
        if command.title.trim().is_empty() {
            return Err(DomainError::Validation("diary entry title is required".into()));
        }

        self.record(
            &DiaryEvent::Created(DiaryEntryCreated {
                user_id: command.user_id.clone(),
                title: command.title.clone(),
                content: command.content.clone(),
                token_count: command.token_count,
                session_id: command.session_id.clone(),
                tags: command.tags.clone(),
            }),
            command,
            clock,
        )
    }

    /// Stages `DiaryEntryUpdated`.
    ///
    /// # Errors
    ///
    /// `DomainError::Validation` if the entry does not exist or was deleted.
    pub fn update(&mut self, command: &UpdateEntry, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_live("update")?;

        self.record(
            &DiaryEvent::Updated(DiaryEntryUpdated {
                title: command.title.clone(),
                content: command.content.clone(),
                token_count: command.token_count,
                tags: command.tags.clone(),
            }),
            command,
            clock,
        )
    }

    /// Stages `DiaryEntryDeleted`.
    ///
    /// # Errors
    ///
    /// `DomainError::Validation` if the entry does not exist or was already
    /// deleted.
    pub fn delete(&mut self, command: &DeleteEntry, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_live("delete")?;

        self.record(
            &DiaryEvent::Deleted(DiaryEntryDeleted {
                reason: command.reason.clone(),
            }),
            command,
            clock,
        )
    }

    fn ensure_live(&self, action: &str) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::Validation(format!(
                "cannot {action} diary entry {}: it does not exist",
                self.id()
            )));
        }
        if self.deleted {
            return Err(DomainError::Validation(format!(
                "cannot {action} diary entry {}: it has been deleted",
                self.id()
            )));
        }
        Ok(())
    }

    fn record(
        &mut self,
        event: &DiaryEvent,
        command: &dyn Command,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let metadata = command.event_metadata();
        let event_type = event.event_type();
        match event {
            DiaryEvent::Created(payload) => self.base.record(event_type, payload, metadata, clock),
            DiaryEvent::Updated(payload) => self.base.record(event_type, payload, metadata, clock),
            DiaryEvent::Deleted(payload) => self.base.record(event_type, payload, metadata, clock),
        }
    }
}

impl Aggregate for DiaryEntry {
    const KIND: &'static str = "diary_entry";

    fn new(id: Uuid) -> Self {
        Self {
            base: AggregateBase::new(id),
            user_id: String::new(),
            title: String::new(),
            content: String::new(),
            token_count: 0,
            session_id: String::new(),
            tags: Vec::new(),
            deleted: false,
            deleted_reason: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn apply_event(&mut self, event: &Event) -> Result<(), DomainError> {
        match DiaryEvent::decode(event)? {
            DiaryEvent::Created(payload) => {
                self.user_id = payload.user_id;
                self.title = payload.title;
                self.content = payload.content;
                self.token_count = payload.token_count;
                self.session_id = payload.session_id;
                self.tags = payload.tags;
                self.created_at = Some(event.timestamp);
                self.updated_at = Some(event.timestamp);
            }
            DiaryEvent::Updated(payload) => {
                if !payload.title.is_empty() {
                    self.title = payload.title;
                }
                if !payload.content.is_empty() {
                    self.content = payload.content;
                }
                if payload.token_count > 0 {
                    self.token_count = payload.token_count;
                }
                if let Some(tags) = payload.tags {
                    self.tags = tags;
                }
                self.updated_at = Some(event.timestamp);
            }
            DiaryEvent::Deleted(payload) => {
                self.deleted = true;
                self.deleted_reason = Some(payload.reason);
                self.updated_at = Some(event.timestamp);
            }
        }
        self.increment_version();
        Ok(())
    }
}
