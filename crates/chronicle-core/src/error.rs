//! Error taxonomy shared by every event store backend and aggregate.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// The five kinds of event store failure business code may branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend could not be reached, or the request deadline elapsed.
    ConnectionFailed,
    /// An operation that requires existing history found none.
    EventNotFound,
    /// Optimistic concurrency violation; reload and retry.
    VersionConflict,
    /// Malformed id, timestamp, payload, or batch shape.
    Serialization,
    /// Backend-internal failure during a well-formed request.
    Storage,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::EventNotFound => "EVENT_NOT_FOUND",
            Self::VersionConflict => "VERSION_CONFLICT",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Storage => "STORAGE_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors returned by [`EventStore`](crate::store::EventStore) implementations.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The backend could not be reached.
    #[error("connection failed during {operation}: {message}")]
    ConnectionFailed {
        /// The store operation in flight.
        operation: &'static str,
        /// Backend-provided detail.
        message: String,
    },

    /// No history exists for an aggregate that was required to exist.
    #[error("no events found for aggregate {0}")]
    EventNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error(
        "version conflict on aggregate {aggregate_id}: expected to follow version {expected}, found {actual}"
    )]
    VersionConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The last version the caller expected to be persisted.
        expected: i64,
        /// The last version actually persisted, when the backend reports it.
        actual: i64,
    },

    /// A group of events that cannot be saved together.
    #[error("invalid event batch: {0}")]
    InvalidBatch(String),

    /// Malformed identifier, timestamp, payload, or metadata.
    #[error("serialization error during {operation}: {message}")]
    Serialization {
        /// The store operation in flight.
        operation: &'static str,
        /// What could not be encoded or decoded.
        message: String,
    },

    /// Backend-internal failure.
    #[error("storage error during {operation}: {message}")]
    Storage {
        /// The store operation in flight.
        operation: &'static str,
        /// Backend-provided detail.
        message: String,
    },
}

impl EventStoreError {
    /// Builds a connection failure from any displayable native error.
    pub fn connection(operation: &'static str, err: impl fmt::Display) -> Self {
        Self::ConnectionFailed {
            operation,
            message: err.to_string(),
        }
    }

    /// Builds a serialization failure from any displayable native error.
    pub fn serialization(operation: &'static str, err: impl fmt::Display) -> Self {
        Self::Serialization {
            operation,
            message: err.to_string(),
        }
    }

    /// Builds a storage failure from any displayable native error.
    pub fn storage(operation: &'static str, err: impl fmt::Display) -> Self {
        Self::Storage {
            operation,
            message: err.to_string(),
        }
    }

    /// The taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Self::EventNotFound(_) => ErrorKind::EventNotFound,
            Self::VersionConflict { .. } => ErrorKind::VersionConflict,
            Self::InvalidBatch(_) | Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Shorthand for `self.kind().code()`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Whether this is an optimistic concurrency conflict.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        self.kind() == ErrorKind::VersionConflict
    }
}

/// Aggregate-side errors, plus store errors surfaced through command handlers.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A business precondition failed against current folded state.
    #[error("validation error: {0}")]
    Validation(String),

    /// `apply_event` was handed a type this aggregate kind never produces.
    #[error("unrecognized event type {event_type:?} for {aggregate_kind} aggregate")]
    UnrecognizedEventType {
        /// The aggregate kind doing the fold.
        aggregate_kind: &'static str,
        /// The offending event type.
        event_type: String,
    },

    /// History handed to an aggregate belongs to another aggregate.
    #[error("event belongs to aggregate {actual}, not {expected}")]
    MismatchedAggregate {
        /// The aggregate being loaded.
        expected: Uuid,
        /// The aggregate id carried by the event.
        actual: Uuid,
    },

    /// A payload could not be decoded into the type its tag names.
    #[error("malformed {event_type} payload: {source}")]
    MalformedPayload {
        /// The event type whose payload failed to decode.
        event_type: String,
        /// The decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// The event store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] EventStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_maps_to_a_taxonomy_kind() {
        let id = Uuid::new_v4();
        let cases = [
            (
                EventStoreError::connection("save", "refused"),
                ErrorKind::ConnectionFailed,
            ),
            (EventStoreError::EventNotFound(id), ErrorKind::EventNotFound),
            (
                EventStoreError::VersionConflict {
                    aggregate_id: id,
                    expected: 1,
                    actual: 2,
                },
                ErrorKind::VersionConflict,
            ),
            (
                EventStoreError::InvalidBatch("mixed".into()),
                ErrorKind::Serialization,
            ),
            (
                EventStoreError::serialization("load_by_time_range", "bad start"),
                ErrorKind::Serialization,
            ),
            (
                EventStoreError::storage("save", "batch failed"),
                ErrorKind::Storage,
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorKind::ConnectionFailed.code(), "CONNECTION_FAILED");
        assert_eq!(ErrorKind::EventNotFound.code(), "EVENT_NOT_FOUND");
        assert_eq!(ErrorKind::VersionConflict.code(), "VERSION_CONFLICT");
        assert_eq!(ErrorKind::Serialization.code(), "SERIALIZATION_ERROR");
        assert_eq!(ErrorKind::Storage.code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_store_error_context_is_in_message() {
        let err = EventStoreError::storage("load_by_type", "timeout on node 3");
        assert_eq!(
            err.to_string(),
            "storage error during load_by_type: timeout on node 3"
        );
    }
}
