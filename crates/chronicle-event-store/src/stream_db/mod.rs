//! Stream-database `EventStore`: one named stream per aggregate.
//!
//! Version `v` lives at stream revision `v - 1`, so appending a group whose
//! first version is `n` expects the stream to be at revision `n - 2`, or to
//! not exist yet when `n == 1`. The server enforces that expectation
//! atomically, which makes this the only networked backend without a race
//! window.
//!
//! The structural fields travel in the event metadata under one reserved
//! key, `$chronicle`, and are stripped again on read. Caller keys are left
//! untouched. Entries written before the reserved key existed carry the
//! fields as flat `type`/`aggregate_id`/`version`/`timestamp` keys, which
//! are still understood.

pub mod esdb;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use chronicle_core::error::EventStoreError;
use chronicle_core::event::{Event, Metadata, Payload};
use chronicle_core::store::{EventStore, TimeRange, validate_batch};

const ENVELOPE_KEY: &str = "$chronicle";
const TYPE_KEY: &str = "type";
const AGGREGATE_ID_KEY: &str = "aggregate_id";
const VERSION_KEY: &str = "version";
const TIMESTAMP_KEY: &str = "timestamp";

/// Structural fields of an event, stored under [`ENVELOPE_KEY`].
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    aggregate_id: Uuid,
    version: i64,
    timestamp: DateTime<Utc>,
}

/// What the stream must look like for an append to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedRevision {
    /// The stream must not exist.
    NoStream,
    /// The stream's last event must be at this revision.
    Exact(u64),
}

impl ExpectedRevision {
    /// The expectation for a group whose first version is `first_version`.
    #[must_use]
    pub fn for_first_version(first_version: i64) -> Self {
        match u64::try_from(first_version - 2) {
            Ok(revision) => Self::Exact(revision),
            Err(_) => Self::NoStream,
        }
    }
}

/// An event ready to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedEvent {
    /// Event id, used by the server for idempotency.
    pub event_id: Uuid,
    /// Event type.
    pub event_type: String,
    /// JSON body.
    pub payload: Payload,
    /// Caller metadata plus the structural envelope.
    pub metadata: Metadata,
}

/// An event as read back from a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEntry {
    /// Stream the event was appended to.
    pub stream_name: String,
    /// Event id.
    pub event_id: Uuid,
    /// Zero-based position within the stream.
    pub revision: u64,
    /// Event type.
    pub event_type: String,
    /// JSON body bytes.
    pub data: Bytes,
    /// JSON metadata bytes, possibly empty.
    pub custom_metadata: Bytes,
    /// Server-side creation time.
    pub created: DateTime<Utc>,
}

/// Failures a [`StreamClient`] reports, already classified.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The stream does not exist.
    #[error("stream not found")]
    StreamNotFound,
    /// The append expectation did not hold.
    #[error("wrong expected revision, stream is at {current:?}")]
    WrongExpectedRevision {
        /// The stream's actual last revision, `None` if it does not exist.
        current: Option<u64>,
    },
    /// The server could not be reached or timed out.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// Anything else the server rejected.
    #[error("{0}")]
    Backend(String),
}

impl StreamError {
    fn into_store_error(self, operation: &'static str) -> EventStoreError {
        match self {
            Self::Unavailable(message) => EventStoreError::connection(operation, message),
            other => EventStoreError::storage(operation, other),
        }
    }
}

/// The native operations the adapter needs from a stream-database client.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Appends `events` atomically if the stream matches `expected`.
    async fn append_to_stream(
        &self,
        stream: &str,
        expected: ExpectedRevision,
        events: Vec<ProposedEvent>,
    ) -> Result<(), StreamError>;

    /// Reads a stream forwards from its start, at most `max_count` events.
    async fn read_stream(
        &self,
        stream: &str,
        max_count: Option<usize>,
    ) -> Result<Vec<RecordedEntry>, StreamError>;

    /// Reads the global log forwards from its start.
    async fn read_all(&self) -> Result<Vec<RecordedEntry>, StreamError>;
}

/// [`EventStore`] over any [`StreamClient`].
#[derive(Debug)]
pub struct StreamDbEventStore<C> {
    client: C,
    stream_prefix: String,
}

impl<C> StreamDbEventStore<C> {
    /// Serves aggregates stored in streams named `{stream_prefix}-{id}`.
    pub fn new(client: C, stream_prefix: impl Into<String>) -> Self {
        Self {
            client,
            stream_prefix: stream_prefix.into(),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The stream holding `aggregate_id`'s history.
    #[must_use]
    pub fn stream_name(&self, aggregate_id: Uuid) -> String {
        format!("{}-{aggregate_id}", self.stream_prefix)
    }

    /// Only `{prefix}-{uuid}` streams hold aggregates; anything else under
    /// the prefix belongs to tooling.
    fn owns(&self, stream_name: &str) -> bool {
        stream_name
            .strip_prefix(self.stream_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|id| Uuid::parse_str(id).is_ok())
    }
}

impl<C: StreamClient> StreamDbEventStore<C> {
    async fn read_aggregate(
        &self,
        operation: &'static str,
        aggregate_id: Uuid,
        max_count: Option<usize>,
    ) -> Result<Vec<Event>, EventStoreError> {
        match self
            .client
            .read_stream(&self.stream_name(aggregate_id), max_count)
            .await
        {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| unpack(operation, entry))
                .collect(),
            Err(StreamError::StreamNotFound) => Ok(Vec::new()),
            Err(err) => Err(err.into_store_error(operation)),
        }
    }

    async fn read_global(
        &self,
        operation: &'static str,
        keep: impl Fn(&Event) -> bool + Send,
    ) -> Result<Vec<Event>, EventStoreError> {
        let entries = match self.client.read_all().await {
            Ok(entries) => entries,
            Err(StreamError::StreamNotFound) => return Ok(Vec::new()),
            Err(err) => return Err(err.into_store_error(operation)),
        };

        let mut events = Vec::new();
        for entry in entries {
            if !self.owns(&entry.stream_name) {
                continue;
            }
            let event = unpack(operation, entry)?;
            if keep(&event) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

fn pack(event: &Event) -> Result<ProposedEvent, EventStoreError> {
    let envelope = Envelope {
        event_type: event.event_type.clone(),
        aggregate_id: event.aggregate_id,
        version: event.version,
        timestamp: event.timestamp,
    };
    let mut metadata = event.metadata.clone();
    metadata.insert(
        ENVELOPE_KEY,
        serde_json::to_value(&envelope).map_err(|e| EventStoreError::serialization("save", e))?,
    );
    Ok(ProposedEvent {
        event_id: event.id,
        event_type: event.event_type.clone(),
        payload: event.payload.clone(),
        metadata,
    })
}

fn unpack(operation: &'static str, entry: RecordedEntry) -> Result<Event, EventStoreError> {
    let mut metadata = if entry.custom_metadata.is_empty() {
        Metadata::new()
    } else {
        serde_json::from_slice::<Metadata>(&entry.custom_metadata).map_err(|e| {
            EventStoreError::serialization(
                operation,
                format!("metadata of event {}: {e}", entry.event_id),
            )
        })?
    };

    let envelope = match metadata.remove(ENVELOPE_KEY) {
        Some(raw) => serde_json::from_value::<Envelope>(raw).map_err(|e| {
            EventStoreError::serialization(
                operation,
                format!("envelope of event {}: {e}", entry.event_id),
            )
        })?,
        None => flat_envelope(operation, &mut metadata, &entry)?,
    };

    let payload = Payload::from_slice(&entry.data).map_err(|e| {
        EventStoreError::serialization(
            operation,
            format!("payload of event {}: {e}", entry.event_id),
        )
    })?;

    Ok(Event {
        id: entry.event_id,
        event_type: envelope.event_type,
        aggregate_id: envelope.aggregate_id,
        version: envelope.version,
        timestamp: envelope.timestamp,
        payload,
        metadata,
    })
}

/// Structural fields of an entry without the reserved key: flat keys if an
/// older writer left them, else the stream name, revision and server time.
fn flat_envelope(
    operation: &'static str,
    metadata: &mut Metadata,
    entry: &RecordedEntry,
) -> Result<Envelope, EventStoreError> {
    metadata.remove(TYPE_KEY);
    let aggregate_id = match metadata.remove(AGGREGATE_ID_KEY) {
        Some(Value::String(raw)) => Uuid::parse_str(&raw).ok(),
        _ => None,
    }
    .or_else(|| aggregate_id_from_stream(&entry.stream_name))
    .ok_or_else(|| {
        EventStoreError::serialization(
            operation,
            format!("no aggregate id for stream {:?}", entry.stream_name),
        )
    })?;

    let version = metadata
        .remove(VERSION_KEY)
        .as_ref()
        .and_then(Value::as_i64)
        .unwrap_or_else(|| revision_to_version(entry.revision));

    let timestamp = match metadata.remove(TIMESTAMP_KEY) {
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(entry.created),
        _ => entry.created,
    };

    Ok(Envelope {
        event_type: entry.event_type.clone(),
        aggregate_id,
        version,
        timestamp,
    })
}

/// Stream names end in a hyphenated UUID, which is 36 characters.
fn aggregate_id_from_stream(stream_name: &str) -> Option<Uuid> {
    let start = stream_name.len().checked_sub(36)?;
    stream_name.get(start..).and_then(|tail| Uuid::parse_str(tail).ok())
}

fn revision_to_version(revision: u64) -> i64 {
    i64::try_from(revision).map_or(i64::MAX, |r| r.saturating_add(1))
}

#[async_trait]
impl<C: StreamClient> EventStore for StreamDbEventStore<C> {
    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn save(&self, events: &[Event]) -> Result<(), EventStoreError> {
        let Some(span) = validate_batch(events)? else {
            return Ok(());
        };
        let stream = self.stream_name(span.aggregate_id);
        let expected = ExpectedRevision::for_first_version(span.first_version);
        let proposed = events.iter().map(pack).collect::<Result<Vec<_>, _>>()?;

        match self
            .client
            .append_to_stream(&stream, expected, proposed)
            .await
        {
            Ok(()) => {
                debug!(%stream, version = span.last_version, "events appended");
                Ok(())
            }
            Err(StreamError::WrongExpectedRevision { current }) => {
                let actual = current.map_or(0, revision_to_version);
                warn!(%stream, ?expected, actual, "version conflict");
                Err(span.conflict(actual))
            }
            Err(err) => Err(err.into_store_error("save")),
        }
    }

    #[instrument(skip(self))]
    async fn load_by_aggregate(&self, aggregate_id: Uuid) -> Result<Vec<Event>, EventStoreError> {
        self.read_aggregate("load_by_aggregate", aggregate_id, None)
            .await
    }

    #[instrument(skip(self))]
    async fn load_by_type(&self, event_type: &str) -> Result<Vec<Event>, EventStoreError> {
        self.read_global("load_by_type", |e| e.event_type == event_type)
            .await
    }

    #[instrument(skip(self))]
    async fn load_by_aggregate_up_to_version(
        &self,
        aggregate_id: Uuid,
        version: i64,
    ) -> Result<Vec<Event>, EventStoreError> {
        let Ok(max_count) = usize::try_from(version) else {
            return Ok(Vec::new());
        };
        if max_count == 0 {
            return Ok(Vec::new());
        }
        let mut events = self
            .read_aggregate("load_by_aggregate_up_to_version", aggregate_id, Some(max_count))
            .await?;
        events.retain(|e| e.version <= version);
        Ok(events)
    }

    #[instrument(skip(self))]
    async fn load_by_time_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<Event>, EventStoreError> {
        let range = TimeRange::parse(start, end)?;
        self.read_global("load_by_time_range", |e| range.contains(e.timestamp))
            .await
    }
}
