//! The immutable event record and its payload and metadata carriers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{DomainError, EventStoreError};

/// Metadata key holding the correlation id.
pub const CORRELATION_ID: &str = "correlation_id";
/// Metadata key holding the causation id.
pub const CAUSATION_ID: &str = "causation_id";
/// Metadata key holding the acting user id.
pub const USER_ID: &str = "user_id";

/// Opaque, self-describing JSON body of an event.
///
/// The exact bytes handed in are the bytes handed back; the store never
/// re-encodes or inspects them.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Box<RawValue>);

impl Payload {
    /// Encodes a value as a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be encoded as JSON.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, EventStoreError> {
        serde_json::value::to_raw_value(value)
            .map(Self)
            .map_err(|e| EventStoreError::serialization("encode_payload", e))
    }

    /// Wraps already-encoded JSON bytes without re-encoding them.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `bytes` are not a single JSON value.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EventStoreError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| EventStoreError::serialization("decode_payload", e))?;
        Self::from_json(text.to_owned())
    }

    /// Wraps an already-encoded JSON string without re-encoding it.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `json` is not a single JSON value.
    pub fn from_json(json: String) -> Result<Self, EventStoreError> {
        RawValue::from_string(json)
            .map(Self)
            .map_err(|e| EventStoreError::serialization("decode_payload", e))
    }

    /// The raw JSON text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    /// The raw JSON bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.get().as_bytes()
    }

    /// Decodes the payload into a concrete type.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if the JSON does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.0.get())
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Payload {}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.as_str()).finish()
    }
}

/// Open string-keyed metadata carried alongside the payload.
///
/// Values are JSON values: strings, numbers, booleans, or nested maps.
/// Key order is irrelevant to equality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    /// Empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous one for that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Removes a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The correlation id, if present as a string.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.get_str(CORRELATION_ID)
    }

    /// The causation id, if present as a string.
    #[must_use]
    pub fn causation_id(&self) -> Option<&str> {
        self.get_str(CAUSATION_ID)
    }

    /// The acting user id, if present as a string.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.get_str(USER_ID)
    }
}

impl From<BTreeMap<String, Value>> for Metadata {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Metadata> for BTreeMap<String, Value> {
    fn from(metadata: Metadata) -> Self {
        metadata.0
    }
}

impl IntoIterator for Metadata {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Extend<(String, Value)> for Metadata {
    fn extend<I: IntoIterator<Item = (String, Value)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Typed tracing metadata, flattened into [`Metadata`] before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMetadata {
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the event/command that caused it.
    pub causation_id: Uuid,
    /// The acting user, when known.
    pub user_id: Option<String>,
    /// Free-form extras.
    pub extra: BTreeMap<String, Value>,
}

impl EventMetadata {
    /// Metadata with no user and no extras.
    #[must_use]
    pub fn new(correlation_id: Uuid, causation_id: Uuid) -> Self {
        Self {
            correlation_id,
            causation_id,
            user_id: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Flattens into the open mapping. Extras never override the typed keys.
    #[must_use]
    pub fn into_metadata(self) -> Metadata {
        let mut map = self.extra;
        map.insert(
            CORRELATION_ID.to_owned(),
            Value::String(self.correlation_id.to_string()),
        );
        map.insert(
            CAUSATION_ID.to_owned(),
            Value::String(self.causation_id.to_string()),
        );
        if let Some(user_id) = self.user_id.filter(|u| !u.is_empty()) {
            map.insert(USER_ID.to_owned(), Value::String(user_id));
        }
        Metadata(map)
    }
}

impl From<EventMetadata> for Metadata {
    fn from(metadata: EventMetadata) -> Self {
        metadata.into_metadata()
    }
}

/// Immutable record of one state transition of one aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique identifier.
    pub id: Uuid,
    /// Transition tag, owned by the aggregate kind that emits it.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The owning aggregate.
    pub aggregate_id: Uuid,
    /// Position in the aggregate's history, starting at 1.
    pub version: i64,
    /// Creation time, millisecond precision.
    pub timestamp: DateTime<Utc>,
    /// Type-specific body.
    pub payload: Payload,
    /// Correlation, causation, user and free-form extras.
    pub metadata: Metadata,
}

impl Event {
    /// Creates an event with a fresh id, stamped by `clock`.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `payload` cannot be encoded.
    pub fn new<T: Serialize + ?Sized>(
        event_type: impl Into<String>,
        aggregate_id: Uuid,
        version: i64,
        payload: &T,
        metadata: impl Into<Metadata>,
        clock: &dyn Clock,
    ) -> Result<Self, EventStoreError> {
        Ok(Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            aggregate_id,
            version,
            timestamp: clock.now().trunc_subsecs(3),
            payload: Payload::encode(payload)?,
            metadata: metadata.into(),
        })
    }

    /// Decodes the payload, tagging failures with this event's type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedPayload` if the payload does not match `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, DomainError> {
        self.payload
            .decode()
            .map_err(|source| DomainError::MalformedPayload {
                event_type: self.event_type.clone(),
                source,
            })
    }
}
