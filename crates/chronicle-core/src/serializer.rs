//! Flat byte encoding of events for transports that need one.

use crate::error::EventStoreError;
use crate::event::Event;

/// Two-way conversion between an [`Event`] and bytes.
pub trait EventSerializer: Send + Sync {
    /// Encodes an event.
    ///
    /// # Errors
    ///
    /// A serialization error if the event cannot be encoded.
    fn serialize(&self, event: &Event) -> Result<Vec<u8>, EventStoreError>;

    /// Decodes an event.
    ///
    /// # Errors
    ///
    /// A serialization error if `data` is not a valid encoding.
    fn deserialize(&self, data: &[u8]) -> Result<Event, EventStoreError>;
}

/// JSON envelope with the payload embedded verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventSerializer;

impl EventSerializer for JsonEventSerializer {
    fn serialize(&self, event: &Event) -> Result<Vec<u8>, EventStoreError> {
        serde_json::to_vec(event).map_err(|e| EventStoreError::serialization("serialize", e))
    }

    fn deserialize(&self, data: &[u8]) -> Result<Event, EventStoreError> {
        serde_json::from_slice(data).map_err(|e| EventStoreError::serialization("deserialize", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::ErrorKind;
    use crate::event::{EventMetadata, Payload};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_round_trip_reproduces_every_field() {
        // Arrange
        let mut metadata = EventMetadata::new(Uuid::new_v4(), Uuid::new_v4())
            .with_user("u-1")
            .into_metadata();
        metadata.insert("nested", json!({"depth": {"level": 2}, "flag": false}));
        let mut event = Event::new(
            "DiaryEntryCreated",
            Uuid::new_v4(),
            7,
            &(),
            metadata,
            &SystemClock,
        )
        .unwrap();
        event.payload = Payload::from_slice(br#"{"title":"x",   "tags":["a","b"]}"#).unwrap();
        let serializer = JsonEventSerializer;

        // Act
        let bytes = serializer.serialize(&event).unwrap();
        let decoded = serializer.deserialize(&bytes).unwrap();

        // Assert
        assert_eq!(decoded, event);
        assert_eq!(decoded.payload.as_bytes(), event.payload.as_bytes());
    }

    #[test]
    fn test_envelope_uses_type_key() {
        let event = Event::new(
            "UserRegistered",
            Uuid::new_v4(),
            1,
            &json!({}),
            EventMetadata::new(Uuid::new_v4(), Uuid::new_v4()),
            &SystemClock,
        )
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&JsonEventSerializer.serialize(&event).unwrap()).unwrap();

        assert_eq!(value["type"], "UserRegistered");
        assert_eq!(value["version"], 1);
    }

    #[test]
    fn test_garbage_is_a_serialization_error() {
        let err = JsonEventSerializer.deserialize(b"[1,2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
