//! Domain events for user profiles.

use chronicle_core::aggregate::Aggregate;
use chronicle_core::error::DomainError;
use chronicle_core::event::Event;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::aggregates::UserProfile;

/// Event type of [`UserRegistered`].
pub const USER_REGISTERED: &str = "UserRegistered";
/// Event type of [`UserProfileUpdated`].
pub const USER_PROFILE_UPDATED: &str = "UserProfileUpdated";
/// Event type of an archetype assignment.
pub const USER_ARCHETYPE_ASSIGNED: &str = "UserArchetypeAssigned";
/// Event type of an archetype revision.
pub const USER_ARCHETYPE_UPDATED: &str = "UserArchetypeUpdated";
/// Event type of [`UserModalitiesUpdated`].
pub const USER_MODALITIES_UPDATED: &str = "UserModalitiesUpdated";

/// Emitted when a user signs up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    /// Unique handle.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// ISO date, if given.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date_of_birth: String,
}

/// Emitted when profile details change. Empty fields are omitted on the
/// wire and leave the current value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfileUpdated {
    /// New given name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    /// New family name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    /// New date of birth.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date_of_birth: String,
    /// New avatar URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub avatar: String,
    /// New biography.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bio: String,
}

/// Body of both archetype events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeChanged {
    /// Archetype identifier.
    pub archetype_id: String,
    /// Display name.
    pub archetype_name: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

/// One interaction modality and how much the user prefers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserModality {
    /// Modality identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Modality family, e.g. `"text"` or `"voice"`.
    #[serde(rename = "type")]
    pub modality_type: String,
    /// Whether it is switched on.
    pub enabled: bool,
    /// Relative preference.
    pub weight: f64,
    /// Modality-specific settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
}

/// Emitted when the modality set is replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserModalitiesUpdated {
    /// The complete new set.
    pub modalities: Vec<UserModality>,
}

/// Every event a user profile can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    /// The user signed up.
    Registered(UserRegistered),
    /// Profile details changed.
    ProfileUpdated(UserProfileUpdated),
    /// An archetype was assigned.
    ArchetypeAssigned(ArchetypeChanged),
    /// The assigned archetype was revised.
    ArchetypeUpdated(ArchetypeChanged),
    /// The modality set was replaced.
    ModalitiesUpdated(UserModalitiesUpdated),
}

impl UserEvent {
    /// The stored event type.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Registered(_) => USER_REGISTERED,
            Self::ProfileUpdated(_) => USER_PROFILE_UPDATED,
            Self::ArchetypeAssigned(_) => USER_ARCHETYPE_ASSIGNED,
            Self::ArchetypeUpdated(_) => USER_ARCHETYPE_UPDATED,
            Self::ModalitiesUpdated(_) => USER_MODALITIES_UPDATED,
        }
    }

    /// Decodes a stored event by its type tag.
    ///
    /// # Errors
    ///
    /// `UnrecognizedEventType` for a type no user profile produces, or
    /// `MalformedPayload` if the body does not match the type.
    pub fn decode(event: &Event) -> Result<Self, DomainError> {
        match event.event_type.as_str() {
            USER_REGISTERED => event.decode_payload().map(Self::Registered),
            USER_PROFILE_UPDATED => event.decode_payload().map(Self::ProfileUpdated),
            USER_ARCHETYPE_ASSIGNED => event.decode_payload().map(Self::ArchetypeAssigned),
            USER_ARCHETYPE_UPDATED => event.decode_payload().map(Self::ArchetypeUpdated),
            USER_MODALITIES_UPDATED => event.decode_payload().map(Self::ModalitiesUpdated),
            other => Err(DomainError::UnrecognizedEventType {
                aggregate_kind: UserProfile::KIND,
                event_type: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_modality_type_field_is_named_type_on_the_wire() {
        let modality = UserModality {
            id: "m-1".into(),
            name: "Voice notes".into(),
            modality_type: "voice".into(),
            enabled: true,
            weight: 0.5,
            config: None,
        };

        let json = serde_json::to_value(&modality).unwrap();

        assert_eq!(
            json,
            json!({"id": "m-1", "name": "Voice notes", "type": "voice", "enabled": true, "weight": 0.5})
        );
    }

    #[test]
    fn test_profile_update_omits_empty_fields() {
        let update = UserProfileUpdated {
            bio: "Writes at night.".into(),
            ..UserProfileUpdated::default()
        };

        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"bio": "Writes at night."})
        );
    }
}
