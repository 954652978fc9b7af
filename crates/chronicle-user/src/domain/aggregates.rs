//! Aggregate root for user profiles.

use chrono::{DateTime, Utc};
use chronicle_core::aggregate::{Aggregate, AggregateBase};
use chronicle_core::clock::Clock;
use chronicle_core::command::Command;
use chronicle_core::error::DomainError;
use chronicle_core::event::Event;
use uuid::Uuid;

use super::commands::{
    AssignArchetype, RegisterUser, UpdateArchetype, UpdateModalities, UpdateProfile,
};
use super::events::{
    ArchetypeChanged, UserEvent, UserModalitiesUpdated, UserModality, UserProfileUpdated,
    UserRegistered,
};

/// The personality archetype currently assigned to a user.
#[derive(Debug, Clone, PartialEq)]
pub struct Archetype {
    /// Archetype identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Classifier confidence.
    pub score: f64,
}

impl From<ArchetypeChanged> for Archetype {
    fn from(payload: ArchetypeChanged) -> Self {
        Self {
            id: payload.archetype_id,
            name: payload.archetype_name,
            description: payload.description,
            score: payload.confidence,
        }
    }
}

/// A registered user.
#[derive(Debug)]
pub struct UserProfile {
    base: AggregateBase,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) date_of_birth: String,
    pub(crate) avatar: String,
    pub(crate) bio: String,
    pub(crate) archetype: Option<Archetype>,
    pub(crate) modalities: Vec<UserModality>,
    pub(crate) registered_at: Option<DateTime<Utc>>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Whether a registration event has been applied.
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.username.is_empty()
    }

    /// Unique handle.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Contact address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Assigned archetype, if any.
    #[must_use]
    pub fn archetype(&self) -> Option<&Archetype> {
        self.archetype.as_ref()
    }

    /// Interaction modalities.
    #[must_use]
    pub fn modalities(&self) -> &[UserModality] {
        &self.modalities
    }

    /// Stages `UserRegistered`.
    ///
    /// # Errors
    ///
    /// `DomainError::Validation` if the user is already registered or the
    /// username or email is missing.
    pub fn register(
        &mut self,
        command: &RegisterUser,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.exists() {
            return Err(DomainError::Validation(format!(
                "user {} already exists",
                self.id()
            )));
        }
        if command.username.trim().is_empty() {
            return Err(DomainError::Validation("username is required".into()));
        }
        if command.email.trim().is_empty() {
            return Err(DomainError::Validation("email is required".into()));
        }

        self.record(
            &UserEvent::Registered(UserRegistered {
                username: command.username.clone(),
                email: command.email.clone(),
                first_name: command.first_name.clone(),
                last_name: command.last_name.clone(),
                date_of_birth: command.date_of_birth.clone(),
            }),
            command,
            clock,
        )
    }

    /// Stages `UserProfileUpdated`.
    ///
    /// # Errors
    ///
    /// `DomainError::Validation` if the user is not registered.
    pub fn update_profile(
        &mut self,
        command: &UpdateProfile,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_registered("update profile of")?;

        self.record(
            &UserEvent::ProfileUpdated(UserProfileUpdated {
                first_name: command.first_name.clone(),
                last_name: command.last_name.clone(),
                date_of_birth: command.date_of_birth.clone(),
                avatar: command.avatar.clone(),
                bio: command.bio.clone(),
            }),
            command,
            clock,
        )
    }

    /// Stages `UserArchetypeAssigned`.
    ///
    /// # Errors
    ///
    /// `DomainError::Validation` if the user is not registered or the
    /// archetype is malformed.
    pub fn assign_archetype(
        &mut self,
        command: &AssignArchetype,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_registered("assign archetype to")?;
        let payload = archetype_payload(
            &command.archetype_id,
            &command.archetype_name,
            command.confidence,
            &command.description,
        )?;

        self.record(&UserEvent::ArchetypeAssigned(payload), command, clock)
    }

    /// Stages `UserArchetypeUpdated`.
    ///
    /// # Errors
    ///
    /// `DomainError::Validation` if the user is not registered or the
    /// archetype is malformed.
    pub fn update_archetype(
        &mut self,
        command: &UpdateArchetype,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_registered("update archetype of")?;
        let payload = archetype_payload(
            &command.archetype_id,
            &command.archetype_name,
            command.confidence,
            &command.description,
        )?;

        self.record(&UserEvent::ArchetypeUpdated(payload), command, clock)
    }

    /// Stages `UserModalitiesUpdated`.
    ///
    /// # Errors
    ///
    /// `DomainError::Validation` if the user is not registered.
    pub fn update_modalities(
        &mut self,
        command: &UpdateModalities,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_registered("update modalities of")?;

        self.record(
            &UserEvent::ModalitiesUpdated(UserModalitiesUpdated {
                modalities: command.modalities.clone(),
            }),
            command,
            clock,
        )
    }

    fn ensure_registered(&self, action: &str) -> Result<(), DomainError> {
        if self.exists() {
            Ok(())
        } else {
            Err(DomainError::Validation(format!(
                "cannot {action} user {}: not registered",
                self.id()
            )))
        }
    }

    fn record(
        &mut self,
        event: &UserEvent,
        command: &dyn Command,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let metadata = command.event_metadata();
        let event_type = event.event_type();
        match event {
            UserEvent::Registered(payload) => self.base.record(event_type, payload, metadata, clock),
            UserEvent::ProfileUpdated(payload) => {
                self.base.record(event_type, payload, metadata, clock)
            }
            UserEvent::ArchetypeAssigned(payload) | UserEvent::ArchetypeUpdated(payload) => {
                self.base.record(event_type, payload, metadata, clock)
            }
            UserEvent::ModalitiesUpdated(payload) => {
                self.base.record(event_type, payload, metadata, clock)
            }
        }
    }
}

fn archetype_payload(
    archetype_id: &str,
    archetype_name: &str,
    confidence: f64,
    description: &str,
) -> Result<ArchetypeChanged, DomainError> {
    if archetype_id.trim().is_empty() {
        return Err(DomainError::Validation("archetype id is required".into()));
    }
    if !(0.0..=1.0).contains(&confidence) {
        return Err(DomainError::Validation(format!(
            "archetype confidence must be within [0, 1], got {confidence}"
        )));
    }
    Ok(ArchetypeChanged {
        archetype_id: archetype_id.to_owned(),
        archetype_name: archetype_name.to_owned(),
        confidence,
        description: description.to_owned(),
    })
}

fn replace_if_set(field: &mut String, value: String) {
    if !value.is_empty() {
        *field = value;
    }
}

impl Aggregate for UserProfile {
    const KIND: &'static str = "user_profile";

    fn new(id: Uuid) -> Self {
        Self {
            base: AggregateBase::new(id),
            username: String::new(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            date_of_birth: String::new(),
            avatar: String::new(),
            bio: String::new(),
            archetype: None,
            modalities: Vec::new(),
            registered_at: None,
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
        match UserEvent::decode(event)? {
            UserEvent::Registered(payload) => {
                self.username = payload.username;
                self.email = payload.email;
                self.first_name = payload.first_name;
                self.last_name = payload.last_name;
                self.date_of_birth = payload.date_of_birth;
                self.registered_at = Some(event.timestamp);
            }
            UserEvent::ProfileUpdated(payload) => {
                replace_if_set(&mut self.first_name, payload.first_name);
                replace_if_set(&mut self.last_name, payload.last_name);
                replace_if_set(&mut self.date_of_birth, payload.date_of_birth);
                replace_if_set(&mut self.avatar, payload.avatar);
                replace_if_set(&mut self.bio, payload.bio);
            }
            UserEvent::ArchetypeAssigned(payload) | UserEvent::ArchetypeUpdated(payload) => {
                self.archetype = Some(payload.into());
            }
            UserEvent::ModalitiesUpdated(payload) => {
                self.modalities = payload.modalities;
            }
        }
        self.updated_at = Some(event.timestamp);
        self.increment_version();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chronicle_test_support::FixedClock;
    use serde_json::json;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap())
    }

    fn register_command(user_id: Uuid) -> RegisterUser {
        RegisterUser {
            correlation_id: Uuid::new_v4(),
            user_id,
            username: "wren".into(),
            email: "wren@example.com".into(),
            first_name: "Wren".into(),
            last_name: "Ashby".into(),
            date_of_birth: "1990-04-12".into(),
        }
    }

    fn registered_user() -> UserProfile {
        let id = Uuid::new_v4();
        let mut user = UserProfile::new(id);
        user.register(&register_command(id), &clock()).unwrap();
        user.confirm_uncommitted_events().unwrap();
        user
    }

    fn assign(user_id: Uuid, confidence: f64) -> AssignArchetype {
        AssignArchetype {
            user_id,
            archetype_id: "explorer".into(),
            archetype_name: "The Explorer".into(),
            confidence,
            description: "Seeks new experiences.".into(),
            ..AssignArchetype::default()
        }
    }

    #[test]
    fn test_register_stages_event_without_touching_state() {
        // Arrange
        let id = Uuid::new_v4();
        let mut user = UserProfile::new(id);

        // Act
        user.register(&register_command(id), &clock()).unwrap();

        // Assert
        let staged = user.uncommitted_events();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].event_type, "UserRegistered");
        assert_eq!(staged[0].version, 1);
        assert!(!user.exists());
    }

    #[test]
    fn test_register_twice_fails() {
        let mut user = registered_user();
        let command = register_command(user.id());

        let result = user.register(&command, &clock());

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(user.uncommitted_events().is_empty());
    }

    #[test]
    fn test_register_requires_username_and_email() {
        let id = Uuid::new_v4();
        let mut no_name = register_command(id);
        no_name.username = String::new();
        let mut no_email = register_command(id);
        no_email.email = " ".into();

        assert!(UserProfile::new(id).register(&no_name, &clock()).is_err());
        assert!(UserProfile::new(id).register(&no_email, &clock()).is_err());
    }

    #[test]
    fn test_profile_update_keeps_fields_left_empty() {
        // Arrange
        let mut user = registered_user();
        let command = UpdateProfile {
            user_id: user.id(),
            last_name: "Ashby-Hale".into(),
            bio: "Writes at night.".into(),
            ..UpdateProfile::default()
        };

        // Act
        user.update_profile(&command, &clock()).unwrap();
        user.confirm_uncommitted_events().unwrap();

        // Assert
        assert_eq!(user.first_name, "Wren");
        assert_eq!(user.last_name, "Ashby-Hale");
        assert_eq!(user.date_of_birth, "1990-04-12");
        assert_eq!(user.bio, "Writes at night.");
        assert_eq!(user.version(), 2);
    }

    #[test]
    fn test_operations_on_unregistered_user_fail() {
        let id = Uuid::new_v4();
        let mut user = UserProfile::new(id);

        assert!(user.update_profile(&UpdateProfile::default(), &clock()).is_err());
        assert!(user.assign_archetype(&assign(id, 0.5), &clock()).is_err());
        assert!(
            user.update_modalities(&UpdateModalities::default(), &clock())
                .is_err()
        );
        assert!(user.uncommitted_events().is_empty());
    }

    #[test]
    fn test_archetype_assignment_and_revision() {
        // Arrange
        let mut user = registered_user();
        user.assign_archetype(&assign(user.id(), 0.62), &clock()).unwrap();
        user.confirm_uncommitted_events().unwrap();

        // Act
        user.update_archetype(
            &UpdateArchetype {
                user_id: user.id(),
                archetype_id: "sage".into(),
                archetype_name: "The Sage".into(),
                confidence: 0.81,
                ..UpdateArchetype::default()
            },
            &clock(),
        )
        .unwrap();
        user.confirm_uncommitted_events().unwrap();

        // Assert
        let archetype = user.archetype().unwrap();
        assert_eq!(archetype.id, "sage");
        assert!((archetype.score - 0.81).abs() < f64::EPSILON);
        assert_eq!(user.version(), 3);
    }

    #[test]
    fn test_archetype_confidence_out_of_range_is_rejected() {
        let mut user = registered_user();

        let result = user.assign_archetype(&assign(user.id(), 1.5), &clock());

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_modalities_are_replaced_wholesale() {
        let mut user = registered_user();
        let voice = UserModality {
            id: "voice".into(),
            name: "Voice notes".into(),
            modality_type: "audio".into(),
            enabled: true,
            weight: 0.7,
            config: serde_json::from_value(json!({"language": "en"})).unwrap(),
        };

        user.update_modalities(
            &UpdateModalities {
                user_id: user.id(),
                modalities: vec![voice.clone()],
                ..UpdateModalities::default()
            },
            &clock(),
        )
        .unwrap();
        user.confirm_uncommitted_events().unwrap();

        assert_eq!(user.modalities(), [voice]);
    }

    #[test]
    fn test_replay_matches_live_state() {
        // Arrange
        let id = Uuid::new_v4();
        let mut live = UserProfile::new(id);
        let mut history = Vec::new();
        live.register(&register_command(id), &clock()).unwrap();
        history.extend(live.uncommitted_events().iter().cloned());
        live.confirm_uncommitted_events().unwrap();
        live.assign_archetype(&assign(id, 0.4), &clock()).unwrap();
        history.extend(live.uncommitted_events().iter().cloned());
        live.confirm_uncommitted_events().unwrap();

        // Act
        let mut replayed = UserProfile::new(id);
        replayed.load_from_history(&history).unwrap();

        // Assert
        assert_eq!(replayed.version(), live.version());
        assert_eq!(replayed.username(), live.username());
        assert_eq!(replayed.archetype(), live.archetype());
        assert_eq!(replayed.updated_at, live.updated_at);
    }
}
