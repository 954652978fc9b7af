//! Commands for user profiles.

use chronicle_core::command::Command;
use uuid::Uuid;

use super::events::UserModality;

/// Sign a new user up.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The profile to create.
    pub user_id: Uuid,
    /// Unique handle. Required.
    pub username: String,
    /// Contact address. Required.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// ISO date, or empty.
    pub date_of_birth: String,
}

/// Change profile details. Empty fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The profile to change.
    pub user_id: Uuid,
    /// New given name.
    pub first_name: String,
    /// New family name.
    pub last_name: String,
    /// New date of birth.
    pub date_of_birth: String,
    /// New avatar URL.
    pub avatar: String,
    /// New biography.
    pub bio: String,
}

/// Record the archetype a classifier picked for the user.
#[derive(Debug, Clone, Default)]
pub struct AssignArchetype {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The profile to change.
    pub user_id: Uuid,
    /// Archetype identifier. Required.
    pub archetype_id: String,
    /// Display name.
    pub archetype_name: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable description.
    pub description: String,
}

/// Revise the user's archetype after re-classification.
#[derive(Debug, Clone, Default)]
pub struct UpdateArchetype {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The profile to change.
    pub user_id: Uuid,
    /// Archetype identifier. Required.
    pub archetype_id: String,
    /// Display name.
    pub archetype_name: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable description.
    pub description: String,
}

/// Replace the user's interaction modalities.
#[derive(Debug, Clone, Default)]
pub struct UpdateModalities {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The profile to change.
    pub user_id: Uuid,
    /// The complete new set.
    pub modalities: Vec<UserModality>,
}

macro_rules! user_command {
    ($command:ty, $name:literal) => {
        impl Command for $command {
            fn command_type(&self) -> &'static str {
                $name
            }

            fn correlation_id(&self) -> Uuid {
                self.correlation_id
            }
        }
    };
}

user_command!(RegisterUser, "user.register");
user_command!(UpdateProfile, "user.update_profile");
user_command!(AssignArchetype, "user.assign_archetype");
user_command!(UpdateArchetype, "user.update_archetype");
user_command!(UpdateModalities, "user.update_modalities");
