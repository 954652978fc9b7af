//! Command handlers for user profiles.

use chronicle_core::aggregate::Aggregate;
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::event::Event;
use chronicle_core::repository::AggregateRepository;
use chronicle_core::store::EventStore;
use tracing::{info, instrument};

use crate::domain::aggregates::UserProfile;
use crate::domain::commands::{
    AssignArchetype, RegisterUser, UpdateArchetype, UpdateModalities, UpdateProfile,
};

/// Handles `RegisterUser`.
///
/// # Errors
///
/// `DomainError::Validation` if the user exists or required fields are
/// missing, or a store error from loading or saving.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_register_user<S: EventStore>(
    command: &RegisterUser,
    clock: &dyn Clock,
    repo: &AggregateRepository<S>,
) -> Result<Vec<Event>, DomainError> {
    let mut user: UserProfile = repo.load(command.user_id).await?;
    user.register(command, clock)?;
    let committed = repo.save(&mut user).await?;
    info!(username = %user.username(), "user registered");
    Ok(committed)
}

/// Handles `UpdateProfile`.
///
/// # Errors
///
/// `DomainError::Validation` if the user is not registered, or a store
/// error from loading or saving.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_update_profile<S: EventStore>(
    command: &UpdateProfile,
    clock: &dyn Clock,
    repo: &AggregateRepository<S>,
) -> Result<Vec<Event>, DomainError> {
    let mut user: UserProfile = repo.load(command.user_id).await?;
    user.update_profile(command, clock)?;
    repo.save(&mut user).await
}

/// Handles `AssignArchetype`.
///
/// # Errors
///
/// `DomainError::Validation` if the user is not registered or the
/// archetype is malformed, or a store error from loading or saving.
#[instrument(skip_all, fields(user_id = %command.user_id, archetype = %command.archetype_id))]
pub async fn handle_assign_archetype<S: EventStore>(
    command: &AssignArchetype,
    clock: &dyn Clock,
    repo: &AggregateRepository<S>,
) -> Result<Vec<Event>, DomainError> {
    let mut user: UserProfile = repo.load(command.user_id).await?;
    user.assign_archetype(command, clock)?;
    let committed = repo.save(&mut user).await?;
    info!(version = user.version(), "archetype assigned");
    Ok(committed)
}

/// Handles `UpdateArchetype`.
///
/// # Errors
///
/// As [`handle_assign_archetype`].
#[instrument(skip_all, fields(user_id = %command.user_id, archetype = %command.archetype_id))]
pub async fn handle_update_archetype<S: EventStore>(
    command: &UpdateArchetype,
    clock: &dyn Clock,
    repo: &AggregateRepository<S>,
) -> Result<Vec<Event>, DomainError> {
    let mut user: UserProfile = repo.load(command.user_id).await?;
    user.update_archetype(command, clock)?;
    repo.save(&mut user).await
}

/// Handles `UpdateModalities`.
///
/// # Errors
///
/// `DomainError::Validation` if the user is not registered, or a store
/// error from loading or saving.
#[instrument(skip_all, fields(user_id = %command.user_id, count = command.modalities.len()))]
pub async fn handle_update_modalities<S: EventStore>(
    command: &UpdateModalities,
    clock: &dyn Clock,
    repo: &AggregateRepository<S>,
) -> Result<Vec<Event>, DomainError> {
    let mut user: UserProfile = repo.load(command.user_id).await?;
    user.update_modalities(command, clock)?;
    repo.save(&mut user).await
}
