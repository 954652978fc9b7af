//! Query handlers for user profiles.

use chrono::{DateTime, Utc};
use chronicle_core::aggregate::Aggregate;
use chronicle_core::error::DomainError;
use chronicle_core::repository::AggregateRepository;
use chronicle_core::store::EventStore;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::UserProfile;
use crate::domain::events::UserModality;

/// Archetype as shown to readers.
#[derive(Debug, Serialize)]
pub struct ArchetypeView {
    /// Archetype identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Classifier confidence.
    pub score: f64,
}

/// Read-only view of a user profile.
#[derive(Debug, Serialize)]
pub struct UserProfileView {
    /// The user identifier.
    pub user_id: Uuid,
    /// Unique handle.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth, possibly empty.
    pub date_of_birth: String,
    /// Avatar URL, possibly empty.
    pub avatar: String,
    /// Biography, possibly empty.
    pub bio: String,
    /// Assigned archetype.
    pub archetype: Option<ArchetypeView>,
    /// Interaction modalities.
    pub modalities: Vec<UserModality>,
    /// When the user registered.
    pub registered_at: Option<DateTime<Utc>>,
    /// When the profile last changed.
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of events folded.
    pub version: i64,
}

impl From<&UserProfile> for UserProfileView {
    fn from(user: &UserProfile) -> Self {
        Self {
            user_id: user.id(),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            date_of_birth: user.date_of_birth.clone(),
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            archetype: user.archetype.as_ref().map(|a| ArchetypeView {
                id: a.id.clone(),
                name: a.name.clone(),
                description: a.description.clone(),
                score: a.score,
            }),
            modalities: user.modalities.clone(),
            registered_at: user.registered_at,
            updated_at: user.updated_at,
            version: user.version(),
        }
    }
}

/// Retrieves a user profile by id.
///
/// # Errors
///
/// `EventStoreError::EventNotFound` (wrapped) if the user has no history,
/// or any load or fold failure.
pub async fn get_user_by_id<S: EventStore>(
    user_id: Uuid,
    repo: &AggregateRepository<S>,
) -> Result<UserProfileView, DomainError> {
    let user: UserProfile = repo.load_existing(user_id).await?;
    Ok(UserProfileView::from(&user))
}
