//! Chronicle user profiles.
//!
//! Responsible for registration, profile details, the assigned personality
//! archetype and the user's preferred interaction modalities.

pub mod application;
pub mod domain;
