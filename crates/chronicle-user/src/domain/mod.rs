//! User profile aggregate, its events and the commands that drive it.

pub mod aggregates;
pub mod commands;
pub mod events;
