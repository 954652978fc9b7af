//! Chronicle diary entries.
//!
//! Responsible for creating, revising and deleting a user's diary entries.
//! Every change is an event; an entry's state is whatever its history folds to.

pub mod application;
pub mod domain;
