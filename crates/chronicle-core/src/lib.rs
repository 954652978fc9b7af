//! Chronicle core: event-sourcing abstractions.
//!
//! Events, the aggregate contract and its shared bookkeeping, the event
//! store contract with its error taxonomy, and the repository that ties
//! them together. Backends live in `chronicle-event-store`.

pub mod aggregate;
pub mod bus;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod repository;
pub mod serializer;
pub mod store;
