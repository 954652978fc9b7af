//! Command and query handlers over an `AggregateRepository`.

pub mod command_handlers;
pub mod query_handlers;
