//! Shared test doubles and the event store contract suite for Chronicle.

pub mod contract;

mod clock;
mod publisher;
mod store;

pub use clock::{FixedClock, SteppingClock};
pub use publisher::{FailingPublisher, RecordingPublisher};
pub use store::{EmptyEventStore, FailingEventStore, RecordingEventStore};

/// Installs a test-friendly `tracing` subscriber filtered by `RUST_LOG`.
/// Safe to call from every test; only the first call has any effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
