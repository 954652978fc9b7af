//! `EventStore` backends: in-memory, wide-column and stream database.
//!
//! Every backend honours the same contract from `chronicle_core::store`.
//! The networked adapters are split into contract logic, generic over a
//! small driver trait, and a thin driver binding, so the logic can be
//! exercised without a live server.

pub mod config;
pub mod memory;
pub mod stream_db;
pub mod wide_column;

use std::future::Future;
use std::time::Duration;

use chronicle_core::error::EventStoreError;

pub use memory::InMemoryEventStore;
pub use stream_db::StreamDbEventStore;
pub use wide_column::WideColumnEventStore;

/// Runs `fut` with a deadline. Elapsing is reported as a connection failure.
pub(crate) async fn with_deadline<T, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, EventStoreError>
where
    F: Future<Output = Result<T, EventStoreError>>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        EventStoreError::connection(operation, format!("no response within {limit:?}"))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::error::ErrorKind;

    #[tokio::test]
    async fn test_elapsed_deadline_is_a_connection_failure() {
        let err = with_deadline("load_by_type", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, EventStoreError>(())
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert!(err.to_string().contains("load_by_type"));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let err = with_deadline("save", Duration::from_secs(1), async {
            Err::<(), _>(EventStoreError::storage("save", "disk full"))
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
