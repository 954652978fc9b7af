//! The shared store contract against `InMemoryEventStore`.

use chronicle_event_store::InMemoryEventStore;
use chronicle_test_support::{contract, init_tracing};

#[tokio::test]
async fn test_in_memory_store_satisfies_contract() {
    init_tracing();
    let store = InMemoryEventStore::new();

    contract::run_all(&store).await;
}

#[tokio::test]
async fn test_contract_holds_after_clear() {
    let store = InMemoryEventStore::new();
    contract::consecutive_saves_build_contiguous_history(&store).await;

    store.clear().await;

    assert!(store.is_empty().await);
    contract::run_all(&store).await;
}

#[tokio::test]
async fn test_racing_writers_exactly_one_wins() {
    contract::racing_writers_one_wins(&InMemoryEventStore::new()).await;
}
