//! Event store CQL schema and statements.
//!
//! One table partitioned by `(aggregate_kind, aggregate_id)` and clustered by
//! ascending `version`, so ascending order is a storage-level guarantee.
//! Every DDL statement is create-if-absent.

/// Keyspace creation, single-replica.
#[must_use]
pub fn create_keyspace(keyspace: &str) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {keyspace} \
         WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': 1}}"
    )
}

/// The events table.
#[must_use]
pub fn create_events_table(keyspace: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.events ( \
         aggregate_kind text, \
         aggregate_id uuid, \
         version bigint, \
         event_id uuid, \
         event_type text, \
         payload text, \
         metadata text, \
         created_at timestamp, \
         PRIMARY KEY ((aggregate_kind, aggregate_id), version)) \
         WITH CLUSTERING ORDER BY (version ASC)"
    )
}

/// Secondary index backing lookups by event type.
#[must_use]
pub fn create_event_type_index(keyspace: &str) -> String {
    format!("CREATE INDEX IF NOT EXISTS events_event_type_idx ON {keyspace}.events (event_type)")
}

/// Secondary index backing lookups by creation time.
#[must_use]
pub fn create_created_at_index(keyspace: &str) -> String {
    format!("CREATE INDEX IF NOT EXISTS events_created_at_idx ON {keyspace}.events (created_at)")
}

const COLUMNS: &str =
    "aggregate_kind, aggregate_id, version, event_id, event_type, payload, metadata, created_at";

/// Highest persisted version in one partition.
#[must_use]
pub fn select_current_version(keyspace: &str) -> String {
    format!(
        "SELECT version FROM {keyspace}.events \
         WHERE aggregate_kind = ? AND aggregate_id = ? \
         ORDER BY version DESC LIMIT 1"
    )
}

/// One row per event; appended to a logged batch.
#[must_use]
pub fn insert_event(keyspace: &str) -> String {
    format!("INSERT INTO {keyspace}.events ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)")
}

/// A partition, optionally truncated by version.
#[must_use]
pub fn select_partition(keyspace: &str, up_to_version: bool) -> String {
    let bound = if up_to_version { " AND version <= ?" } else { "" };
    format!(
        "SELECT {COLUMNS} FROM {keyspace}.events \
         WHERE aggregate_kind = ? AND aggregate_id = ?{bound}"
    )
}

/// Every event of one type, via the secondary index.
#[must_use]
pub fn select_by_type(keyspace: &str) -> String {
    format!("SELECT {COLUMNS} FROM {keyspace}.events WHERE event_type = ?")
}

/// Every event created in a closed interval.
#[must_use]
pub fn select_by_time_range(keyspace: &str) -> String {
    format!(
        "SELECT {COLUMNS} FROM {keyspace}.events \
         WHERE created_at >= ? AND created_at <= ? ALLOW FILTERING"
    )
}
