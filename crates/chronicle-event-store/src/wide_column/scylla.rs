use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ::scylla::client::session::Session;
use ::scylla::client::session_builder::SessionBuilder;
use ::scylla::statement::batch::{Batch, BatchType};
use tracing::{info, instrument};
use uuid::Uuid;

use chronicle_core::error::EventStoreError;
use chronicle_core::store::TimeRange;

use super::schema;
use super::{EventRow, PartitionKey, WideColumnSession};
use crate::config::ScyllaConfig;
use crate::with_deadline;

type RowTuple = (String, Uuid, i64, Uuid, String, String, String, DateTime<Utc>);

fn into_event_row(row: RowTuple) -> EventRow {
    let (aggregate_kind, aggregate_id, version, event_id, event_type, payload, metadata, created_at) =
        row;
    EventRow {
        aggregate_kind,
        aggregate_id,
        version,
        event_id,
        event_type,
        payload,
        metadata,
        created_at,
    }
}

/// A ScyllaDB / Cassandra session bound to one keyspace.
pub struct ScyllaSession {
    session: Session,
    keyspace: String,
    request_timeout: Duration,
}

impl ScyllaSession {
    /// Connects to the configured contact points.
    ///
    /// # Errors
    ///
    /// A connection error if no node can be reached within the timeout.
    #[instrument(skip(config), fields(nodes = ?config.known_nodes))]
    pub async fn connect(config: &ScyllaConfig) -> Result<Self, EventStoreError> {
        let session = SessionBuilder::new()
            .known_nodes(&config.known_nodes)
            .connection_timeout(config.connection_timeout)
            .build()
            .await
            .map_err(|e| EventStoreError::connection("connect", e))?;

        info!(keyspace = %config.keyspace, "connected to wide-column store");
        Ok(Self {
            session,
            keyspace: config.keyspace.clone(),
            request_timeout: config.request_timeout,
        })
    }

    /// Creates the keyspace, events table and both indexes if absent.
    ///
    /// # Errors
    ///
    /// A storage error if any DDL statement is rejected.
    pub async fn initialize_schema(&self) -> Result<(), EventStoreError> {
        for ddl in [
            schema::create_keyspace(&self.keyspace),
            schema::create_events_table(&self.keyspace),
            schema::create_event_type_index(&self.keyspace),
            schema::create_created_at_index(&self.keyspace),
        ] {
            with_deadline("initialize_schema", self.request_timeout, async {
                self.session
                    .query_unpaged(ddl, &[])
                    .await
                    .map_err(|e| EventStoreError::storage("initialize_schema", e))
            })
            .await?;
        }
        Ok(())
    }

    async fn select_rows<V>(
        &self,
        operation: &'static str,
        statement: String,
        values: V,
    ) -> Result<Vec<EventRow>, EventStoreError>
    where
        V: ::scylla::serialize::row::SerializeRow + Send,
    {
        with_deadline(operation, self.request_timeout, async {
            let result = self
                .session
                .query_unpaged(statement, values)
                .await
                .map_err(|e| EventStoreError::storage(operation, e))?
                .into_rows_result()
                .map_err(|e| EventStoreError::storage(operation, e))?;

            result
                .rows::<RowTuple>()
                .map_err(|e| EventStoreError::serialization(operation, e))?
                .map(|row| {
                    row.map(into_event_row)
                        .map_err(|e| EventStoreError::serialization(operation, e))
                })
                .collect()
        })
        .await
    }
}

#[async_trait]
impl WideColumnSession for ScyllaSession {
    async fn current_version(&self, partition: &PartitionKey) -> Result<i64, EventStoreError> {
        with_deadline("save", self.request_timeout, async {
            let result = self
                .session
                .query_unpaged(
                    schema::select_current_version(&self.keyspace),
                    (partition.aggregate_kind.as_str(), partition.aggregate_id),
                )
                .await
                .map_err(|e| EventStoreError::storage("save", e))?
                .into_rows_result()
                .map_err(|e| EventStoreError::storage("save", e))?;

            let row = result
                .maybe_first_row::<(i64,)>()
                .map_err(|e| EventStoreError::serialization("save", e))?;
            Ok(row.map_or(0, |(version,)| version))
        })
        .await
    }

    async fn insert_batch(&self, rows: &[EventRow]) -> Result<(), EventStoreError> {
        let insert = schema::insert_event(&self.keyspace);
        let mut batch = Batch::new(BatchType::Logged);
        let values: Vec<_> = rows
            .iter()
            .map(|row| {
                batch.append_statement(insert.as_str());
                (
                    row.aggregate_kind.as_str(),
                    row.aggregate_id,
                    row.version,
                    row.event_id,
                    row.event_type.as_str(),
                    row.payload.as_str(),
                    row.metadata.as_str(),
                    row.created_at,
                )
            })
            .collect();

        with_deadline("save", self.request_timeout, async {
            self.session
                .batch(&batch, values)
                .await
                .map_err(|e| EventStoreError::storage("save", e))
        })
        .await?;
        Ok(())
    }

    async fn select_partition(
        &self,
        partition: &PartitionKey,
        up_to_version: Option<i64>,
    ) -> Result<Vec<EventRow>, EventStoreError> {
        let key = (partition.aggregate_kind.as_str(), partition.aggregate_id);
        match up_to_version {
            None => {
                self.select_rows(
                    "load_by_aggregate",
                    schema::select_partition(&self.keyspace, false),
                    key,
                )
                .await
            }
            Some(bound) => {
                self.select_rows(
                    "load_by_aggregate_up_to_version",
                    schema::select_partition(&self.keyspace, true),
                    (key.0, key.1, bound),
                )
                .await
            }
        }
    }

    async fn select_by_type(&self, event_type: &str) -> Result<Vec<EventRow>, EventStoreError> {
        self.select_rows(
            "load_by_type",
            schema::select_by_type(&self.keyspace),
            (event_type,),
        )
        .await
    }

    async fn select_by_time_range(
        &self,
        range: TimeRange,
    ) -> Result<Vec<EventRow>, EventStoreError> {
        self.select_rows(
            "load_by_time_range",
            schema::select_by_time_range(&self.keyspace),
            (range.start, range.end),
        )
        .await
    }
}

impl std::fmt::Debug for ScyllaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScyllaSession")
            .field("keyspace", &self.keyspace)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
