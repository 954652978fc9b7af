//! In-process fakes for the two native driver seams.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use chronicle_core::error::EventStoreError;
use chronicle_core::store::TimeRange;
use chronicle_event_store::stream_db::{
    ExpectedRevision, ProposedEvent, RecordedEntry, StreamClient, StreamError,
};
use chronicle_event_store::wide_column::{EventRow, PartitionKey, WideColumnSession};

type RowKey = (String, Uuid, i64);

#[derive(Debug, Default)]
struct WideColumnState {
    /// Primary key -> row. Inserting an existing key overwrites it, as the
    /// real table does.
    rows: BTreeMap<RowKey, EventRow>,
    batches: usize,
}

/// A wide-column table held in memory. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct FakeWideColumnSession {
    state: Arc<Mutex<WideColumnState>>,
    /// Yield to the scheduler between reading the version and writing,
    /// widening the pre-check window so races become observable.
    yield_after_read: Arc<AtomicBool>,
    fail_inserts: Arc<AtomicBool>,
    version_reads: Arc<AtomicUsize>,
}

impl FakeWideColumnSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn yield_after_read(&self) {
        self.yield_after_read.store(true, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub async fn batches(&self) -> usize {
        self.state.lock().await.batches
    }

    pub async fn row_count(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    pub fn version_reads(&self) -> usize {
        self.version_reads.load(Ordering::SeqCst)
    }

    pub async fn insert_raw(&self, row: EventRow) {
        let key = (row.aggregate_kind.clone(), row.aggregate_id, row.version);
        self.state.lock().await.rows.insert(key, row);
    }
}

#[async_trait]
impl WideColumnSession for FakeWideColumnSession {
    async fn current_version(&self, partition: &PartitionKey) -> Result<i64, EventStoreError> {
        self.version_reads.fetch_add(1, Ordering::SeqCst);
        let version = {
            let state = self.state.lock().await;
            state
                .rows
                .values()
                .filter(|r| {
                    r.aggregate_kind == partition.aggregate_kind
                        && r.aggregate_id == partition.aggregate_id
                })
                .map(|r| r.version)
                .max()
                .unwrap_or(0)
        };
        if self.yield_after_read.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        Ok(version)
    }

    async fn insert_batch(&self, rows: &[EventRow]) -> Result<(), EventStoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(EventStoreError::storage("save", "write timeout"));
        }
        let mut state = self.state.lock().await;
        for row in rows {
            let key = (row.aggregate_kind.clone(), row.aggregate_id, row.version);
            state.rows.insert(key, row.clone());
        }
        state.batches += 1;
        Ok(())
    }

    async fn select_partition(
        &self,
        partition: &PartitionKey,
        up_to_version: Option<i64>,
    ) -> Result<Vec<EventRow>, EventStoreError> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .values()
            .filter(|r| {
                r.aggregate_kind == partition.aggregate_kind
                    && r.aggregate_id == partition.aggregate_id
                    && up_to_version.is_none_or(|bound| r.version <= bound)
            })
            .cloned()
            .collect())
    }

    async fn select_by_type(&self, event_type: &str) -> Result<Vec<EventRow>, EventStoreError> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .values()
            .filter(|r| r.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn select_by_time_range(
        &self,
        range: TimeRange,
    ) -> Result<Vec<EventRow>, EventStoreError> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .values()
            .filter(|r| range.contains(r.created_at))
            .cloned()
            .collect())
    }
}

/// A stream database held in memory: named streams plus one global log.
#[derive(Debug, Clone, Default)]
pub struct FakeStreamClient {
    log: Arc<Mutex<Vec<RecordedEntry>>>,
    unavailable: Arc<AtomicBool>,
    appends: Arc<AtomicUsize>,
}

impl FakeStreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn go_offline(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    /// Appends an entry as some other tool would, bypassing the adapter.
    pub async fn append_raw(
        &self,
        stream: &str,
        event_type: &str,
        data: &str,
        custom_metadata: &str,
        created: DateTime<Utc>,
    ) -> RecordedEntry {
        let mut log = self.log.lock().await;
        let revision = next_revision(&log, stream);
        let entry = RecordedEntry {
            stream_name: stream.to_owned(),
            event_id: Uuid::new_v4(),
            revision,
            event_type: event_type.to_owned(),
            data: Bytes::copy_from_slice(data.as_bytes()),
            custom_metadata: Bytes::copy_from_slice(custom_metadata.as_bytes()),
            created,
        };
        log.push(entry.clone());
        entry
    }

    fn check_online(&self) -> Result<(), StreamError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StreamError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

fn last_revision(log: &[RecordedEntry], stream: &str) -> Option<u64> {
    log.iter()
        .filter(|e| e.stream_name == stream)
        .map(|e| e.revision)
        .max()
}

fn next_revision(log: &[RecordedEntry], stream: &str) -> u64 {
    last_revision(log, stream).map_or(0, |r| r + 1)
}

#[async_trait]
impl StreamClient for FakeStreamClient {
    async fn append_to_stream(
        &self,
        stream: &str,
        expected: ExpectedRevision,
        events: Vec<ProposedEvent>,
    ) -> Result<(), StreamError> {
        self.check_online()?;
        let mut log = self.log.lock().await;
        let current = last_revision(&log, stream);
        let matches = match expected {
            ExpectedRevision::NoStream => current.is_none(),
            ExpectedRevision::Exact(revision) => current == Some(revision),
        };
        if !matches {
            return Err(StreamError::WrongExpectedRevision { current });
        }

        let mut revision = next_revision(&log, stream);
        let created = Utc::now();
        for event in events {
            let metadata = serde_json::to_vec(&event.metadata)
                .map_err(|e| StreamError::Backend(e.to_string()))?;
            log.push(RecordedEntry {
                stream_name: stream.to_owned(),
                event_id: event.event_id,
                revision,
                event_type: event.event_type,
                data: Bytes::copy_from_slice(event.payload.as_bytes()),
                custom_metadata: metadata.into(),
                created,
            });
            revision += 1;
        }
        self.appends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_stream(
        &self,
        stream: &str,
        max_count: Option<usize>,
    ) -> Result<Vec<RecordedEntry>, StreamError> {
        self.check_online()?;
        let log = self.log.lock().await;
        let entries: Vec<RecordedEntry> = log
            .iter()
            .filter(|e| e.stream_name == stream)
            .take(max_count.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        if entries.is_empty() {
            return Err(StreamError::StreamNotFound);
        }
        Ok(entries)
    }

    async fn read_all(&self) -> Result<Vec<RecordedEntry>, StreamError> {
        self.check_online()?;
        Ok(self.log.lock().await.clone())
    }
}
