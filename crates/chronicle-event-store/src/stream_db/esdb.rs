use std::time::Duration;

use async_trait::async_trait;
use eventstore::{
    AppendToStreamOptions, Client, ClientSettings, CurrentRevision, EventData, ReadAllOptions,
    ReadStreamOptions, RecordedEvent, StreamPosition,
};
use tracing::{info, instrument};

use chronicle_core::error::EventStoreError;

use super::{ExpectedRevision, ProposedEvent, RecordedEntry, StreamClient, StreamError};
use crate::config::StreamDbConfig;

/// gRPC client for an EventStoreDB / KurrentDB server.
#[derive(Clone)]
pub struct EsdbClient {
    client: Client,
    request_timeout: Duration,
}

impl EsdbClient {
    /// Parses the connection string and creates the client. The first
    /// round trip happens lazily.
    ///
    /// # Errors
    ///
    /// A connection error for an unparsable connection string.
    #[instrument(skip(config))]
    pub fn connect(config: &StreamDbConfig) -> Result<Self, EventStoreError> {
        let settings: ClientSettings = config
            .connection_string
            .parse()
            .map_err(|e| EventStoreError::connection("connect", e))?;
        let client = Client::new(settings).map_err(|e| EventStoreError::connection("connect", e))?;

        info!(prefix = %config.stream_prefix, "stream database client ready");
        Ok(Self {
            client,
            request_timeout: config.request_timeout,
        })
    }
}

fn classify(err: eventstore::Error) -> StreamError {
    match err {
        eventstore::Error::ResourceNotFound => StreamError::StreamNotFound,
        eventstore::Error::WrongExpectedVersion { current, .. } => {
            StreamError::WrongExpectedRevision {
                current: match current {
                    CurrentRevision::Current(revision) => Some(revision),
                    CurrentRevision::NoStream => None,
                },
            }
        }
        eventstore::Error::GrpcConnectionError(e) => StreamError::Unavailable(e.to_string()),
        eventstore::Error::DeadlineExceeded => {
            StreamError::Unavailable("deadline exceeded".to_owned())
        }
        other => StreamError::Backend(other.to_string()),
    }
}

fn entry(recorded: &RecordedEvent) -> RecordedEntry {
    RecordedEntry {
        stream_name: recorded.stream_id.clone(),
        event_id: recorded.id,
        revision: recorded.revision,
        event_type: recorded.event_type.clone(),
        data: recorded.data.clone(),
        custom_metadata: recorded.custom_metadata.clone(),
        created: recorded.created,
    }
}

fn timed_out(limit: Duration) -> StreamError {
    StreamError::Unavailable(format!("no response within {limit:?}"))
}

#[async_trait]
impl StreamClient for EsdbClient {
    async fn append_to_stream(
        &self,
        stream: &str,
        expected: ExpectedRevision,
        events: Vec<ProposedEvent>,
    ) -> Result<(), StreamError> {
        let data = events
            .into_iter()
            .map(|event| {
                EventData::json(event.event_type.as_str(), &event.payload)
                    .and_then(|data| data.id(event.event_id).metadata_as_json(&event.metadata))
                    .map_err(|e| StreamError::Backend(format!("encode {}: {e}", event.event_id)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let options = AppendToStreamOptions::default().expected_revision(match expected {
            ExpectedRevision::NoStream => eventstore::ExpectedRevision::NoStream,
            ExpectedRevision::Exact(revision) => eventstore::ExpectedRevision::Exact(revision),
        });

        tokio::time::timeout(
            self.request_timeout,
            self.client.append_to_stream(stream, &options, data),
        )
        .await
        .map_err(|_| timed_out(self.request_timeout))?
        .map(|_| ())
        .map_err(classify)
    }

    async fn read_stream(
        &self,
        stream: &str,
        max_count: Option<usize>,
    ) -> Result<Vec<RecordedEntry>, StreamError> {
        let mut options = ReadStreamOptions::default()
            .position(StreamPosition::Start)
            .forwards();
        if let Some(max_count) = max_count {
            options = options.max_count(max_count);
        }

        tokio::time::timeout(self.request_timeout, async {
            let mut reader = self
                .client
                .read_stream(stream, &options)
                .await
                .map_err(classify)?;
            let mut entries = Vec::new();
            while let Some(resolved) = reader.next().await.map_err(classify)? {
                if let Some(recorded) = resolved.event.as_ref() {
                    entries.push(entry(recorded));
                }
            }
            Ok(entries)
        })
        .await
        .map_err(|_| timed_out(self.request_timeout))?
    }

    async fn read_all(&self) -> Result<Vec<RecordedEntry>, StreamError> {
        let options = ReadAllOptions::default()
            .position(StreamPosition::Start)
            .forwards();

        tokio::time::timeout(self.request_timeout, async {
            let mut reader = self.client.read_all(&options).await.map_err(classify)?;
            let mut entries = Vec::new();
            while let Some(resolved) = reader.next().await.map_err(classify)? {
                if let Some(recorded) = resolved.event.as_ref() {
                    entries.push(entry(recorded));
                }
            }
            Ok(entries)
        })
        .await
        .map_err(|_| timed_out(self.request_timeout))?
    }
}

impl std::fmt::Debug for EsdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsdbClient")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
