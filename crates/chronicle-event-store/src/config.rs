//! Connection settings for the networked adapters, read from the environment.

use std::time::Duration;

use chronicle_core::error::EventStoreError;

/// Stream prefix used when none is configured.
pub const DEFAULT_STREAM_PREFIX: &str = "chronicle";

/// Partition kind used when none is configured.
pub const DEFAULT_AGGREGATE_KIND: &str = "default";

fn parse_millis(key: &str, raw: &str) -> Result<Duration, EventStoreError> {
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| EventStoreError::connection("configure", format!("{key} must be milliseconds: {e}")))
}

/// Settings for [`ScyllaSession`](crate::wide_column::scylla::ScyllaSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScyllaConfig {
    /// Contact points, `host:port`.
    pub known_nodes: Vec<String>,
    /// Keyspace holding the events table.
    pub keyspace: String,
    /// First half of the partition key for every aggregate this store serves.
    pub aggregate_kind: String,
    /// Deadline for establishing the session.
    pub connection_timeout: Duration,
    /// Deadline for each round trip.
    pub request_timeout: Duration,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            known_nodes: vec!["127.0.0.1:9042".to_owned()],
            keyspace: "chronicle".to_owned(),
            aggregate_kind: DEFAULT_AGGREGATE_KIND.to_owned(),
            connection_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ScyllaConfig {
    /// Reads `SCYLLA_NODES` (comma-separated), `SCYLLA_KEYSPACE`,
    /// `SCYLLA_AGGREGATE_KIND` and `SCYLLA_REQUEST_TIMEOUT_MS`, defaulting
    /// anything unset.
    ///
    /// # Errors
    ///
    /// A connection-kind error if a value is present but malformed.
    pub fn from_env() -> Result<Self, EventStoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// A connection-kind error if a value is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EventStoreError> {
        let mut config = Self::default();
        if let Some(nodes) = lookup("SCYLLA_NODES") {
            config.known_nodes = nodes
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_owned)
                .collect();
            if config.known_nodes.is_empty() {
                return Err(EventStoreError::connection(
                    "configure",
                    "SCYLLA_NODES lists no nodes",
                ));
            }
        }
        if let Some(keyspace) = lookup("SCYLLA_KEYSPACE") {
            config.keyspace = keyspace;
        }
        if let Some(kind) = lookup("SCYLLA_AGGREGATE_KIND").filter(|k| !k.is_empty()) {
            config.aggregate_kind = kind;
        }
        if let Some(raw) = lookup("SCYLLA_REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("SCYLLA_REQUEST_TIMEOUT_MS", &raw)?;
        }
        Ok(config)
    }
}

/// Settings for [`EsdbClient`](crate::stream_db::esdb::EsdbClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDbConfig {
    /// `esdb://` connection string.
    pub connection_string: String,
    /// Stream names are `{stream_prefix}-{aggregate_id}`.
    pub stream_prefix: String,
    /// Deadline for each round trip.
    pub request_timeout: Duration,
}

impl Default for StreamDbConfig {
    fn default() -> Self {
        Self {
            connection_string: "esdb://localhost:2113?tls=false".to_owned(),
            stream_prefix: DEFAULT_STREAM_PREFIX.to_owned(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl StreamDbConfig {
    /// Builds an insecure connection string from a server URL and credentials.
    ///
    /// # Errors
    ///
    /// A connection-kind error if `url` has no host.
    pub fn from_url(
        url: &str,
        username: &str,
        password: &str,
        stream_prefix: &str,
    ) -> Result<Self, EventStoreError> {
        let authority = url.split_once("://").map_or(url, |(_, rest)| rest);
        let host = authority
            .split(['/', '?', '#'])
            .next()
            .map(|h| h.rsplit('@').next().unwrap_or(h))
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                EventStoreError::connection("configure", format!("no host in {url:?}"))
            })?;

        Ok(Self {
            connection_string: format!("esdb://{username}:{password}@{host}?tls=false"),
            stream_prefix: prefix_or_default(stream_prefix),
            ..Self::default()
        })
    }

    /// Reads `EVENTSTORE_CONNECTION_STRING`, `EVENTSTORE_STREAM_PREFIX` and
    /// `EVENTSTORE_REQUEST_TIMEOUT_MS`, defaulting anything unset.
    ///
    /// # Errors
    ///
    /// A connection-kind error if a value is present but malformed.
    pub fn from_env() -> Result<Self, EventStoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// A connection-kind error if a value is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EventStoreError> {
        let mut config = Self::default();
        if let Some(connection_string) = lookup("EVENTSTORE_CONNECTION_STRING") {
            config.connection_string = connection_string;
        }
        if let Some(prefix) = lookup("EVENTSTORE_STREAM_PREFIX") {
            config.stream_prefix = prefix_or_default(&prefix);
        }
        if let Some(raw) = lookup("EVENTSTORE_REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("EVENTSTORE_REQUEST_TIMEOUT_MS", &raw)?;
        }
        Ok(config)
    }
}

fn prefix_or_default(prefix: &str) -> String {
    if prefix.is_empty() {
        DEFAULT_STREAM_PREFIX.to_owned()
    } else {
        prefix.to_owned()
    }
}
