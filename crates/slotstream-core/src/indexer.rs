//! Indexer configuration and state types.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::retry::{RetryConfig, RetryPolicy};

/// Commitment levels `getBlock` accepts.
pub const SUPPORTED_COMMITMENTS: &[&str] = &["confirmed", "finalized"];

/// What the control loop does when a batch cannot be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceFailurePolicy {
    /// Abandon the cycle and retry it from the same cursor after a poll interval.
    #[default]
    Retry,
    /// Stop the loop and return the error.
    Abort,
}

/// Logging options, consumed by the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `"trace" | "debug" | "info" | "warn" | "error"` or a full filter directive.
    pub level: String,
    /// Emit JSON structured logs instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

/// Configuration for an indexer instance.
///
/// Built once at startup and passed by value into every component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// JSON-RPC endpoint of the ledger node.
    pub endpoint_url: String,
    /// Base58 id of the program whose instructions are ingested.
    pub program_filter_id: String,
    /// Commitment level passed to the node.
    pub commitment: String,
    /// Maximum items per composite request.
    pub batch_limit: usize,
    /// Maximum chunk requests in flight at once.
    pub max_parallel_fetchers: usize,
    /// Wait between polling cycles when there is nothing new (milliseconds).
    pub poll_interval_ms: u64,
    /// Per-request timeout (milliseconds).
    pub request_timeout_ms: u64,
    /// Wait between retries of a failed request (milliseconds).
    pub retry_delay_ms: u64,
    /// Extra random wait as a fraction of `retry_delay_ms`.
    pub retry_jitter: f64,
    /// Give up after this many attempts. `None` retries forever.
    pub max_retry_attempts: Option<u32>,
    pub on_persistence_failure: PersistenceFailurePolicy,
    /// SQLite file holding rows and checkpoint.
    pub database_path: String,
    pub log: LogConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "https://api.devnet.solana.com".into(),
            program_filter_id: String::new(),
            commitment: "finalized".into(),
            batch_limit: 100,
            max_parallel_fetchers: 10,
            poll_interval_ms: 250,
            request_timeout_ms: 10_000,
            retry_delay_ms: 250,
            retry_jitter: 0.0,
            max_retry_attempts: None,
            on_persistence_failure: PersistenceFailurePolicy::Retry,
            database_path: "slotstream.db".into(),
            log: LogConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, IndexerError> {
        serde_yaml::from_str(yaml).map_err(|e| IndexerError::Config(e.to_string()))
    }

    /// Read and parse a YAML config file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| IndexerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.endpoint_url.trim().is_empty() {
            return Err(IndexerError::Config("endpoint_url is empty".into()));
        }
        if self.program_filter_id.trim().is_empty() {
            return Err(IndexerError::Config("program_filter_id is empty".into()));
        }
        if !SUPPORTED_COMMITMENTS.contains(&self.commitment.as_str()) {
            return Err(IndexerError::Config(format!(
                "commitment must be one of {SUPPORTED_COMMITMENTS:?}, got {:?}",
                self.commitment
            )));
        }
        if self.batch_limit == 0 {
            return Err(IndexerError::Config("batch_limit must be at least 1".into()));
        }
        if self.max_parallel_fetchers == 0 {
            return Err(IndexerError::Config(
                "max_parallel_fetchers must be at least 1".into(),
            ));
        }
        if self.max_retry_attempts == Some(0) {
            return Err(IndexerError::Config(
                "max_retry_attempts must be at least 1 when set".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry_jitter) {
            return Err(IndexerError::Config("retry_jitter must be within 0..=1".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The retry policy shared by the lister and the fetcher.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            delay: Duration::from_millis(self.retry_delay_ms),
            jitter_fraction: self.retry_jitter,
            max_attempts: self.max_retry_attempts,
        })
    }
}

/// Runtime state of the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    /// Not yet started.
    Idle,
    /// Polling and committing cycles.
    Running,
    /// Terminated.
    Stopped,
    /// Encountered an unrecoverable error.
    Error,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}
