//! Fluent builder API for creating Solana indexers.
//!
//! # Example
//!
//! ```rust,no_run
//! use slotstream_solana::IndexerBuilder;
//!
//! let config = IndexerBuilder::new()
//!     .endpoint("https://api.devnet.solana.com")
//!     .program("49tLGpRt6ikpsGrWQ5ke5QJcFjJGqrbkNgLgUvK8gBKS")
//!     .batch_limit(100)
//!     .max_parallel_fetchers(10)
//!     .build_config();
//! ```

use slotstream_core::checkpoint::CheckpointStore;
use slotstream_core::decoder::BlockDecoder;
use slotstream_core::error::IndexerError;
use slotstream_core::indexer::{IndexerConfig, PersistenceFailurePolicy};

use crate::choice::ChoiceDecoder;
use crate::client::SolanaRpcClient;
use crate::index_loop::IndexLoop;

/// Fluent builder for `IndexerConfig`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Start from an existing config (e.g. loaded from YAML).
    pub fn from_config(config: IndexerConfig) -> Self {
        Self { config }
    }

    /// Set the JSON-RPC endpoint.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = url.into();
        self
    }

    /// Set the program whose instructions are ingested.
    pub fn program(mut self, program_id: impl Into<String>) -> Self {
        self.config.program_filter_id = program_id.into();
        self
    }

    /// Set the commitment level (`finalized`, `confirmed`, ...).
    pub fn commitment(mut self, commitment: impl Into<String>) -> Self {
        self.config.commitment = commitment.into();
        self
    }

    /// Set the number of slots per batched `getBlock` request.
    pub fn batch_limit(mut self, n: usize) -> Self {
        self.config.batch_limit = n;
        self
    }

    pub fn max_parallel_fetchers(mut self, n: usize) -> Self {
        self.config.max_parallel_fetchers = n;
        self
    }

    /// Set the idle polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn retry_jitter(mut self, fraction: f64) -> Self {
        self.config.retry_jitter = fraction;
        self
    }

    /// Cap retries instead of retrying forever.
    pub fn max_retry_attempts(mut self, n: u32) -> Self {
        self.config.max_retry_attempts = Some(n);
        self
    }

    pub fn on_persistence_failure(mut self, policy: PersistenceFailurePolicy) -> Self {
        self.config.on_persistence_failure = policy;
        self
    }

    pub fn database_path(mut self, path: impl Into<String>) -> Self {
        self.config.database_path = path.into();
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }

    /// Validate the config and wire an HTTP-backed loop for the choice program.
    pub fn build(
        self,
        store: Box<dyn CheckpointStore>,
    ) -> Result<IndexLoop<SolanaRpcClient>, IndexerError> {
        self.config.validate()?;
        let client = SolanaRpcClient::from_config(&self.config)?;
        let decoder = BlockDecoder::new(
            self.config.program_filter_id.as_str(),
            Box::new(ChoiceDecoder),
        );
        tracing::debug!(
            endpoint = %client.url(),
            program = %decoder.program_id(),
            "index loop built"
        );
        Ok(IndexLoop::new(self.config, client, decoder, store))
    }
}
