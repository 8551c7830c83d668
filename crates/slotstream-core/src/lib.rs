//! slotstream-core — foundation for the resumable, order-preserving ingestion pipeline.
//!
//! # Architecture
//!
//! ```text
//! IndexerBuilder → IndexLoop
//!                      ├── CheckpointManager (cursor + atomic commit)
//!                      ├── BlockLister       (new slots since cursor, retried)
//!                      ├── BatchFetcher      (chunked, bounded parallel fetch)
//!                      ├── sequence()        (restore ledger order)
//!                      ├── BlockDecoder      (program filter → schema decode)
//!                      └── build_rows()      (contiguous ids, sentinel rows)
//! ```
//!
//! This crate holds the chain-agnostic pieces; the Solana adapter, lister,
//! fetcher and loop live in `slotstream-solana`.

pub mod checkpoint;
pub mod client;
pub mod decoder;
pub mod error;
pub mod indexer;
pub mod retry;
pub mod rows;
pub mod sequencer;
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore, MemoryCheckpointStore};
pub use client::ChainClient;
pub use decoder::{BlockDecoder, DecodeOutcome, InstructionDecoder};
pub use error::IndexerError;
pub use indexer::{IndexerConfig, IndexerState, LogConfig, PersistenceFailurePolicy};
pub use retry::{RetryConfig, RetryPolicy};
pub use rows::{build_rows, RowBatch};
pub use sequencer::sequence;
pub use types::{
    AccountKey, BlockBody, BlockId, DecodedEvent, Instruction, ProgramRef, Row, RowPayload,
    Transaction,
};
