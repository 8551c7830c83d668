//! slotstream-solana — Solana slot ingestion: adapter, lister, fetcher, decoder and loop.

pub mod block;
pub mod builder;
pub mod choice;
pub mod client;
pub mod fetcher;
pub mod index_loop;
pub mod lister;

pub use builder::IndexerBuilder;
pub use choice::{Choice, ChoiceDecoder, ChoiceInstruction};
pub use client::SolanaRpcClient;
pub use fetcher::BatchFetcher;
pub use index_loop::{CycleOutcome, IndexLoop};
pub use lister::BlockLister;
