//! Error types for the slotstream pipeline.

use thiserror::Error;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Timeout, non-2xx response or connection failure talking to the ledger.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The ledger answered, but the response lacked the fields we need.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// An instruction payload did not match the program schema.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The durable store could not commit a batch.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The store's next row id disagrees with the one being written or read.
    #[error("Checkpoint mismatch: store expects next row {expected}, got {actual}")]
    CheckpointMismatch { expected: u64, actual: u64 },

    #[error("Block {0} missing from fetch results")]
    MissingBlock(u64),

    #[error("{operation} gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the error is worth retrying at the layer that saw it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Malformed(_))
    }

    /// Returns `true` if a durable commit failed.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::CheckpointMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(IndexerError::Transport("timeout".into()).is_transient());
        assert!(IndexerError::Malformed("no result".into()).is_transient());
        assert!(!IndexerError::Decode("bad tag".into()).is_transient());
        assert!(!IndexerError::Storage("disk full".into()).is_transient());
    }

    #[test]
    fn mismatch_message_names_store_side_first() {
        let err = IndexerError::CheckpointMismatch {
            expected: 5,
            actual: 0,
        };
        assert_eq!(
            err.to_string(),
            "Checkpoint mismatch: store expects next row 5, got 0"
        );
    }

    #[test]
    fn persistence_classification() {
        assert!(IndexerError::Storage("locked".into()).is_persistence());
        assert!(!IndexerError::Transport("503".into()).is_persistence());
    }
}
