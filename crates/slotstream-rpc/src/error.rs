//! Transport-level error types.

use slotstream_core::IndexerError;
use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, broken body).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is retryable (transient).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. } | Self::Rpc(_))
    }
}

impl From<TransportError> for IndexerError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Deserialization(inner) => IndexerError::Malformed(inner.to_string()),
            other if other.is_retryable() => IndexerError::Transport(other.to_string()),
            other => IndexerError::Other(other.to_string()),
        }
    }
}
