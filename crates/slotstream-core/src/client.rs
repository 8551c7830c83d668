//! The `ChainClient` trait — what the pipeline needs from a ledger node.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::{BlockBody, BlockId};

/// Read access to a ledger.
///
/// Implementations should map timeouts and non-2xx responses to
/// [`IndexerError::Transport`] and missing fields to
/// [`IndexerError::Malformed`]; callers retry both.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Current ledger height.
    async fn current_height(&self) -> Result<BlockId, IndexerError>;

    /// Ordered list of available blocks starting at (and usually including) `since`.
    async fn list_blocks(&self, since: BlockId) -> Result<Vec<BlockId>, IndexerError>;

    /// Fetch bodies for `ids` in one composite request.
    ///
    /// The returned map may omit ids that failed individually; absence means
    /// "retry this one". An `Err` means no item succeeded.
    async fn fetch_block_bodies(
        &self,
        ids: &[BlockId],
    ) -> Result<HashMap<BlockId, BlockBody>, IndexerError>;
}
