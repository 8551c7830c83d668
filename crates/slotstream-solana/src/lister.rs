//! Block lister — turns the cursor into the list of new slots.

use std::sync::Arc;

use slotstream_core::client::ChainClient;
use slotstream_core::error::IndexerError;
use slotstream_core::retry::RetryPolicy;
use slotstream_core::types::BlockId;

/// Lists slots after the cursor, retrying transport failures per the policy.
pub struct BlockLister<C> {
    client: Arc<C>,
    retry: RetryPolicy,
}

impl<C: ChainClient> BlockLister<C> {
    pub fn new(client: Arc<C>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Current ledger height.
    pub async fn current_height(&self) -> Result<BlockId, IndexerError> {
        let client = &self.client;
        self.retry
            .retry("getSlot", move || client.current_height())
            .await
    }

    /// Ascending slots strictly after `cursor`. Empty means nothing new yet.
    ///
    /// The node includes the start slot when it exists, so it is dropped here.
    pub async fn list_since(&self, cursor: BlockId) -> Result<Vec<BlockId>, IndexerError> {
        let client = &self.client;
        let mut ids = self
            .retry
            .retry("getBlocks", move || client.list_blocks(cursor))
            .await?;
        ids.retain(|&id| id > cursor);
        tracing::debug!(cursor, new = ids.len(), "listed blocks");
        Ok(ids)
    }
}
