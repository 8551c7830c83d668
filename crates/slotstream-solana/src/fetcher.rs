//! Batch fetcher — block bodies for many slots under bounded concurrency.
//!
//! Slots are split into chunks of at most `batch_limit`. Each chunk keeps a
//! completion mask and re-requests only the slots still missing until every
//! slot is present. With more than one chunk, each chunk runs in its own
//! task and at most `max_parallel` of them hold a permit at once. Chunks are
//! disjoint, so every task owns its own mask and map; the join is the only
//! synchronization point.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use slotstream_core::client::ChainClient;
use slotstream_core::error::IndexerError;
use slotstream_core::retry::RetryPolicy;
use slotstream_core::types::{BlockBody, BlockId};

/// Fetches block bodies in parallel chunks with item-level retry.
pub struct BatchFetcher<C> {
    client: Arc<C>,
    batch_limit: usize,
    max_parallel: usize,
    retry: RetryPolicy,
}

impl<C: ChainClient> BatchFetcher<C> {
    pub fn new(client: Arc<C>, batch_limit: usize, max_parallel: usize, retry: RetryPolicy) -> Self {
        Self {
            client,
            batch_limit: batch_limit.max(1),
            max_parallel: max_parallel.max(1),
            retry,
        }
    }

    /// Fetch a body for every id in `ids`.
    ///
    /// Returns only once the map holds every requested slot, or with
    /// `RetriesExhausted` if a bounded policy runs out.
    pub async fn fetch(&self, ids: &[BlockId]) -> Result<HashMap<BlockId, BlockBody>, IndexerError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let chunks: Vec<Vec<BlockId>> = ids.chunks(self.batch_limit).map(<[_]>::to_vec).collect();
        if chunks.len() == 1 {
            return fetch_chunk(self.client.as_ref(), &chunks[0], &self.retry).await;
        }

        tracing::debug!(
            slots = ids.len(),
            chunks = chunks.len(),
            max_parallel = self.max_parallel,
            "fetching in parallel"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                let client = Arc::clone(&self.client);
                let retry = self.retry.clone();
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| IndexerError::Other(format!("semaphore closed: {e}")))?;
                    fetch_chunk(client.as_ref(), &chunk, &retry).await
                })
            })
            .collect();

        let mut merged = HashMap::with_capacity(ids.len());
        for joined in join_all(handles).await {
            let bodies = joined
                .map_err(|e| IndexerError::Other(format!("fetch task failed: {e}")))??;
            merged.extend(bodies);
        }
        Ok(merged)
    }
}

/// Drive one chunk to completion.
///
/// The attempt counter resets whenever a round makes progress, so a bounded
/// policy only gives up after that many fruitless rounds in a row.
async fn fetch_chunk<C: ChainClient + ?Sized>(
    client: &C,
    chunk: &[BlockId],
    retry: &RetryPolicy,
) -> Result<HashMap<BlockId, BlockBody>, IndexerError> {
    let mut done = vec![false; chunk.len()];
    let mut bodies = HashMap::with_capacity(chunk.len());
    let mut attempt = 0u32;

    loop {
        let pending: Vec<BlockId> = chunk
            .iter()
            .zip(&done)
            .filter(|(_, done)| !**done)
            .map(|(id, _)| *id)
            .collect();

        let last_error = match client.fetch_block_bodies(&pending).await {
            Ok(mut got) => {
                let mut progress = 0usize;
                for (slot, flag) in chunk.iter().zip(done.iter_mut()) {
                    if *flag {
                        continue;
                    }
                    if let Some(body) = got.remove(slot) {
                        bodies.insert(*slot, body);
                        *flag = true;
                        progress += 1;
                    }
                }
                if progress == pending.len() {
                    return Ok(bodies);
                }
                if progress > 0 {
                    attempt = 0;
                }
                format!("{} of {} slots missing from reply", pending.len() - progress, pending.len())
            }
            Err(e) if e.is_transient() => e.to_string(),
            Err(e) => return Err(e),
        };

        attempt += 1;
        match retry.next_delay(attempt) {
            Some(delay) => {
                tracing::warn!(
                    first_slot = chunk[0],
                    attempt,
                    outstanding = done.iter().filter(|d| !**d).count(),
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "retrying block fetch"
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                tracing::error!(first_slot = chunk[0], attempt, error = %last_error, "giving up on block fetch");
                return Err(IndexerError::RetriesExhausted {
                    operation: "getBlock".into(),
                    attempts: attempt,
                    last_error,
                });
            }
        }
    }
}
