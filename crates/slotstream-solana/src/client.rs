//! Solana JSON-RPC adapter for [`ChainClient`].
//!
//! Uses `getSlot`, `getBlocks` and batched `getBlock`. Batch items are matched
//! back to slots by JSON-RPC id (`index + 1`), never by position.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use slotstream_core::client::ChainClient;
use slotstream_core::error::IndexerError;
use slotstream_core::indexer::IndexerConfig;
use slotstream_core::types::{BlockBody, BlockId};
use slotstream_rpc::{HttpClientConfig, HttpRpcClient, JsonRpcRequest, RpcTransport};

use crate::block::block_from_json;

/// [`ChainClient`] over any [`RpcTransport`].
pub struct SolanaRpcClient {
    transport: Arc<dyn RpcTransport>,
    commitment: String,
}

impl SolanaRpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>, commitment: impl Into<String>) -> Self {
        Self {
            transport,
            commitment: commitment.into(),
        }
    }

    /// HTTP client for `config.endpoint_url` with the configured timeout.
    pub fn from_config(config: &IndexerConfig) -> Result<Self, IndexerError> {
        let http = HttpRpcClient::new(
            config.endpoint_url.clone(),
            HttpClientConfig {
                request_timeout: config.request_timeout(),
            },
        )?;
        Ok(Self::new(Arc::new(http), config.commitment.clone()))
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    fn get_block_request(&self, id: u64, slot: BlockId) -> JsonRpcRequest {
        JsonRpcRequest::new(
            id,
            "getBlock",
            vec![
                json!(slot),
                json!({
                    "encoding": "json",
                    "maxSupportedTransactionVersion": 0,
                    "transactionDetails": "full",
                    "rewards": false,
                    "commitment": self.commitment,
                }),
            ],
        )
    }
}

#[async_trait]
impl ChainClient for SolanaRpcClient {
    async fn current_height(&self) -> Result<BlockId, IndexerError> {
        let v = self
            .transport
            .call(1, "getSlot", vec![json!({ "commitment": self.commitment })])
            .await?;
        v.as_u64()
            .ok_or_else(|| IndexerError::Malformed(format!("getSlot returned {v}")))
    }

    async fn list_blocks(&self, since: BlockId) -> Result<Vec<BlockId>, IndexerError> {
        let v = self
            .transport
            .call(
                1,
                "getBlocks",
                vec![json!(since), json!({ "commitment": self.commitment })],
            )
            .await?;
        if v.is_null() {
            return Err(IndexerError::Malformed("getBlocks returned null".into()));
        }
        serde_json::from_value::<Vec<BlockId>>(v)
            .map_err(|e| IndexerError::Malformed(format!("getBlocks: {e}")))
    }

    async fn fetch_block_bodies(
        &self,
        ids: &[BlockId],
    ) -> Result<HashMap<BlockId, BlockBody>, IndexerError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let reqs = ids
            .iter()
            .enumerate()
            .map(|(i, &slot)| self.get_block_request(i as u64 + 1, slot))
            .collect();
        let responses = self.transport.send_batch(reqs).await?;

        let mut out = HashMap::with_capacity(responses.len());
        for resp in responses {
            let Some(slot) = resp
                .id
                .as_number()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| ids.get(i as usize).copied())
            else {
                tracing::debug!(id = %resp.id, "batch item with unknown id");
                continue;
            };
            if !resp.is_ok() {
                match &resp.error {
                    Some(err) => {
                        tracing::debug!(slot, code = err.code, message = %err.message, "getBlock item failed")
                    }
                    None => tracing::debug!(slot, "getBlock item without result"),
                }
                continue;
            }
            let Some(result) = resp.result else {
                continue;
            };
            match block_from_json(slot, result) {
                Ok(body) => {
                    out.insert(slot, body);
                }
                Err(e) => tracing::debug!(slot, error = %e, "getBlock item unparseable"),
            }
        }
        Ok(out)
    }
}
