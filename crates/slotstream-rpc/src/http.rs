//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! One attempt per call with a per-request timeout. Batches go out as a
//! single HTTP request holding a JSON array.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{parse_batch, JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP JSON-RPC client.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            request_timeout: config.request_timeout,
        })
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    /// POST `body` and return the raw reply bytes of a 2xx response.
    async fn post<B: serde::Serialize + ?Sized>(&self, body: &B) -> Result<Vec<u8>, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        let bytes = resp.bytes().await.map_err(|e| self.map_reqwest(e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(method = %req.method, id = %req.id, url = %self.url, "rpc call");
        let bytes = self.post(&req).await?;
        Ok(serde_json::from_slice::<JsonRpcResponse>(&bytes)?)
    }

    /// True HTTP batch: send all requests as a JSON array in one HTTP call.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        tracing::trace!(items = reqs.len(), url = %self.url, "rpc batch");

        let bytes = self.post(&reqs).await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        match parse_batch(body.clone()) {
            Some(items) => Ok(items),
            None => {
                // A whole-batch rejection comes back as one error object.
                if let Ok(JsonRpcResponse { error: Some(err), .. }) =
                    serde_json::from_value::<JsonRpcResponse>(body)
                {
                    return Err(TransportError::Rpc(err));
                }
                Err(TransportError::Deserialization(
                    <serde_json::Error as serde::de::Error>::custom("batch reply is not an array"),
                ))
            }
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}
