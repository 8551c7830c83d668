//! slotstream-rpc — JSON-RPC transport for SlotStream.
//!
//! - [`RpcTransport`] — the async trait the ledger adapter talks through
//! - [`HttpRpcClient`] — `reqwest` implementation with true HTTP batching
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`] — wire types
//! - [`TransportError`] — structured error type, convertible into `IndexerError`

pub mod error;
pub mod http;
pub mod request;
pub mod transport;

pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use request::{parse_batch, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::RpcTransport;
