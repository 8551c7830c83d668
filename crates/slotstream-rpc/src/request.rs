//! JSON-RPC 2.0 wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    #[default]
    Null,
}

impl RpcId {
    /// The numeric id, if this is one.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: RpcId,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
///
/// Nodes are not always strict about `jsonrpc` and `id` inside batch replies,
/// so both default instead of failing the parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: RpcId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Returns `true` if this is a successful response (non-null result, no error).
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && matches!(self.result, Some(ref v) if !v.is_null())
    }

    /// Unwrap the result value or return an error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// Parse the body of a batch reply.
///
/// Items that are not valid response objects are dropped; the caller treats
/// an absent item the same as a failed one. Returns `None` if the body is not
/// an array at all (some nodes answer a whole batch with a single error).
pub fn parse_batch(body: Value) -> Option<Vec<JsonRpcResponse>> {
    let Value::Array(items) = body else {
        return None;
    };
    Some(
        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<JsonRpcResponse>(item) {
                Ok(resp) => Some(resp),
                Err(e) => {
                    tracing::debug!(error = %e, "dropping unparseable batch item");
                    None
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serialization() {
        let req = JsonRpcRequest::new(1, "getSlot", vec![json!({ "commitment": "finalized" })]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"getSlot\""));
        assert!(json.contains("\"id\":1"));
    }

    #[test]
    fn response_into_result_ok() {
        let resp: JsonRpcResponse =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 1, "result": 12345 })).unwrap();
        assert!(resp.is_ok());
        assert_eq!(resp.into_result().unwrap(), json!(12345));
    }

    #[test]
    fn response_into_result_error() {
        let resp: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": { "code": -32007, "message": "Slot 3 was skipped" }
        }))
        .unwrap();
        assert!(!resp.is_ok());
        assert_eq!(resp.into_result().unwrap_err().code, -32007);
    }

    #[test]
    fn null_result_is_not_ok() {
        let resp: JsonRpcResponse =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 2, "result": null })).unwrap();
        assert!(!resp.is_ok());
    }

    #[test]
    fn batch_tolerates_missing_ids_and_junk() {
        let items = parse_batch(json!([
            { "jsonrpc": "2.0", "id": 1, "result": { "blockHeight": 1 } },
            { "jsonrpc": "2.0", "result": { "blockHeight": 2 } },
            "garbage",
            { "jsonrpc": "2.0", "id": 3, "error": { "code": -1, "message": "x" } }
        ]))
        .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id.as_number(), Some(1));
        assert_eq!(items[1].id, RpcId::Null);
        assert_eq!(items[2].id.as_number(), Some(3));
    }

    #[test]
    fn batch_rejects_non_array() {
        assert!(parse_batch(json!({ "error": { "code": -32600, "message": "bad" } })).is_none());
    }
}
