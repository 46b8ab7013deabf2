//! JSON-RPC 2.0 envelopes for the two `eth_*` calls the poller makes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Outgoing call. Ids are numeric and allocated by the client.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// The `error` member of a failed response, as sent by the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("node error {code}: {message}")]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Incoming reply.
///
/// `id` is `None` when the node could not parse the request and answered with `"id": null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// The result value, or the node's error object.
    ///
    /// An absent `result` is read as `null`; `eth_getBlockByNumber` uses that for
    /// a block the node does not have yet.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
