//! The `RpcTransport` trait - the seam between the eth client and the wire.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// A JSON-RPC transport (HTTP in production, scripted fakes in tests).
///
/// Implementations must be `Send + Sync` for use across Tokio tasks and are
/// stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Return the transport's identifier (URL or name).
    fn url(&self) -> &str;
}
