//! `eth_*` calls over a [`RpcTransport`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ethwatch_core::client::EthRpcClient;
use ethwatch_core::error::{TransportError, WatchError};
use ethwatch_core::quantity::{decode_quantity, encode_quantity};
use ethwatch_core::request::JsonRpcRequest;
use ethwatch_core::transport::RpcTransport;
use ethwatch_core::types::Block;

/// Ethereum JSON-RPC client over any transport.
pub struct RpcEthClient {
    transport: Arc<dyn RpcTransport>,
    next_id: AtomicU64,
}

impl RpcEthClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    /// The endpoint this client talks to.
    pub fn url(&self) -> &str {
        self.transport.url()
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resp = self.transport.send(JsonRpcRequest::new(id, method, params)).await?;
        if resp.id.is_some_and(|echoed| echoed != id) {
            tracing::warn!(method, sent = id, echoed = ?resp.id, "response id does not match request");
        }
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        serde_json::from_value(result).map_err(TransportError::Deserialization)
    }
}

#[async_trait]
impl EthRpcClient for RpcEthClient {
    async fn block_number(&self) -> Result<u64, WatchError> {
        let hex: String = self.call("eth_blockNumber", vec![]).await?;
        decode_quantity(&hex)
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<Block>, WatchError> {
        let block: Option<Block> = self
            .call(
                "eth_getBlockByNumber",
                vec![Value::String(encode_quantity(number)), Value::Bool(true)],
            )
            .await?;
        Ok(block)
    }
}
