//! ethwatch-http - JSON-RPC over HTTP for EthWatch.
//!
//! - [`HttpRpcClient`] - `reqwest`-backed [`RpcTransport`](ethwatch_core::RpcTransport)
//! - [`RpcEthClient`] - `eth_blockNumber` / `eth_getBlockByNumber` over any transport

pub mod client;
pub mod eth;

pub use client::{HttpClientConfig, HttpRpcClient};
pub use eth::RpcEthClient;
