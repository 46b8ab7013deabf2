//! ethwatch-core - foundation types and collaborator contracts for EthWatch.
//!
//! # Architecture
//!
//! ```text
//! EthWatcher → ChainPoller ──(TxDelivery per watched address)──► SubscriptionRegistry channels
//!                                                                     │
//!              IngestCoordinator ◄────────────────────────────────────┘
//!                     └── TransactionStore (address ledger)
//! ```
//!
//! This crate defines:
//! - [`Transaction`] / [`Block`] - wire types with the `0x` hex quantity codec
//! - [`RpcTransport`] / [`JsonRpcRequest`] / [`JsonRpcResponse`] - JSON-RPC 2.0 plumbing
//! - [`EthRpcClient`] - the two `eth_*` calls the poller needs
//! - [`TransactionStore`] - the address ledger contract
//! - [`SubscriptionRegistry`] - one delivery channel per watched address
//! - [`Cursor`] - the poller's position in the chain

pub mod client;
pub mod cursor;
pub mod error;
pub mod quantity;
pub mod registry;
pub mod request;
pub mod store;
pub mod transport;
pub mod types;

pub use client::EthRpcClient;
pub use cursor::Cursor;
pub use error::{TransportError, WatchError};
pub use quantity::{decode_quantity, encode_quantity};
pub use registry::{normalize_address, OverflowPolicy, SubscriptionRegistry};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use store::TransactionStore;
pub use transport::RpcTransport;
pub use types::{Block, Direction, Transaction, TxDelivery};
