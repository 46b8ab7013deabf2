//! Error types for the watcher pipeline.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("rpc: {0}")]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient (worth trying again later).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}

/// Errors surfaced by the poller, ledger and facade.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// A wire value (hex quantity, block body) could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("address {address} already has a subscription channel")]
    AlreadySubscribed { address: String },

    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid or incomplete watcher configuration.
    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl WatchError {
    /// Returns `true` if the failure is likely to clear up on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}
