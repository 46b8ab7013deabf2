//! Shared wire and delivery types.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

// ─── Transaction ─────────────────────────────────────────────────────────────

/// An Ethereum transaction as returned inside a full `eth_getBlockByNumber` body.
///
/// All fields are opaque strings; numeric fields keep their `0x` hex encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    /// Empty for contract creations (the node sends `null`).
    #[serde(default, deserialize_with = "null_as_empty")]
    pub to: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub gas: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub gas_price: String,
}

impl Transaction {
    /// Returns `true` if sender and receiver are the same address.
    pub fn is_self_transfer(&self) -> bool {
        !self.to.is_empty() && self.from.eq_ignore_ascii_case(&self.to)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ─── Block ───────────────────────────────────────────────────────────────────

/// A block fetched with full transaction objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Chain height.
    #[serde(with = "crate::quantity")]
    pub number: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub hash: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parent_hash: String,
    /// Unix timestamp (seconds since epoch).
    #[serde(with = "crate::quantity")]
    pub timestamp: u64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

// ─── Delivery ────────────────────────────────────────────────────────────────

/// The role a watched address plays in a routed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The watched address is the receiver (`to`).
    Inbound,
    /// The watched address is the sender (`from`).
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// One transaction routed to one watched address.
///
/// A self-transfer produces two deliveries sharing the same `Arc<Transaction>`.
#[derive(Debug, Clone)]
pub struct TxDelivery {
    /// The watched address (normalized) this delivery was routed for.
    pub address: String,
    pub direction: Direction,
    pub tx: Arc<Transaction>,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
