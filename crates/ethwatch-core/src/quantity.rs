//! `0x`-prefixed hex quantity codec used by Ethereum JSON-RPC.
//!
//! Decoding accepts an optional `0x`/`0X` prefix and either digit case;
//! encoding always emits lowercase with a `0x` prefix.

use serde::{de, Deserialize, Deserializer, Serializer};

use crate::error::WatchError;

/// Encode a `u64` as a JSON-RPC quantity (`0x1a`, zero is `0x0`).
pub fn encode_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// Decode a JSON-RPC quantity string into a `u64`.
pub fn decode_quantity(s: &str) -> Result<u64, WatchError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() {
        return Err(WatchError::Decode(format!("empty hex quantity: {s:?}")));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| WatchError::Decode(format!("invalid hex quantity {s:?}: {e}")))
}

/// `#[serde(with = "quantity")]` support for `u64` fields.
pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode_quantity(*value))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let s = String::deserialize(deserializer)?;
    decode_quantity(&s).map_err(de::Error::custom)
}
