//! ethwatch-storage - address ledger backends for EthWatch.
//!
//! Backends:
//! - [`memory`] - in-memory (no persistence across restarts)

pub mod memory;

pub use memory::InMemoryLedger;
