//! Watcher configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use ethwatch_core::error::WatchError;
use ethwatch_core::registry::OverflowPolicy;

/// Expected block time on Ethereum mainnet (post-merge slots are 12 s; observed ~11 s).
pub const BLOCK_INTERVAL_SECS: u64 = 11;
/// Extra wait after the expected block time so the block has propagated to the node.
pub const BLOCK_FETCH_DELAY_SECS: u64 = 4;
/// Fixed wait before re-requesting a block after a failed or empty fetch.
pub const RETRY_DELAY_MS: u64 = 2_000;

/// Configuration for an [`EthWatcher`](crate::EthWatcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Expected wall-clock gap between consecutive blocks (seconds).
    #[serde(default = "default_block_interval")]
    pub block_interval_secs: u64,
    /// Safety margin added on top of the block interval (seconds).
    #[serde(default = "default_fetch_delay")]
    pub fetch_delay_secs: u64,
    /// Fixed retry interval after a fetch error (milliseconds).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Capacity of the bounded delivery channel feeding the ledger.
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
    /// What to do when a subscription channel is full.
    #[serde(default)]
    pub overflow: OverflowPolicy,
    /// First block to fetch. `None` = the block after the current head.
    #[serde(default)]
    pub start_block: Option<u64>,
}

fn default_block_interval() -> u64 { BLOCK_INTERVAL_SECS }
fn default_fetch_delay() -> u64 { BLOCK_FETCH_DELAY_SECS }
fn default_retry_delay() -> u64 { RETRY_DELAY_MS }
fn default_subscriber_capacity() -> usize { 1_024 }

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            block_interval_secs: BLOCK_INTERVAL_SECS,
            fetch_delay_secs: BLOCK_FETCH_DELAY_SECS,
            retry_delay_ms: RETRY_DELAY_MS,
            subscriber_capacity: 1_024,
            overflow: OverflowPolicy::default(),
            start_block: None,
        }
    }
}

impl WatcherConfig {
    /// Reject settings the poller cannot run with.
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.subscriber_capacity == 0 {
            return Err(WatchError::Config("subscriber_capacity must be > 0".into()));
        }
        if self.retry_delay_ms == 0 {
            return Err(WatchError::Config("retry_delay_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Seconds after a block's timestamp at which the next block should be fetchable.
    pub fn pacing_secs(&self) -> u64 {
        self.block_interval_secs.saturating_add(self.fetch_delay_secs)
    }
}
