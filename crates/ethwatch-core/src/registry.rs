//! Subscription registry - one delivery channel per watched address.
//!
//! Entries are created once and never replaced or removed for the life of the
//! process. Lookups clone the sender under the read lock so callers never hold
//! the lock across an `.await`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::types::TxDelivery;

/// What the poller does when a subscriber's bounded channel is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for capacity. A stalled subscriber holds back the poll loop; nothing is lost.
    #[default]
    Block,
    /// Drop the delivery that does not fit and keep polling.
    DropNewest,
}

/// Canonical form of an address for matching (ASCII lowercase).
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Maps watched addresses to their delivery channel.
#[derive(Default)]
pub struct SubscriptionRegistry {
    feeds: RwLock<HashMap<String, mpsc::Sender<TxDelivery>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` as the delivery channel for `address`.
    ///
    /// Fails with [`WatchError::AlreadySubscribed`] if the address already has one;
    /// the existing channel stays in place.
    pub fn subscribe(
        &self,
        address: &str,
        sender: mpsc::Sender<TxDelivery>,
    ) -> Result<(), WatchError> {
        let key = normalize_address(address);
        if key.is_empty() {
            return Err(WatchError::Config("cannot subscribe an empty address".into()));
        }
        let mut feeds = self.feeds.write().unwrap_or_else(PoisonError::into_inner);
        if feeds.contains_key(&key) {
            return Err(WatchError::AlreadySubscribed { address: key });
        }
        tracing::debug!(address = %key, "subscription channel registered");
        feeds.insert(key, sender);
        Ok(())
    }

    /// Return a handle to the channel registered for `address`, if any.
    pub fn lookup(&self, address: &str) -> Option<mpsc::Sender<TxDelivery>> {
        if address.is_empty() {
            return None;
        }
        self.feeds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_address(address))
            .cloned()
    }

    /// Returns `true` if `address` is being watched.
    pub fn contains(&self, address: &str) -> bool {
        self.feeds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&normalize_address(address))
    }

    /// All watched addresses, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .feeds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Number of watched addresses.
    pub fn len(&self) -> usize {
        self.feeds.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
