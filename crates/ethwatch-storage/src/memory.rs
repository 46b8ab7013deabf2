//! In-memory address ledger.
//!
//! One `RwLock` guards the whole address → bucket map. Writers take the
//! exclusive lock, readers the shared one. Watched-address cardinality is
//! small, so there is no per-bucket locking.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ethwatch_core::error::WatchError;
use ethwatch_core::registry::normalize_address;
use ethwatch_core::store::TransactionStore;
use ethwatch_core::types::Transaction;

type Buckets = HashMap<String, Vec<Arc<Transaction>>>;

/// In-memory transaction ledger keyed by address.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryLedger {
    buckets: RwLock<Buckets>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses with at least one entry.
    pub fn address_count(&self) -> Result<usize, WatchError> {
        Ok(self.read()?.len())
    }

    /// Number of entries in the bucket for `address`.
    pub fn len(&self, address: &str) -> Result<usize, WatchError> {
        Ok(self
            .read()?
            .get(&normalize_address(address))
            .map_or(0, Vec::len))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Buckets>, WatchError> {
        self.buckets.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Buckets>, WatchError> {
        self.buckets.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> WatchError {
    tracing::error!("ledger lock poisoned by a panicking writer");
    WatchError::Storage("ledger lock poisoned".into())
}

fn append(buckets: &mut Buckets, key: String, tx: Arc<Transaction>) {
    if key.is_empty() {
        return;
    }
    buckets.entry(key).or_default().push(tx);
}

#[async_trait]
impl TransactionStore for InMemoryLedger {
    async fn add_transaction(&self, tx: Arc<Transaction>) -> Result<(), WatchError> {
        let from = normalize_address(&tx.from);
        let to = normalize_address(&tx.to);
        let mut buckets = self.write()?;
        if from != to {
            append(&mut buckets, to, Arc::clone(&tx));
        }
        append(&mut buckets, from, tx);
        Ok(())
    }

    async fn add_transaction_for(
        &self,
        address: &str,
        tx: Arc<Transaction>,
    ) -> Result<(), WatchError> {
        let mut buckets = self.write()?;
        append(&mut buckets, normalize_address(address), tx);
        Ok(())
    }

    async fn transactions_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<Arc<Transaction>>, WatchError> {
        Ok(self
            .read()?
            .get(&normalize_address(address))
            .cloned()
            .unwrap_or_default())
    }
}
