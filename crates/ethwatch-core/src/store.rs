//! The address ledger contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WatchError;
use crate::types::Transaction;

/// Append-only, address-indexed store of observed transactions.
///
/// Implementations must be safe to call concurrently from the ingest task
/// and from query callers.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Append `tx` to both its `from` and `to` buckets.
    ///
    /// A self-transfer lands once in its single bucket; empty addresses are skipped.
    async fn add_transaction(&self, tx: Arc<Transaction>) -> Result<(), WatchError>;

    /// Append `tx` to the bucket of `address` only.
    async fn add_transaction_for(&self, address: &str, tx: Arc<Transaction>)
        -> Result<(), WatchError>;

    /// Snapshot of the bucket for `address` in insertion order (empty if unknown).
    async fn transactions_by_address(&self, address: &str)
        -> Result<Vec<Arc<Transaction>>, WatchError>;
}
