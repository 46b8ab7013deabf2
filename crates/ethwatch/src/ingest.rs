//! Ingest coordinator - drains routed transactions into the ledger.
//!
//! Every subscription funnels into one shared channel with one consumer, so
//! ledger writes happen in delivery order. A failed write is logged and
//! dropped; it is never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use ethwatch_core::store::TransactionStore;
use ethwatch_core::types::TxDelivery;

use crate::shutdown::cancelled;

/// Counters snapshot for the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestMetrics {
    pub ingested: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct IngestStats {
    ingested: AtomicU64,
    failed: AtomicU64,
}

pub struct IngestCoordinator {
    store: Arc<dyn TransactionStore>,
    stats: Arc<IngestStats>,
}

impl IngestCoordinator {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self {
            store,
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn metrics(&self) -> IngestMetrics {
        IngestMetrics {
            ingested: self.stats.ingested.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    /// Spawn the consume loop. It exits on shutdown or once every sender is dropped.
    pub fn spawn(
        &self,
        rx: mpsc::Receiver<TxDelivery>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        tokio::spawn(consume(store, stats, rx, shutdown))
    }
}

async fn consume(
    store: Arc<dyn TransactionStore>,
    stats: Arc<IngestStats>,
    mut rx: mpsc::Receiver<TxDelivery>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let delivery = tokio::select! {
            biased;
            _ = cancelled(&mut shutdown) => break,
            item = rx.recv() => match item {
                Some(d) => d,
                None => break,
            },
        };

        match store
            .add_transaction_for(&delivery.address, delivery.tx.clone())
            .await
        {
            Ok(()) => {
                stats.ingested.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    address = %delivery.address,
                    direction = %delivery.direction,
                    hash = %delivery.tx.hash,
                    "transaction recorded"
                );
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    address = %delivery.address,
                    hash = %delivery.tx.hash,
                    error = %e,
                    "cannot insert transaction into ledger"
                );
            }
        }
    }
    tracing::info!("ingest loop stopped");
}
