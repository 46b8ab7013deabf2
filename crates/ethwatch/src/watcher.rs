//! `EthWatcher` - the start / subscribe / query surface.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo(client: std::sync::Arc<dyn ethwatch_core::EthRpcClient>) -> Result<(), ethwatch_core::WatchError> {
//! use ethwatch::{EthWatcher, WatcherConfig};
//!
//! let watcher = EthWatcher::builder()
//!     .client(client)
//!     .in_memory_store()
//!     .config(WatcherConfig::default())
//!     .build()?;
//!
//! watcher.start().await?;
//! watcher.subscribe("0xdac17f958d2ee523a2206206994597c13d831ec7");
//! let txs = watcher.get_transactions("0xdac17f958d2ee523a2206206994597c13d831ec7").await;
//! # let _ = txs;
//! watcher.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use ethwatch_core::client::EthRpcClient;
use ethwatch_core::error::WatchError;
use ethwatch_core::registry::SubscriptionRegistry;
use ethwatch_core::store::TransactionStore;
use ethwatch_core::types::{Transaction, TxDelivery};
use ethwatch_storage::InMemoryLedger;

use crate::config::WatcherConfig;
use crate::ingest::{IngestCoordinator, IngestMetrics};
use crate::poller::{ChainPoller, PollerMetrics};

/// Builder for [`EthWatcher`]. The client and store are required.
#[derive(Default)]
pub struct EthWatcherBuilder {
    client: Option<Arc<dyn EthRpcClient>>,
    store: Option<Arc<dyn TransactionStore>>,
    config: WatcherConfig,
}

impl EthWatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the node client.
    pub fn client(mut self, client: Arc<dyn EthRpcClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the transaction ledger.
    pub fn store(mut self, store: Arc<dyn TransactionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a fresh [`InMemoryLedger`].
    pub fn in_memory_store(self) -> Self {
        self.store(Arc::new(InMemoryLedger::new()))
    }

    pub fn config(mut self, config: WatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate and assemble the watcher. Nothing runs until [`EthWatcher::start`].
    pub fn build(self) -> Result<EthWatcher, WatchError> {
        let client = self
            .client
            .ok_or_else(|| WatchError::Config("an eth client is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| WatchError::Config("a transaction store is required".into()))?;
        self.config.validate()?;

        let (ingest_tx, ingest_rx) = mpsc::channel(self.config.subscriber_capacity);
        let (shutdown_tx, _) = watch::channel(false);
        let registry = Arc::new(SubscriptionRegistry::new());

        Ok(EthWatcher {
            poller: ChainPoller::new(client, registry, self.config),
            ingest: IngestCoordinator::new(Arc::clone(&store)),
            store,
            ingest_tx,
            ingest_rx: Mutex::new(Some(ingest_rx)),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }
}

/// Watches addresses on chain and keeps their transaction history.
pub struct EthWatcher {
    poller: ChainPoller,
    ingest: IngestCoordinator,
    store: Arc<dyn TransactionStore>,
    ingest_tx: mpsc::Sender<TxDelivery>,
    /// Taken by `start`; `None` once running.
    ingest_rx: Mutex<Option<mpsc::Receiver<TxDelivery>>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EthWatcher {
    pub fn builder() -> EthWatcherBuilder {
        EthWatcherBuilder::new()
    }

    /// Start polling and ingesting.
    ///
    /// Fails if the node's current height cannot be read; in that case nothing
    /// is spawned and `start` may be called again.
    pub async fn start(&self) -> Result<(), WatchError> {
        let rx = self
            .ingest_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| WatchError::Config("watcher already started".into()))?;

        let poll_handle = match self.poller.start(self.shutdown_tx.subscribe()).await {
            Ok(handle) => handle,
            Err(e) => {
                *self.ingest_rx.lock().unwrap_or_else(PoisonError::into_inner) = Some(rx);
                return Err(e);
            }
        };
        let ingest_handle = self.ingest.spawn(rx, self.shutdown_tx.subscribe());

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([poll_handle, ingest_handle]);
        Ok(())
    }

    /// Watch `address`. Returns `false` (and logs) if it is already watched.
    pub fn subscribe(&self, address: &str) -> bool {
        match self
            .poller
            .subscribe_transactions(address, self.ingest_tx.clone())
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(address, error = %e, "cannot subscribe transaction feed");
                false
            }
        }
    }

    /// Recorded transactions for `address`, oldest first. Empty on error.
    pub async fn get_transactions(&self, address: &str) -> Vec<Arc<Transaction>> {
        match self.store.transactions_by_address(address).await {
            Ok(txs) => txs,
            Err(e) => {
                tracing::error!(address, error = %e, "cannot read transactions from ledger");
                Vec::new()
            }
        }
    }

    /// Height of the last block fetched by the poller (0 before `start`).
    pub fn get_current_block(&self) -> u64 {
        self.poller.current_block()
    }

    /// All watched addresses (normalized, sorted).
    pub fn watched_addresses(&self) -> Vec<String> {
        self.poller.registry().addresses()
    }

    pub fn poller_metrics(&self) -> PollerMetrics {
        self.poller.metrics()
    }

    pub fn ingest_metrics(&self) -> IngestMetrics {
        self.ingest.metrics()
    }

    /// Signal both loops to stop and wait for them to exit.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        tracing::info!("watcher stopped");
    }
}
