//! ethwatch - follow an Ethereum chain tip and keep per-address transaction history.
//!
//! ```text
//! EthWatcher
//!   ├── ChainPoller        (cursor, block cadence pacing, fan-out by from/to)
//!   │      └── SubscriptionRegistry  (watched address → delivery channel)
//!   ├── IngestCoordinator  (drains the shared channel into the ledger)
//!   └── TransactionStore   (address ledger, in-memory by default)
//! ```

pub mod config;
pub mod ingest;
pub mod poller;
mod shutdown;
pub mod watcher;

pub use config::WatcherConfig;
pub use ingest::{IngestCoordinator, IngestMetrics};
pub use poller::{next_poll_delay, ChainPoller, PollerMetrics};
pub use watcher::{EthWatcher, EthWatcherBuilder};
