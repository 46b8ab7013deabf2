//! The chain poller - follows the chain tip one block at a time.
//!
//! # Loop
//! 1. Request block `cursor + 1` with full transaction bodies.
//! 2. On error, a block the node has not produced yet, or a block other than
//!    the one asked for, wait `retry_delay` and ask again; the cursor does not move.
//! 3. On success advance the cursor and schedule the next fetch for
//!    `block.timestamp + block_interval + fetch_delay`.
//! 4. Fan the block's transactions out to the subscription registry:
//!    receiver first, then sender. A self-transfer is delivered twice.
//!
//! Blocks are fetched strictly in height order, never in parallel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use ethwatch_core::client::EthRpcClient;
use ethwatch_core::cursor::Cursor;
use ethwatch_core::error::WatchError;
use ethwatch_core::registry::{normalize_address, OverflowPolicy, SubscriptionRegistry};
use ethwatch_core::types::{Block, Direction, Transaction, TxDelivery};

use crate::config::WatcherConfig;
use crate::shutdown::{cancelled, is_cancelled};

/// Counters snapshot for the poller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerMetrics {
    pub blocks: u64,
    pub fetch_errors: u64,
    pub delivered: u64,
    pub dropped: u64,
    /// Responses carrying a block other than the one requested.
    pub stale: u64,
}

#[derive(Debug, Default)]
struct PollerStats {
    blocks: AtomicU64,
    fetch_errors: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    stale: AtomicU64,
}

impl PollerStats {
    fn snapshot(&self) -> PollerMetrics {
        PollerMetrics {
            blocks: self.blocks.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
        }
    }
}

/// Delay until the block after one stamped `block_timestamp` should be available.
///
/// `now_ms` is wall-clock Unix time in milliseconds. A deadline in the past
/// yields `Duration::ZERO`.
pub fn next_poll_delay(block_timestamp: u64, pacing_secs: u64, now_ms: i64) -> Duration {
    let due_secs = block_timestamp.saturating_add(pacing_secs);
    let due_ms = i64::try_from(due_secs)
        .unwrap_or(i64::MAX)
        .saturating_mul(1_000);
    match u64::try_from(due_ms.saturating_sub(now_ms)) {
        Ok(ms) => Duration::from_millis(ms),
        Err(_) => Duration::ZERO,
    }
}

/// Follows the chain tip and routes transactions to watched addresses.
pub struct ChainPoller {
    client: Arc<dyn EthRpcClient>,
    registry: Arc<SubscriptionRegistry>,
    config: WatcherConfig,
    head: Arc<AtomicU64>,
    stats: Arc<PollerStats>,
}

impl ChainPoller {
    pub fn new(
        client: Arc<dyn EthRpcClient>,
        registry: Arc<SubscriptionRegistry>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            client,
            registry,
            config,
            head: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(PollerStats::default()),
        }
    }

    /// Record interest in `address`; deliveries go to `sender`.
    ///
    /// Fails with [`WatchError::AlreadySubscribed`] if the address is already watched.
    pub fn subscribe_transactions(
        &self,
        address: &str,
        sender: mpsc::Sender<TxDelivery>,
    ) -> Result<(), WatchError> {
        self.registry.subscribe(address, sender)?;
        tracing::info!(address, "address subscribed to transaction feed");
        Ok(())
    }

    /// Height of the last fetched block (the seed height before the first fetch).
    pub fn current_block(&self) -> u64 {
        self.head.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> PollerMetrics {
        self.stats.snapshot()
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Discover the chain height, seed the cursor and spawn the poll loop.
    ///
    /// The height lookup happens before this returns; its failure is fatal.
    pub async fn start(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, WatchError> {
        let head = self.client.block_number().await?;
        let seed = match self.config.start_block {
            Some(first) => first.saturating_sub(1).min(head),
            None => head,
        };
        self.head.store(seed, Ordering::Release);
        tracing::info!(head, cursor = seed, "current block number");

        let poll = PollLoop {
            client: Arc::clone(&self.client),
            registry: Arc::clone(&self.registry),
            head: Arc::clone(&self.head),
            stats: Arc::clone(&self.stats),
            cursor: Cursor::new(seed),
            retry_delay: self.config.retry_delay(),
            pacing_secs: self.config.pacing_secs(),
            overflow: self.config.overflow,
        };
        Ok(tokio::spawn(poll.run(shutdown)))
    }
}

/// State owned by the spawned loop. The cursor lives here and nowhere else.
struct PollLoop {
    client: Arc<dyn EthRpcClient>,
    registry: Arc<SubscriptionRegistry>,
    head: Arc<AtomicU64>,
    stats: Arc<PollerStats>,
    cursor: Cursor,
    retry_delay: Duration,
    pacing_secs: u64,
    overflow: OverflowPolicy,
}

impl PollLoop {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut next_fetch = Instant::now();

        loop {
            tokio::select! {
                _ = cancelled(&mut shutdown) => break,
                _ = time::sleep_until(next_fetch) => {}
            }

            let number = self.cursor.next_block();
            // An in-flight call runs to completion; its result is dropped after shutdown.
            let fetched = self.client.block_by_number(number).await;
            if is_cancelled(&shutdown) {
                break;
            }

            next_fetch = match fetched {
                Ok(Some(block)) => match self.accept(number, block, &mut shutdown).await {
                    Some(deadline) => deadline,
                    None => break,
                },
                Ok(None) => {
                    tracing::debug!(block = number, "block not available yet");
                    Instant::now() + self.retry_delay
                }
                Err(e) => {
                    self.stats.fetch_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        block = number,
                        error = %e,
                        transient = e.is_transient(),
                        "cannot fetch eth_getBlockByNumber"
                    );
                    Instant::now() + self.retry_delay
                }
            };
        }

        tracing::info!(cursor = self.cursor.block_number, "poll loop stopped");
    }

    /// Advance past `block` and fan it out. Returns the next fetch deadline,
    /// or `None` if shutdown fired during fan-out.
    ///
    /// A block whose height is not the one requested (a lagging node behind a
    /// load balancer) is neither applied nor fanned out; the request is retried.
    async fn accept(
        &mut self,
        requested: u64,
        block: Block,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Instant> {
        if block.number != requested || !self.cursor.advance(block.number) {
            self.stats.stale.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                requested,
                got = block.number,
                cursor = self.cursor.block_number,
                "node returned a different block than requested; retrying"
            );
            return Some(Instant::now() + self.retry_delay);
        }
        self.head.store(block.number, Ordering::Release);
        self.stats.blocks.fetch_add(1, Ordering::Relaxed);

        let delay = next_poll_delay(
            block.timestamp,
            self.pacing_secs,
            chrono::Utc::now().timestamp_millis(),
        );
        let deadline = Instant::now() + delay;
        tracing::info!(
            block = block.number,
            txs = block.transactions.len(),
            next_in_ms = delay.as_millis() as u64,
            "fetched block"
        );

        for tx in block.transactions {
            if !self.fan_out(Arc::new(tx), shutdown).await {
                return None;
            }
        }
        Some(deadline)
    }

    /// Route one transaction to its receiver's and sender's channels.
    /// Returns `false` if shutdown fired while blocked on a full channel.
    async fn fan_out(&self, tx: Arc<Transaction>, shutdown: &mut watch::Receiver<bool>) -> bool {
        let routes = [(&tx.to, Direction::Inbound), (&tx.from, Direction::Outbound)];
        for (address, direction) in routes {
            let Some(sender) = self.registry.lookup(address) else {
                continue;
            };
            let delivery = TxDelivery {
                address: normalize_address(address),
                direction,
                tx: Arc::clone(&tx),
            };
            if !self.deliver(sender, delivery, shutdown).await {
                return false;
            }
        }
        true
    }

    async fn deliver(
        &self,
        sender: mpsc::Sender<TxDelivery>,
        delivery: TxDelivery,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let address = delivery.address.clone();
        let hash = delivery.tx.hash.clone();

        let sent = match self.overflow {
            OverflowPolicy::DropNewest => match sender.try_send(delivery) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(%address, %hash, "subscriber channel full, dropping delivery");
                    return true;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(()),
            },
            OverflowPolicy::Block => tokio::select! {
                res = sender.send(delivery) => res.map_err(|_| ()),
                _ = cancelled(shutdown) => return false,
            },
        };

        match sent {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(()) => {
                tracing::warn!(%address, %hash, "subscriber channel closed, delivery skipped");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use ethwatch_core::error::TransportError;

    /// Serves a fixed head and a queue of block responses; records requests.
    struct ScriptedClient {
        head: Result<u64, ()>,
        script: Mutex<VecDeque<Result<Option<Block>, WatchError>>>,
        requested: Mutex<Vec<u64>>,
    }

    impl ScriptedClient {
        fn new(head: u64, script: Vec<Result<Option<Block>, WatchError>>) -> Arc<Self> {
            Arc::new(Self {
                head: Ok(head),
                script: Mutex::new(script.into()),
                requested: Mutex::new(vec![]),
            })
        }

        fn requested(&self) -> Vec<u64> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EthRpcClient for ScriptedClient {
        async fn block_number(&self) -> Result<u64, WatchError> {
            self.head
                .map_err(|_| TransportError::Http("connection refused".into()).into())
        }

        async fn block_by_number(&self, number: u64) -> Result<Option<Block>, WatchError> {
            self.requested.lock().unwrap().push(number);
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    fn tx(hash: &str, from: &str, to: &str) -> Transaction {
        Transaction {
            hash: hash.into(),
            from: from.into(),
            to: to.into(),
            value: "0x5".into(),
            gas: "0x10".into(),
            gas_price: "0x20".into(),
        }
    }

    fn block(number: u64, timestamp: u64, txs: Vec<Transaction>) -> Block {
        Block {
            number,
            hash: format!("0x{number:x}"),
            parent_hash: format!("0x{:x}", number - 1),
            timestamp,
            transactions: txs,
        }
    }

    fn transport_err() -> Result<Option<Block>, WatchError> {
        Err(TransportError::Http("502 bad gateway".into()).into())
    }

    fn poller(client: Arc<ScriptedClient>, config: WatcherConfig) -> ChainPoller {
        ChainPoller::new(client, Arc::new(SubscriptionRegistry::new()), config)
    }

    fn now_secs() -> u64 {
        chrono::Utc::now().timestamp() as u64
    }

    #[test]
    fn poll_delay_targets_timestamp_plus_pacing() {
        // Block at t=1000s, now exactly t=1000s → wait the full 15 s.
        assert_eq!(next_poll_delay(1_000, 15, 1_000_000), Duration::from_secs(15));
        // 6.5 s later → 8.5 s left.
        assert_eq!(next_poll_delay(1_000, 15, 1_006_500), Duration::from_millis(8_500));
    }

    #[test]
    fn poll_delay_in_the_past_fires_immediately() {
        assert_eq!(next_poll_delay(1_000, 15, 1_015_000), Duration::ZERO);
        assert_eq!(next_poll_delay(0, 15, 1_700_000_000_000), Duration::ZERO);
    }

    #[tokio::test]
    async fn start_fails_when_height_unavailable() {
        let client = Arc::new(ScriptedClient {
            head: Err(()),
            script: Mutex::new(VecDeque::new()),
            requested: Mutex::new(vec![]),
        });
        let poller = poller(client.clone(), WatcherConfig::default());
        let (_tx, rx) = watch::channel(false);
        let err = poller.start(rx).await.unwrap_err();
        assert!(matches!(err, WatchError::Transport(_)));
        assert!(client.requested().is_empty());
    }

    #[tokio::test]
    async fn start_block_hint_seeds_cursor() {
        let client = ScriptedClient::new(500, vec![]);
        let config = WatcherConfig {
            start_block: Some(450),
            ..Default::default()
        };
        let poller = poller(client.clone(), config);
        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();
        assert_eq!(poller.current_block(), 449);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.requested()[0], 450);

        stop.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn start_block_beyond_head_is_clamped() {
        let client = ScriptedClient::new(100, vec![]);
        let config = WatcherConfig {
            start_block: Some(1_000),
            ..Default::default()
        };
        let poller = poller(client, config);
        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();
        assert_eq!(poller.current_block(), 100);
        stop.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn next_fetch_waits_for_block_cadence() {
        let ts = now_secs();
        let client = ScriptedClient::new(
            100,
            vec![Ok(Some(block(101, ts, vec![]))), Ok(Some(block(102, ts + 12, vec![])))],
        );
        let poller = poller(client.clone(), WatcherConfig::default());
        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();

        tokio::time::sleep(Duration::from_secs(13)).await;
        assert_eq!(client.requested(), vec![101], "fetched before ts + 15s");
        assert_eq!(poller.current_block(), 101);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(client.requested(), vec![101, 102]);

        stop.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_retry_at_fixed_interval_without_moving_cursor() {
        let client = ScriptedClient::new(
            100,
            vec![
                transport_err(),
                transport_err(),
                transport_err(),
                Ok(Some(block(101, 0, vec![]))),
            ],
        );
        let poller = poller(client.clone(), WatcherConfig::default());
        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();
        let t0 = Instant::now();

        // Attempts at t = 0s, 2s, 4s.
        for (at, attempts) in [(1, 1), (3, 2), (5, 3)] {
            time::sleep_until(t0 + Duration::from_secs(at)).await;
            assert_eq!(client.requested(), vec![101; attempts], "at t={at}s");
            assert_eq!(poller.current_block(), 100);
        }
        assert_eq!(poller.metrics().fetch_errors, 3);

        time::sleep_until(t0 + Duration::from_secs(7)).await;
        let requested = client.requested();
        assert_eq!(requested.iter().filter(|n| **n == 101).count(), 4);
        assert_eq!(poller.current_block(), 101);
        assert_eq!(poller.metrics().blocks, 1);

        stop.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn fan_out_routes_by_role_and_duplicates_self_transfer() {
        let client = ScriptedClient::new(
            100,
            vec![Ok(Some(block(
                101,
                0,
                vec![
                    tx("0xin", "0xother", "0xaa"),
                    tx("0xout", "0xaa", "0xother"),
                    tx("0xself", "0xaa", "0xaa"),
                    tx("0xnone", "0xother", "0xother"),
                ],
            )))],
        );
        let config = WatcherConfig {
            overflow: OverflowPolicy::Block,
            ..Default::default()
        };
        let poller = poller(client, config);
        let (feed_tx, mut feed_rx) = mpsc::channel(16);
        poller.subscribe_transactions("0xAA", feed_tx).unwrap();

        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();

        let mut got = Vec::new();
        for _ in 0..4 {
            let d = tokio::time::timeout(Duration::from_secs(1), feed_rx.recv())
                .await
                .unwrap()
                .unwrap();
            got.push((d.tx.hash.clone(), d.direction, d.address.clone()));
        }
        assert_eq!(
            got,
            vec![
                ("0xin".to_string(), Direction::Inbound, "0xaa".to_string()),
                ("0xout".to_string(), Direction::Outbound, "0xaa".to_string()),
                ("0xself".to_string(), Direction::Inbound, "0xaa".to_string()),
                ("0xself".to_string(), Direction::Outbound, "0xaa".to_string()),
            ]
        );
        assert!(feed_rx.try_recv().is_err());
        assert_eq!(poller.metrics().delivered, 4);

        stop.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn self_transfer_shares_one_transaction() {
        let client = ScriptedClient::new(
            100,
            vec![Ok(Some(block(101, 0, vec![tx("0xself", "0xaa", "0xaa")])))],
        );
        let poller = poller(client, WatcherConfig::default());
        let (feed_tx, mut feed_rx) = mpsc::channel(4);
        poller.subscribe_transactions("0xaa", feed_tx).unwrap();
        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();

        let a = feed_rx.recv().await.unwrap();
        let b = feed_rx.recv().await.unwrap();
        assert!(Arc::ptr_eq(&a.tx, &b.tx));

        stop.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn full_channel_drops_newest_and_keeps_polling() {
        let client = ScriptedClient::new(
            100,
            vec![
                Ok(Some(block(
                    101,
                    0,
                    vec![tx("0x1", "0xa", "0xbb"), tx("0x2", "0xa", "0xbb"), tx("0x3", "0xa", "0xbb")],
                ))),
                Ok(Some(block(102, 0, vec![]))),
            ],
        );
        let config = WatcherConfig {
            overflow: OverflowPolicy::DropNewest,
            ..Default::default()
        };
        let poller = poller(client.clone(), config);
        let (feed_tx, mut feed_rx) = mpsc::channel(1);
        poller.subscribe_transactions("0xbb", feed_tx).unwrap();
        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(poller.current_block(), 102, "loop kept going");
        let m = poller.metrics();
        assert_eq!(m.delivered, 1);
        assert_eq!(m.dropped, 2);
        assert_eq!(feed_rx.recv().await.unwrap().tx.hash, "0x1");

        stop.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_releases_loop_blocked_on_full_channel() {
        let client = ScriptedClient::new(
            100,
            vec![Ok(Some(block(
                101,
                0,
                vec![tx("0x1", "0xa", "0xbb"), tx("0x2", "0xa", "0xbb")],
            )))],
        );
        let config = WatcherConfig {
            overflow: OverflowPolicy::Block,
            ..Default::default()
        };
        let poller = poller(client.clone(), config);
        let (feed_tx, _feed_rx) = mpsc::channel(1);
        poller.subscribe_transactions("0xbb", feed_tx).unwrap();
        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Stuck on the second send; no further fetches.
        assert_eq!(client.requested(), vec![101]);

        stop.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should exit on shutdown")
            .unwrap();
        assert_eq!(client.requested(), vec![101]);
    }

    #[tokio::test]
    async fn duplicate_subscription_is_rejected() {
        let poller = poller(ScriptedClient::new(1, vec![]), WatcherConfig::default());
        let (a, _ra) = mpsc::channel(1);
        let (b, _rb) = mpsc::channel(1);
        poller.subscribe_transactions("0x2", a).unwrap();
        assert!(matches!(
            poller.subscribe_transactions("0x2", b),
            Err(WatchError::AlreadySubscribed { .. })
        ));
    }

    #[tokio::test]
    async fn default_policy_waits_instead_of_dropping() {
        let txs = (0..5).map(|i| tx(&format!("0x{i}"), "0xa", "0xbb")).collect();
        let client = ScriptedClient::new(100, vec![Ok(Some(block(101, 0, txs)))]);
        let poller = poller(client, WatcherConfig::default());
        let (feed_tx, mut feed_rx) = mpsc::channel(1);
        poller.subscribe_transactions("0xbb", feed_tx).unwrap();
        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();

        let mut hashes = Vec::new();
        for _ in 0..5 {
            let d = tokio::time::timeout(Duration::from_secs(1), feed_rx.recv())
                .await
                .unwrap()
                .unwrap();
            hashes.push(d.tx.hash.clone());
        }
        assert_eq!(hashes, vec!["0x0", "0x1", "0x2", "0x3", "0x4"]);
        assert_eq!(poller.metrics().dropped, 0);

        stop.send_replace(true);
        handle.await.unwrap();
    }

    /// Answers every request with the same block, like a node stuck behind a load balancer.
    struct StuckNode {
        block: Block,
        requested: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl EthRpcClient for StuckNode {
        async fn block_number(&self) -> Result<u64, WatchError> {
            Ok(self.block.number - 1)
        }

        async fn block_by_number(&self, number: u64) -> Result<Option<Block>, WatchError> {
            self.requested.lock().unwrap().push(number);
            Ok(Some(self.block.clone()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_block_is_not_fanned_out_again() {
        let client = Arc::new(StuckNode {
            block: block(101, 0, vec![tx("0xabc", "0x1", "0x2")]),
            requested: Mutex::new(vec![]),
        });
        let poller = ChainPoller::new(
            client.clone(),
            Arc::new(SubscriptionRegistry::new()),
            WatcherConfig::default(),
        );
        let (feed_tx, mut feed_rx) = mpsc::channel(16);
        poller.subscribe_transactions("0x2", feed_tx).unwrap();
        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();

        // 101 at t=0, then 102 at t=0, 2s, 4s all answered with 101.
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*client.requested.lock().unwrap(), vec![101, 102, 102, 102]);
        assert_eq!(poller.current_block(), 101);
        assert_eq!(poller.metrics().blocks, 1);
        assert_eq!(poller.metrics().stale, 3);

        assert_eq!(feed_rx.recv().await.unwrap().tx.hash, "0xabc");
        assert!(feed_rx.try_recv().is_err());

        stop.send_replace(true);
        handle.await.unwrap();
    }

    /// Takes a while to answer and records whether the call ran to the end.
    struct SlowNode {
        finished: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl EthRpcClient for SlowNode {
        async fn block_number(&self) -> Result<u64, WatchError> {
            Ok(100)
        }

        async fn block_by_number(&self, number: u64) -> Result<Option<Block>, WatchError> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(Some(block(number, 0, vec![])))
        }
    }

    #[tokio::test]
    async fn shutdown_lets_in_flight_fetch_finish_and_discards_it() {
        let client = Arc::new(SlowNode {
            finished: std::sync::atomic::AtomicBool::new(false),
        });
        let poller = ChainPoller::new(
            client.clone(),
            Arc::new(SubscriptionRegistry::new()),
            WatcherConfig::default(),
        );
        let (stop, rx) = watch::channel(false);
        let handle = poller.start(rx).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.send_replace(true);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop should exit after the fetch returns")
            .unwrap();

        assert!(client.finished.load(Ordering::SeqCst));
        assert_eq!(poller.current_block(), 100, "late result is not applied");
        assert_eq!(poller.metrics().blocks, 0);
    }
}
