//! ethwatch CLI - follow the chain tip and report activity for watched addresses.
//!
//! Usage:
//! ```bash
//! ethwatch watch --url https://cloudflare-eth.com --watch 0xdac17f958d2ee523a2206206994597c13d831ec7
//! ethwatch watch --report-secs 10 --json-logs --log ethwatch-http=debug
//! ethwatch info
//! ```

mod logging;

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use ethwatch::{EthWatcher, WatcherConfig};
use ethwatch_core::EthRpcClient;
use ethwatch_http::{HttpRpcClient, RpcEthClient};

use crate::logging::{init_tracing, LogConfig};

const DEFAULT_URL: &str = "https://cloudflare-eth.com";
const DEFAULT_WATCH: [&str; 2] = [
    // USDT
    "0xdac17f958d2ee523a2206206994597c13d831ec7",
    // Uniswap V2 router
    "0x7a250d5630b4cf539739df2c5dacb4c659f2488d",
];
const DEFAULT_REPORT_SECS: u64 = 60;

#[derive(Debug, PartialEq)]
struct WatchArgs {
    url: String,
    addresses: Vec<String>,
    report_secs: u64,
    log: LogConfig,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "watch" => {
            let parsed = match parse_watch_args(&args[2..]) {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!("error: {e}");
                    print_usage();
                    process::exit(1);
                }
            };
            if let Err(e) = cmd_watch(parsed).await {
                eprintln!("error: {e:#}");
                process::exit(1);
            }
        }
        "info" => cmd_info(),
        "version" | "--version" | "-V" => {
            println!("ethwatch {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("ethwatch {}", env!("CARGO_PKG_VERSION"));
    println!("Follow the Ethereum chain tip and record transactions for watched addresses\n");
    println!("USAGE:");
    println!("    ethwatch <COMMAND> [OPTIONS]\n");
    println!("COMMANDS:");
    println!("    watch    Poll the node and report per-address activity");
    println!("    info     Show default settings");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("WATCH OPTIONS:");
    println!("    --url <URL>          JSON-RPC endpoint (default: {DEFAULT_URL})");
    println!("    --watch <ADDR>       Address to watch; repeatable (default: USDT, Uniswap V2 router)");
    println!("    --report-secs <N>    Seconds between reports (default: {DEFAULT_REPORT_SECS})");
    println!("    --json-logs          Emit JSON log lines");
    println!("    --log-level <LEVEL>  Default log level (default: info; RUST_LOG overrides)");
    println!("    --log <CRATE=LEVEL>  Per-crate log level; repeatable");
    println!("\nStops on Ctrl-C or SIGTERM.");
}

fn cmd_info() {
    let config = WatcherConfig::default();
    println!("EthWatch v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default endpoint: {DEFAULT_URL}");
    println!("  Block interval: {}s", config.block_interval_secs);
    println!("  Fetch delay after expected block: {}s", config.fetch_delay_secs);
    println!("  Retry delay after a failed fetch: {}ms", config.retry_delay_ms);
    println!("  Ingest queue capacity: {}", config.subscriber_capacity);
    println!("  Storage backend: memory");
}

fn parse_watch_args(args: &[String]) -> Result<WatchArgs> {
    let mut parsed = WatchArgs {
        url: DEFAULT_URL.to_string(),
        addresses: Vec::new(),
        report_secs: DEFAULT_REPORT_SECS,
        log: LogConfig::default(),
    };

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--url" => parsed.url = flag_value(&mut iter, flag)?,
            "--watch" => parsed.addresses.push(flag_value(&mut iter, flag)?),
            "--report-secs" => {
                let raw = flag_value(&mut iter, flag)?;
                parsed.report_secs = raw
                    .parse()
                    .with_context(|| format!("--report-secs expects a number, got {raw:?}"))?;
                if parsed.report_secs == 0 {
                    bail!("--report-secs must be at least 1");
                }
            }
            "--json-logs" => parsed.log.json = true,
            "--log-level" => parsed.log.level = flag_value(&mut iter, flag)?,
            "--log" => {
                let raw = flag_value(&mut iter, flag)?;
                let Some((component, level)) = raw.split_once('=') else {
                    bail!("--log expects CRATE=LEVEL, got {raw:?}");
                };
                parsed.log.components.insert(component.to_string(), level.to_string());
            }
            other => bail!("unknown option: {other}"),
        }
    }

    if parsed.addresses.is_empty() {
        parsed.addresses = DEFAULT_WATCH.iter().map(|a| a.to_string()).collect();
    }
    Ok(parsed)
}

fn flag_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<String> {
    iter.next()
        .cloned()
        .with_context(|| format!("{flag} requires a value"))
}

async fn cmd_watch(args: WatchArgs) -> Result<()> {
    init_tracing(&args.log);

    let transport = HttpRpcClient::default_for(args.url.as_str())
        .context("cannot build HTTP client")?;
    let client: Arc<dyn EthRpcClient> = Arc::new(RpcEthClient::new(Arc::new(transport)));

    let watcher = EthWatcher::builder()
        .client(client)
        .in_memory_store()
        .config(WatcherConfig::default())
        .build()?;

    for address in &args.addresses {
        watcher.subscribe(address);
    }
    watcher
        .start()
        .await
        .with_context(|| format!("cannot start watching {}", args.url))?;
    tracing::info!(url = %args.url, addresses = args.addresses.len(), "watching");

    let mut ticker = tokio::time::interval(Duration::from_secs(args.report_secs));
    // The first tick fires immediately; skip it so the first report has data.
    ticker.tick().await;

    let stop = shutdown_signal();
    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = ticker.tick() => report(&watcher).await,
            _ = &mut stop => break,
        }
    }

    tracing::info!("shutting down");
    watcher.shutdown().await;
    report(&watcher).await;
    Ok(())
}

/// Resolve on Ctrl-C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "shutdown requested"),
        _ = terminate => tracing::info!(signal = "SIGTERM", "shutdown requested"),
    }
}

async fn report(watcher: &EthWatcher) {
    let poller = watcher.poller_metrics();
    println!(
        "block {} | fetched {} | fetch errors {} | stale {} | dropped {}",
        watcher.get_current_block(),
        poller.blocks,
        poller.fetch_errors,
        poller.stale,
        poller.dropped
    );
    for address in watcher.watched_addresses() {
        let count = watcher.get_transactions(&address).await.len();
        println!("  {address}: {count} transactions");
    }
}
