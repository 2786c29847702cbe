//! Minimal demo relay: a runnable miniature metrics daemon.
//!
//! Wires the full anthracite pipeline together the way a production relay
//! would: a synthetic feed stands in for the network receivers, a writer
//! pool stands in for the whisper-file backend, and the cache sits in the
//! middle buffering, flushing and (optionally) dumping between runs.
//!
//! ```text
//! feed threads -> Cache::add -> Flusher (periodic) -> channel -> writer pool
//! ```
//!
//! Run it with the bundled sample configuration:
//!
//! ```text
//! cargo run -p anthracite-demo-relay -- \
//!     --config anthracite-demo-relay/conf/anthracite.conf \
//!     --schemas anthracite-demo-relay/conf/storage-schemas.conf \
//!     --aggregation anthracite-demo-relay/conf/storage-aggregation.conf
//! ```
//!
//! With `dump-enable` set, a second run restores whatever the first one
//! dumped before new traffic arrives.

mod feed;
mod writer;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use anthracite::{Cache, EngineConfig, Flusher};

/// anthracite-demo-relay — miniature metrics daemon over an anthracite cache.
#[derive(Parser)]
#[command(name = "anthracite-demo-relay", version, about)]
struct Cli {
    /// Path to the engine configuration (TOML). Built-in defaults apply
    /// when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a storage-schemas.conf. Without it, every metric is
    /// accepted by the writers.
    #[arg(long)]
    schemas: Option<PathBuf>,

    /// Path to a storage-aggregation.conf. Without it, the built-in
    /// default policy applies.
    #[arg(long)]
    aggregation: Option<PathBuf>,

    /// How long the relay runs before shutting down, in seconds.
    #[arg(long, default_value = "10")]
    duration_secs: u64,

    /// Number of feed threads, one simulated host each.
    #[arg(long, default_value = "4")]
    feeders: usize,

    /// Number of storage writer threads. 0 means one per CPU core.
    #[arg(long, default_value = "0")]
    writers: usize,

    /// Tick between synthetic samples, per feeder, in milliseconds.
    #[arg(long, default_value = "100")]
    feed_interval_ms: u64,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(e) = run_relay(cli) {
        tracing::error!("relay failed: {e}");
        std::process::exit(1);
    }
}

fn run_relay(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => {
            let mut config = EngineConfig::default();
            config.normalize();
            config
        }
    };
    let strategy = config.cache.parse_write_strategy()?;

    let mut cache = Cache::new(config.cache.max_size);
    cache.set_write_strategy(strategy);
    let cache = Arc::new(cache);

    let dump_dir = (config.cache.dump_enable && !config.cache.dump_path.is_empty())
        .then(|| PathBuf::from(&config.cache.dump_path));

    // Restore before any loop starts, so replayed points land ahead of
    // fresh traffic.
    if let Some(dir) = &dump_dir {
        std::fs::create_dir_all(dir)?;
        let summary = cache.restore(dir)?;
        if summary.files > 0 {
            tracing::info!(
                files = summary.files,
                points = summary.points,
                skipped = summary.skipped_lines,
                "restored previous dump"
            );
        }
    }

    let policies = writer::Policies::load(cli.schemas.as_deref(), cli.aggregation.as_deref())?;

    let writers = if cli.writers == 0 {
        thread::available_parallelism().map_or(1, usize::from)
    } else {
        cli.writers
    };
    let pool = writer::WriterPool::start(cache.drain_receiver(), Arc::new(policies), writers);
    let flusher = Flusher::start(Arc::clone(&cache), config.cache.flush_interval());
    let feed = feed::Feed::start(
        Arc::clone(&cache),
        cli.feeders,
        Duration::from_millis(cli.feed_interval_ms),
    );

    tracing::info!(
        feeders = cli.feeders,
        writers,
        strategy = %strategy,
        duration_secs = cli.duration_secs,
        "relay running"
    );

    for _ in 0..cli.duration_secs {
        thread::sleep(Duration::from_secs(1));
        tracing::info!(metrics = cache.len(), points = cache.size(), "cache level");
        if cache.is_over_limit() {
            tracing::warn!(
                points = cache.size(),
                limit = cache.size_limit(),
                "cache above configured size limit"
            );
        }
    }

    // Shutdown order: feed first so no new points arrive, then the
    // periodic flusher, then one final cycle so the writers see every
    // pending point before the pool drains out.
    let fed = feed.stop();
    flusher.stop();
    let final_points = cache.flush();
    tracing::info!(points = final_points, "final flush");
    let totals = pool.stop();

    if let Some(dir) = &dump_dir {
        match cache.dump(dir) {
            Ok(path) => tracing::info!(path = %path.display(), "cache dumped"),
            Err(e) => tracing::error!("dump failed: {e}"),
        }
    }

    tracing::info!(
        points_fed = fed,
        bags_written = totals.bags,
        points_written = totals.points,
        points_dropped = totals.dropped,
        "relay finished"
    );
    Ok(())
}
