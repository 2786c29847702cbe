//! Synthetic metric feed.
//!
//! Stands in for the network receivers of a real relay: each generator
//! thread plays one host emitting a small family of Graphite-style
//! metrics (`relay.host3.cpu.load ...`) on a fixed tick. Every sample
//! goes through the text codec and into the cache exactly as received
//! traffic would.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender, select, tick};

use anthracite::{Cache, MetricPoint};

/// Metric families emitted per simulated host.
const FAMILIES: [&str; 5] = ["cpu.load", "cpu.idle", "mem.rss", "net.rx", "net.tx"];

/// Pool of generator threads feeding one shared cache.
pub struct Feed {
    stop_tx: Sender<()>,
    handles: Vec<JoinHandle<u64>>,
}

impl Feed {
    /// Spawns `generators` threads, each emitting one point per family
    /// every `interval`.
    pub fn start(cache: Arc<Cache>, generators: usize, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(generators);
        let mut handles = Vec::with_capacity(generators);
        for host in 0..generators {
            let cache = Arc::clone(&cache);
            let stop_rx = stop_rx.clone();
            handles.push(thread::spawn(move || {
                generator_loop(&cache, &stop_rx, host, interval)
            }));
        }
        Self { stop_tx, handles }
    }

    /// Signals every generator and returns the total points fed.
    pub fn stop(self) -> u64 {
        for _ in &self.handles {
            let _ = self.stop_tx.send(());
        }
        let mut fed = 0;
        for handle in self.handles {
            match handle.join() {
                Ok(count) => fed += count,
                Err(_) => tracing::error!("feed generator panicked"),
            }
        }
        fed
    }
}

fn generator_loop(cache: &Cache, stop_rx: &Receiver<()>, host: usize, interval: Duration) -> u64 {
    let ticker = tick(interval);
    let mut round = 0u64;
    let mut fed = 0u64;
    loop {
        select! {
            recv(ticker) -> _ => {
                let now = unix_now();
                for family in FAMILIES {
                    let line = format!(
                        "relay.host{host}.{family} {} {now}",
                        sample(family, round, host)
                    );
                    match line.parse::<MetricPoint>() {
                        Ok(point) => {
                            cache.add(point);
                            fed += 1;
                        }
                        Err(e) => tracing::warn!("generated bad line: {e}"),
                    }
                }
                round += 1;
            }
            recv(stop_rx) -> _ => break,
        }
    }
    tracing::debug!(host, fed, "generator stopped");
    fed
}

/// Synthetic sample values: waves for the gauges, monotonic counts for
/// the counters.
#[allow(clippy::cast_precision_loss)]
fn sample(family: &str, round: u64, host: usize) -> f64 {
    let phase = round as f64 * 0.1 + host as f64;
    match family {
        "cpu.load" => phase.sin().abs() * 8.0,
        "cpu.idle" => 100.0 - phase.sin().abs() * 60.0,
        "mem.rss" => (512.0 + phase.cos() * 64.0) * 1024.0 * 1024.0,
        "net.rx" => (round * 1500 + host as u64 * 7) as f64,
        _ => (round * 900 + host as u64 * 3) as f64,
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_count_matches_cache_size() {
        let cache = Arc::new(Cache::new(0));
        let feed = Feed::start(Arc::clone(&cache), 2, Duration::from_millis(5));
        thread::sleep(Duration::from_millis(100));
        let fed = feed.stop();

        assert!(fed > 0);
        assert_eq!(cache.size(), fed as i64);
        // Each host contributes its full family of metric names.
        assert_eq!(cache.len() % FAMILIES.len(), 0);
        assert_eq!(fed % FAMILIES.len() as u64, 0);
    }

    #[test]
    fn test_generated_lines_parse() {
        for round in [0, 1, 100] {
            for host in [0, 7] {
                for family in FAMILIES {
                    let value = sample(family, round, host);
                    assert!(value.is_finite());
                    let line = format!("relay.host{host}.{family} {value} 1700000000");
                    assert!(line.parse::<MetricPoint>().is_ok(), "{line}");
                }
            }
        }
    }
}
