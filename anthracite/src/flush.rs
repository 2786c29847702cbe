//! Flush orchestration: draining pending points onto the hand-off channel.
//!
//! A flush cycle snapshots every metric's pending list under its shard
//! lock, orders the resulting batches by the configured [`WriteStrategy`]
//! and pushes them to the channel the storage writers drain. [`Flusher`]
//! runs such cycles on a background thread, one per tick.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, select, tick};

use crate::cache::Cache;
use crate::error::ConfigError;
use crate::point::PointBag;

/// How one flush cycle orders batches before handing them off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Largest batches first: order key is the batch point count,
    /// descending. Configured as `"max"`.
    Max,
    /// Oldest data first: order key is the timestamp of the batch's first
    /// point, ascending. Configured as `"sort"`.
    TimeSorted,
}

impl FromStr for WriteStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, ConfigError> {
        match s {
            "max" => Ok(Self::Max),
            "sort" => Ok(Self::TimeSorted),
            _ => Err(ConfigError::UnknownWriteStrategy {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for WriteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Max => "max",
            Self::TimeSorted => "sort",
        })
    }
}

impl Cache {
    /// Replaces the write strategy. Set once at startup, before the cache
    /// is shared across threads.
    pub fn set_write_strategy(&mut self, strategy: WriteStrategy) {
        self.write_strategy = strategy;
    }

    /// Runs one flush cycle and returns the number of points moved.
    ///
    /// Shards are visited sequentially, each under its own brief lock;
    /// metrics with nothing pending are skipped. After all shards are
    /// drained the batches are sorted by the strategy's order key and
    /// pushed onto the hand-off channel. A full channel blocks here, not
    /// in [`Cache::add`]. Zero collected points makes the cycle a no-op.
    pub fn flush(&self) -> usize {
        let strategy = self.write_strategy;
        let started = Instant::now();

        let mut queue: Vec<(i64, PointBag)> = Vec::with_capacity(self.len() * 2);
        let mut moved = 0usize;

        for shard in &self.shards {
            let mut items = shard.items.lock();
            for (metric, bag) in items.iter_mut() {
                if bag.pending.is_empty() {
                    continue;
                }
                let batch = bag.take_pending(metric);
                moved += batch.len();
                let key = match strategy {
                    WriteStrategy::Max => batch.len() as i64,
                    WriteStrategy::TimeSorted => batch.first_timestamp().unwrap_or(0),
                };
                queue.push((key, batch));
            }
        }

        if queue.is_empty() {
            return 0;
        }

        match strategy {
            WriteStrategy::Max => queue.sort_by(|a, b| b.0.cmp(&a.0)),
            WriteStrategy::TimeSorted => queue.sort_by(|a, b| a.0.cmp(&b.0)),
        }

        for (_, batch) in queue {
            // The cache owns a receiver of its own channel, so the send
            // can only fail once `self` is being torn down.
            if self.tx.send(batch).is_err() {
                break;
            }
        }

        tracing::debug!(
            points = moved,
            strategy = %strategy,
            elapsed = ?started.elapsed(),
            "flush cycle queued"
        );
        moved
    }
}

/// Background thread running one flush cycle per tick.
#[derive(Debug)]
pub struct Flusher {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Flusher {
    /// Spawns the flusher over `cache`, ticking every `interval`.
    pub fn start(cache: Arc<Cache>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let ticker = tick(interval);
        let handle = thread::spawn(move || {
            loop {
                select! {
                    recv(ticker) -> _ => {
                        cache.flush();
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
            tracing::debug!("flusher stopped");
        });
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signals the thread and waits for any in-flight cycle to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.stop_tx.send(());
            if handle.join().is_err() {
                tracing::error!("flusher thread panicked");
            }
        }
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
