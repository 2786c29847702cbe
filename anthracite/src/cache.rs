//! The sharded concurrent point cache.
//!
//! Metric names hash onto 1024 fixed shards, each guarding its own
//! `metric name -> CachePointBag` map with a [`parking_lot::Mutex`], so
//! writers for different metrics almost never contend. Each per-metric
//! buffer keeps a time-ordered window of recent points for the read path
//! and a pending list for the flush path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::flush::WriteStrategy;
use crate::point::{MetricPoint, Point, PointBag};

/// Number of shards. Fixed for the process lifetime.
const SHARD_COUNT: usize = 1024;

/// Retention window of every per-metric buffer, in seconds.
const DEFAULT_DURATION_SECS: i64 = 3600;

/// Capacity of the hand-off channel to the storage writers.
const CHANNEL_CAPACITY: usize = 1024 * 1024;

/// 32-bit FNV-1 hash: multiply by the prime, then XOR the byte.
///
/// Shard placement is part of the dump/restore contract, so the exact
/// variant (FNV-1, not FNV-1a) is pinned here.
fn fnv1_32(key: &str) -> u32 {
    const PRIME: u32 = 16_777_619;
    let mut hash: u32 = 2_166_136_261;
    for byte in key.bytes() {
        hash = hash.wrapping_mul(PRIME);
        hash ^= u32::from(byte);
    }
    hash
}

fn shard_index(key: &str) -> usize {
    fnv1_32(key) as usize % SHARD_COUNT
}

/// Current unix time in seconds. A clock before the epoch reads as 0
/// rather than failing ingestion.
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

/// Per-metric buffer: the recent-points window plus the pending list.
///
/// Mutated only under the owning shard's lock; needs no lock of its own.
#[derive(Debug)]
pub(crate) struct CachePointBag {
    /// Points within the retention window, ascending by timestamp.
    pub(crate) data: Vec<Point>,
    /// Points accumulated since the last flush drain.
    pub(crate) pending: Vec<Point>,
    /// Retention window in seconds, fixed at creation.
    pub(crate) duration: i64,
}

impl CachePointBag {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            pending: Vec::new(),
            duration: DEFAULT_DURATION_SECS,
        }
    }

    /// Inserts one point, expiring old ones first, and records it on the
    /// pending list. Returns how many points the expiry step dropped.
    ///
    /// The expiry scan advances a cut index while points are still older
    /// than `now - duration` and truncates the prefix `[..cut]` only when
    /// `cut > 0`. The cut lands on the position of the last expired point
    /// examined, so that point itself survives the scan, and a single
    /// expired point at index 0 is never dropped.
    fn add(&mut self, point: Point, now: i64) -> usize {
        let horizon = now - self.duration;
        let mut cut = 0;
        for (i, p) in self.data.iter().enumerate() {
            if p.timestamp >= horizon {
                break;
            }
            cut = i;
        }
        if cut > 0 {
            self.data.drain(..cut);
        }

        // Most points arrive in order; late samples bubble left until the
        // predecessor is no newer. Equal timestamps keep arrival order.
        self.data.push(point);
        let mut i = self.data.len() - 1;
        while i > 0 && self.data[i - 1].timestamp > point.timestamp {
            self.data.swap(i - 1, i);
            i -= 1;
        }

        self.pending.push(point);
        cut
    }

    /// Swaps the pending list out as a [`PointBag`] for the storage
    /// writer, leaving it empty.
    pub(crate) fn take_pending(&mut self, metric: &str) -> PointBag {
        PointBag {
            metric: metric.to_string(),
            data: std::mem::take(&mut self.pending),
        }
    }
}

/// One lock-guarded partition of the metric-name space.
#[derive(Debug, Default)]
pub(crate) struct Shard {
    pub(crate) items: Mutex<HashMap<String, CachePointBag>>,
}

/// Sharded in-memory cache of recent metric points, with a bounded
/// hand-off channel feeding the storage writers.
///
/// All ingestion and query methods take `&self`; the cache is meant to be
/// shared across threads behind an [`std::sync::Arc`].
///
/// # Examples
///
/// ```rust
/// use std::time::{SystemTime, UNIX_EPOCH};
/// use anthracite::{Cache, MetricPoint};
///
/// let cache = Cache::new(1_000_000);
/// let now = SystemTime::now()
///     .duration_since(UNIX_EPOCH)
///     .unwrap()
///     .as_secs() as i64;
///
/// cache.add(MetricPoint::new("sys.cpu.idle", 97.5, now));
/// let (found, points) = cache.get("sys.cpu.idle", now - 60, now + 60);
/// assert!(found);
/// assert_eq!(points.len(), 1);
/// ```
#[derive(Debug)]
pub struct Cache {
    pub(crate) shards: Vec<Shard>,
    pub(crate) write_strategy: WriteStrategy,
    pub(crate) tx: Sender<PointBag>,
    rx: Receiver<PointBag>,
    size: AtomicI64,
    size_limit: i64,
}

impl Cache {
    /// Creates an empty cache with all shards allocated up front.
    ///
    /// `size_limit` is a monitoring threshold for [`Cache::is_over_limit`];
    /// it does not gate admission. The write strategy starts as
    /// [`WriteStrategy::TimeSorted`] until configuration overrides it.
    pub fn new(size_limit: i64) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
        let mut shards = Vec::with_capacity(SHARD_COUNT);
        for _ in 0..SHARD_COUNT {
            shards.push(Shard::default());
        }
        Self {
            shards,
            write_strategy: WriteStrategy::TimeSorted,
            tx,
            rx,
            size: AtomicI64::new(0),
            size_limit,
        }
    }

    fn shard(&self, key: &str) -> &Shard {
        &self.shards[shard_index(key)]
    }

    /// Ingests one point.
    ///
    /// Creates the metric's buffer on first sight, lets the buffer expire
    /// points that fell out of its window, and adjusts the approximate
    /// global point counter. Never fails and never blocks beyond the
    /// shard lock.
    pub fn add(&self, point: MetricPoint) {
        let sample = point.point();
        let shard = self.shard(&point.key);
        let now = unix_now();

        let expired = {
            let mut items = shard.items.lock();
            let bag = items.entry(point.key).or_insert_with(CachePointBag::new);
            bag.add(sample, now)
        };

        self.size.fetch_add(1 - expired as i64, Ordering::Relaxed);
    }

    /// Reads the cached points of `key` with timestamps in
    /// `[from, until]`, both ends inclusive.
    ///
    /// The flag says whether the cache view is authoritative for the
    /// request. A metric never seen yields `(true, [])`: the cache *is*
    /// the full picture and it is empty. A known metric asked for a range
    /// starting before its retention window yields `(false, [])`: the
    /// caller must fall back to durable storage.
    pub fn get(&self, key: &str, from: i64, until: i64) -> (bool, Vec<Point>) {
        let shard = self.shard(key);
        let items = shard.items.lock();
        let Some(bag) = items.get(key) else {
            return (true, Vec::new());
        };

        if from < unix_now() - bag.duration {
            return (false, Vec::new());
        }
        let points = bag
            .data
            .iter()
            .copied()
            .filter(|p| p.timestamp >= from && p.timestamp <= until)
            .collect();
        (true, points)
    }

    /// Retention duration and current window length of `key`, if cached.
    pub fn metric_info(&self, key: &str) -> Option<(i64, usize)> {
        let shard = self.shard(key);
        let items = shard.items.lock();
        items.get(key).map(|bag| (bag.duration, bag.data.len()))
    }

    /// Number of distinct metrics, summed shard by shard.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.items.lock().len()).sum()
    }

    /// Whether no metric is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate total number of cached points.
    pub fn size(&self) -> i64 {
        self.size.load(Ordering::Relaxed)
    }

    /// The configured monitoring threshold for the point count.
    pub fn size_limit(&self) -> i64 {
        self.size_limit
    }

    /// Whether the point count currently exceeds the threshold. A limit
    /// of zero or below disables the check.
    pub fn is_over_limit(&self) -> bool {
        self.size_limit > 0 && self.size() > self.size_limit
    }

    /// Replaces the monitoring threshold.
    pub fn set_size_limit(&mut self, limit: i64) {
        self.size_limit = limit;
    }

    /// A receiver end of the hand-off channel.
    ///
    /// Receivers are cloneable; each flushed [`PointBag`] is delivered to
    /// exactly one of them, so a pool of writer threads can share the
    /// drain work.
    pub fn drain_receiver(&self) -> Receiver<PointBag> {
        self.rx.clone()
    }

    /// The write strategy flush cycles currently order by.
    pub fn write_strategy(&self) -> WriteStrategy {
        self.write_strategy
    }
}
