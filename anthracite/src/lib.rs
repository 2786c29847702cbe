//! # anthracite
//!
//! Sharded in-memory metrics cache and write buffer for Graphite-style
//! daemons.
//!
//! anthracite sits between a metrics receiver and a durable time-series
//! store: it absorbs a high-rate stream of (metric, value, timestamp)
//! samples into 1024 lock-sharded per-metric buffers, serves recent-range
//! reads straight from memory, and periodically hands ordered batches to a
//! writer pool over a bounded channel. Dump/restore carries
//! buffered-but-unflushed points across restarts.
//!
//! ## Key Properties
//!
//! - Write contention bounded by 1024 independent shards, no global lock
//! - Per-metric buffers stay timestamp-ordered under out-of-order arrival
//! - Time-based expiry keeps memory proportional to the retention window
//! - Two flush orderings: largest-batch-first (`max`) or oldest-first (`sort`)
//! - Plain-text dump files replayed through the normal ingest path on restart
//! - Retention and rollup policy matching compatible with Graphite's
//!   `storage-schemas.conf` / `storage-aggregation.conf`
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::{SystemTime, UNIX_EPOCH};
//! use anthracite::{Cache, MetricPoint};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Cache::new(1_000_000);
//! let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;
//!
//! // Ingest a couple of samples.
//! cache.add(MetricPoint::new("servers.web1.load", 0.25, now - 1));
//! cache.add(MetricPoint::new("servers.web1.load", 0.75, now));
//!
//! // Recent ranges are served straight from memory.
//! let (found, points) = cache.get("servers.web1.load", now - 60, now);
//! assert!(found);
//! assert_eq!(points.len(), 2);
//!
//! // A flush cycle moves pending points onto the hand-off channel.
//! assert_eq!(cache.flush(), 2);
//! let batch = cache.drain_receiver().try_recv()?;
//! assert_eq!(batch.metric, "servers.web1.load");
//! assert_eq!(batch.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Cache`] — sharded point cache: ingest/query surface plus the hand-off channel
//! - [`Flusher`] — background thread running one flush cycle per tick
//! - [`StorageSchemas`] / [`StorageAggregation`] — retention and rollup policy matchers
//! - [`EngineConfig`] — TOML daemon configuration
//!
//! ## Modules
//!
//! - [`cache`] — shards and per-metric buffers
//! - [`flush`] — write strategies, flush cycles, the periodic flusher
//! - [`dump`] — dump/restore crash recovery
//! - [`point`] — point value types and the dump line codec
//! - [`schema`] — `storage-schemas.conf` retention rules
//! - [`aggregation`] — `storage-aggregation.conf` rollup rules
//! - [`config`] — daemon TOML configuration
//! - [`error`] — error types

mod conf;

pub mod aggregation;
pub mod cache;
pub mod config;
pub mod dump;
pub mod error;
pub mod flush;
pub mod point;
pub mod schema;

// Re-export primary API types at crate root for convenience.
pub use aggregation::{AggregationItem, AggregationMethod, StorageAggregation};
pub use cache::Cache;
pub use config::{CacheSection, EngineConfig};
pub use dump::RestoreSummary;
pub use error::{AnthraciteError, Result};
pub use flush::{Flusher, WriteStrategy};
pub use point::{MetricPoint, Point, PointBag};
pub use schema::{Retention, Schema, StorageSchemas};
