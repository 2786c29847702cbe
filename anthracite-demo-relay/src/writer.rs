//! Storage writer pool and write-policy resolution.
//!
//! Drains flushed batches off the cache's hand-off channel the way a
//! whisper-backed writer would: each metric resolves to a retention rule
//! and an aggregation policy before its points are accepted. This demo
//! counts and logs instead of touching series files.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, select};

use anthracite::{PointBag, Result, StorageAggregation, StorageSchemas};

/// The loaded rule sets writers consult per metric.
pub struct Policies {
    schemas: Option<StorageSchemas>,
    aggregation: StorageAggregation,
}

impl Policies {
    /// Loads the rule files that were given. A missing aggregation file
    /// falls back to the built-in default policy; a missing schemas file
    /// disables retention matching, so every metric is accepted.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when a given file cannot be read or
    /// parsed.
    pub fn load(schemas: Option<&Path>, aggregation: Option<&Path>) -> Result<Self> {
        let schemas = schemas.map(StorageSchemas::load).transpose()?;
        let aggregation = match aggregation {
            Some(path) => StorageAggregation::load(path)?,
            None => StorageAggregation::default(),
        };
        Ok(Self {
            schemas,
            aggregation,
        })
    }

    /// Resolves the write policy for one metric, logging the outcome.
    /// `false` means no retention rule matched and the metric's batches
    /// must be dropped.
    fn admit(&self, metric: &str) -> bool {
        let rollup = self.aggregation.match_metric(metric);
        let Some(schemas) = &self.schemas else {
            tracing::debug!(metric, method = %rollup.method, "write policy resolved");
            return true;
        };
        match schemas.match_metric(metric) {
            Some(rule) => {
                tracing::debug!(
                    metric,
                    schema = %rule.name,
                    method = %rollup.method,
                    x_files_factor = rollup.x_files_factor,
                    "write policy resolved"
                );
                true
            }
            None => {
                tracing::warn!(metric, "no retention rule matches, dropping");
                false
            }
        }
    }
}

/// What a writer pool consumed, summed over its threads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterTotals {
    /// Batches accepted.
    pub bags: u64,
    /// Points accepted.
    pub points: u64,
    /// Points dropped because no retention rule matched.
    pub dropped: u64,
}

/// Pool of threads draining one hand-off channel.
pub struct WriterPool {
    stop_tx: Sender<()>,
    handles: Vec<JoinHandle<WriterTotals>>,
}

impl WriterPool {
    /// Spawns `writers` threads over a shared receiver. Each flushed
    /// batch is consumed by exactly one of them.
    pub fn start(rx: Receiver<PointBag>, policies: Arc<Policies>, writers: usize) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(writers);
        let mut handles = Vec::with_capacity(writers);
        for _ in 0..writers {
            let rx = rx.clone();
            let stop_rx = stop_rx.clone();
            let policies = Arc::clone(&policies);
            handles.push(thread::spawn(move || {
                writer_loop(&rx, &stop_rx, &policies)
            }));
        }
        Self { stop_tx, handles }
    }

    /// Signals every writer, lets them take whatever is already queued,
    /// and returns the summed totals.
    pub fn stop(self) -> WriterTotals {
        for _ in &self.handles {
            let _ = self.stop_tx.send(());
        }
        let mut totals = WriterTotals::default();
        for handle in self.handles {
            match handle.join() {
                Ok(t) => {
                    totals.bags += t.bags;
                    totals.points += t.points;
                    totals.dropped += t.dropped;
                }
                Err(_) => tracing::error!("writer thread panicked"),
            }
        }
        totals
    }
}

fn writer_loop(
    rx: &Receiver<PointBag>,
    stop_rx: &Receiver<()>,
    policies: &Policies,
) -> WriterTotals {
    let mut totals = WriterTotals::default();
    // Per-metric admit decisions, made once on first sight.
    let mut admitted: HashMap<String, bool> = HashMap::new();
    loop {
        select! {
            recv(rx) -> bag => {
                match bag {
                    Ok(bag) => consume(&bag, policies, &mut admitted, &mut totals),
                    Err(_) => break,
                }
            }
            recv(stop_rx) -> _ => {
                // Whatever the final flush queued is still in the
                // channel; take it before exiting.
                while let Ok(bag) = rx.try_recv() {
                    consume(&bag, policies, &mut admitted, &mut totals);
                }
                break;
            }
        }
    }
    totals
}

fn consume(
    bag: &PointBag,
    policies: &Policies,
    admitted: &mut HashMap<String, bool>,
    totals: &mut WriterTotals,
) {
    let admit = match admitted.get(&bag.metric) {
        Some(&decision) => decision,
        None => {
            let decision = policies.admit(&bag.metric);
            admitted.insert(bag.metric.clone(), decision);
            decision
        }
    };
    if admit {
        totals.bags += 1;
        totals.points += bag.len() as u64;
        tracing::trace!(metric = %bag.metric, points = bag.len(), "batch written");
    } else {
        totals.dropped += bag.len() as u64;
    }
}
