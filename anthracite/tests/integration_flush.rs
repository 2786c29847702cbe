//! Integration tests for whole-cache flush cycles and the background
//! flusher thread.

use anthracite::{Cache, Flusher, MetricPoint, WriteStrategy};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Helper returning the current unix timestamp in seconds.
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

#[test]
fn test_flush_completeness() {
    let cache = Cache::new(1_000_000);
    let now = unix_now();

    // 20 metrics with 1..=20 pending points each.
    for m in 1..=20 {
        for i in 0..m {
            cache.add(MetricPoint::new(
                format!("batch.metric{m:02}"),
                f64::from(i),
                now - 300 + i64::from(i),
            ));
        }
    }

    let total: i32 = (1..=20).sum();
    assert_eq!(cache.flush(), usize::try_from(total).unwrap());

    // Exactly one batch per metric, nothing left pending anywhere.
    let rx = cache.drain_receiver();
    let mut batches = Vec::new();
    while let Ok(bag) = rx.try_recv() {
        batches.push(bag);
    }
    assert_eq!(batches.len(), 20);

    let mut seen: Vec<&str> = batches.iter().map(|b| b.metric.as_str()).collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 20, "each metric hands off exactly one batch");

    // A second cycle finds nothing to do.
    assert_eq!(cache.flush(), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_max_strategy_hands_off_largest_first() {
    let mut cache = Cache::new(0);
    cache.set_write_strategy(WriteStrategy::Max);
    let now = unix_now();

    for (metric, count) in [("mid", 4), ("big", 9), ("small", 1)] {
        for i in 0..count {
            cache.add(MetricPoint::new(metric, 1.0, now - 60 + i64::from(i)));
        }
    }

    assert_eq!(cache.flush(), 14);
    let rx = cache.drain_receiver();
    let sizes: Vec<usize> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|bag| bag.len())
        .collect();
    assert_eq!(sizes, vec![9, 4, 1]);
}

#[test]
fn test_sort_strategy_hands_off_oldest_first() {
    let mut cache = Cache::new(0);
    cache.set_write_strategy(WriteStrategy::TimeSorted);
    let now = unix_now();

    cache.add(MetricPoint::new("newest", 1.0, now - 10));
    cache.add(MetricPoint::new("oldest", 1.0, now - 300));
    cache.add(MetricPoint::new("oldest", 1.0, now - 299));
    cache.add(MetricPoint::new("middle", 1.0, now - 150));

    assert_eq!(cache.flush(), 4);
    let rx = cache.drain_receiver();
    let order: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|bag| bag.metric)
        .collect();
    assert_eq!(order, vec!["oldest", "middle", "newest"]);
}

#[test]
fn test_flusher_drains_concurrent_producers() {
    let cache = Arc::new(Cache::new(1_000_000));
    let rx = cache.drain_receiver();
    let flusher = Flusher::start(Arc::clone(&cache), Duration::from_millis(10));

    let now = unix_now();
    let mut producers = Vec::new();
    for w in 0..4 {
        let cache = Arc::clone(&cache);
        producers.push(thread::spawn(move || {
            for i in 0..100 {
                cache.add(MetricPoint::new(
                    format!("feed{w}.value"),
                    f64::from(i),
                    now - 120 + i64::from(i),
                ));
                if i % 25 == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }));
    }
    for p in producers {
        p.join().unwrap();
    }
    flusher.stop();

    // The last tick may have fired before the final adds landed; one
    // manual cycle picks up the remainder.
    let tail = cache.flush();

    let mut handed_off = 0;
    while let Ok(bag) = rx.try_recv() {
        handed_off += bag.len();
    }
    assert_eq!(handed_off, 400);
    assert!(tail <= 400);

    // Hand-off moves pending points but leaves the query window intact.
    assert_eq!(cache.size(), 400);
    let (found, points) = cache.get("feed0.value", now - 200, now);
    assert!(found);
    assert_eq!(points.len(), 100);
}
