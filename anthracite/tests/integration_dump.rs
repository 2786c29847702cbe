//! Integration tests for dump/restore crash recovery.
//!
//! These tests simulate the crash-and-restart cycle: one cache dumps its
//! buffers to disk, a fresh cache restores them, and the recovered points
//! must behave exactly like freshly ingested ones.

use anthracite::{Cache, MetricPoint};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::tempdir;

/// Helper returning the current unix timestamp in seconds.
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

#[test]
fn test_dump_restore_round_trip() {
    let dir = tempdir().unwrap();
    let now = unix_now();

    // First process: buffer points, dump, "crash".
    let cache = Cache::new(1_000_000);
    cache.add(MetricPoint::new("a.b", 1.5, now - 200));
    cache.add(MetricPoint::new("a.b", 2.0, now - 100));
    cache.add(MetricPoint::new("c.d", -3.25, now - 50));
    let path = cache.dump(dir.path()).unwrap();
    assert!(path.exists());

    // Second process: restore replays the file through normal ingest.
    let recovered = Cache::new(1_000_000);
    let summary = recovered.restore(dir.path()).unwrap();
    assert_eq!(summary.files, 1);
    assert_eq!(summary.points, 3);
    assert_eq!(summary.skipped_lines, 0);

    let (found, points) = recovered.get("a.b", now - 300, now);
    assert!(found);
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].value, 1.5);
    assert_eq!(points[0].timestamp, now - 200);
    assert_eq!(points[1].value, 2.0);
    assert_eq!(points[1].timestamp, now - 100);

    let (found, points) = recovered.get("c.d", now - 300, now);
    assert!(found);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].value, -3.25);

    // The consumed dump file is gone.
    assert!(!path.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_empty_dump_round_trip() {
    let dir = tempdir().unwrap();

    let cache = Cache::new(1_000_000);
    let path = cache.dump(dir.path()).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);

    let recovered = Cache::new(1_000_000);
    let summary = recovered.restore(dir.path()).unwrap();
    assert_eq!(summary.files, 1);
    assert_eq!(summary.points, 0);
    assert_eq!(summary.skipped_lines, 0);
    assert!(recovered.is_empty());
    assert!(!path.exists());
}

#[test]
fn test_restore_counts_skipped_garbage() {
    let dir = tempdir().unwrap();
    let now = unix_now();

    // A dump file with two good lines and three kinds of damage in the
    // middle: wrong field count, unparseable value, invalid UTF-8.
    let mut raw = Vec::new();
    raw.extend_from_slice(format!("good.metric 1 {}\n", now - 10).as_bytes());
    raw.extend_from_slice(b"not a metric line\n");
    raw.extend_from_slice(format!("bad.value abc {now}\n").as_bytes());
    raw.extend_from_slice(&[0xff, 0xfe, b'\n']);
    raw.extend_from_slice(format!("good.metric 2 {}\n", now - 5).as_bytes());
    fs::write(dir.path().join("cache.77.88.bin"), raw).unwrap();

    let cache = Cache::new(1_000_000);
    let summary = cache.restore(dir.path()).unwrap();
    assert_eq!(summary.files, 1);
    assert_eq!(summary.points, 2);
    assert_eq!(summary.skipped_lines, 3);

    let (found, points) = cache.get("good.metric", now - 60, now);
    assert!(found);
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].value, 1.0);
    assert_eq!(points[1].value, 2.0);

    // Damaged lines do not keep the file alive once fully read.
    assert!(!dir.path().join("cache.77.88.bin").exists());
}

#[test]
fn test_restored_points_flow_through_flush() {
    let dir = tempdir().unwrap();
    let now = unix_now();

    let cache = Cache::new(1_000_000);
    cache.add(MetricPoint::new("q.r", 4.0, now - 30));
    cache.dump(dir.path()).unwrap();

    let recovered = Cache::new(1_000_000);
    recovered.restore(dir.path()).unwrap();

    // Replayed points are pending again and reach the writer channel.
    assert_eq!(recovered.flush(), 1);
    let bag = recovered.drain_receiver().try_recv().unwrap();
    assert_eq!(bag.metric, "q.r");
    assert_eq!(bag.data[0].value, 4.0);
    assert_eq!(bag.data[0].timestamp, now - 30);
}

#[test]
fn test_restore_merges_cache_and_input_files() {
    let dir = tempdir().unwrap();
    let now = unix_now();

    let cache = Cache::new(1_000_000);
    cache.add(MetricPoint::new("m.x", 5.0, now));
    let dump_path = cache.dump(dir.path()).unwrap();

    // A receiver spool file carrying the same stamp as the dump. Equal
    // timestamps keep arrival order in the buffer, so replay order is
    // observable through point order.
    let dump_name = dump_path.file_name().unwrap().to_str().unwrap();
    let stamp = dump_name.split('.').nth(2).unwrap();
    fs::write(
        dir.path().join(format!("input.999.{stamp}.bin")),
        format!("m.x 7 {now}\n"),
    )
    .unwrap();

    let recovered = Cache::new(1_000_000);
    let summary = recovered.restore(dir.path()).unwrap();
    assert_eq!(summary.files, 2);
    assert_eq!(summary.points, 2);

    // Cache dumps replay ahead of receiver spools with the same stamp.
    let (found, points) = recovered.get("m.x", now - 60, now);
    assert!(found);
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].value, 5.0);
    assert_eq!(points[1].value, 7.0);

    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
