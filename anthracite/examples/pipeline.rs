//! End-to-end tour of the ingest pipeline.
//!
//! This example wires the pieces together the way a carbon-style daemon
//! would: parse plain-text protocol lines, buffer them in the sharded
//! cache, run a background flusher that hands batches to a writer
//! thread, then dump and restore across a simulated restart.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anthracite::{Cache, Flusher, MetricPoint, WriteStrategy};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

    // A cache sized like the daemon default, handing off big batches first.
    let mut cache = Cache::new(1_000_000);
    cache.set_write_strategy(WriteStrategy::Max);
    let cache = Arc::new(cache);
    println!("Created cache with write strategy '{}'", cache.write_strategy());

    // Phase 1: parse a burst of plain-text protocol lines.
    println!("\nIngesting plain-text lines:");
    let lines = [
        format!("servers.web1.cpu.load 0.42 {}", now - 20),
        format!("servers.web1.cpu.load 0.58 {}", now - 10),
        format!("servers.web2.cpu.load 0.13 {}", now - 15),
        format!("servers.web1.mem.rss 1048576 {}", now - 5),
    ];
    for line in &lines {
        let point: MetricPoint = line.parse()?;
        println!("  {point}");
        cache.add(point);
    }
    println!(
        "Cache now holds {} metrics, {} points",
        cache.len(),
        cache.size()
    );

    // Phase 2: a recent range is served straight from memory.
    let (found, points) = cache.get("servers.web1.cpu.load", now - 60, now);
    println!(
        "\nQuery servers.web1.cpu.load over the last minute: found={found}, {} points",
        points.len()
    );
    for p in &points {
        println!("  value={} timestamp={}", p.value, p.timestamp);
    }

    // Phase 3: background flusher hands batches to a writer thread.
    println!("\nStarting flusher and writer:");
    let rx = cache.drain_receiver();
    let writer = thread::spawn(move || {
        let mut written = 0;
        while let Ok(bag) = rx.recv_timeout(Duration::from_millis(500)) {
            println!("  writer got {} point(s) for {}", bag.len(), bag.metric);
            written += bag.len();
        }
        written
    });

    let flusher = Flusher::start(Arc::clone(&cache), Duration::from_millis(100));
    thread::sleep(Duration::from_millis(300));
    flusher.stop();

    let written = writer.join().expect("writer thread panicked");
    println!("Writer drained {written} points");

    // Phase 4: dump, "restart", restore.
    let dump_dir = std::path::Path::new("./pipeline_dump");
    std::fs::create_dir_all(dump_dir)?;
    let dump_path = cache.dump(dump_dir)?;
    println!("\nDumped cache to {}", dump_path.display());

    let restarted = Cache::new(1_000_000);
    let summary = restarted.restore(dump_dir)?;
    println!(
        "Restored {} point(s) from {} file(s), {} bad line(s) skipped",
        summary.points, summary.files, summary.skipped_lines
    );

    let (found, points) = restarted.get("servers.web1.cpu.load", now - 60, now);
    println!("Query after restart: found={found}, {} points", points.len());

    std::fs::remove_dir_all(dump_dir)?;
    println!("\nCleaned up demo dump directory");

    Ok(())
}
