//! CLI for the anthracite metrics cache engine.
//!
//! Provides commands for inspecting retention schemas, resolving the
//! storage policy for a metric name, and benchmarking the cache write
//! path.

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand, ValueEnum};

use anthracite::{Cache, MetricPoint, StorageAggregation, StorageSchemas};

/// anthracite — Sharded metrics cache and write buffer CLI.
#[derive(Parser)]
#[command(name = "anthracite", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// List the retention rules of a storage-schemas.conf file in match order.
    Schemas {
        /// Path to the storage-schemas.conf file.
        conf: PathBuf,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Resolve the retention and rollup policy for a metric name.
    Policy {
        /// Metric name to match (e.g., "servers.web1.cpu.load").
        metric: String,

        /// Path to the storage-schemas.conf file.
        #[arg(long)]
        schemas: PathBuf,

        /// Path to the storage-aggregation.conf file.
        #[arg(long)]
        aggregation: Option<PathBuf>,
    },

    /// Run a cache write-path microbenchmark.
    Bench {
        /// Number of points to ingest.
        #[arg(long, default_value = "1000000")]
        points: u64,

        /// Number of distinct metrics to spread them over.
        #[arg(long, default_value = "100")]
        metrics: u32,
    },
}

/// Output format for schema listings.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON array of objects.
    Json,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Schemas { conf, format } => cmd_schemas(&conf, &format),
        Commands::Policy {
            metric,
            schemas,
            aggregation,
        } => cmd_policy(&metric, &schemas, aggregation.as_deref()),
        Commands::Bench { points, metrics } => cmd_bench(points, metrics),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `anthracite schemas <conf>`.
fn cmd_schemas(conf: &Path, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let schemas = StorageSchemas::load(conf)?;

    match format {
        OutputFormat::Csv => {
            println!("# conf={}, rules={}", conf.display(), schemas.len());
            println!("name,pattern,priority,retentions");
            for rule in schemas.rules() {
                let retentions: Vec<String> =
                    rule.retentions.iter().map(ToString::to_string).collect();
                println!(
                    "{},{},{},{}",
                    rule.name,
                    rule.pattern,
                    rule.priority,
                    retentions.join(";")
                );
            }
        }
        OutputFormat::Json => {
            let rules: Vec<serde_json::Value> = schemas
                .rules()
                .iter()
                .map(|rule| {
                    serde_json::json!({
                        "name": rule.name,
                        "pattern": rule.pattern,
                        "priority": rule.priority,
                        "retentions": rule.retentions,
                    })
                })
                .collect();

            let output = serde_json::json!({
                "conf": conf.display().to_string(),
                "count": schemas.len(),
                "rules": rules,
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `anthracite policy <metric>`.
fn cmd_policy(
    metric: &str,
    schemas_path: &Path,
    aggregation_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let schemas = StorageSchemas::load(schemas_path)?;
    let rule = schemas
        .match_metric(metric)
        .ok_or_else(|| format!("no schema rule matches '{metric}'"))?;

    println!("Metric: {metric}");
    println!();
    println!("Schema rule: \"{}\"", rule.name);
    println!("  Pattern: {}", rule.pattern);
    println!("  Priority: {}", rule.priority);
    println!("  Retentions:");
    for tier in &rule.retentions {
        println!(
            "    {tier} ({} per point, {} total)",
            format_duration_secs(u64::from(tier.seconds_per_point)),
            format_duration_secs(tier.retention_secs()),
        );
    }

    if let Some(path) = aggregation_path {
        let rules = StorageAggregation::load(path)?;
        let item = rules.match_metric(metric);
        println!();
        println!("Aggregation rule: \"{}\"", item.name);
        if !item.pattern.is_empty() {
            println!("  Pattern: {}", item.pattern);
        }
        println!("  Method: {}", item.method);
        println!("  xFilesFactor: {}", item.x_files_factor);
    }

    Ok(())
}

/// Implements `anthracite bench`.
#[allow(clippy::cast_precision_loss)] // Benchmark stats are fine with f64 precision
fn cmd_bench(points: u64, metrics: u32) -> Result<(), Box<dyn std::error::Error>> {
    if metrics == 0 {
        return Err("need at least one metric".into());
    }

    println!("anthracite cache write-path benchmark");
    println!("  Points:  {points}");
    println!("  Metrics: {metrics}");
    println!();

    let cache = Cache::new(0);
    let keys: Vec<String> = (0..metrics).map(|m| format!("bench.metric{m}")).collect();
    let base = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

    println!("Ingesting {points} points across {metrics} metrics...");

    let rounds = points / u64::from(metrics);
    let mut ts = base;

    let start = Instant::now();

    for _ in 0..rounds {
        ts += 1;
        for key in &keys {
            cache.add(MetricPoint::new(key.clone(), 42.5, ts));
        }
    }

    let elapsed = start.elapsed();
    let total_adds = rounds * u64::from(metrics);
    let ns_per_add = elapsed.as_nanos() as f64 / total_adds as f64;
    let adds_per_sec = total_adds as f64 / elapsed.as_secs_f64();

    println!();
    println!("Results:");
    println!("  Total adds: {total_adds}");
    println!("  Cached points: {}", cache.size());
    println!("  Elapsed: {elapsed:.3?}");
    println!("  Avg latency: {ns_per_add:.1} ns/add");
    println!("  Throughput: {adds_per_sec:.0} adds/sec");

    let start = Instant::now();
    let flushed = cache.flush();
    println!("  Flush cycle: {flushed} points in {:.3?}", start.elapsed());

    Ok(())
}

/// Formats seconds as a human-readable duration.
fn format_duration_secs(secs: u64) -> String {
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
