//! Point and point-bag value types shared across the pipeline.
//!
//! A [`MetricPoint`] is what the ingestion feed delivers (metric name plus
//! one sample); a [`Point`] is the per-metric sample stored in the cache;
//! a [`PointBag`] is the ordered batch handed to the storage writer.
//!
//! The text line codec used by dump files lives here too: one point per
//! line, `"<metric> <value> <timestamp>"`.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use crate::error::ParseError;

/// One (value, timestamp) sample. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// The sampled value.
    pub value: f64,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

impl Point {
    /// Creates a new point.
    pub fn new(value: f64, timestamp: i64) -> Self {
        Self { value, timestamp }
    }
}

/// One sample together with its metric name, as delivered by the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    /// The metric name, e.g. `sys.cpu.idle`.
    pub key: String,
    /// The sampled value.
    pub value: f64,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

impl MetricPoint {
    /// Creates a new metric point.
    pub fn new(key: impl Into<String>, value: f64, timestamp: i64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp,
        }
    }

    /// The sample without its metric name.
    pub fn point(&self) -> Point {
        Point {
            value: self.value,
            timestamp: self.timestamp,
        }
    }
}

impl fmt::Display for MetricPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.value, self.timestamp)
    }
}

impl FromStr for MetricPoint {
    type Err = ParseError;

    /// Parses one feed/dump line.
    ///
    /// The line is trimmed of whitespace and split on single spaces; it
    /// must hold exactly three fields. The timestamp may carry a
    /// fractional part (some senders emit float timestamps) and is
    /// truncated to whole seconds. NaN values and NaN timestamps are
    /// rejected.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use anthracite::MetricPoint;
    ///
    /// let p: MetricPoint = "sys.cpu.idle 97.5 1700000000\n".parse().unwrap();
    /// assert_eq!(p.key, "sys.cpu.idle");
    /// assert_eq!(p.value, 97.5);
    /// assert_eq!(p.timestamp, 1_700_000_000);
    ///
    /// assert!("sys.cpu.idle 97.5".parse::<MetricPoint>().is_err());
    /// ```
    fn from_str(line: &str) -> Result<Self, ParseError> {
        let bad = || ParseError::BadLine {
            line: line.to_string(),
        };

        let trimmed = line.trim_matches(['\n', ' ', '\t', '\r']);
        let fields: Vec<&str> = trimmed.split(' ').collect();
        if fields.len() != 3 {
            return Err(bad());
        }

        let value: f64 = fields[1].parse().map_err(|_| bad())?;
        let timestamp: f64 = fields[2].parse().map_err(|_| bad())?;
        if value.is_nan() || timestamp.is_nan() {
            return Err(bad());
        }

        // Some senders emit float timestamps; the fraction is dropped.
        #[allow(clippy::cast_possible_truncation)]
        let timestamp = timestamp as i64;

        Ok(Self {
            key: fields[0].to_string(),
            value,
            timestamp,
        })
    }
}

/// An ordered batch of points for one metric.
///
/// `data` is ascending by timestamp; this is the transport unit between
/// the cache and the storage writer pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PointBag {
    /// The metric name.
    pub metric: String,
    /// The points, ascending by timestamp.
    pub data: Vec<Point>,
}

impl PointBag {
    /// Creates an empty bag for `metric`.
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            data: Vec::new(),
        }
    }

    /// Appends one point at the tail.
    pub fn append(&mut self, point: Point) -> &mut Self {
        self.data.push(point);
        self
    }

    /// Number of points in the bag.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the bag holds no points.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Timestamp of the first (oldest) point, if any.
    pub fn first_timestamp(&self) -> Option<i64> {
        self.data.first().map(|p| p.timestamp)
    }

    /// Writes every point as a `"<metric> <value> <timestamp>\n"` line.
    ///
    /// Returns the number of bytes written. This is the dump file format;
    /// [`MetricPoint::from_str`] parses it back.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error from the underlying writer.
    pub fn write_lines<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        write_points(&self.metric, &self.data, w)
    }
}

/// Writes `points` of `metric` in the dump line format.
pub(crate) fn write_points<W: Write>(metric: &str, points: &[Point], w: &mut W) -> io::Result<u64> {
    let mut written = 0u64;
    for p in points {
        let line = format!("{metric} {} {}\n", p.value, p.timestamp);
        w.write_all(line.as_bytes())?;
        written += line.len() as u64;
    }
    Ok(written)
}
