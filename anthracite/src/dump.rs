//! Dump and restore: crash recovery for buffered-but-unflushed points.
//!
//! On shutdown the cache writes every point of every metric's window to a
//! single plain-text dump file. On the next start, restore scans the dump
//! directory and replays every candidate file through the normal ingest
//! path, oldest first, deleting each file once it is safely back in
//! memory.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::cache::Cache;
use crate::error::{DumpError, RestoreError, Result};
use crate::point::{self, MetricPoint};

/// Buffer size for dump writes and restore reads.
const IO_BUF_SIZE: usize = 1024 * 1024;

/// Totals from one restore pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Dump files fully replayed and deleted.
    pub files: usize,
    /// Points re-ingested through the normal add path.
    pub points: usize,
    /// Lines that failed to parse and were skipped.
    pub skipped_lines: usize,
}

impl Cache {
    /// Writes every cached point to a fresh dump file in `dir`.
    ///
    /// The file is named `cache.<pid>.<nanos>.bin` and holds one
    /// `"<metric> <value> <timestamp>"` line per point of every metric's
    /// window, written through a 1 MiB buffer. An empty cache still
    /// produces a file. Returns the path written, so the caller can log
    /// it and carry on with its shutdown sequence on error.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError`] if the file cannot be created, written or
    /// flushed.
    pub fn dump(&self, dir: &Path) -> Result<PathBuf> {
        let size = self.size();
        if size == 0 {
            tracing::info!("no points to dump");
        }

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let path = dir.join(format!("cache.{}.{}.bin", std::process::id(), nanos));
        tracing::info!(points = size, path = %path.display(), "cache dump started");

        let file = File::create(&path).map_err(|source| DumpError::Create {
            path: path.display().to_string(),
            source,
        })?;
        let mut writer = BufWriter::with_capacity(IO_BUF_SIZE, file);

        for shard in &self.shards {
            let items = shard.items.lock();
            for (metric, bag) in items.iter() {
                point::write_points(metric, &bag.data, &mut writer).map_err(|source| {
                    DumpError::Write {
                        path: path.display().to_string(),
                        source,
                    }
                })?;
            }
        }
        writer.flush().map_err(|source| DumpError::Write {
            path: path.display().to_string(),
            source,
        })?;

        tracing::info!(points = size, path = %path.display(), "cache dump finished");
        Ok(path)
    }

    /// Replays every dump file under `dir` through the normal add path.
    ///
    /// Candidate files have at least three dot-separated name parts and a
    /// `cache` or `input` prefix; anything else is ignored. Files replay
    /// in lexicographic order of the key `"<nanos>_<rank>:<filename>"`,
    /// rank 1 for `cache` and 2 for `input`, so cache dumps come before
    /// receiver spool files from the same shutdown. A missing directory
    /// is a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError`] if the directory cannot be listed or any
    /// file fails as described by [`Cache::restore_file`].
    pub fn restore(&self, dir: &Path) -> Result<RestoreSummary> {
        let started = Instant::now();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(dir = %dir.display(), "restore directory does not exist, nothing to restore");
                return Ok(RestoreSummary::default());
            }
            Err(source) => {
                return Err(RestoreError::ListDir {
                    path: dir.display().to_string(),
                    source,
                }
                .into());
            }
        };

        let mut keyed: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| RestoreError::ListDir {
                path: dir.display().to_string(),
                source,
            })?;
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            let parts: Vec<&str> = name.split('.').collect();
            if parts.len() < 3 {
                continue;
            }
            let rank = match parts[0] {
                "cache" => "1",
                "input" => "2",
                _ => continue,
            };
            keyed.push(format!("{}_{}:{}", parts[2], rank, name));
        }

        if keyed.is_empty() {
            tracing::info!(dir = %dir.display(), "nothing to restore");
            return Ok(RestoreSummary::default());
        }
        keyed.sort();

        let mut summary = RestoreSummary::default();
        for key in keyed {
            let Some((_, name)) = key.split_once(':') else {
                continue;
            };
            let sub = self.restore_file(&dir.join(name))?;
            summary.files += sub.files;
            summary.points += sub.points;
            summary.skipped_lines += sub.skipped_lines;
        }

        tracing::info!(
            files = summary.files,
            points = summary.points,
            skipped = summary.skipped_lines,
            elapsed = ?started.elapsed(),
            "restore finished"
        );
        Ok(summary)
    }

    /// Replays one dump file through the normal add path, then deletes it.
    ///
    /// Lines that fail to parse are skipped and counted; restored points
    /// go through ordering and expiry like live traffic. A read error or
    /// an unfinished final line (no trailing newline) aborts the replay
    /// and leaves the file in place. A delete failure after a successful
    /// replay is fatal: the file would be ingested a second time on the
    /// next start.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError`] on open, read, unfinished-line or delete
    /// failures.
    pub fn restore_file(&self, path: &Path) -> Result<RestoreSummary> {
        let started = Instant::now();
        tracing::info!(path = %path.display(), "restoring dump file");

        let file = File::open(path).map_err(|source| RestoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let mut reader = BufReader::with_capacity(IO_BUF_SIZE, file);

        let mut summary = RestoreSummary::default();
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|source| RestoreError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
            if read == 0 {
                break;
            }
            if line.last() != Some(&b'\n') {
                return Err(RestoreError::UnfinishedLine {
                    path: path.display().to_string(),
                }
                .into());
            }

            match std::str::from_utf8(&line) {
                Ok(text) => match text.parse::<MetricPoint>() {
                    Ok(p) => {
                        summary.points += 1;
                        self.add(p);
                    }
                    Err(_) => summary.skipped_lines += 1,
                },
                Err(_) => summary.skipped_lines += 1,
            }
        }
        summary.files = 1;

        fs::remove_file(path).map_err(|source| RestoreError::RemoveFile {
            path: path.display().to_string(),
            source,
        })?;

        tracing::info!(
            points = summary.points,
            skipped = summary.skipped_lines,
            elapsed = ?started.elapsed(),
            path = %path.display(),
            "dump file restored"
        );
        Ok(summary)
    }
}
