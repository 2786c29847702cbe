//! Daemon configuration, read from a TOML file.
//!
//! Only the `[cache]` section matters to this crate; missing keys fall
//! back to upstream defaults. The retention and aggregation rule files
//! (`storage-schemas.conf`, `storage-aggregation.conf`) are separate,
//! INI-style inputs handled by [`crate::schema`] and
//! [`crate::aggregation`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::flush::WriteStrategy;

/// Lower bound the `max-size` threshold is clamped to.
const MIN_MAX_SIZE: i64 = 1024 * 1024;

/// The `[cache]` section of the daemon config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheSection {
    /// Monitoring threshold for the cached point count. Values below
    /// 1 MiB are raised to it on load.
    pub max_size: i64,

    /// Flush ordering, `"max"` or `"sort"`. Unknown names fail at
    /// startup when parsed.
    pub write_strategy: String,

    /// Directory for dump/restore files.
    pub dump_path: String,

    /// Whether to restore on start and dump on stop.
    pub dump_enable: bool,

    /// Seconds between flush cycles.
    pub flush_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_size: 1_000_000,
            write_strategy: "max".to_string(),
            dump_path: String::new(),
            dump_enable: false,
            flush_interval_secs: 1,
        }
    }
}

impl CacheSection {
    /// Parses the configured write strategy name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownWriteStrategy`] for names other than
    /// `"max"` and `"sort"`.
    pub fn parse_write_strategy(&self) -> Result<WriteStrategy> {
        Ok(self.write_strategy.parse::<WriteStrategy>()?)
    }

    /// The flush tick period.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

/// Whole daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Cache and flush settings.
    pub cache: CacheSection,
}

impl EngineConfig {
    /// Reads and parses the TOML file at `path`, then normalizes it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is not valid
    /// TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })?;
        config.normalize();
        Ok(config)
    }

    /// Applies the upstream bounds. Note that the stock default of
    /// 1,000,000 sits below the 1 MiB floor, so a config that never
    /// mentions `max-size` still ends up at 1,048,576.
    pub fn normalize(&mut self) {
        if self.cache.max_size < MIN_MAX_SIZE {
            tracing::warn!(
                configured = self.cache.max_size,
                raised_to = MIN_MAX_SIZE,
                "cache max-size below minimum"
            );
            self.cache.max_size = MIN_MAX_SIZE;
        }
    }
}
