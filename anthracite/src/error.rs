//! Error types for the anthracite cache engine.

use thiserror::Error;

/// The main error type for all anthracite operations.
///
/// This enum covers all error conditions that can occur across the engine,
/// from configuration loading to dump/restore I/O. Each area has its own
/// sub-enum so callers can match on the class of failure.
#[derive(Error, Debug)]
pub enum AnthraciteError {
    /// Error loading or validating daemon configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error parsing a point line.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error loading the retention schema rules.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Error loading the aggregation rules.
    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// Error while dumping the cache to disk.
    #[error("dump error: {0}")]
    Dump(#[from] DumpError),

    /// Error while restoring dump files into the cache.
    #[error("restore error: {0}")]
    Restore(#[from] RestoreError),
}

/// Errors that can occur when loading daemon configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// The path that could not be read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML.
    #[error("failed to parse config file '{path}': {source}")]
    Toml {
        /// The path that failed to parse.
        path: String,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The configured write strategy name is not recognized.
    #[error("unknown write strategy '{name}', should be one of: max, sort")]
    UnknownWriteStrategy {
        /// The unrecognized strategy name.
        name: String,
    },
}

/// Errors that can occur when parsing a point line.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The line does not hold exactly `<metric> <value> <timestamp>`,
    /// or a numeric field failed to parse or was NaN.
    #[error("bad message: {line:?}")]
    BadLine {
        /// The offending line, as received.
        line: String,
    },
}

/// Errors that can occur when loading `storage-schemas.conf`.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The schema file could not be read.
    #[error("failed to read schema file '{path}': {source}")]
    Read {
        /// The path that could not be read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A section is missing its `pattern` key (or it is empty).
    #[error("empty pattern for [{section}]")]
    EmptyPattern {
        /// The section with the missing pattern.
        section: String,
    },

    /// A section's `pattern` is not a valid regular expression.
    #[error("failed to parse pattern {pattern:?} for [{section}]: {source}")]
    BadPattern {
        /// The section holding the pattern.
        section: String,
        /// The pattern text that failed to compile.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// A section's `retentions` schedule could not be parsed.
    #[error("failed to parse retentions {retentions:?} for [{section}]: {reason}")]
    BadRetentions {
        /// The section holding the schedule.
        section: String,
        /// The schedule text that failed to parse.
        retentions: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A section's `priority` is not an integer.
    #[error("failed to parse priority {priority:?} for [{section}]: {source}")]
    BadPriority {
        /// The section holding the priority.
        section: String,
        /// The priority text that failed to parse.
        priority: String,
        /// The underlying integer parse error.
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Errors that can occur when loading `storage-aggregation.conf`.
#[derive(Error, Debug)]
pub enum AggregationError {
    /// The aggregation file could not be read.
    #[error("failed to read aggregation file '{path}': {source}")]
    Read {
        /// The path that could not be read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A section's `pattern` is not a valid regular expression.
    #[error("failed to parse pattern {pattern:?} for [{section}]: {source}")]
    BadPattern {
        /// The section holding the pattern.
        section: String,
        /// The pattern text that failed to compile.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// A section's `xFilesFactor` is missing or not a float.
    #[error("failed to parse xFilesFactor {value:?} in {section}: {source}")]
    BadXFilesFactor {
        /// The section holding the factor.
        section: String,
        /// The factor text that failed to parse.
        value: String,
        /// The underlying float parse error.
        #[source]
        source: std::num::ParseFloatError,
    },

    /// An `aggregationMethod` value is not one of the known methods.
    #[error("unknown aggregation method '{method}'")]
    UnknownMethod {
        /// The unrecognized method name.
        method: String,
    },
}

/// Errors that can occur while dumping the cache to disk.
#[derive(Error, Debug)]
pub enum DumpError {
    /// The dump file could not be created.
    #[error("failed to create dump file '{path}': {source}")]
    Create {
        /// The dump file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing or flushing the dump file failed.
    #[error("failed to write dump file '{path}': {source}")]
    Write {
        /// The dump file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while restoring dump files into the cache.
#[derive(Error, Debug)]
pub enum RestoreError {
    /// The dump directory could not be listed.
    #[error("failed to list dump dir '{path}': {source}")]
    ListDir {
        /// The directory path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A dump file could not be opened.
    #[error("failed to open dump file '{path}': {source}")]
    Open {
        /// The dump file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading from a dump file failed mid-replay.
    #[error("failed to read dump file '{path}': {source}")]
    Read {
        /// The dump file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The last line of a dump file has no trailing newline.
    #[error("unfinished line in file '{path}'")]
    UnfinishedLine {
        /// The dump file path.
        path: String,
    },

    /// A fully replayed dump file could not be deleted. Leaving it in
    /// place would double-ingest its points on the next restart, so the
    /// caller must treat this as fatal.
    #[error("failed to remove replayed dump file '{path}': {source}")]
    RemoveFile {
        /// The dump file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for `Result<T, AnthraciteError>`.
pub type Result<T> = std::result::Result<T, AnthraciteError>;
