//! Aggregation policy rules loaded from `storage-aggregation.conf`.
//!
//! Each `[section]` names a regular expression, an `xFilesFactor` and an
//! `aggregationMethod`; the first rule matching a metric name decides how
//! its points are rolled up into coarser retention tiers. A built-in
//! default (average, factor 0.5) answers when no rule matches, so policy
//! lookup always succeeds.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;

use crate::conf;
use crate::error::{AggregationError, Result};

/// How multiple points of a finer tier combine into one coarser point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMethod {
    /// Arithmetic mean of all finite values.
    Average,
    /// Sum of all finite values.
    Sum,
    /// Most recent (last) finite value.
    Last,
    /// Maximum of all finite values.
    Max,
    /// Minimum of all finite values.
    Min,
}

impl AggregationMethod {
    /// Applies this method to a slice of values.
    ///
    /// Non-finite values are filtered out first. If nothing finite
    /// remains, returns NaN.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use anthracite::AggregationMethod;
    ///
    /// let values = [1.0, 2.0, f64::NAN, 4.0];
    /// assert_eq!(AggregationMethod::Sum.apply(&values), 7.0);
    /// assert_eq!(AggregationMethod::Last.apply(&values), 4.0);
    /// assert!(AggregationMethod::Max.apply(&[]).is_nan());
    /// ```
    #[allow(clippy::cast_precision_loss)] // Acceptable for aggregation operations
    pub fn apply(self, values: &[f64]) -> f64 {
        let valid: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

        if valid.is_empty() {
            return f64::NAN;
        }

        match self {
            Self::Average => {
                let sum: f64 = valid.iter().sum();
                sum / valid.len() as f64
            }
            Self::Sum => valid.iter().sum(),
            Self::Last => *valid.last().unwrap(), // Safe because we checked non-empty
            Self::Max => valid.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v)),
            Self::Min => valid.iter().fold(f64::INFINITY, |acc, &v| acc.min(v)),
        }
    }
}

impl FromStr for AggregationMethod {
    type Err = AggregationError;

    fn from_str(s: &str) -> std::result::Result<Self, AggregationError> {
        match s {
            "average" | "avg" => Ok(Self::Average),
            "sum" => Ok(Self::Sum),
            "last" => Ok(Self::Last),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            _ => Err(AggregationError::UnknownMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Average => "average",
            Self::Sum => "sum",
            Self::Last => "last",
            Self::Max => "max",
            Self::Min => "min",
        };
        f.write_str(name)
    }
}

/// One loaded aggregation rule.
#[derive(Debug, Clone)]
pub struct AggregationItem {
    /// Section name from the conf file.
    pub name: String,
    /// Raw regular expression the rule was declared with. Empty when the
    /// section had no `pattern` key, in which case the rule matches every
    /// metric.
    pub pattern: String,
    /// Fraction of known points a rollup window needs to produce a value.
    pub x_files_factor: f64,
    /// The rollup method.
    pub method: AggregationMethod,
    /// None only on the built-in default, which matches unconditionally.
    regex: Option<Regex>,
}

impl AggregationItem {
    /// Whether this rule applies to the metric name.
    pub fn matches(&self, metric: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(metric),
            None => true,
        }
    }
}

/// All aggregation rules of one `storage-aggregation.conf`.
#[derive(Debug, Clone)]
pub struct StorageAggregation {
    items: Vec<AggregationItem>,
    default: AggregationItem,
}

impl Default for StorageAggregation {
    /// No loaded rules; every metric gets the built-in default policy.
    fn default() -> Self {
        Self {
            items: Vec::new(),
            default: AggregationItem {
                name: "default".to_string(),
                pattern: String::new(),
                x_files_factor: 0.5,
                method: AggregationMethod::Average,
                regex: None,
            },
        }
    }
}

impl StorageAggregation {
    /// Loads the rules from the file at `path`, keeping file order.
    ///
    /// Sections whose name is empty or starts with `#` are skipped. A
    /// missing `pattern` key compiles to an empty expression and matches
    /// everything; `xFilesFactor` and `aggregationMethod` are required.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationError`] if the file cannot be read or any
    /// kept section has an invalid pattern, a non-numeric `xFilesFactor`,
    /// or an unknown `aggregationMethod`.
    pub fn load(path: &Path) -> Result<Self> {
        let sections = conf::read_sections(path).map_err(|source| AggregationError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut loaded = Self::default();
        for section in &sections {
            if section.name.is_empty() || section.name.starts_with('#') {
                continue;
            }

            let pattern = section.value_of("pattern").unwrap_or("");
            let regex = Regex::new(pattern).map_err(|source| AggregationError::BadPattern {
                section: section.name.clone(),
                pattern: pattern.to_string(),
                source,
            })?;

            let raw_factor = section.value_of("xFilesFactor").unwrap_or("");
            let x_files_factor: f64 =
                raw_factor
                    .parse()
                    .map_err(|source| AggregationError::BadXFilesFactor {
                        section: section.name.clone(),
                        value: raw_factor.to_string(),
                        source,
                    })?;

            let method: AggregationMethod =
                section.value_of("aggregationMethod").unwrap_or("").parse()?;

            loaded.items.push(AggregationItem {
                name: section.name.clone(),
                pattern: pattern.to_string(),
                x_files_factor,
                method,
                regex: Some(regex),
            });
        }

        Ok(loaded)
    }

    /// The first rule in file order that matches `metric`, or the
    /// built-in default. Policy lookup never fails.
    pub fn match_metric(&self, metric: &str) -> &AggregationItem {
        self.items
            .iter()
            .find(|item| item.matches(metric))
            .unwrap_or(&self.default)
    }

    /// The loaded rules in file order, without the built-in default.
    pub fn items(&self) -> &[AggregationItem] {
        &self.items
    }

    /// The built-in fallback rule.
    pub fn default_item(&self) -> &AggregationItem {
        &self.default
    }
}
