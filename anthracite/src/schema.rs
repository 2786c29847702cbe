//! Retention schema rules loaded from `storage-schemas.conf`.
//!
//! Each `[section]` of the file declares a regular expression and a list
//! of retention tiers; the first rule whose pattern matches a metric name
//! decides how that metric is stored downstream. Rules are consulted in
//! priority order, with file order breaking ties.

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::conf;
use crate::error::{Result, SchemaError};

/// One retention tier: how densely points are kept and for how many slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    /// Seconds covered by one stored point.
    pub seconds_per_point: u32,
    /// Number of points kept at this density.
    pub points: u32,
}

impl Retention {
    /// Total time span covered by this tier, in seconds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use anthracite::Retention;
    ///
    /// let tier = Retention { seconds_per_point: 60, points: 1440 };
    /// assert_eq!(tier.retention_secs(), 86_400);
    /// ```
    pub fn retention_secs(&self) -> u64 {
        u64::from(self.seconds_per_point) * u64::from(self.points)
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seconds_per_point, self.points)
    }
}

/// Parses one time span such as `60`, `1m` or `30d` into seconds.
///
/// A bare number is already seconds. Otherwise the last character is a
/// case-insensitive unit: s, m, h, d, w or y.
fn parse_span(part: &str) -> std::result::Result<u64, String> {
    if let Ok(seconds) = part.parse::<u64>() {
        return Ok(seconds);
    }

    let mut chars = part.chars();
    let unit = chars
        .next_back()
        .ok_or_else(|| "empty retention part".to_string())?;
    let number = chars.as_str();

    let multiplier: u64 = match unit.to_ascii_lowercase() {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        'w' => 604_800,
        'y' => 31_536_000,
        _ => return Err(format!("unknown time unit '{unit}'")),
    };
    let number: u64 = number
        .parse()
        .map_err(|_| format!("bad number '{number}'"))?;
    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("span '{part}' too large"))
}

/// Parses one `precision:span` retention definition.
///
/// The old Graphite form with two bare integers is tried first and reads
/// as seconds-per-point and point count (`60:1440`). Anything else reads
/// both sides as time spans and derives the point count from their ratio,
/// so `1m:30d` keeps 43200 one-minute points. Note that in the span form
/// a bare right-hand number is seconds, not a point count: `1m:1440` is
/// 24 points of one minute each.
fn parse_retention(def: &str) -> std::result::Result<Retention, String> {
    let (raw_precision, raw_span) = def
        .split_once(':')
        .ok_or_else(|| format!("missing ':' in '{def}'"))?;
    let raw_precision = raw_precision.trim();
    let raw_span = raw_span.trim();

    if let (Ok(seconds_per_point), Ok(points)) =
        (raw_precision.parse::<u32>(), raw_span.parse::<u32>())
    {
        if seconds_per_point == 0 {
            return Err(format!("zero seconds per point in '{def}'"));
        }
        if points == 0 {
            return Err(format!("zero points in '{def}'"));
        }
        return Ok(Retention {
            seconds_per_point,
            points,
        });
    }

    let precision = parse_span(raw_precision)?;
    let span = parse_span(raw_span)?;
    if precision == 0 {
        return Err(format!("zero seconds per point in '{def}'"));
    }
    let points = span / precision;
    if points == 0 {
        return Err(format!("span shorter than one point in '{def}'"));
    }

    let seconds_per_point =
        u32::try_from(precision).map_err(|_| format!("precision too large in '{def}'"))?;
    let points = u32::try_from(points).map_err(|_| format!("too many points in '{def}'"))?;
    Ok(Retention {
        seconds_per_point,
        points,
    })
}

/// Parses a comma-separated retention list such as `60s:1d,5m:30d`.
fn parse_retentions(defs: &str) -> std::result::Result<Vec<Retention>, String> {
    let mut retentions = Vec::new();
    for def in defs.split(',') {
        let def = def.trim();
        if def.is_empty() {
            return Err("empty retention definition".to_string());
        }
        retentions.push(parse_retention(def)?);
    }
    Ok(retentions)
}

/// One loaded schema rule.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Section name from the conf file.
    pub name: String,
    /// Raw regular expression the rule was declared with.
    pub pattern: String,
    /// Retention tiers in declaration order.
    pub retentions: Vec<Retention>,
    /// Declared priority; higher wins, defaulting to 0.
    pub priority: i64,
    regex: Regex,
    /// Sort key: declared priority shifted left 32 bits, minus the file
    /// order index. Later declarations always rank below earlier ones at
    /// the same declared priority.
    rank: i64,
}

impl Schema {
    /// Whether this rule's pattern matches the metric name.
    pub fn matches(&self, metric: &str) -> bool {
        self.regex.is_match(metric)
    }
}

/// All schema rules of one `storage-schemas.conf`, ordered for matching.
#[derive(Debug, Clone, Default)]
pub struct StorageSchemas {
    rules: Vec<Schema>,
}

impl StorageSchemas {
    /// Loads and orders the rules from the file at `path`.
    ///
    /// Sections whose name is empty or starts with `#` are skipped.
    /// `pattern` and `retentions` are required in every kept section;
    /// `priority` is optional and defaults to 0.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the file cannot be read or any kept
    /// section has a missing or empty pattern, an invalid regular
    /// expression, unparsable retentions, or a non-integer priority.
    pub fn load(path: &Path) -> Result<Self> {
        let sections = conf::read_sections(path).map_err(|source| SchemaError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut rules = Vec::with_capacity(sections.len());
        for (index, section) in sections.iter().enumerate() {
            if section.name.is_empty() || section.name.starts_with('#') {
                continue;
            }

            let pattern = section.value_of("pattern").unwrap_or("");
            if pattern.is_empty() {
                return Err(SchemaError::EmptyPattern {
                    section: section.name.clone(),
                }
                .into());
            }
            let regex = Regex::new(pattern).map_err(|source| SchemaError::BadPattern {
                section: section.name.clone(),
                pattern: pattern.to_string(),
                source,
            })?;

            let raw_retentions =
                section
                    .value_of("retentions")
                    .ok_or_else(|| SchemaError::BadRetentions {
                        section: section.name.clone(),
                        retentions: String::new(),
                        reason: "missing retentions key".to_string(),
                    })?;
            let retentions =
                parse_retentions(raw_retentions).map_err(|reason| SchemaError::BadRetentions {
                    section: section.name.clone(),
                    retentions: raw_retentions.to_string(),
                    reason,
                })?;

            let priority: i64 = match section.value_of("priority") {
                Some(raw) => raw.parse().map_err(|source| SchemaError::BadPriority {
                    section: section.name.clone(),
                    priority: raw.to_string(),
                    source,
                })?,
                None => 0,
            };

            rules.push(Schema {
                name: section.name.clone(),
                pattern: pattern.to_string(),
                retentions,
                priority,
                regex,
                rank: (priority << 32) - index as i64,
            });
        }

        rules.sort_by(|a, b| b.rank.cmp(&a.rank));
        Ok(Self { rules })
    }

    /// The highest-ranked rule whose pattern matches `metric`, if any.
    pub fn match_metric(&self, metric: &str) -> Option<&Schema> {
        self.rules.iter().find(|rule| rule.matches(metric))
    }

    /// The rules in matching order.
    pub fn rules(&self) -> &[Schema] {
        &self.rules
    }

    /// Number of loaded rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules were loaded.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::error::AnthraciteError;

    fn write_conf(dir: &tempfile::TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("storage-schemas.conf");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_parse_retention_old_format() {
        let r = parse_retention("60:1440").unwrap();
        assert_eq!(r.seconds_per_point, 60);
        assert_eq!(r.points, 1440);
        assert_eq!(r.retention_secs(), 86_400);
    }

    #[test]
    fn test_parse_retention_suffixed() {
        let r = parse_retention("1m:30d").unwrap();
        assert_eq!(r.seconds_per_point, 60);
        assert_eq!(r.points, 43_200);

        let r = parse_retention("1s:7d").unwrap();
        assert_eq!(r.seconds_per_point, 1);
        assert_eq!(r.points, 604_800);

        let r = parse_retention("1H:1Y").unwrap();
        assert_eq!(r.seconds_per_point, 3_600);
        assert_eq!(r.points, 8_760);
    }

    #[test]
    fn test_parse_retention_bare_span_is_seconds() {
        // In span form the right side is seconds, not a point count.
        let r = parse_retention("1m:1440").unwrap();
        assert_eq!(r.seconds_per_point, 60);
        assert_eq!(r.points, 24);
    }

    #[test]
    fn test_parse_retention_rejects_invalid() {
        assert!(parse_retention("60").is_err());
        assert!(parse_retention("0:100").is_err());
        assert!(parse_retention("60:0").is_err());
        assert!(parse_retention("1x:30d").is_err());
        assert!(parse_retention("1m:0d").is_err());
        // Span shorter than one point.
        assert!(parse_retention("1h:30m").is_err());
        assert!(parse_retention("").is_err());
    }

    #[test]
    fn test_parse_retentions_list() {
        let tiers = parse_retentions("60s:1d, 5m:30d").unwrap();
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[0].seconds_per_point, 60);
        assert_eq!(tiers[1].seconds_per_point, 300);
        assert!(parse_retentions("60s:1d,,5m:30d").is_err());
    }

    #[test]
    fn test_retention_display() {
        let r = Retention {
            seconds_per_point: 60,
            points: 1440,
        };
        assert_eq!(r.to_string(), "60:1440");
    }

    #[test]
    fn test_load_orders_by_priority() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_conf(
            &dir,
            "\
[catchall]
pattern = .*
retentions = 300s:30d

[system]
pattern = ^sys\\.
retentions = 60s:1d
priority = 10
",
        );
        let schemas = StorageSchemas::load(&path).unwrap();
        assert_eq!(schemas.len(), 2);
        // Despite declaration order, the priority-10 rule matches first.
        assert_eq!(schemas.match_metric("sys.cpu.idle").unwrap().name, "system");
        assert_eq!(schemas.match_metric("app.requests").unwrap().name, "catchall");
    }

    #[test]
    fn test_file_order_breaks_priority_ties() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_conf(
            &dir,
            "\
[first]
pattern = .*
retentions = 60s:1d

[second]
pattern = .*
retentions = 300s:30d
",
        );
        let schemas = StorageSchemas::load(&path).unwrap();
        assert_eq!(schemas.match_metric("anything").unwrap().name, "first");
    }

    #[test]
    fn test_match_metric_none_without_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_conf(&dir, "[only]\npattern = ^only\\.\nretentions = 60s:1d\n");
        let schemas = StorageSchemas::load(&path).unwrap();
        assert!(schemas.match_metric("other.metric").is_none());
    }

    #[test]
    fn test_load_skips_commented_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_conf(
            &dir,
            "\
[#disabled]
pattern = ^old\\.
retentions = 60s:1d

[live]
pattern = .*
retentions = 60s:1d
",
        );
        let schemas = StorageSchemas::load(&path).unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas.rules()[0].name, "live");
    }

    #[test]
    fn test_load_rejects_missing_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_conf(&dir, "[bad]\nretentions = 60s:1d\n");
        let err = StorageSchemas::load(&path).unwrap_err();
        assert!(matches!(
            err,
            AnthraciteError::Schema(SchemaError::EmptyPattern { .. })
        ));
    }

    #[test]
    fn test_load_rejects_bad_regex() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_conf(&dir, "[bad]\npattern = (\nretentions = 60s:1d\n");
        let err = StorageSchemas::load(&path).unwrap_err();
        assert!(matches!(
            err,
            AnthraciteError::Schema(SchemaError::BadPattern { .. })
        ));
    }

    #[test]
    fn test_load_rejects_bad_retentions_and_priority() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_conf(&dir, "[bad]\npattern = .*\nretentions = nope\n");
        assert!(matches!(
            StorageSchemas::load(&path).unwrap_err(),
            AnthraciteError::Schema(SchemaError::BadRetentions { .. })
        ));

        let path = write_conf(
            &dir,
            "[bad]\npattern = .*\nretentions = 60s:1d\npriority = high\n",
        );
        assert!(matches!(
            StorageSchemas::load(&path).unwrap_err(),
            AnthraciteError::Schema(SchemaError::BadPriority { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StorageSchemas::load(&dir.path().join("absent.conf")).unwrap_err();
        assert!(matches!(
            err,
            AnthraciteError::Schema(SchemaError::Read { .. })
        ));
    }
}
