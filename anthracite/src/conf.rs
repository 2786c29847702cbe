//! Minimal reader for Graphite-style `.conf` files (INI sections).
//!
//! Both `storage-schemas.conf` and `storage-aggregation.conf` use the
//! same shape: `[section]` headers followed by `key = value` lines, with
//! `#` or `;` comments. Only what those two loaders need is implemented.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// One `[name]` section with its key/value entries in file order.
#[derive(Debug, Clone)]
pub(crate) struct Section {
    pub(crate) name: String,
    pub(crate) entries: Vec<(String, String)>,
}

impl Section {
    /// Value of the first entry named `key`, if present.
    pub(crate) fn value_of(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Reads every section of the file at `path`, in file order.
pub(crate) fn read_sections(path: &Path) -> io::Result<Vec<Section>> {
    let file = File::open(path)?;
    parse_sections(BufReader::new(file))
}

/// Parses INI sections from `reader`.
///
/// Blank lines and `#`/`;` comment lines are skipped. Entries before the
/// first section header are ignored. Entry lines without `=` are ignored.
fn parse_sections<R: BufRead>(reader: R) -> io::Result<Vec<Section>> {
    let mut sections: Vec<Section> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            sections.push(Section {
                name: header.trim().to_string(),
                entries: Vec::new(),
            });
            continue;
        }

        if let (Some(section), Some((key, value))) = (sections.last_mut(), line.split_once('=')) {
            section
                .entries
                .push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_sections_in_order() {
        let text = "\
[first]
pattern = ^a\\.
retentions = 60s:1d

[second]
pattern = .*
retentions = 300s:30d
";
        let sections = parse_sections(text.as_bytes()).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "first");
        assert_eq!(sections[0].value_of("pattern"), Some("^a\\."));
        assert_eq!(sections[1].name, "second");
        assert_eq!(sections[1].value_of("retentions"), Some("300s:30d"));
    }

    #[test]
    fn test_skips_comments_and_blank_lines() {
        let text = "\
# leading comment
; alternative comment

[only]
# inside a section
key = value
";
        let sections = parse_sections(text.as_bytes()).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].value_of("key"), Some("value"));
    }

    #[test]
    fn test_ignores_entries_before_first_section() {
        let text = "stray = line\n[s]\nkey = v\n";
        let sections = parse_sections(text.as_bytes()).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].entries.len(), 1);
    }

    #[test]
    fn test_value_keeps_embedded_equals() {
        let text = "[s]\npattern = ^x=y$\n";
        let sections = parse_sections(text.as_bytes()).unwrap();
        assert_eq!(sections[0].value_of("pattern"), Some("^x=y$"));
    }

    #[test]
    fn test_missing_key_is_none() {
        let text = "[s]\nkey = v\n";
        let sections = parse_sections(text.as_bytes()).unwrap();
        assert_eq!(sections[0].value_of("absent"), None);
    }
}
