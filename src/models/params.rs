//! Origin/destination parameter sets

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::PostrunError;

/// Separators accepted by the bulk format, in detection order
const BULK_SEPARATORS: [char; 4] = [';', ',', '\t', '|'];

/// One origin/destination pair driving a pass over the collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub origin: String,
    pub destination: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ParameterSet {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self { origin: origin.into(), destination: destination.into(), enabled: true }
    }

    /// `origin-destination`, the grouping key of the sequence view
    pub fn key(&self) -> String {
        format!("{}-{}", self.origin, self.destination)
    }

    /// Parse `ORIGIN;DEST` (any bulk separator)
    pub fn parse_pair(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let separator = BULK_SEPARATORS.iter()
            .copied()
            .find(|sep| line.contains(*sep))
            .ok_or_else(|| "no separator found (use ; , tab or |)".to_string())?;

        let (origin, destination) = line.split_once(separator)
            .ok_or_else(|| "no separator found (use ; , tab or |)".to_string())?;
        let (origin, destination) = (origin.trim(), destination.trim());

        if !is_numeric(origin) || !is_numeric(destination) {
            return Err(format!("both values must be numeric, got '{}' and '{}'", origin, destination));
        }

        Ok(Self::new(origin, destination))
    }
}

/// Numeric string literal as a JavaScript `Number()` accepts it
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[+-]?(?:(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?|Infinity)|0[xX][0-9a-fA-F]+|0[oO][0-7]+|0[bB][01]+)$",
    )
    .expect("Invalid numeric regex")
});

/// Non-empty and numeric once trimmed
///
/// Rust-only float spellings (`inf`, `infinity`, `NaN`) are not numbers here.
pub fn is_numeric(value: &str) -> bool {
    NUMERIC_RE.is_match(value.trim())
}

/// A rejected line of bulk input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLine {
    /// 1-based line number
    pub line: usize,
    pub content: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BulkParse {
    pub valid: Vec<ParameterSet>,
    pub invalid: Vec<InvalidLine>,
}

/// Parse one pair per line, skipping blank lines
pub fn parse_bulk(input: &str) -> BulkParse {
    let mut result = BulkParse::default();

    for (idx, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match ParameterSet::parse_pair(line) {
            Ok(set) => result.valid.push(set),
            Err(reason) => result.invalid.push(InvalidLine {
                line: idx + 1,
                content: line.trim().to_string(),
                reason,
            }),
        }
    }

    result
}

/// Load a parameter file in the bulk format
pub fn load_params(path: &Path) -> Result<BulkParse, PostrunError> {
    let content = fs::read_to_string(path)
        .map_err(|e| PostrunError::Import(format!("{}: {}", path.display(), e)))?;
    Ok(parse_bulk(&content))
}

/// Ordered, editable list of parameter sets
///
/// The CLI fills one from `--params` and `--param` and switches sets off with
/// `--disable-param`; the other editing operations are library API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterList {
    sets: Vec<ParameterSet>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a set; non-numeric values are cleared
    pub fn add(&mut self, origin: &str, destination: &str) {
        let keep = |v: &str| if is_numeric(v) { v.trim().to_string() } else { String::new() };
        self.sets.push(ParameterSet::new(keep(origin), keep(destination)));
    }

    pub fn extend(&mut self, sets: impl IntoIterator<Item = ParameterSet>) {
        self.sets.extend(sets);
    }

    /// Replace origin and destination at `index`; returns false if out of range
    pub fn update(&mut self, index: usize, origin: &str, destination: &str) -> bool {
        match self.sets.get_mut(index) {
            Some(set) => {
                set.origin = origin.to_string();
                set.destination = destination.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<ParameterSet> {
        (index < self.sets.len()).then(|| self.sets.remove(index))
    }

    /// Flip `enabled` at `index`; returns the new value
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        let set = self.sets.get_mut(index)?;
        set.enabled = !set.enabled;
        Some(set.enabled)
    }

    pub fn toggle_all(&mut self, enabled: bool) {
        for set in &mut self.sets {
            set.enabled = enabled;
        }
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }

    pub fn all(&self) -> &[ParameterSet] {
        &self.sets
    }

    pub fn enabled(&self) -> Vec<ParameterSet> {
        self.sets.iter().filter(|s| s.enabled).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl FromIterator<ParameterSet> for ParameterList {
    fn from_iter<I: IntoIterator<Item = ParameterSet>>(iter: I) -> Self {
        Self { sets: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("3550308"));
        assert!(is_numeric(" 1.5 "));
        assert!(is_numeric("-2"));
        assert!(!is_numeric(""));
        assert!(!is_numeric("abc"));
        assert!(!is_numeric("NaN"));
    }

    #[test]
    fn test_is_numeric_rejects_rust_float_spellings() {
        for value in ["inf", "+inf", "-inf", "infinity", "Inf", "nan", "1_000", "."] {
            assert!(!is_numeric(value), "{} should not be numeric", value);
        }
        for value in ["1e3", ".5", "7.", "0x1F", "+12", "Infinity"] {
            assert!(is_numeric(value), "{} should be numeric", value);
        }
    }

    #[test]
    fn test_parse_bulk_separators() {
        let parsed = parse_bulk("1;2\n3,4\n5\t6\n7|8\n\n");
        assert_eq!(parsed.invalid, vec![]);
        assert_eq!(parsed.valid, vec![
            ParameterSet::new("1", "2"),
            ParameterSet::new("3", "4"),
            ParameterSet::new("5", "6"),
            ParameterSet::new("7", "8"),
        ]);
    }

    #[test]
    fn test_parse_bulk_reports_invalid_lines() {
        let parsed = parse_bulk("1;2\nfoo;3\n42\n");
        assert_eq!(parsed.valid.len(), 1);
        assert_eq!(parsed.invalid.len(), 2);
        assert_eq!(parsed.invalid[0].line, 2);
        assert!(parsed.invalid[0].reason.contains("numeric"));
        assert_eq!(parsed.invalid[1].content, "42");
    }

    #[test]
    fn test_first_separator_wins() {
        // `;` is checked before `,`, so "1,5;2" splits into "1,5" and "2"
        let parsed = ParameterSet::parse_pair("1,5;2");
        assert!(parsed.is_err());
        assert_eq!(ParameterSet::parse_pair("10 ; 20").unwrap(), ParameterSet::new("10", "20"));
    }

    #[test]
    fn test_list_operations() {
        let mut list = ParameterList::new();
        list.add("1", "2");
        list.add("x", "4");
        assert_eq!(list.all()[1].origin, "");
        assert_eq!(list.all()[1].destination, "4");

        assert!(list.update(1, "3", "4"));
        assert!(!list.update(9, "3", "4"));

        assert_eq!(list.toggle(0), Some(false));
        assert_eq!(list.enabled(), vec![ParameterSet::new("3", "4")]);

        list.toggle_all(true);
        assert_eq!(list.enabled().len(), 2);

        assert_eq!(list.remove(0).map(|s| s.origin), Some("1".to_string()));
        assert!(list.remove(5).is_none());

        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_key() {
        assert_eq!(ParameterSet::new("1", "2").key(), "1-2");
    }
}
