//! Multi-value identifier extraction.
//!
//! Exports spread identifiers of one kind (tax numbers, VAT ids) over ad hoc columns:
//! `STCD1`, `STCD2`, a `tax_id` column holding `"A; B"`, or nothing at all. This module
//! collects them into one ordered, deduplicated list.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConfigError, ConfigResult};
use crate::models::{normalize_column, Row};

/// Delimiters between several identifiers in one cell.
static SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;|\s]+").expect("static pattern"));

/// Compiled column-name patterns for one identifier kind.
///
/// Each pattern must match the *whole* lower-cased column name.
#[derive(Debug, Clone)]
pub struct IdPatterns {
    patterns: Vec<Regex>,
}

impl IdPatterns {
    /// Compile column-name patterns. Fails on the first invalid expression.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> ConfigResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(&format!("^(?:{p})$")).map_err(|source| ConfigError::InvalidPattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether a column name matches any pattern.
    pub fn matches(&self, column: &str) -> bool {
        let name = normalize_column(column);
        self.patterns.iter().any(|re| re.is_match(&name))
    }
}

/// Split one cell into identifier tokens.
pub fn split_multi(value: &str) -> impl Iterator<Item = &str> {
    SPLIT_RE.split(value).filter(|t| !t.is_empty())
}

/// Collect identifiers from every matching column of a row.
///
/// Columns are visited in row order; duplicates are dropped, first occurrence wins.
pub fn collect(row: &Row, patterns: &IdPatterns) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for (column, value) in row.iter() {
        if !patterns.matches(column) {
            continue;
        }
        for token in split_multi(value) {
            if !out.iter().any(|seen| seen == token) {
                out.push(token.to_string());
            }
        }
    }

    out
}
