//! Foreign-key indexes over subordinate tables.
//!
//! A subordinate table is indexed once per batch; every primary record then looks up
//! its related rows. Unknown keys yield an empty slice: a left join, not an error.

use std::collections::HashMap;

use crate::models::Row;
use crate::transform::dsl::schema::AliasSet;
use crate::transform::resolve::resolve_opt;

/// Resolved join key: one part for a plain foreign key, several for a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinKey(Vec<String>);

impl JoinKey {
    /// Single-part key.
    pub fn single(value: impl Into<String>) -> Self {
        Self(vec![value.into()])
    }

    /// Resolve every part from a row. `None` unless all parts are non-empty.
    pub fn from_row(row: &Row, parts: &[AliasSet]) -> Option<Self> {
        if parts.is_empty() {
            return None;
        }
        parts
            .iter()
            .map(|aliases| resolve_opt(row, aliases.as_slice()).map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Parts concatenated without separator (used for derived external ids).
    pub fn concat(&self) -> String {
        self.0.concat()
    }
}

/// Rows of one table bucketed by join key, in table order.
#[derive(Debug, Clone, Default)]
pub struct ForeignIndex<'a> {
    buckets: HashMap<JoinKey, Vec<&'a Row>>,
    skipped: usize,
}

impl<'a> ForeignIndex<'a> {
    /// Index a table. Rows missing any key part are skipped.
    pub fn build(table: &'a [Row], key: &[AliasSet]) -> Self {
        let mut index = Self::default();
        for row in table {
            match JoinKey::from_row(row, key) {
                Some(k) => index.buckets.entry(k).or_default().push(row),
                None => index.skipped += 1,
            }
        }
        index
    }

    /// Related rows for a key; empty when the key is unknown.
    pub fn lookup(&self, key: &JoinKey) -> &[&'a Row] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Convenience lookup for single-part keys.
    pub fn lookup_one(&self, value: &str) -> &[&'a Row] {
        self.lookup(&JoinKey::single(value))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Rows that could not be indexed because a key part was empty.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
