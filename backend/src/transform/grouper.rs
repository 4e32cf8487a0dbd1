//! Group flat document rows into one group per document.
//!
//! Invoice exports carry one row per line item, repeating the header columns on every
//! row. This module gathers the rows of each document under its group key.
//!
//! # Architecture
//!
//! ```text
//! CSV Input (flat rows)            →  Groups (input order)
//! ┌──────────────────────────┐       ┌──────────────────────────┐
//! │ externalId: ext-1, line 1│       │ ext-1: [line 1]          │
//! │ externalId: ext-2, line 1│  →    ├──────────────────────────┤
//! │ externalId: ext-2, line 2│       │ ext-2: [line 1, line 2]  │
//! └──────────────────────────┘       └──────────────────────────┘
//! ```
//!
//! Group order follows the first occurrence of each key; rows inside a group keep
//! input order, since it is the natural line sequence of the document.

use std::collections::HashMap;

use crate::error::{ValidationError, ValidationResult};
use crate::models::{Row, RowGroup};
use crate::transform::resolve::resolve_opt;

/// Partition rows into ordered groups by the first alias that resolves.
///
/// Fails on the first row without a group key; no partial grouping is returned.
pub fn group_by<S: AsRef<str>>(rows: &[Row], key_aliases: &[S]) -> ValidationResult<Vec<RowGroup>> {
    let mut groups: Vec<RowGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (idx, row) in rows.iter().enumerate() {
        let key = resolve_opt(row, key_aliases).ok_or_else(|| ValidationError::MissingGroupKey {
            row: idx + 1,
            aliases: key_aliases.iter().map(|a| a.as_ref().to_string()).collect(),
        })?;

        match positions.get(key) {
            Some(&pos) => groups[pos].push(row.clone()),
            None => {
                positions.insert(key.to_string(), groups.len());
                groups.push(RowGroup::new(key, row.clone()));
            }
        }
    }

    Ok(groups)
}
