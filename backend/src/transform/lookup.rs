//! Flat row payloads: lookup-table entries and delete-by-id lists.
//!
//! These tables need no mapping; every non-empty cell is forwarded as a string.

use serde_json::{Map, Value};

use crate::models::{is_blank, normalize_column, Row};

/// Columns a lookup-table upload is expected to carry.
pub const RECOMMENDED_COLUMNS: &[&str] = &["externalId", "key", "description"];

/// Id column names accepted for deletion lists, in priority order.
const ID_COLUMNS: &[&str] = &["externalid", "externalids", "external_id", "external_ids", "id", "ids"];

/// Values exported by spreadsheet tools for an empty cell.
const NULL_MARKERS: &[&str] = &["nan", "None", "NULL", "null"];

/// One row as a flat string payload. Empty and `nan` cells are dropped.
pub fn row_payload(row: &Row) -> Value {
    let fields: Map<String, Value> = row
        .iter()
        .filter(|(_, value)| !is_blank(value))
        .map(|(column, value)| (column.to_string(), Value::String(value.trim().to_string())))
        .collect();
    Value::Object(fields)
}

/// Normalize a lookup-table type name: lowercase, spaces to `_`, only `[a-z0-9_]`.
pub fn slugify_type(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Recommended columns absent from every row.
pub fn missing_recommended_columns(rows: &[Row]) -> Vec<&'static str> {
    RECOMMENDED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !rows.iter().any(|row| row.contains(column)))
        .collect()
}

/// External ids listed in a deletion table.
///
/// The id column is the first of `externalId`, `externalIds`, `external_id`,
/// `external_ids`, `id`, `ids` present (any case). Values are trimmed; empty cells and
/// null markers are dropped; duplicates keep their first position.
pub fn collect_external_ids(rows: &[Row]) -> Vec<String> {
    let Some(column) = ID_COLUMNS
        .iter()
        .find(|wanted| {
            rows.iter()
                .any(|row| row.columns().any(|c| normalize_column(c) == **wanted))
        })
        .copied()
    else {
        return Vec::new();
    };

    let mut ids: Vec<String> = Vec::new();
    for row in rows {
        let Some(value) = row.get(column).map(str::trim) else {
            continue;
        };
        if value.is_empty() || NULL_MARKERS.contains(&value) {
            continue;
        }
        if !ids.iter().any(|seen| seen == value) {
            ids.push(value.to_string());
        }
    }
    ids
}
