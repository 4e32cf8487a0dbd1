//! Value operations applied to a resolved cell.
//!
//! Every operation takes the current value and returns the next one, or `None` when
//! the value cannot be converted. `None` makes the field absent: a malformed amount or
//! embedded JSON never becomes a placeholder in the payload.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transform::amount::{parse_decimal, to_json_number};

/// Input date layouts, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d", "%d/%m/%Y"];

/// All available operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// `true` when the value is one of `true_values` (case-insensitive), else `false`
    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Exact decimal parse, emitted as a JSON number
    ToNumber,

    /// Reformat a date as `YYYY-MM-DD`; unknown layouts pass through unchanged
    NormalizeDate,

    /// Parse the cell as embedded JSON
    ParseJson,

    /// Keep only ASCII digits
    DigitsOnly,
}

fn default_true_values() -> Vec<String> {
    vec!["true".to_string()]
}

/// Truthy markers used by SAP-style flag columns.
pub fn flag_true_values() -> Vec<String> {
    ["x", "1", "true", "yes", "y", "ja"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Operation {
    /// Truthiness test against the default marker `true`.
    pub fn to_boolean() -> Self {
        Operation::ToBoolean {
            true_values: default_true_values(),
        }
    }

    /// Truthiness test against the SAP flag markers.
    pub fn flag() -> Self {
        Operation::ToBoolean {
            true_values: flag_true_values(),
        }
    }

    /// Apply this operation to a value.
    pub fn apply(&self, value: &Value) -> Option<Value> {
        match self {
            Operation::Uppercase => as_string(value).map(|s| Value::String(s.to_uppercase())),
            Operation::Lowercase => as_string(value).map(|s| Value::String(s.to_lowercase())),
            Operation::ToBoolean { true_values } => Some(apply_to_boolean(value, true_values)),
            Operation::ToNumber => apply_to_number(value),
            Operation::NormalizeDate => as_string(value).map(|s| Value::String(normalize_date(&s))),
            Operation::ParseJson => match value {
                Value::String(s) => parse_embedded_json(s),
                other => Some(other.clone()),
            },
            Operation::DigitsOnly => as_string(value).map(|s| {
                Value::String(s.chars().filter(|c| c.is_ascii_digit()).collect())
            }),
        }
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn apply_to_boolean(value: &Value, true_values: &[String]) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        _ => {
            let truthy = as_string(value)
                .map(|s| {
                    let s = s.trim();
                    true_values.iter().any(|tv| tv.eq_ignore_ascii_case(s))
                })
                .unwrap_or(false);
            Value::Bool(truthy)
        }
    }
}

fn apply_to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        _ => as_string(value)
            .and_then(|s| parse_decimal(&s))
            .and_then(to_json_number),
    }
}

/// Normalize a date to `YYYY-MM-DD`.
///
/// A trailing time part (`2024-03-01 00:00:00`) is ignored. Values matching no known
/// layout are returned unchanged.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let date_part = trimmed.split_whitespace().next().unwrap_or(trimmed);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Parse a cell holding a JSON document.
///
/// Malformed JSON yields `None`: the field is omitted, never forwarded as text.
pub fn parse_embedded_json(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    serde_json::from_str(raw).ok()
}
