//! Domain models for the tabload mapping engine.
//!
//! This module contains the core data structures used throughout the engine:
//!
//! - [`Row`] - One source row: ordered, case-preserving column → string cells
//! - [`RowGroup`] - Rows sharing a group key (the lines of one document)
//! - [`TaxMode`] - Where the tax total of a document comes from
//! - [`AltNamePriority`] - Which table wins for alternate names
//! - [`PayloadKind`] - Which payload schema a document is checked against

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Row
// =============================================================================

/// One row of a source table.
///
/// Cells keep their input order and the original spelling of the column name.
/// Lookups by column name ignore case and surrounding whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(String, String)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cell. A later cell with the same column name is shadowed by the earlier one.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.push((column.into(), value.into()));
    }

    /// Raw (untrimmed) value of a column, if the column exists.
    pub fn get(&self, column: &str) -> Option<&str> {
        if let Some((_, v)) = self.cells.iter().find(|(c, _)| c == column) {
            return Some(v.as_str());
        }
        let wanted = normalize_column(column);
        self.cells
            .iter()
            .find(|(c, _)| normalize_column(c) == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the row has a column with this name.
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Column names in input order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    /// `(column, value)` pairs in input order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Build a row from a JSON object.
    ///
    /// Strings are kept verbatim, other scalars are stringified and `null` becomes an
    /// empty cell. Returns `None` when the value is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let cells = obj
            .iter()
            .map(|(k, v)| {
                let cell = match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k.clone(), cell)
            })
            .collect();
        Some(Self { cells })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Lower-cased, trimmed column name used for matching.
pub fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether a cell value counts as absent (`""`, whitespace, or a `nan` marker).
pub fn is_blank(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case("nan")
}

// =============================================================================
// Row Group
// =============================================================================

/// Rows that belong to one logical document, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroup {
    /// Group key value shared by every row.
    pub key: String,
    /// Never empty: a group is created from its first row and only grows.
    rows: Vec<Row>,
}

impl RowGroup {
    /// Create a group from its first row.
    pub fn new(key: impl Into<String>, first: Row) -> Self {
        Self {
            key: key.into(),
            rows: vec![first],
        }
    }

    /// First row of the group; header fields are read from it.
    pub fn first(&self) -> &Row {
        &self.rows[0]
    }

    /// All rows, in input order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Policies
// =============================================================================

/// Where a document's tax total comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Read once from the first row; lines carry no tax amount.
    Header,
    /// Each line carries its own tax; the header total is their sum.
    #[default]
    Line,
}

impl TaxMode {
    /// Parse `header` / `line` (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "header" => Some(Self::Header),
            "line" | "lines" => Some(Self::Line),
            _ => None,
        }
    }
}

/// Which table is consulted first for the alternate-name triple.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AltNamePriority {
    /// Primary table first, extension table as fallback.
    #[default]
    PrimaryFirst,
    /// Extension table first, primary table as fallback.
    ExtensionFirst,
}

impl AltNamePriority {
    /// Parse `primary_first` / `extension_first` (dashes accepted).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().replace('-', "_").as_str() {
            "primary_first" | "primary" => Some(Self::PrimaryFirst),
            "extension_first" | "extension" => Some(Self::ExtensionFirst),
            _ => None,
        }
    }
}

/// Payload family, used to pick the JSON schema a document is validated against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Invoice,
    Supplier,
    Company,
    /// User-supplied mapping without an embedded schema.
    #[default]
    Custom,
}

impl PayloadKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "invoice" | "invoices" => Some(Self::Invoice),
            "supplier" | "suppliers" => Some(Self::Supplier),
            "company" | "companies" => Some(Self::Company),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
