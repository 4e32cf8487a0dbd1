//! Declarative mapping schemas.
//!
//! A schema says, for every payload field, which source columns feed it and how the raw
//! cell is turned into a JSON value. The same building blocks drive both payload
//! shapes:
//!
//! - [`InvoiceSchema`] - Header+Lines documents assembled from a group of rows
//! - [`EntitySchema`] - Header+Children records assembled from one primary row and its
//!   subordinate tables
//!
//! Schemas are plain serde types, so a caller can hand in its own mapping as JSON
//! instead of using the built-in ones in [`super::domains`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::operations::Operation;
use crate::models::PayloadKind;

// =============================================================================
// Alias Set
// =============================================================================

/// Ordered candidate column names for one logical field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasSet(Vec<String>);

impl AliasSet {
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(aliases.into_iter().map(Into::into).collect())
    }

    /// An alias set with no candidates; only overrides or defaults can fill it.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for AliasSet {
    fn from(column: &str) -> Self {
        Self(vec![column.to_string()])
    }
}

// =============================================================================
// Field Rules
// =============================================================================

/// Where the raw value of a field comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSource {
    /// First non-empty column of an alias set.
    Columns { aliases: AliasSet },

    /// Several columns joined together; absent unless every part is present.
    Concat {
        parts: Vec<AliasSet>,
        #[serde(default)]
        separator: String,
    },

    /// Every column named `<prefix><name>` becomes `name` inside an object.
    Prefixed { prefix: String },

    /// Value column of a lookup table, joined on a key built from the current row.
    ///
    /// When several lookup rows share the key, the last one with a value wins.
    Lookup {
        table: String,
        key: Vec<AliasSet>,
        value: AliasSet,
    },

    /// Fixed value.
    Constant { value: Value },
}

/// Mapping rule for one payload field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Payload path; dots create nested objects (`paymentTerms.paymentTermKey`).
    pub target: String,

    pub source: FieldSource,

    /// Applied in order to the raw value. An operation that cannot handle the value
    /// makes the field absent.
    #[serde(default)]
    pub operations: Vec<Operation>,

    /// Used when the field is absent after every other step.
    #[serde(default)]
    pub default: Option<Value>,

    /// Key into the configured overrides, consulted after the row (and extension).
    #[serde(default)]
    pub override_key: Option<String>,

    /// Extension-table columns consulted when the primary row has no value.
    #[serde(default)]
    pub extension: Option<AliasSet>,

    /// Missing value fails the whole record.
    #[serde(default)]
    pub required: bool,

    /// The value alone does not cause an enclosing [`NestedRule`] object to be built.
    #[serde(default)]
    pub passive: bool,
}

impl FieldRule {
    fn with_source(target: impl Into<String>, source: FieldSource) -> Self {
        Self {
            target: target.into(),
            source,
            operations: Vec::new(),
            default: None,
            override_key: None,
            extension: None,
            required: false,
            passive: false,
        }
    }

    /// Field read from the first non-empty alias.
    pub fn columns<I, S>(target: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_source(
            target,
            FieldSource::Columns {
                aliases: AliasSet::new(aliases),
            },
        )
    }

    /// Field filled from overrides only.
    pub fn override_only(target: impl Into<String>) -> Self {
        let target = target.into();
        Self::with_source(
            target.clone(),
            FieldSource::Columns {
                aliases: AliasSet::none(),
            },
        )
        .with_override(target)
    }

    pub fn concat(target: impl Into<String>, parts: Vec<AliasSet>, separator: impl Into<String>) -> Self {
        Self::with_source(
            target,
            FieldSource::Concat {
                parts,
                separator: separator.into(),
            },
        )
    }

    pub fn prefixed(target: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::with_source(
            target,
            FieldSource::Prefixed {
                prefix: prefix.into(),
            },
        )
    }

    pub fn lookup(target: impl Into<String>, table: impl Into<String>, key: Vec<AliasSet>, value: AliasSet) -> Self {
        Self::with_source(
            target,
            FieldSource::Lookup {
                table: table.into(),
                key,
                value,
            },
        )
    }

    pub fn constant(target: impl Into<String>, value: Value) -> Self {
        Self::with_source(target, FieldSource::Constant { value })
    }

    /// Add an operation to the chain.
    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Set the fallback value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Fall back to an override entry.
    pub fn with_override(mut self, key: impl Into<String>) -> Self {
        self.override_key = Some(key.into());
        self
    }

    /// Fall back to extension-table columns.
    pub fn with_extension<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extension = Some(AliasSet::new(aliases));
        self
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark as passive.
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }
}

/// An object (or one-element list) built from several fields.
///
/// Built only when at least one non-passive field resolved from the row, the
/// extension or the overrides; constants and defaults never trigger it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedRule {
    pub target: String,

    /// Wrap the object in a one-element array.
    #[serde(default)]
    pub list: bool,

    pub fields: Vec<FieldRule>,

    #[serde(default)]
    pub nested: Vec<NestedRule>,

    /// Also built, from whatever resolves, whenever the enclosing object is built.
    #[serde(default)]
    pub follows_parent: bool,
}

impl NestedRule {
    pub fn object(target: impl Into<String>, fields: Vec<FieldRule>) -> Self {
        Self {
            target: target.into(),
            list: false,
            fields,
            nested: Vec::new(),
            follows_parent: false,
        }
    }

    pub fn list(target: impl Into<String>, fields: Vec<FieldRule>) -> Self {
        Self {
            list: true,
            ..Self::object(target, fields)
        }
    }

    pub fn with_nested(mut self, nested: NestedRule) -> Self {
        self.nested.push(nested);
        self
    }

    /// Build this child whenever its parent is built.
    pub fn follows_parent(mut self) -> Self {
        self.follows_parent = true;
        self
    }
}

// =============================================================================
// Header+Children Rules
// =============================================================================

/// Alternate-name fields resolved from either the primary or the extension table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltNameRule {
    pub target: String,
    pub primary: AliasSet,
    pub extension: AliasSet,
}

impl AltNameRule {
    pub fn new(target: impl Into<String>, primary: AliasSet, extension: AliasSet) -> Self {
        Self {
            target: target.into(),
            primary,
            extension,
        }
    }
}

/// List of identifiers collected from every column matching a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdListRule {
    pub target: String,

    /// Full-match regular expressions against lower-cased column names.
    pub patterns: Vec<String>,

    /// Emit `{wrap_key: id}` objects instead of bare strings.
    #[serde(default)]
    pub wrap_key: Option<String>,
}

impl IdListRule {
    pub fn strings<I, S>(target: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: target.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
            wrap_key: None,
        }
    }

    pub fn wrapped<I, S>(target: impl Into<String>, patterns: I, wrap_key: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            wrap_key: Some(wrap_key.into()),
            ..Self::strings(target, patterns)
        }
    }
}

/// One-to-many relation to a subordinate table.
///
/// Every subordinate row whose join column equals the primary's identity yields one
/// child object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRelation {
    /// Array field on the parent.
    pub target: String,
    /// Subordinate table name.
    pub table: String,
    /// Join column in the subordinate table.
    pub join: AliasSet,
    /// Rules evaluated against each subordinate row.
    pub fields: Vec<FieldRule>,
}

/// Lookup table used by [`FieldSource::Lookup`], indexed once per batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    pub name: String,
    pub key: Vec<AliasSet>,
}

/// One-to-one join of the primary row to an optional extension table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionJoin {
    /// Extension table name.
    pub table: String,
    /// Key column in the extension table.
    pub key: AliasSet,
    /// Column of the primary row referencing it.
    pub reference: AliasSet,
}

/// Header+Children mapping for one primary entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,

    #[serde(default)]
    pub kind: PayloadKind,

    /// The record's own identifier. Missing identity fails the record.
    pub identity: FieldRule,

    #[serde(default)]
    pub fields: Vec<FieldRule>,

    #[serde(default)]
    pub alt_names: Vec<AltNameRule>,

    #[serde(default)]
    pub id_lists: Vec<IdListRule>,

    #[serde(default)]
    pub children: Vec<ChildRelation>,

    #[serde(default)]
    pub lookup_tables: Vec<LookupTable>,

    #[serde(default)]
    pub extension: Option<ExtensionJoin>,
}

impl EntitySchema {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Names of every subordinate table the schema reads.
    pub fn table_names(&self) -> Vec<&str> {
        self.children
            .iter()
            .map(|c| c.table.as_str())
            .chain(self.lookup_tables.iter().map(|l| l.name.as_str()))
            .collect()
    }
}

// =============================================================================
// Header+Lines Rules
// =============================================================================

/// Columns feeding the document totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountColumns {
    pub net: AliasSet,
    pub gross: AliasSet,
    pub tax: AliasSet,
    pub freight: AliasSet,
    pub other: AliasSet,
}

impl Default for AmountColumns {
    fn default() -> Self {
        Self {
            net: AliasSet::from("netAmount"),
            gross: AliasSet::from("grossAmount"),
            tax: AliasSet::from("totalTaxAmount"),
            freight: AliasSet::from("totalFreightCharges"),
            other: AliasSet::from("totalOtherCharges"),
        }
    }
}

/// Header+Lines mapping for transactional documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSchema {
    /// Payload schema the documents are validated against.
    #[serde(default = "default_invoice_kind")]
    pub kind: PayloadKind,

    /// Document identity, read from the first row.
    pub identity: FieldRule,

    /// Scalar header fields, read from the first row.
    #[serde(default)]
    pub header: Vec<FieldRule>,

    /// Composite header fields.
    #[serde(default)]
    pub header_objects: Vec<NestedRule>,

    /// Array field receiving the lines.
    #[serde(default = "default_lines_target")]
    pub lines_target: String,

    /// Scalar line fields, one line per row.
    #[serde(default)]
    pub line: Vec<FieldRule>,

    #[serde(default)]
    pub line_objects: Vec<NestedRule>,

    /// Line fields copied from the header when the line has no value of its own.
    #[serde(default)]
    pub line_inherits: Vec<String>,

    #[serde(default)]
    pub amounts: AmountColumns,
}

fn default_lines_target() -> String {
    "invoiceLines".to_string()
}

fn default_invoice_kind() -> PayloadKind {
    PayloadKind::Invoice
}

impl InvoiceSchema {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
