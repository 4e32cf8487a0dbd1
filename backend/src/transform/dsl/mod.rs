//! Declarative mapping DSL.
//!
//! This module provides:
//! - `schema`: Field rules, relations and the two schema shapes
//! - `operations`: Value conversions applied to resolved cells
//! - `executor`: Rule evaluation against a row
//! - `domains`: Built-in invoice, supplier and company schemas
//!
//! ## Usage Flow
//!
//! ```text
//! Row → executor::evaluate (row → extension → override → operations → default) → payload field
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tabload::transform::dsl::{EntitySchema, FieldRule, Operation};
//!
//! // Load a custom mapping, or start from a built-in one
//! let mut schema = tabload::transform::dsl::supplier_schema();
//! schema.fields.push(
//!     FieldRule::columns("region", ["Rg", "REGIO"]).with_operation(Operation::Uppercase),
//! );
//! std::fs::write("suppliers.json", schema.to_json()?)?;
//! ```

pub mod domains;
pub mod executor;
pub mod operations;
pub mod schema;

// Re-exports for convenience
pub use domains::{company_schema, invoice_schema, supplier_schema};
pub use executor::{apply_rules, build_nested, evaluate, insert_path, FieldContext, Resolved};
pub use operations::{normalize_date, parse_embedded_json, Operation};
pub use schema::{
    AliasSet, AltNameRule, AmountColumns, ChildRelation, EntitySchema, ExtensionJoin, FieldRule,
    FieldSource, IdListRule, InvoiceSchema, LookupTable, NestedRule,
};
