//! # Tabload - tabular exports to nested API payloads
//!
//! Tabload maps the flat rows of ERP exports (invoice lines, supplier master data,
//! company codes) to the nested JSON documents an import API expects.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Rows (JSON) │────▶│ Group/Index │────▶│  Assemble   │────▶│ Prune + Val │
//! │  per table  │     │  (batch)    │     │ (schemas)   │     │  payloads   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabload::{build_invoices, invoice_schema, EngineConfig};
//!
//! let result = build_invoices(&rows, &invoice_schema(), &EngineConfig::default())?;
//! println!("Built {} invoices", result.payloads.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Engine configuration (file, environment, overrides)
//! - [`models`] - Rows, row groups and batch policies
//! - [`transform`] - Resolution, grouping, mapping schemas, assembly and pipeline
//! - [`validation`] - JSON Schema validation of payloads
//! - [`logs`] - Batch progress logs

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    ConfigResult,
    PipelineError,
    PipelineResult,
    ValidationError,
    ValidationResult,
};

// =============================================================================
// Re-exports - Configuration and models
// =============================================================================

pub use config::EngineConfig;

pub use models::{
    AltNamePriority,
    PayloadKind,
    Row,
    RowGroup,
    TaxMode,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    is_valid,
    validate,
    validate_payload,
    PayloadValidator,
};

// =============================================================================
// Re-exports - Mapping schemas
// =============================================================================

pub use transform::dsl::{
    company_schema,
    invoice_schema,
    supplier_schema,
    EntitySchema,
    FieldRule,
    InvoiceSchema,
    Operation,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    build_entities,
    build_invoices,
    read_rows,
    rows_from_value,
    BatchResult,
    BuiltPayload,
    RecordFailure,
    SourceTables,
};

pub use transform::prune::prune;
