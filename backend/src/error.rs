//! Error types for the tabload mapping engine.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ValidationError`] - A record cannot be assembled (missing identity, bad group key)
//!   or the assembled payload violates its JSON schema
//! - [`ConfigError`] - Configuration and schema loading errors
//! - [`PipelineError`] - Top-level batch orchestration errors
//!
//! Field-level problems (an amount that does not parse, malformed embedded JSON, a join
//! that finds nothing) are *not* errors: the field is simply left out of the payload.
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Validation Errors
// =============================================================================

/// A record-level failure. Fatal for the record it names, never for the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A row could not resolve any of the group key aliases.
    #[error("Row {row} has no group key (tried: {})", aliases.join(", "))]
    MissingGroupKey { row: usize, aliases: Vec<String> },

    /// The record's own external identifier is missing.
    #[error("Record '{record}': required field '{field}' is missing")]
    MissingIdentity { record: String, field: String },

    /// A document total exceeds the decimal range.
    #[error("Record '{record}': amount '{field}' overflows")]
    AmountOverflow { record: String, field: String },

    /// The assembled payload does not match its JSON schema.
    #[error("Record '{record}' failed schema validation: {}", errors.join("; "))]
    Schema { record: String, errors: Vec<String> },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration or mapping schemas.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration JSON is malformed.
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An identifier column pattern is not a valid regular expression.
    #[error("Invalid column pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A setting has a value outside its allowed set.
    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level batch errors.
///
/// Returned by the batch entry points in [`crate::transform::pipeline`]. Individual
/// records that fail are reported in the batch result instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Grouping failed; no document can be assembled.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Failed to read rows or write payloads.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Rows or payload file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input file does not contain an array of row objects.
    #[error("Expected an array of row objects: {0}")]
    InvalidRows(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for record assembly.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for batch operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let err = ValidationError::MissingGroupKey {
            row: 3,
            aliases: vec!["externalId".into(), "invoiceExternalId".into()],
        };
        let pipeline_err: PipelineError = err.into();
        let msg = pipeline_err.to_string();
        assert!(msg.contains("Row 3"));
        assert!(msg.contains("invoiceExternalId"));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let pipeline_err: PipelineError = ConfigError::from(json_err).into();
        assert!(pipeline_err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_identity_error_names_record() {
        let err = ValidationError::MissingIdentity {
            record: "row 7".into(),
            field: "vendorId".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("row 7"));
        assert!(msg.contains("vendorId"));
    }

    #[test]
    fn test_overflow_error_names_field() {
        let err = ValidationError::AmountOverflow {
            record: "INV-1".into(),
            field: "totalNetAmount".into(),
        };
        assert_eq!(err.to_string(), "Record 'INV-1': amount 'totalNetAmount' overflows");
    }
}
