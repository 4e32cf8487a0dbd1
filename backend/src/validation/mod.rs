//! JSON Schema validation of assembled payloads.
//!
//! Every payload kind with a known target shape has an embedded Draft 7 schema:
//!
//! - `schemas/invoice.json` - Header+Lines invoice documents
//! - `schemas/supplier.json` - Supplier records with subsidiaries and bank accounts
//! - `schemas/company.json` - Company records
//!
//! The schemas check structure and types of the fields this engine writes; they allow
//! additional properties, since the target API accepts more than the built-in mappings
//! produce. [`PayloadKind::Custom`] payloads are not validated.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use tabload::models::PayloadKind;
//! use tabload::validation::validate_payload;
//!
//! let supplier = json!({ "vendorId": "0000100001", "companyName": "ACME" });
//! assert!(validate_payload(PayloadKind::Supplier, &supplier).is_ok());
//! ```

use serde_json::Value;

use crate::models::PayloadKind;

const INVOICE_SCHEMA: &str = include_str!("../../schemas/invoice.json");
const SUPPLIER_SCHEMA: &str = include_str!("../../schemas/supplier.json");
const COMPANY_SCHEMA: &str = include_str!("../../schemas/company.json");

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with one message per violation
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick true/false check.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Embedded schema source for a payload kind.
pub fn schema_source(kind: PayloadKind) -> Option<&'static str> {
    match kind {
        PayloadKind::Invoice => Some(INVOICE_SCHEMA),
        PayloadKind::Supplier => Some(SUPPLIER_SCHEMA),
        PayloadKind::Company => Some(COMPANY_SCHEMA),
        PayloadKind::Custom => None,
    }
}

/// Parsed embedded schema for a payload kind.
pub fn payload_schema(kind: PayloadKind) -> Result<Option<Value>, Vec<String>> {
    schema_source(kind)
        .map(|src| {
            serde_json::from_str(src).map_err(|e| vec![format!("Invalid embedded schema: {}", e)])
        })
        .transpose()
}

/// Validate a payload against the embedded schema of its kind.
pub fn validate_payload(kind: PayloadKind, data: &Value) -> Result<(), Vec<String>> {
    match payload_schema(kind)? {
        Some(schema) => validate(&schema, data),
        None => Ok(()),
    }
}

/// Validates many payloads of one kind, parsing and compiling the schema once.
pub struct PayloadValidator {
    validator: Option<jsonschema::Validator>,
}

impl PayloadValidator {
    pub fn new(kind: PayloadKind) -> Result<Self, Vec<String>> {
        let validator = match payload_schema(kind)? {
            Some(schema) => Some(
                jsonschema::draft7::new(&schema)
                    .map_err(|e| vec![format!("Invalid schema: {}", e)])?,
            ),
            None => None,
        };
        Ok(Self { validator })
    }

    pub fn validate(&self, data: &Value) -> Result<(), Vec<String>> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let errors: Vec<String> = validator
            .iter_errors(data)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
