//! Batch API: rows in, validated payloads out.
//!
//! This module combines all steps for one batch: grouping or indexing, assembly,
//! pruning and schema validation. It is the only part of the engine that logs.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabload::config::EngineConfig;
//! use tabload::transform::dsl::invoice_schema;
//! use tabload::transform::pipeline::{build_invoices, read_rows};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rows = read_rows(Path::new("invoices.json"))?;
//!     let result = build_invoices(&rows, &invoice_schema(), &EngineConfig::default())?;
//!
//!     println!("Built {} invoices", result.payloads.len());
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::{ConfigError, PipelineError, PipelineResult, ValidationError};
use crate::logs::{log_error_indent, log_info, log_success, log_warning};
use crate::models::{PayloadKind, Row, TaxMode};
use crate::transform::dsl::schema::{EntitySchema, InvoiceSchema};
use crate::transform::entity::{assemble_entity, BatchIndexes};
use crate::transform::grouper::group_by;
use crate::transform::invoice::assemble_invoice;
use crate::validation::PayloadValidator;

/// Failures printed individually before the log switches to a summary line.
const LOGGED_FAILURES: usize = 5;

// =============================================================================
// Input
// =============================================================================

/// The tables of one batch, by role.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    /// One record (or group) per row.
    pub primary: Vec<Row>,
    /// Tables joined as child relations and lookups, by table name.
    pub subordinate: BTreeMap<String, Vec<Row>>,
    /// Optional 1:1 extension table.
    pub extension: Option<Vec<Row>>,
}

impl SourceTables {
    pub fn new(primary: Vec<Row>) -> Self {
        Self {
            primary,
            ..Self::default()
        }
    }

    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.subordinate.insert(name.into(), rows);
        self
    }

    pub fn with_extension(mut self, rows: Vec<Row>) -> Self {
        self.extension = Some(rows);
        self
    }
}

/// Parse a JSON array of row objects.
pub fn rows_from_value(value: &Value) -> PipelineResult<Vec<Row>> {
    let items = value
        .as_array()
        .ok_or_else(|| PipelineError::InvalidRows("top-level value is not an array".to_string()))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            Row::from_value(item)
                .ok_or_else(|| PipelineError::InvalidRows(format!("item {} is not an object", i + 1)))
        })
        .collect()
}

/// Read rows from a JSON file holding an array of objects.
pub fn read_rows(path: &Path) -> PipelineResult<Vec<Row>> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    rows_from_value(&value)
}

// =============================================================================
// Output
// =============================================================================

/// One assembled payload and the record it was built for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltPayload {
    pub record: String,
    pub payload: Value,
}

/// A record that produced no payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub record: String,
    pub error: String,
}

impl RecordFailure {
    fn from_error(fallback: &str, error: &ValidationError) -> Self {
        let record = match error {
            ValidationError::MissingIdentity { record, .. }
            | ValidationError::AmountOverflow { record, .. }
            | ValidationError::Schema { record, .. } => record.clone(),
            ValidationError::MissingGroupKey { row, .. } => format!("row {row}"),
        };
        Self {
            record: if record.is_empty() { fallback.to_string() } else { record },
            error: error.to_string(),
        }
    }
}

/// Result of one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    /// Payloads in primary-row (or first-occurrence group) order.
    pub payloads: Vec<BuiltPayload>,

    /// Records that failed assembly or schema validation.
    pub failures: Vec<RecordFailure>,

    /// Payloads that passed validation (all payloads when validation is skipped).
    pub valid_count: usize,

    /// Payloads rejected by schema validation.
    pub invalid_count: usize,
}

impl BatchResult {
    /// Payload documents only, for emission.
    pub fn payload_values(&self) -> Vec<Value> {
        self.payloads.iter().map(|p| p.payload.clone()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// =============================================================================
// Batch entry points
// =============================================================================

/// Build one Header+Lines document per group of rows.
///
/// Grouping failure (a row without group key) fails the whole batch; a group whose
/// document cannot be assembled is reported in [`BatchResult::failures`]. Payloads are
/// validated against the JSON schema of `schema.kind`.
pub fn build_invoices(
    rows: &[Row],
    schema: &InvoiceSchema,
    config: &EngineConfig,
) -> PipelineResult<BatchResult> {
    if rows.is_empty() {
        log_warning("No rows to transform");
        return Ok(BatchResult::default());
    }
    log_info(format!("📦 Grouping {} rows by {}...", rows.len(), config.group_key_aliases.join(" | ")));
    let groups = group_by(rows, config.group_key_aliases.as_slice())?;
    log_success(format!("{} documents", groups.len()));

    log_info(format!("⚙️  Assembling invoices ({} tax)...", tax_mode_label(config)));
    let mut batch = Batch::new(schema.kind, config)?;
    for group in &groups {
        batch.push(&group.key, assemble_invoice(group, schema, config));
    }
    Ok(batch.finish())
}

/// Build one Header+Children record per primary row.
///
/// Subordinate and extension tables are indexed once for the batch. A row whose record
/// cannot be assembled is reported in [`BatchResult::failures`].
pub fn build_entities(
    tables: &SourceTables,
    schema: &EntitySchema,
    config: &EngineConfig,
) -> PipelineResult<BatchResult> {
    if tables.primary.is_empty() {
        log_warning(format!("No {} rows to transform", schema.name));
        return Ok(BatchResult::default());
    }
    log_info(format!("📖 {} {} rows", tables.primary.len(), schema.name));
    for (name, rows) in &tables.subordinate {
        log_info(format!("{name}: {} rows", rows.len()));
    }
    if let Some(rows) = &tables.extension {
        let name = schema.extension.as_ref().map(|e| e.table.as_str()).unwrap_or("extension");
        log_info(format!("{name}: {} rows", rows.len()));
    }

    log_info("🔗 Indexing subordinate tables...");
    let indexes = BatchIndexes::build(schema, &tables.subordinate, tables.extension.as_deref(), config)?;

    log_info(format!("⚙️  Assembling {} records...", schema.name));
    let mut batch = Batch::new(schema.kind, config)?;
    for (i, row) in tables.primary.iter().enumerate() {
        let label = format!("row {}", i + 1);
        batch.push(&label, assemble_entity(row, i + 1, schema, &indexes, config));
    }
    Ok(batch.finish())
}

fn tax_mode_label(config: &EngineConfig) -> &'static str {
    match config.tax_mode {
        TaxMode::Header => "header",
        TaxMode::Line => "line",
    }
}

/// Collects assembled records, validating each as it arrives.
struct Batch {
    validator: Option<PayloadValidator>,
    result: BatchResult,
}

impl Batch {
    fn new(kind: PayloadKind, config: &EngineConfig) -> PipelineResult<Self> {
        let validator = if config.skip_validation {
            None
        } else {
            let validator = PayloadValidator::new(kind).map_err(|errors| ConfigError::InvalidValue {
                key: "schema".to_string(),
                value: errors.join("; "),
            })?;
            Some(validator)
        };
        Ok(Self {
            validator,
            result: BatchResult::default(),
        })
    }

    fn push(&mut self, label: &str, assembled: Result<Value, ValidationError>) {
        let payload = match assembled {
            Ok(payload) => payload,
            Err(e) => {
                self.result.failures.push(RecordFailure::from_error(label, &e));
                return;
            }
        };
        let record = record_name(&payload).unwrap_or_else(|| label.to_string());

        if let Some(validator) = &self.validator {
            if let Err(errors) = validator.validate(&payload) {
                self.result.invalid_count += 1;
                let error = ValidationError::Schema { record, errors };
                self.result.failures.push(RecordFailure::from_error(label, &error));
                return;
            }
        }
        self.result.valid_count += 1;
        self.result.payloads.push(BuiltPayload { record, payload });
    }

    fn finish(self) -> BatchResult {
        let result = self.result;
        log_success(format!("Built {} payloads", result.payloads.len()));
        if !result.failures.is_empty() {
            log_warning(format!("{} records failed", result.failures.len()));
            for failure in result.failures.iter().take(LOGGED_FAILURES) {
                log_error_indent(&failure.error, 1);
            }
            if result.failures.len() > LOGGED_FAILURES {
                log_warning(format!("... +{} more", result.failures.len() - LOGGED_FAILURES));
            }
        }
        if result.invalid_count > 0 {
            log_warning(format!("{} payloads failed schema validation", result.invalid_count));
        } else if self.validator.is_some() {
            log_success("All payloads valid");
        }
        result
    }
}

/// The identity of an assembled payload: its first string field.
fn record_name(payload: &Value) -> Option<String> {
    payload
        .as_object()?
        .values()
        .next()
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AltNamePriority;
    use crate::transform::dsl::domains::{company_schema, invoice_schema, supplier_schema, LFB1, LFBK, TIBAN};
    use serde_json::json;

    fn row(cells: &[(&str, &str)]) -> Row {
        cells.iter().copied().collect()
    }

    fn invoice_rows() -> Vec<Row> {
        vec![
            row(&[
                ("externalId", "ext-2"),
                ("currency", "EUR"),
                ("line.externalId", "1"),
                ("netAmount", "100.00"),
                ("totalTaxAmount", "10.00"),
            ]),
            row(&[
                ("externalId", "ext-1"),
                ("currency", "EUR"),
                ("line.externalId", "1"),
                ("netAmount", "100.00"),
                ("totalTaxAmount", "19.00"),
            ]),
            row(&[
                ("externalId", "ext-2"),
                ("currency", "EUR"),
                ("line.externalId", "2"),
                ("netAmount", "200.00"),
                ("totalTaxAmount", "20.00"),
            ]),
        ]
    }

    #[test]
    fn test_invoice_batch() {
        let result = build_invoices(&invoice_rows(), &invoice_schema(), &EngineConfig::default()).unwrap();

        assert!(result.is_clean());
        assert_eq!(result.valid_count, 2);
        let records: Vec<&str> = result.payloads.iter().map(|p| p.record.as_str()).collect();
        assert_eq!(records, vec!["ext-2", "ext-1"]);

        let first = &result.payloads[0].payload;
        assert_eq!(first["totalNetAmount"], json!(300.0));
        assert_eq!(first["totalTaxAmount"], json!(30.0));
        assert_eq!(first["invoiceLines"].as_array().unwrap().len(), 2);
        assert_eq!(result.payloads[1].payload["totalGrossAmount"], json!(119.0));
    }

    #[test]
    fn test_invoice_batch_header_tax() {
        let config = EngineConfig {
            tax_mode: TaxMode::Header,
            ..EngineConfig::default()
        };
        let result = build_invoices(&invoice_rows(), &invoice_schema(), &config).unwrap();
        let first = &result.payloads[0].payload;
        assert_eq!(first["totalTaxAmount"], json!(10.0));
        for line in first["invoiceLines"].as_array().unwrap() {
            assert!(line.get("totalTaxAmount").is_none());
        }
    }

    #[test]
    fn test_missing_group_key_fails_batch() {
        let mut rows = invoice_rows();
        rows.push(row(&[("currency", "EUR"), ("netAmount", "5")]));
        let err = build_invoices(&rows, &invoice_schema(), &EngineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::MissingGroupKey { row: 4, .. })
        ));
    }

    #[test]
    fn test_empty_input_gives_empty_batch() {
        let result = build_invoices(&[], &invoice_schema(), &EngineConfig::default()).unwrap();
        assert!(result.payloads.is_empty());
        assert!(result.is_clean());
        assert_eq!(result.valid_count, 0);

        // Subordinate rows without any primary row still build nothing.
        let tables = SourceTables::default().with_table(LFB1, vec![row(&[("LIFNR", "100"), ("BUKRS", "1000")])]);
        let result = build_entities(&tables, &supplier_schema(), &EngineConfig::default()).unwrap();
        assert!(result.payloads.is_empty());
        assert!(result.is_clean());
        assert_eq!(result.invalid_count, 0);
    }

    #[test]
    fn test_overflowing_group_does_not_block_batch() {
        let max = "79228162514264337593543950335";
        let mut rows = invoice_rows();
        rows.insert(1, row(&[("externalId", "big"), ("currency", "EUR"), ("netAmount", max)]));
        rows.push(row(&[("externalId", "big"), ("currency", "EUR"), ("netAmount", max)]));

        let result = build_invoices(&rows, &invoice_schema(), &EngineConfig::default()).unwrap();

        let records: Vec<&str> = result.payloads.iter().map(|p| p.record.as_str()).collect();
        assert_eq!(records, vec!["ext-2", "ext-1"]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].record, "big");
        assert!(result.failures[0].error.contains("totalNetAmount"));
    }

    #[test]
    fn test_supplier_batch_isolates_failures() {
        let tables = SourceTables::new(vec![
            row(&[("LIFNR", "100"), ("NAME1", "ACME")]),
            row(&[("NAME1", "No Id Ltd")]),
            row(&[("LIFNR", "200"), ("NAME1", "Beta")]),
        ])
        .with_table(LFB1, vec![row(&[("LIFNR", "100"), ("BUKRS", "1000")])])
        .with_table(
            LFBK,
            vec![row(&[("LIFNR", "200"), ("BANKS", "DE"), ("BANKL", "1"), ("BANKN", "42")])],
        )
        .with_table(
            TIBAN,
            vec![row(&[("BANKS", "DE"), ("BANKL", "1"), ("BANKN", "42"), ("IBAN", "DE42")])],
        );

        let result = build_entities(&tables, &supplier_schema(), &EngineConfig::default()).unwrap();

        assert_eq!(result.payloads.len(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].record, "row 2");
        assert!(result.failures[0].error.contains("vendorId"));

        let acme = &result.payloads[0].payload;
        assert_eq!(acme["supplierSubsidiaries"][0]["externalCompanyId"], "1000");
        assert!(acme.get("supplierBankAccounts").is_none());

        let beta = &result.payloads[1].payload;
        assert_eq!(beta["supplierBankAccounts"][0]["iban"], "DE42");
        assert!(beta.get("supplierSubsidiaries").is_none());
    }

    #[test]
    fn test_company_batch_with_extension() {
        let tables = SourceTables::new(vec![row(&[("BUKRS", "1000"), ("BUTXT", ""), ("ADRNR", "A1")])])
            .with_extension(vec![row(&[
                ("ADDRNUMBER", "A1"),
                ("NAME1", "ACME Holding"),
                ("NAME2", "ACME Alt"),
                ("CITY1", "Berlin"),
            ])]);
        let mut config = EngineConfig {
            alt_name_priority: AltNamePriority::ExtensionFirst,
            ..EngineConfig::default()
        };
        config.set_override("externalClientId=client-9").unwrap();

        let result = build_entities(&tables, &company_schema(), &config).unwrap();

        assert!(result.is_clean());
        let company = &result.payloads[0].payload;
        assert_eq!(company["externalId"], "1000");
        assert_eq!(company["externalClientId"], "client-9");
        assert_eq!(company["companyName"], "ACME Holding");
        assert_eq!(company["city"], "Berlin");
        assert_eq!(company["nameAlternative1"], "ACME Alt");
        assert_eq!(result.payloads[0].record, "1000");
    }

    #[test]
    fn test_schema_failures_counted() {
        let mut schema = invoice_schema();
        // Rewriting the identity target leaves the payload without `externalId`.
        schema.identity.target = "documentNumber".to_string();
        let rows = vec![row(&[("externalId", "ext-1"), ("netAmount", "1")])];

        let result = build_invoices(&rows, &schema, &EngineConfig::default()).unwrap();
        assert_eq!(result.invalid_count, 1);
        assert_eq!(result.valid_count, 0);
        assert!(result.payloads.is_empty());
        assert!(result.failures[0].error.contains("schema validation"));

        let config = EngineConfig {
            skip_validation: true,
            ..EngineConfig::default()
        };
        let result = build_invoices(&rows, &schema, &config).unwrap();
        assert_eq!(result.valid_count, 1);
        assert_eq!(result.payload_values()[0]["documentNumber"], "ext-1");
    }

    #[test]
    fn test_custom_invoice_mapping_skips_invoice_schema() {
        let mut schema = invoice_schema();
        schema.kind = PayloadKind::Custom;
        schema.identity.target = "documentNumber".to_string();
        let rows = vec![row(&[("externalId", "ext-1"), ("netAmount", "1")])];

        let result = build_invoices(&rows, &schema, &EngineConfig::default()).unwrap();
        assert!(result.is_clean());
        assert_eq!(result.valid_count, 1);
        assert_eq!(result.invalid_count, 0);
        assert_eq!(result.payloads[0].record, "ext-1");
        assert_eq!(result.payload_values()[0]["documentNumber"], "ext-1");
    }

    #[test]
    fn test_rows_from_value() {
        let rows = rows_from_value(&json!([{ "a": "1", "b": 2, "c": null }])).unwrap();
        assert_eq!(rows[0].get("a"), Some("1"));
        assert_eq!(rows[0].get("b"), Some("2"));
        assert_eq!(rows[0].get("c"), Some(""));

        assert!(matches!(rows_from_value(&json!({ "a": 1 })), Err(PipelineError::InvalidRows(_))));
        assert!(matches!(rows_from_value(&json!([1])), Err(PipelineError::InvalidRows(_))));
    }

    #[test]
    fn test_read_rows_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, r#"[{"LIFNR": "100"}, {"LIFNR": "200"}]"#).unwrap();
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(read_rows(&path), Err(PipelineError::Json(_))));
    }
}
