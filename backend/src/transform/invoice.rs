//! Header+Lines assembly.
//!
//! One [`RowGroup`] becomes one document: header fields come from the group's first
//! row, every row becomes a line, and the header totals are exact decimal sums over
//! the lines.
//!
//! # Tax attribution
//!
//! ```text
//! TaxMode::Line    row 1 tax ─┐
//!                  row 2 tax ─┼─ Σ → totalTaxAmount   (each line keeps its own tax)
//!                  row n tax ─┘
//!
//! TaxMode::Header  row 1 tax ─── totalTaxAmount       (lines carry no tax)
//! ```

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::error::{ValidationError, ValidationResult};
use crate::models::{Row, RowGroup, TaxMode};
use crate::transform::amount::{parse_decimal, to_json_number, Totals};
use crate::transform::dsl::executor::{apply_rules, build_nested, insert_path, FieldContext};
use crate::transform::dsl::schema::{AliasSet, InvoiceSchema};
use crate::transform::prune::prune;
use crate::transform::resolve::resolve_opt;

fn amount(row: &Row, aliases: &AliasSet) -> Option<Decimal> {
    resolve_opt(row, aliases.as_slice()).and_then(parse_decimal)
}

fn insert_amount(map: &mut Map<String, Value>, field: &str, value: Decimal) {
    if let Some(number) = to_json_number(value) {
        map.insert(field.to_string(), number);
    }
}

fn overflow(group: &RowGroup, field: &str) -> ValidationError {
    ValidationError::AmountOverflow {
        record: group.key.clone(),
        field: field.to_string(),
    }
}

/// Assemble one document from a group of rows.
///
/// Fails when the document identity cannot be resolved from the first row or the
/// overrides, or when a total leaves the decimal range. Every other missing or
/// malformed field is left out.
pub fn assemble_invoice(
    group: &RowGroup,
    schema: &InvoiceSchema,
    config: &EngineConfig,
) -> ValidationResult<Value> {
    let ctx = FieldContext::new(&group.key, &config.overrides);
    let first = group.first();
    let columns = &schema.amounts;

    let mut header = Map::new();
    apply_rules(first, std::slice::from_ref(&schema.identity), &ctx, &mut header)?;
    apply_rules(first, &schema.header, &ctx, &mut header)?;
    for rule in &schema.header_objects {
        if let Some(value) = build_nested(first, rule, &ctx)? {
            insert_path(&mut header, &rule.target, value);
        }
    }

    let mut totals = Totals::default();
    let mut lines = Vec::with_capacity(group.len());

    for row in group.rows() {
        let mut line = Map::new();
        apply_rules(row, &schema.line, &ctx, &mut line)?;

        for field in &schema.line_inherits {
            if !line.contains_key(field) {
                if let Some(value) = header.get(field) {
                    line.insert(field.clone(), value.clone());
                }
            }
        }

        if let Some(net) = amount(row, &columns.net) {
            totals.add_net(net).map_err(|_| overflow(group, "totalNetAmount"))?;
            insert_amount(&mut line, "netAmount", net);
        }
        if let Some(gross) = amount(row, &columns.gross) {
            totals.add_gross(gross).map_err(|_| overflow(group, "totalGrossAmount"))?;
            insert_amount(&mut line, "grossAmount", gross);
        }
        if config.tax_mode == TaxMode::Line {
            if let Some(tax) = amount(row, &columns.tax) {
                totals.add_tax(tax).map_err(|_| overflow(group, "totalTaxAmount"))?;
                insert_amount(&mut line, "totalTaxAmount", tax);
            }
        }

        for rule in &schema.line_objects {
            if let Some(value) = build_nested(row, rule, &ctx)? {
                insert_path(&mut line, &rule.target, value);
            }
        }

        lines.push(Value::Object(line));
    }

    let freight = amount(first, &columns.freight).unwrap_or(Decimal::ZERO);
    let other = amount(first, &columns.other).unwrap_or(Decimal::ZERO);
    let tax = match config.tax_mode {
        TaxMode::Line => Some(totals.tax),
        TaxMode::Header => amount(first, &columns.tax),
    };

    insert_amount(&mut header, "totalNetAmount", totals.net);
    insert_amount(&mut header, "totalFreightCharges", freight);
    insert_amount(&mut header, "totalOtherCharges", other);
    if let Some(tax) = tax {
        insert_amount(&mut header, "totalTaxAmount", tax);
    }
    let gross = totals
        .gross_total(tax.unwrap_or(Decimal::ZERO), freight, other)
        .map_err(|_| overflow(group, "totalGrossAmount"))?;
    insert_amount(&mut header, "totalGrossAmount", gross);
    header.insert(schema.lines_target.clone(), Value::Array(lines));

    Ok(prune(Value::Object(header)))
}
