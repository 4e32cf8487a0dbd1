//! Field rule evaluation.
//!
//! A rule's value is looked up in a fixed order:
//!
//! ```text
//! row columns → extension row → override → operations → default
//! ```
//!
//! The first step that yields a non-empty value wins. Operations then run on it; an
//! operation that rejects the value makes the field absent, after which the default
//! (if any) applies.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use super::schema::{FieldRule, FieldSource, NestedRule};
use crate::error::{ValidationError, ValidationResult};
use crate::models::{is_blank, Row};
use crate::transform::index::{ForeignIndex, JoinKey};
use crate::transform::resolve::resolve_opt;

/// Everything a rule can read besides the current row.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'c, 'a> {
    /// Label of the record being built, used in error messages.
    pub record: &'c str,
    pub overrides: &'c BTreeMap<String, String>,
    /// Matched extension-table row, if any.
    pub extension: Option<&'a Row>,
    pub lookups: Option<&'c HashMap<String, ForeignIndex<'a>>>,
}

impl<'c, 'a> FieldContext<'c, 'a> {
    pub fn new(record: &'c str, overrides: &'c BTreeMap<String, String>) -> Self {
        Self {
            record,
            overrides,
            extension: None,
            lookups: None,
        }
    }

    pub fn with_extension(mut self, extension: Option<&'a Row>) -> Self {
        self.extension = extension;
        self
    }

    pub fn with_lookups(mut self, lookups: &'c HashMap<String, ForeignIndex<'a>>) -> Self {
        self.lookups = Some(lookups);
        self
    }

    /// Non-blank override for a key.
    pub fn override_value(&self, key: &str) -> Option<&'c str> {
        self.overrides
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !is_blank(v))
    }
}

/// A field value and whether it came from the data (row, extension, override) rather
/// than from a constant or default.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub from_data: bool,
}

/// Evaluate one rule against a row.
pub fn evaluate(row: &Row, rule: &FieldRule, ctx: &FieldContext<'_, '_>) -> Option<Resolved> {
    let mut from_data = true;

    let raw = match &rule.source {
        FieldSource::Constant { value } => {
            from_data = false;
            Some(value.clone())
        }
        source => source_value(row, source, ctx),
    };

    let raw = raw
        .or_else(|| {
            let ext_row = ctx.extension?;
            let aliases = rule.extension.as_ref()?;
            resolve_opt(ext_row, aliases.as_slice()).map(|v| Value::String(v.to_string()))
        })
        .or_else(|| {
            let key = rule.override_key.as_deref()?;
            ctx.override_value(key).map(|v| Value::String(v.to_string()))
        });

    let value = raw.and_then(|v| {
        rule.operations
            .iter()
            .try_fold(v, |acc, op| op.apply(&acc))
    });

    match value {
        Some(value) if !is_absent(&value) => Some(Resolved { value, from_data }),
        _ => rule.default.clone().map(|value| Resolved {
            value,
            from_data: false,
        }),
    }
}

fn source_value(row: &Row, source: &FieldSource, ctx: &FieldContext<'_, '_>) -> Option<Value> {
    match source {
        FieldSource::Columns { aliases } => {
            resolve_opt(row, aliases.as_slice()).map(|v| Value::String(v.to_string()))
        }
        FieldSource::Concat { parts, separator } => {
            let key = JoinKey::from_row(row, parts)?;
            Some(Value::String(key.parts().join(separator)))
        }
        FieldSource::Prefixed { prefix } => {
            let fields: Map<String, Value> = row
                .iter()
                .filter_map(|(column, value)| {
                    let name = column.trim().strip_prefix(prefix.as_str())?;
                    if name.is_empty() || is_blank(value) {
                        return None;
                    }
                    Some((name.to_string(), Value::String(value.trim().to_string())))
                })
                .collect();
            (!fields.is_empty()).then_some(Value::Object(fields))
        }
        FieldSource::Lookup { table, key, value } => {
            let index = ctx.lookups?.get(table)?;
            let join = JoinKey::from_row(row, key)?;
            index
                .lookup(&join)
                .iter()
                .rev()
                .find_map(|r| resolve_opt(r, value.as_slice()))
                .map(|v| Value::String(v.to_string()))
        }
        FieldSource::Constant { value } => Some(value.clone()),
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Evaluate rules into `out`.
///
/// Returns whether any value came from the data. A required rule without value fails
/// with [`ValidationError::MissingIdentity`].
pub fn apply_rules(
    row: &Row,
    rules: &[FieldRule],
    ctx: &FieldContext<'_, '_>,
    out: &mut Map<String, Value>,
) -> ValidationResult<bool> {
    let mut any_data = false;

    for rule in rules {
        match evaluate(row, rule, ctx) {
            Some(resolved) => {
                any_data |= resolved.from_data && !rule.passive;
                insert_path(out, &rule.target, resolved.value);
            }
            None if rule.required => {
                return Err(ValidationError::MissingIdentity {
                    record: ctx.record.to_string(),
                    field: rule.target.clone(),
                });
            }
            None => {}
        }
    }

    Ok(any_data)
}

/// Build a composite field. `None` unless at least one non-passive value came from the
/// data, in its own fields or in a nested child.
pub fn build_nested(
    row: &Row,
    rule: &NestedRule,
    ctx: &FieldContext<'_, '_>,
) -> ValidationResult<Option<Value>> {
    build_object(row, rule, ctx, false)
}

fn build_object(
    row: &Row,
    rule: &NestedRule,
    ctx: &FieldContext<'_, '_>,
    force: bool,
) -> ValidationResult<Option<Value>> {
    let mut object = Map::new();
    let mut built = apply_rules(row, &rule.fields, ctx, &mut object)?;

    let mut children = Vec::with_capacity(rule.nested.len());
    for nested in &rule.nested {
        let value = build_object(row, nested, ctx, false)?;
        built |= value.is_some();
        children.push((nested, value));
    }

    if !built && !force {
        return Ok(None);
    }

    for (nested, value) in children {
        let value = match value {
            Some(value) => Some(value),
            None if nested.follows_parent => build_object(row, nested, ctx, true)?,
            None => None,
        };
        if let Some(value) = value {
            insert_path(&mut object, &nested.target, value);
        }
    }

    let value = Value::Object(object);
    Ok(Some(if rule.list {
        Value::Array(vec![value])
    } else {
        value
    }))
}

/// Insert a value at a dotted path, creating intermediate objects.
pub fn insert_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::dsl::operations::Operation;
    use crate::transform::dsl::schema::AliasSet;
    use serde_json::json;

    fn row(cells: &[(&str, &str)]) -> Row {
        cells.iter().copied().collect()
    }

    fn no_overrides() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn test_row_value_beats_override() {
        let overrides = BTreeMap::from([("currency".to_string(), "USD".to_string())]);
        let ctx = FieldContext::new("ext-1", &overrides);
        let rule = FieldRule::columns("currency", ["currency"]).with_override("currency");

        let hit = evaluate(&row(&[("currency", "EUR")]), &rule, &ctx).unwrap();
        assert_eq!(hit.value, json!("EUR"));

        let fallback = evaluate(&row(&[("currency", "")]), &rule, &ctx).unwrap();
        assert_eq!(fallback.value, json!("USD"));
        assert!(fallback.from_data);
    }

    #[test]
    fn test_extension_before_override() {
        let overrides = BTreeMap::from([("companyName".to_string(), "Fallback".to_string())]);
        let ext = row(&[("NAME1", "ACME Address Name")]);
        let ctx = FieldContext::new("1000", &overrides).with_extension(Some(&ext));
        let rule = FieldRule::columns("companyName", ["BUTXT"])
            .with_extension(["NAME1"])
            .with_override("companyName");

        let resolved = evaluate(&row(&[("BUTXT", " ")]), &rule, &ctx).unwrap();
        assert_eq!(resolved.value, json!("ACME Address Name"));
    }

    #[test]
    fn test_failed_operation_falls_to_default() {
        let overrides = no_overrides();
        let ctx = FieldContext::new("r", &overrides);
        let rule = FieldRule::columns("quantity", ["quantity"])
            .with_operation(Operation::ToNumber)
            .with_default(json!(0));

        let resolved = evaluate(&row(&[("quantity", "many")]), &rule, &ctx).unwrap();
        assert_eq!(resolved.value, json!(0));
        assert!(!resolved.from_data);

        let without_default = FieldRule::columns("quantity", ["quantity"]).with_operation(Operation::ToNumber);
        assert!(evaluate(&row(&[("quantity", "many")]), &without_default, &ctx).is_none());
    }

    #[test]
    fn test_concat_requires_every_part() {
        let overrides = no_overrides();
        let ctx = FieldContext::new("r", &overrides);
        let rule = FieldRule::concat(
            "externalId",
            vec![AliasSet::from("BANKS"), AliasSet::from("BANKL"), AliasSet::from("BANKN")],
            "",
        );

        let full = row(&[("BANKS", "DE"), ("BANKL", "100"), ("BANKN", "42")]);
        assert_eq!(evaluate(&full, &rule, &ctx).unwrap().value, json!("DE10042"));

        let partial = row(&[("BANKS", "DE"), ("BANKN", "42")]);
        assert!(evaluate(&partial, &rule, &ctx).is_none());
    }

    #[test]
    fn test_prefixed_columns_become_object() {
        let overrides = no_overrides();
        let ctx = FieldContext::new("r", &overrides);
        let rule = FieldRule::prefixed("customFields", "customFields.");
        let source = row(&[
            ("customFields.costObject", "CO-1"),
            ("customFields.empty", ""),
            ("line.customFields.other", "x"),
        ]);

        assert_eq!(
            evaluate(&source, &rule, &ctx).unwrap().value,
            json!({ "costObject": "CO-1" })
        );
    }

    #[test]
    fn test_lookup_last_match_wins() {
        let tiban = vec![
            row(&[("BANKS", "DE"), ("IBAN", "DE-OLD")]),
            row(&[("BANKS", "DE"), ("IBAN", "DE-NEW")]),
            row(&[("BANKS", "DE"), ("IBAN", "")]),
        ];
        let key = vec![AliasSet::from("BANKS")];
        let lookups = HashMap::from([("TIBAN".to_string(), ForeignIndex::build(&tiban, &key))]);
        let overrides = no_overrides();
        let ctx = FieldContext::new("r", &overrides).with_lookups(&lookups);

        let rule = FieldRule::lookup("iban", "TIBAN", vec![AliasSet::from("Land")], AliasSet::from("IBAN"));
        assert_eq!(
            evaluate(&row(&[("Land", "DE")]), &rule, &ctx).unwrap().value,
            json!("DE-NEW")
        );
        assert!(evaluate(&row(&[("Land", "AT")]), &rule, &ctx).is_none());
    }

    #[test]
    fn test_required_rule_fails_record() {
        let overrides = no_overrides();
        let ctx = FieldContext::new("row 4", &overrides);
        let rules = vec![FieldRule::columns("vendorId", ["LIFNR"]).required()];
        let mut out = Map::new();

        let err = apply_rules(&row(&[("NAME1", "x")]), &rules, &ctx, &mut out).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingIdentity {
                record: "row 4".into(),
                field: "vendorId".into()
            }
        );
    }

    #[test]
    fn test_nested_needs_data_field() {
        let overrides = no_overrides();
        let ctx = FieldContext::new("r", &overrides);
        let rule = NestedRule::list(
            "documents",
            vec![
                FieldRule::columns("id", ["documentId"]),
                FieldRule::constant("type", json!("invoice")),
            ],
        );

        assert_eq!(build_nested(&row(&[]), &rule, &ctx).unwrap(), None);
        assert_eq!(
            build_nested(&row(&[("documentId", "DOC-1")]), &rule, &ctx).unwrap(),
            Some(json!([{ "id": "DOC-1", "type": "invoice" }]))
        );
    }

    #[test]
    fn test_child_following_parent() {
        let overrides = no_overrides();
        let ctx = FieldContext::new("r", &overrides);
        let rule = NestedRule::object("terms", vec![FieldRule::columns("key", ["termKey"])]).with_nested(
            NestedRule::list(
                "descriptions",
                vec![
                    FieldRule::columns("text", ["termText"]),
                    FieldRule::columns("language", ["termLanguage"])
                        .with_default(json!("en"))
                        .passive(),
                ],
            )
            .follows_parent(),
        );

        assert_eq!(build_nested(&row(&[("termLanguage", "de")]), &rule, &ctx).unwrap(), None);
        assert_eq!(
            build_nested(&row(&[("termKey", "K1")]), &rule, &ctx).unwrap(),
            Some(json!({ "key": "K1", "descriptions": [{ "language": "en" }] }))
        );
        assert_eq!(
            build_nested(&row(&[("termText", "net 30")]), &rule, &ctx).unwrap(),
            Some(json!({ "descriptions": [{ "text": "net 30", "language": "en" }] }))
        );

        let mut detached = rule.clone();
        detached.nested[0].follows_parent = false;
        assert_eq!(
            build_nested(&row(&[("termKey", "K1")]), &detached, &ctx).unwrap(),
            Some(json!({ "key": "K1" }))
        );
    }

    #[test]
    fn test_insert_path_creates_objects() {
        let mut map = Map::new();
        insert_path(&mut map, "paymentTerms.paymentTermKey", json!("Z030"));
        insert_path(&mut map, "paymentTerms.days", json!(30));
        insert_path(&mut map, "name", json!("x"));

        assert_eq!(
            Value::Object(map),
            json!({ "paymentTerms": { "paymentTermKey": "Z030", "days": 30 }, "name": "x" })
        );
    }
}
