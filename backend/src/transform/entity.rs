//! Header+Children assembly.
//!
//! One primary row becomes one record. Subordinate tables are joined on the record's
//! identity and become child arrays; an optional extension table is joined 1:1 through
//! a reference column and fills scalar fields the primary row leaves empty.
//!
//! ```text
//! LFA1 row (LIFNR=100) ─┬─ LFB1 rows where LIFNR=100 → supplierSubsidiaries[]
//!                       └─ LFBK rows where LIFNR=100 → supplierBankAccounts[]
//!                                                        └─ iban ← TIBAN(BANKS, BANKL, BANKN)
//! ```

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::error::{ConfigResult, ValidationError, ValidationResult};
use crate::models::{AltNamePriority, Row};
use crate::transform::dsl::executor::{apply_rules, evaluate, insert_path, FieldContext};
use crate::transform::dsl::schema::{AliasSet, EntitySchema, IdListRule};
use crate::transform::extract::{self, IdPatterns};
use crate::transform::index::{ForeignIndex, JoinKey};
use crate::transform::prune::{prune, prune_map};
use crate::transform::resolve::{first_nonempty, resolve_opt};

/// Find a table by name, exact match first.
fn table<'a>(tables: &'a BTreeMap<String, Vec<Row>>, name: &str) -> &'a [Row] {
    tables
        .get(name)
        .or_else(|| {
            tables
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, rows)| rows)
        })
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Join key for a table: configured aliases win over the schema's.
fn join_key(config: &EngineConfig, table: &str, schema_key: &AliasSet) -> AliasSet {
    config
        .join_aliases(table)
        .map(|aliases| AliasSet::new(aliases.iter().cloned()))
        .unwrap_or_else(|| schema_key.clone())
}

/// Per-batch indexes for one entity schema.
///
/// Built once, then shared by every primary row. Absent tables index as empty, so every
/// relation degrades to a left join with no matches.
#[derive(Debug)]
pub struct BatchIndexes<'a> {
    relations: HashMap<String, ForeignIndex<'a>>,
    lookups: HashMap<String, ForeignIndex<'a>>,
    extension: Option<ForeignIndex<'a>>,
    id_patterns: Vec<IdPatterns>,
}

impl<'a> BatchIndexes<'a> {
    /// Index the subordinate and extension tables and compile identifier patterns.
    pub fn build(
        schema: &EntitySchema,
        subordinate: &'a BTreeMap<String, Vec<Row>>,
        extension: Option<&'a [Row]>,
        config: &EngineConfig,
    ) -> ConfigResult<Self> {
        let relations = schema
            .children
            .iter()
            .map(|relation| {
                let key = join_key(config, &relation.table, &relation.join);
                let index = ForeignIndex::build(table(subordinate, &relation.table), &[key]);
                (relation.table.clone(), index)
            })
            .collect();

        let lookups = schema
            .lookup_tables
            .iter()
            .map(|lookup| {
                let index = ForeignIndex::build(table(subordinate, &lookup.name), &lookup.key);
                (lookup.name.clone(), index)
            })
            .collect();

        let extension = match (&schema.extension, extension) {
            (Some(join), Some(rows)) => {
                let key = join_key(config, &join.table, &join.key);
                Some(ForeignIndex::build(rows, &[key]))
            }
            _ => None,
        };

        let id_patterns = schema
            .id_lists
            .iter()
            .map(|rule| IdPatterns::new(&rule.patterns))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            relations,
            lookups,
            extension,
            id_patterns,
        })
    }

    /// Extension row referenced by a primary row; the last one when the key repeats.
    fn extension_row(&self, schema: &EntitySchema, row: &Row) -> Option<&'a Row> {
        let join = schema.extension.as_ref()?;
        let index = self.extension.as_ref()?;
        let key = JoinKey::from_row(row, std::slice::from_ref(&join.reference))?;
        index.lookup(&key).last().copied()
    }

    fn children(&self, table: &str, parent: &str) -> &[&'a Row] {
        self.relations
            .get(table)
            .map(|index| index.lookup_one(parent))
            .unwrap_or(&[])
    }
}

fn id_list(row: &Row, rule: &IdListRule, patterns: &IdPatterns) -> Option<Value> {
    let ids = extract::collect(row, patterns);
    if ids.is_empty() {
        return None;
    }
    let items = ids
        .into_iter()
        .map(|id| match &rule.wrap_key {
            Some(key) => {
                let mut obj = Map::new();
                obj.insert(key.clone(), Value::String(id));
                Value::Object(obj)
            }
            None => Value::String(id),
        })
        .collect();
    Some(Value::Array(items))
}

/// Assemble one record from a primary row.
///
/// `row_number` (1-based) labels the record in errors when it has no identity.
pub fn assemble_entity(
    row: &Row,
    row_number: usize,
    schema: &EntitySchema,
    indexes: &BatchIndexes<'_>,
    config: &EngineConfig,
) -> ValidationResult<Value> {
    let row_label = format!("row {row_number}");
    let ext_row = indexes.extension_row(schema, row);
    let probe = FieldContext::new(&row_label, &config.overrides).with_extension(ext_row);

    let identity = evaluate(row, &schema.identity, &probe)
        .ok_or_else(|| ValidationError::MissingIdentity {
            record: row_label.clone(),
            field: schema.identity.target.clone(),
        })?
        .value;
    let identity = match identity {
        Value::String(s) => s,
        other => other.to_string(),
    };

    let ctx = FieldContext::new(&identity, &config.overrides)
        .with_extension(ext_row)
        .with_lookups(&indexes.lookups);

    let mut record = Map::new();
    insert_path(&mut record, &schema.identity.target, Value::String(identity.clone()));
    apply_rules(row, &schema.fields, &ctx, &mut record)?;

    for rule in &schema.alt_names {
        let primary = resolve_opt(row, rule.primary.as_slice());
        let extension = ext_row.and_then(|ext| resolve_opt(ext, rule.extension.as_slice()));
        let value = match config.alt_name_priority {
            AltNamePriority::PrimaryFirst => first_nonempty([primary, extension]),
            AltNamePriority::ExtensionFirst => first_nonempty([extension, primary]),
        };
        if let Some(value) = value {
            insert_path(&mut record, &rule.target, Value::String(value.to_string()));
        }
    }

    for (rule, patterns) in schema.id_lists.iter().zip(&indexes.id_patterns) {
        if let Some(ids) = id_list(row, rule, patterns) {
            insert_path(&mut record, &rule.target, ids);
        }
    }

    let child_ctx = FieldContext::new(&identity, &config.overrides).with_lookups(&indexes.lookups);
    for relation in &schema.children {
        let mut children = Vec::new();
        for child in indexes.children(&relation.table, &identity) {
            let mut object = Map::new();
            apply_rules(child, &relation.fields, &child_ctx, &mut object)?;
            let object = prune_map(object);
            if !object.is_empty() {
                children.push(Value::Object(object));
            }
        }
        insert_path(&mut record, &relation.target, Value::Array(children));
    }

    Ok(prune(Value::Object(record)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::dsl::domains::{company_schema, supplier_schema, LFB1, LFBK, TIBAN};
    use serde_json::json;

    fn row(cells: &[(&str, &str)]) -> Row {
        cells.iter().copied().collect()
    }

    fn supplier_tables() -> BTreeMap<String, Vec<Row>> {
        BTreeMap::from([
            (
                LFB1.to_string(),
                vec![
                    row(&[("LIFNR", "100"), ("BUKRS", "1000"), ("ZTERM", "Z030"), ("SPERR", "X")]),
                    row(&[("LIFNR", "100"), ("BUKRS", "2000"), ("ZTERM", ""), ("SPERR", "")]),
                    row(&[("LIFNR", "300"), ("BUKRS", "1000")]),
                ],
            ),
            (
                LFBK.to_string(),
                vec![
                    row(&[("LIFNR", "100"), ("BANKS", "DE"), ("BANKL", "10020030"), ("BANKN", "12345")]),
                    row(&[("LIFNR", "100"), ("BANKS", "DE"), ("BANKL", ""), ("BANKN", "999")]),
                ],
            ),
            (
                TIBAN.to_string(),
                vec![
                    row(&[("BANKS", "DE"), ("BANKL", "10020030"), ("BANKN", "12345"), ("IBAN", "DE89 OLD")]),
                    row(&[("BANKS", "DE"), ("BANKL", "10020030"), ("BANKN", "12345"), ("IBAN", "DE89370400440532013000")]),
                ],
            ),
        ])
    }

    #[test]
    fn test_supplier_with_children() {
        let schema = supplier_schema();
        let tables = supplier_tables();
        let config = EngineConfig::default();
        let indexes = BatchIndexes::build(&schema, &tables, None, &config).unwrap();

        let vendor = row(&[
            ("Kreditor", "100"),
            ("Name 1", "Müller Logistik GmbH"),
            ("Ort", "Köln"),
            ("STCD1", "DE111"),
            ("STCEG", "DE999; DE998"),
        ]);
        let record = assemble_entity(&vendor, 1, &schema, &indexes, &config).unwrap();

        assert_eq!(
            record,
            json!({
                "vendorId": "100",
                "companyName": "Müller Logistik GmbH",
                "city": "Köln",
                "taxIds": ["DE111"],
                "vatIds": ["DE999", "DE998"],
                "supplierSubsidiaries": [
                    { "externalCompanyId": "1000", "paymentTerms": { "paymentTermKey": "Z030" }, "blockedForPayment": true },
                    { "externalCompanyId": "2000", "blockedForPayment": false }
                ],
                "supplierBankAccounts": [
                    { "externalId": "DE1002003012345", "bankAccountNumber": "12345", "iban": "DE89370400440532013000" },
                    { "bankAccountNumber": "999" }
                ]
            })
        );
    }

    #[test]
    fn test_unmatched_vendor_is_left_join() {
        let schema = supplier_schema();
        let tables = supplier_tables();
        let config = EngineConfig::default();
        let indexes = BatchIndexes::build(&schema, &tables, None, &config).unwrap();

        let record = assemble_entity(&row(&[("LIFNR", "555"), ("NAME1", "Solo")]), 1, &schema, &indexes, &config).unwrap();
        assert_eq!(record, json!({ "vendorId": "555", "companyName": "Solo" }));
    }

    #[test]
    fn test_missing_subordinate_tables() {
        let schema = supplier_schema();
        let tables = BTreeMap::new();
        let config = EngineConfig::default();
        let indexes = BatchIndexes::build(&schema, &tables, None, &config).unwrap();

        let record = assemble_entity(&row(&[("LIFNR", "100")]), 1, &schema, &indexes, &config).unwrap();
        assert_eq!(record, json!({ "vendorId": "100" }));
    }

    #[test]
    fn test_missing_identity_names_row() {
        let schema = supplier_schema();
        let tables = BTreeMap::new();
        let config = EngineConfig::default();
        let indexes = BatchIndexes::build(&schema, &tables, None, &config).unwrap();

        let err = assemble_entity(&row(&[("NAME1", "Anonymous")]), 4, &schema, &indexes, &config).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingIdentity {
                record: "row 4".into(),
                field: "vendorId".into()
            }
        );
    }

    #[test]
    fn test_configured_join_key() {
        let schema = supplier_schema();
        let tables = BTreeMap::from([(
            LFB1.to_string(),
            vec![row(&[("Vendor", "100"), ("BUKRS", "1000")])],
        )]);
        let mut config = EngineConfig::default();
        config.join_key_aliases.insert("lfb1".into(), vec!["Vendor".into()]);
        let indexes = BatchIndexes::build(&schema, &tables, None, &config).unwrap();

        let record = assemble_entity(&row(&[("LIFNR", "100")]), 1, &schema, &indexes, &config).unwrap();
        assert_eq!(record["supplierSubsidiaries"], json!([{ "externalCompanyId": "1000", "blockedForPayment": false }]));
    }

    fn adrc() -> Vec<Row> {
        vec![row(&[
            ("ADDRNUMBER", "0000022817"),
            ("NAME1", "ACME Holding AG"),
            ("NAME2", "ACME Alt One"),
            ("NAME3", "ACME Alt Two"),
            ("STREET", "Hauptstraße 1"),
            ("CITY1", "Walldorf"),
            ("POST_CODE1", "69190"),
            ("COUNTRY", "DE"),
        ])]
    }

    #[test]
    fn test_company_extension_fallback() {
        let schema = company_schema();
        let tables = BTreeMap::new();
        let ext = adrc();
        let mut config = EngineConfig::default();
        config.overrides.insert("externalClientId".into(), "client-1".into());
        let indexes = BatchIndexes::build(&schema, &tables, Some(ext.as_slice()), &config).unwrap();

        let t001 = row(&[
            ("BUKRS", "1000"),
            ("BUTXT", ""),
            ("ORT01", "Berlin"),
            ("ADRNR", "0000022817"),
            ("NAME2", "T001 Alt"),
            ("STCD1", "111/222"),
            ("STCEG", "DE123456789"),
        ]);
        let record = assemble_entity(&t001, 1, &schema, &indexes, &config).unwrap();

        assert_eq!(record["externalId"], json!("1000"));
        assert_eq!(record["externalClientId"], json!("client-1"));
        assert_eq!(record["companyName"], json!("ACME Holding AG"));
        assert_eq!(record["city"], json!("Berlin"));
        assert_eq!(record["address"], json!("Hauptstraße 1"));
        assert_eq!(record["postcode"], json!("69190"));
        assert_eq!(record["nameAlternative1"], json!("T001 Alt"));
        assert_eq!(record["nameAlternative2"], json!("ACME Alt Two"));
        assert!(record.get("nameAlternative3").is_none());
        assert_eq!(record["taxIds"], json!([{ "taxId": "111/222" }]));
        assert_eq!(record["vatIds"], json!([{ "vatId": "DE123456789" }]));
    }

    #[test]
    fn test_extension_first_priority() {
        let schema = company_schema();
        let tables = BTreeMap::new();
        let ext = adrc();
        let config = EngineConfig {
            alt_name_priority: AltNamePriority::ExtensionFirst,
            ..EngineConfig::default()
        };
        let indexes = BatchIndexes::build(&schema, &tables, Some(ext.as_slice()), &config).unwrap();

        let t001 = row(&[
            ("BUKRS", "1000"),
            ("ADRNR", "0000022817"),
            ("NAME2", "T001 Alt"),
            ("NAME4", "T001 Alt Three"),
        ]);
        let record = assemble_entity(&t001, 1, &schema, &indexes, &config).unwrap();

        assert_eq!(record["nameAlternative1"], json!("ACME Alt One"));
        assert_eq!(record["nameAlternative3"], json!("T001 Alt Three"));
    }

    #[test]
    fn test_company_without_address_match() {
        let schema = company_schema();
        let tables = BTreeMap::new();
        let ext = adrc();
        let config = EngineConfig::default();
        let indexes = BatchIndexes::build(&schema, &tables, Some(ext.as_slice()), &config).unwrap();

        let record = assemble_entity(
            &row(&[("BUKRS", "2000"), ("BUTXT", "Own Name"), ("ADRNR", "404")]),
            1,
            &schema,
            &indexes,
            &config,
        )
        .unwrap();
        assert_eq!(record, json!({ "externalId": "2000", "companyName": "Own Name" }));
    }

    #[test]
    fn test_repeated_extension_key_uses_last_row() {
        let schema = company_schema();
        let tables = BTreeMap::new();
        let mut ext = adrc();
        ext.push(row(&[
            ("ADDRNUMBER", "0000022817"),
            ("NAME1", "ACME Renamed AG"),
            ("CITY1", "Heidelberg"),
        ]));
        let config = EngineConfig::default();
        let indexes = BatchIndexes::build(&schema, &tables, Some(ext.as_slice()), &config).unwrap();

        let t001 = row(&[("BUKRS", "1000"), ("ADRNR", "0000022817")]);
        let record = assemble_entity(&t001, 1, &schema, &indexes, &config).unwrap();

        assert_eq!(record["companyName"], json!("ACME Renamed AG"));
        assert_eq!(record["city"], json!("Heidelberg"));
        assert!(record.get("address").is_none());
    }
}
