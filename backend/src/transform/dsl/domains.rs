//! Built-in mapping schemas.
//!
//! Column names cover both SAP technical names (`LIFNR`, `BUKRS`) and the German UI
//! labels the same exports carry when downloaded from the GUI (`Kreditor`, `BuKr`).

use serde_json::json;

use super::operations::Operation;
use super::schema::{
    AliasSet, AltNameRule, AmountColumns, ChildRelation, EntitySchema, ExtensionJoin, FieldRule,
    IdListRule, InvoiceSchema, LookupTable, NestedRule,
};
use crate::models::PayloadKind;

/// Subordinate table names used by the supplier schema.
pub const LFB1: &str = "LFB1";
pub const LFBK: &str = "LFBK";
pub const TIBAN: &str = "TIBAN";

/// Extension table used by the company schema.
pub const ADRC: &str = "ADRC";

// =============================================================================
// Invoices
// =============================================================================

/// Invoice documents with line items.
pub fn invoice_schema() -> InvoiceSchema {
    let date = |target: &str| FieldRule::columns(target, [target]).with_operation(Operation::NormalizeDate);
    let flag = |target: &str| FieldRule::columns(target, [target]).with_operation(Operation::to_boolean());
    let plain = |target: &str| FieldRule::columns(target, [target]);
    let overridable = |target: &str| FieldRule::columns(target, [target]).with_override(target);
    let number = |target: &str, column: &str| FieldRule::columns(target, [column]).with_operation(Operation::ToNumber);

    InvoiceSchema {
        kind: PayloadKind::Invoice,
        identity: overridable("externalId").required(),
        header: vec![
            overridable("externalClientId"),
            overridable("documentId"),
            plain("supplierInvoiceNumber"),
            plain("invoiceNumber"),
            overridable("externalCompanyId"),
            overridable("externalSupplierId"),
            plain("externalBankAccountId"),
            plain("fiscalYearLabel"),
            date("issuedDate"),
            date("receivedDate"),
            date("postingDate"),
            flag("isCanceled"),
            flag("isCreditNote"),
            plain("externalCustomerId"),
            plain("relatedInvoice"),
            overridable("currency"),
            plain("externalApproverId"),
            FieldRule::prefixed("customFields", "customFields."),
            plain("customMetadata").with_operation(Operation::ParseJson),
            plain("headerText"),
            plain("type"),
            plain("documentType"),
        ],
        header_objects: vec![
            NestedRule::list(
                "documents",
                vec![
                    FieldRule::columns("id", ["documentId"]).with_override("documentId"),
                    FieldRule::constant("type", json!("invoice")),
                ],
            ),
            NestedRule::object(
                "paymentTerms",
                vec![FieldRule::columns("paymentTermKey", ["paymentTermKey"])],
            )
            .with_nested(NestedRule::list(
                "descriptions",
                vec![
                    FieldRule::columns("text", ["paymentTermText"]),
                    FieldRule::columns("language", ["paymentTermLanguage"])
                        .with_default(json!("en"))
                        .passive(),
                ],
            )
            .follows_parent()),
            NestedRule::list(
                "withholdingTax",
                vec![
                    FieldRule::columns("key", ["wht.key"]),
                    number("baseAmount", "wht.baseAmount"),
                    number("amount", "wht.amount"),
                    FieldRule::columns("currency", ["wht.currency", "currency"])
                        .with_override("currency")
                        .passive(),
                ],
            ),
        ],
        lines_target: "invoiceLines".to_string(),
        line: vec![
            FieldRule::columns("externalId", ["line.externalId", "lineExternalId"]),
            FieldRule::columns("externalCompanyId", ["line.externalCompanyId"]),
            FieldRule::columns("type", ["line.type", "type"]),
            number("quantity", "quantity"),
            plain("unitOfMeasure"),
            number("unitPrice", "unitPrice"),
            plain("taxJurisdictionCode"),
            plain("itemText"),
            plain("externalPurchaseOrderId"),
            plain("purchaseOrderLineNumber"),
            plain("centralBankIndicator"),
            FieldRule::prefixed("customFields", "line.customFields."),
            FieldRule::columns("customMetadata", ["line.customMetadata"]).with_operation(Operation::ParseJson),
        ],
        line_objects: vec![
            NestedRule::object(
                "taxCode",
                vec![
                    FieldRule::columns("code", ["taxCode.code", "taxCodeCode"]),
                    FieldRule::columns("description", ["taxCode.description", "taxCodeDescription"]),
                ],
            ),
            NestedRule::list(
                "accountAssignments",
                vec![
                    plain("externalGlAccountId"),
                    plain("externalCostCenterId"),
                    plain("glAccountCode"),
                    plain("costCenterCode"),
                    number("quantity", "aa.quantity"),
                    plain("externalProjectId"),
                    plain("externalOrderId"),
                    plain("costElementCode"),
                ],
            ),
        ],
        line_inherits: vec!["externalCompanyId".to_string()],
        amounts: AmountColumns::default(),
    }
}

// =============================================================================
// Suppliers (LFA1 + LFB1 + LFBK + TIBAN)
// =============================================================================

fn vendor_key() -> AliasSet {
    AliasSet::new(["Kreditor", "LIFNR"])
}

fn bank_key() -> Vec<AliasSet> {
    vec![
        AliasSet::new(["Land", "BANKS"]),
        AliasSet::new(["Bankschlüssel", "BANKL"]),
        AliasSet::new(["Bankkonto", "BANKN"]),
    ]
}

/// Vendor master records with company-code data and bank accounts.
pub fn supplier_schema() -> EntitySchema {
    EntitySchema {
        name: "suppliers".to_string(),
        kind: PayloadKind::Supplier,
        identity: FieldRule::columns("vendorId", ["Kreditor", "LIFNR"]).required(),
        fields: vec![
            FieldRule::columns("companyName", ["Name 1", "NAME1"]),
            FieldRule::columns("address", ["Straße", "STRAS"]),
            FieldRule::columns("city", ["Ort", "ORT01"]),
            FieldRule::columns("postcode", ["Postleitz.", "PSTLZ"]),
            FieldRule::columns("country", ["Lnd", "LAND1"]),
        ],
        alt_names: Vec::new(),
        id_lists: vec![
            IdListRule::strings(
                "taxIds",
                [r"steuernummer( ?\d+)?", r"stcd\d*", r"tax[_-]?(id|number)", r"taxno"],
            ),
            IdListRule::strings(
                "vatIds",
                [r"umsatzsteuer-id\.?nr\.?", r"stceg(_?\d+)?", r"vat[_-]?(id|number)", r"vatno"],
            ),
        ],
        children: vec![
            ChildRelation {
                target: "supplierSubsidiaries".to_string(),
                table: LFB1.to_string(),
                join: vendor_key(),
                fields: vec![
                    FieldRule::columns("externalCompanyId", ["BuKr", "BUKRS"]),
                    FieldRule::columns("paymentTerms.paymentTermKey", ["Zbed", "ZTERM"]),
                    FieldRule::columns("blockedForPayment", ["S", "SPERR"])
                        .with_operation(Operation::flag())
                        .with_default(json!(false)),
                ],
            },
            ChildRelation {
                target: "supplierBankAccounts".to_string(),
                table: LFBK.to_string(),
                join: vendor_key(),
                fields: vec![
                    FieldRule::concat("externalId", bank_key(), ""),
                    FieldRule::columns("bankAccountNumber", ["Bankkonto", "BANKN"]),
                    FieldRule::lookup("iban", TIBAN, bank_key(), AliasSet::from("IBAN")),
                ],
            },
        ],
        lookup_tables: vec![LookupTable {
            name: TIBAN.to_string(),
            key: bank_key(),
        }],
        extension: None,
    }
}

// =============================================================================
// Companies (T001 + ADRC)
// =============================================================================

/// Company codes with an optional address extension.
pub fn company_schema() -> EntitySchema {
    let tax_patterns = [r"stcd(_?\d+)?", r"tax[_-]?id", r"tax[_-]?number", r"taxno"];
    let vat_patterns = [r"stceg(_?\d+)?", r"vat[_-]?id", r"vat[_-]?number", r"vatno"];

    EntitySchema {
        name: "companies".to_string(),
        kind: PayloadKind::Company,
        identity: FieldRule::columns("externalId", ["BUKRS"]).required(),
        fields: vec![
            FieldRule::override_only("externalClientId"),
            FieldRule::columns("companyName", ["BUTXT"]).with_extension(["NAME1"]),
            FieldRule::columns("address", ["STRAS"]).with_extension(["STREET"]),
            FieldRule::columns("city", ["ORT01"]).with_extension(["CITY1"]),
            FieldRule::columns("postcode", ["PSTLZ"]).with_extension(["POST_CODE1"]),
            FieldRule::columns("country", ["LAND1"]).with_extension(["COUNTRY"]),
        ],
        alt_names: (1..=3)
            .map(|n| {
                AltNameRule::new(
                    format!("nameAlternative{n}"),
                    AliasSet::new([format!("NAME{}", n + 1), format!("nameAlternative{n}")]),
                    AliasSet::new([format!("NAME{}", n + 1)]),
                )
            })
            .collect(),
        id_lists: vec![
            IdListRule::wrapped("taxIds", tax_patterns, "taxId"),
            IdListRule::wrapped("vatIds", vat_patterns, "vatId"),
        ],
        children: Vec::new(),
        lookup_tables: Vec::new(),
        extension: Some(ExtensionJoin {
            table: ADRC.to_string(),
            key: AliasSet::from("ADDRNUMBER"),
            reference: AliasSet::from("ADRNR"),
        }),
    }
}
