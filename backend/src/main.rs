//! Tabload CLI - Map exported rows to nested API payloads
//!
//! # Main Commands
//!
//! ```bash
//! tabload invoices rows.json                      # Header+Lines invoice documents
//! tabload suppliers --lfa1 lfa1.json --lfb1 ...   # Supplier records with children
//! tabload companies --t001 t001.json --adrc ...   # Company records
//! tabload lookup rows.json --type "Cost Centers"  # Flat lookup-table entries
//! tabload delete-ids rows.json                    # External ids for deletion
//! ```
//!
//! # Utility Commands
//!
//! ```bash
//! tabload prune doc.json                  # Drop empty values from a document
//! tabload validate supplier doc.json      # Validate documents against a payload schema
//! tabload schema company                  # Print a built-in mapping schema
//! tabload config                          # Print the effective configuration
//! ```
//!
//! Rows are read from JSON files holding an array of objects, one object per row.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tabload::models::{AltNamePriority, PayloadKind, TaxMode};
use tabload::transform::dsl::domains::{ADRC, LFB1, LFBK, TIBAN};
use tabload::transform::lookup::{collect_external_ids, missing_recommended_columns, row_payload, slugify_type};
use tabload::validation::{schema_source, validate_payload};
use tabload::{
    build_entities, build_invoices, company_schema, invoice_schema, prune, read_rows,
    supplier_schema, BatchResult, EngineConfig, EntitySchema, InvoiceSchema, SourceTables,
};

#[derive(Parser)]
#[command(name = "tabload")]
#[command(about = "Map flat tabular exports to nested API payloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the payload-building commands.
#[derive(clap::Args)]
struct BuildArgs {
    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Custom mapping schema file (default: built-in)
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Fallback value for a payload field, as field=value (repeatable)
    #[arg(long = "override", value_name = "FIELD=VALUE")]
    overrides: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip payload schema validation
    #[arg(long)]
    no_validate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build invoice documents from line rows
    Invoices {
        /// Input rows (JSON array)
        input: PathBuf,

        /// Read the tax total once from the header instead of summing lines
        #[arg(long)]
        header_tax: bool,

        /// Group key column alias, in priority order (repeatable)
        #[arg(long = "group-key")]
        group_keys: Vec<String>,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Build supplier records from LFA1 with subsidiaries and bank accounts
    Suppliers {
        /// Vendor master rows
        #[arg(long)]
        lfa1: PathBuf,

        /// Company-code data rows
        #[arg(long)]
        lfb1: Option<PathBuf>,

        /// Bank detail rows
        #[arg(long)]
        lfbk: Option<PathBuf>,

        /// IBAN rows
        #[arg(long)]
        tiban: Option<PathBuf>,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Build company records from T001 with an optional ADRC address extension
    Companies {
        /// Company code rows
        #[arg(long)]
        t001: PathBuf,

        /// Address rows
        #[arg(long)]
        adrc: Option<PathBuf>,

        /// Which table wins for alternate names: primary-first | extension-first
        #[arg(long)]
        alt_names: Option<String>,

        /// External client id written to every company
        #[arg(long)]
        client_id: Option<String>,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Convert rows to lookup-table entries
    Lookup {
        /// Input rows (JSON array)
        input: PathBuf,

        /// Lookup-table type name
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Fail when a recommended column is missing
        #[arg(long)]
        check_columns: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract the external ids of records to delete
    DeleteIds {
        /// Input rows (JSON array)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove null, empty string, empty list and empty object values
    Prune {
        /// Input JSON document
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate documents against a payload schema
    Validate {
        /// Payload kind: invoice | supplier | company
        kind: String,

        /// Input JSON file (one document or an array)
        input: PathBuf,
    },

    /// Print a built-in mapping schema
    Schema {
        /// Payload kind: invoice | supplier | company
        kind: String,

        /// Print the JSON Schema used for validation instead
        #[arg(long)]
        json_schema: bool,
    },

    /// Print the effective configuration (file + environment)
    Config {
        /// Engine configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Invoices {
            input,
            header_tax,
            group_keys,
            build,
        } => cmd_invoices(&input, header_tax, group_keys, &build),

        Commands::Suppliers {
            lfa1,
            lfb1,
            lfbk,
            tiban,
            build,
        } => {
            let subordinate = [(LFB1, lfb1), (LFBK, lfbk), (TIBAN, tiban)];
            cmd_suppliers(&lfa1, &subordinate, &build)
        }

        Commands::Companies {
            t001,
            adrc,
            alt_names,
            client_id,
            build,
        } => cmd_companies(&t001, adrc.as_deref(), alt_names.as_deref(), client_id, &build),

        Commands::Lookup {
            input,
            type_name,
            check_columns,
            output,
        } => cmd_lookup(&input, &type_name, check_columns, output.as_deref()),

        Commands::DeleteIds { input, output } => cmd_delete_ids(&input, output.as_deref()),

        Commands::Prune { input, output } => cmd_prune(&input, output.as_deref()),

        Commands::Validate { kind, input } => cmd_validate(&kind, &input),

        Commands::Schema { kind, json_schema } => cmd_schema(&kind, json_schema),

        Commands::Config { config } => cmd_config(config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn cmd_invoices(input: &Path, header_tax: bool, group_keys: Vec<String>, build: &BuildArgs) -> CliResult {
    eprintln!("📄 Processing: {}", input.display());

    let mut config = load_config(build)?;
    if header_tax {
        config.tax_mode = TaxMode::Header;
    }
    if !group_keys.is_empty() {
        config.group_key_aliases = group_keys;
    }

    let schema = match &build.schema {
        Some(path) => InvoiceSchema::from_json(&fs::read_to_string(path)?)?,
        None => invoice_schema(),
    };

    let rows = read_rows(input)?;
    let result = build_invoices(&rows, &schema, &config)?;
    finish_batch(&result, build.output.as_deref())
}

fn cmd_suppliers(lfa1: &Path, subordinate: &[(&str, Option<PathBuf>)], build: &BuildArgs) -> CliResult {
    eprintln!("📄 Processing: {}", lfa1.display());

    let config = load_config(build)?;
    let schema = entity_schema(build, supplier_schema)?;

    let mut tables = SourceTables::new(read_rows(lfa1)?);
    for (name, path) in subordinate {
        if let Some(path) = path {
            tables = tables.with_table(*name, read_rows(path)?);
        }
    }

    let result = build_entities(&tables, &schema, &config)?;
    finish_batch(&result, build.output.as_deref())
}

fn cmd_companies(
    t001: &Path,
    adrc: Option<&Path>,
    alt_names: Option<&str>,
    client_id: Option<String>,
    build: &BuildArgs,
) -> CliResult {
    eprintln!("📄 Processing: {}", t001.display());

    let mut config = load_config(build)?;
    if let Some(code) = alt_names {
        config.alt_name_priority = AltNamePriority::from_code(code)
            .ok_or_else(|| format!("Unknown alternate-name priority: {}", code))?;
    }
    if let Some(id) = client_id {
        config.overrides.insert("externalClientId".to_string(), id);
    }
    let schema = entity_schema(build, company_schema)?;

    let mut tables = SourceTables::new(read_rows(t001)?);
    if let Some(path) = adrc {
        eprintln!("   {}: {}", ADRC, path.display());
        tables = tables.with_extension(read_rows(path)?);
    }

    let result = build_entities(&tables, &schema, &config)?;
    finish_batch(&result, build.output.as_deref())
}

fn cmd_lookup(input: &Path, type_name: &str, check_columns: bool, output: Option<&Path>) -> CliResult {
    let slug = slugify_type(type_name);
    if slug.is_empty() {
        return Err(format!("Invalid lookup type: '{}'", type_name).into());
    }
    eprintln!("📋 Lookup table '{}': {}", slug, input.display());

    let rows = read_rows(input)?;
    let missing = missing_recommended_columns(&rows);
    if !missing.is_empty() {
        eprintln!("   ⚠️  Missing recommended columns: {}", missing.join(", "));
        if check_columns {
            std::process::exit(1);
        }
    }

    let entries: Vec<Value> = rows.iter().map(row_payload).collect();
    eprintln!("✅ {} entries", entries.len());

    let json = serde_json::to_string_pretty(&json!({ "type": slug, "entries": entries }))?;
    write_output(&json, output)
}

fn cmd_delete_ids(input: &Path, output: Option<&Path>) -> CliResult {
    let rows = read_rows(input)?;
    let ids = collect_external_ids(&rows);
    if ids.is_empty() {
        return Err("No external ids found (expected an externalId or id column)".into());
    }
    eprintln!("🗑️  {} external ids", ids.len());

    let json = serde_json::to_string_pretty(&ids)?;
    write_output(&json, output)
}

fn cmd_prune(input: &Path, output: Option<&Path>) -> CliResult {
    let content = fs::read_to_string(input)?;
    let document: Value = serde_json::from_str(&content)?;

    let json = serde_json::to_string_pretty(&prune(document))?;
    write_output(&json, output)
}

fn cmd_validate(kind: &str, input: &Path) -> CliResult {
    let kind = parse_kind(kind)?;
    eprintln!("✔️  Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let documents = match serde_json::from_str::<Value>(&content)? {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut valid = 0;
    let mut invalid = 0;

    for (i, document) in documents.iter().enumerate() {
        match validate_payload(kind, document) {
            Ok(()) => valid += 1,
            Err(errors) => {
                invalid += 1;
                if invalid <= 5 {
                    eprintln!("\n❌ Document {} invalid:", i);
                    for err in errors.iter().take(3) {
                        eprintln!("   - {}", err);
                    }
                }
            }
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_schema(kind: &str, json_schema: bool) -> CliResult {
    let kind = parse_kind(kind)?;
    if json_schema {
        let source = schema_source(kind).ok_or("Custom payloads have no JSON schema")?;
        println!("{}", source);
        return Ok(());
    }

    let json = match kind {
        PayloadKind::Invoice => invoice_schema().to_json()?,
        PayloadKind::Supplier => supplier_schema().to_json()?,
        PayloadKind::Company => company_schema().to_json()?,
        PayloadKind::Custom => return Err("No built-in schema for custom payloads".into()),
    };
    println!("{}", json);
    Ok(())
}

fn cmd_config(path: Option<&Path>) -> CliResult {
    let config = match path {
        Some(p) => EngineConfig::from_file(p)?,
        None => EngineConfig::default(),
    }
    .with_env()?;
    println!("{}", config.to_json()?);
    Ok(())
}

/// Configuration file (or defaults), then environment, then `--override` flags.
fn load_config(build: &BuildArgs) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match &build.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    }
    .with_env()?;
    for pair in &build.overrides {
        config.set_override(pair)?;
    }
    if build.no_validate {
        config.skip_validation = true;
    }
    Ok(config)
}

fn entity_schema(
    build: &BuildArgs,
    builtin: fn() -> EntitySchema,
) -> Result<EntitySchema, Box<dyn std::error::Error>> {
    match &build.schema {
        Some(path) => Ok(EntitySchema::from_json(&fs::read_to_string(path)?)?),
        None => Ok(builtin()),
    }
}

fn parse_kind(code: &str) -> Result<PayloadKind, Box<dyn std::error::Error>> {
    PayloadKind::from_code(code).ok_or_else(|| format!("Unknown payload kind: {}", code).into())
}

/// Write the payloads, then report failures. Exits non-zero when any record failed.
fn finish_batch(result: &BatchResult, output: Option<&Path>) -> CliResult {
    let json = serde_json::to_string_pretty(&result.payload_values())?;
    write_output(&json, output)?;

    if !result.is_clean() {
        eprintln!("\n⚠️  {} records without payload:", result.failures.len());
        for failure in &result.failures {
            eprintln!("   - {}: {}", failure.record, failure.error);
        }
        std::process::exit(1);
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
