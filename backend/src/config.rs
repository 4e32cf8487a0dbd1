//! Engine configuration.
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! `TABLOAD_*` environment variables (a `.env` file is read first), then CLI flags.
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `TABLOAD_TAX_MODE` | `header` or `line` |
//! | `TABLOAD_ALT_NAME_PRIORITY` | `primary_first` or `extension_first` |
//! | `TABLOAD_GROUP_KEYS` | comma-separated group key aliases |
//! | `TABLOAD_OVERRIDE_<FIELD>` | override for a payload field, e.g. `_EXTERNAL_CLIENT_ID` → `externalClientId` |

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{AltNamePriority, TaxMode};

const ENV_PREFIX: &str = "TABLOAD_";
const ENV_OVERRIDE_PREFIX: &str = "TABLOAD_OVERRIDE_";

/// Settings passed to every batch entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Columns tried, in order, to find the document a row belongs to.
    pub group_key_aliases: Vec<String>,

    pub tax_mode: TaxMode,

    pub alt_name_priority: AltNamePriority,

    /// Payload field → fallback value, used when the row has no value.
    pub overrides: BTreeMap<String, String>,

    /// Table name → join column aliases, replacing the schema's join key.
    pub join_key_aliases: BTreeMap<String, Vec<String>>,

    /// Do not validate payloads against their JSON schema.
    pub skip_validation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            group_key_aliases: vec!["externalId".to_string(), "invoiceExternalId".to_string()],
            tax_mode: TaxMode::default(),
            alt_name_priority: AltNamePriority::default(),
            overrides: BTreeMap::new(),
            join_key_aliases: BTreeMap::new(),
            skip_validation: false,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Overlay `TABLOAD_*` variables from the process environment.
    pub fn with_env(self) -> ConfigResult<Self> {
        self.apply_env(std::env::vars())
    }

    /// Overlay `TABLOAD_*` variables from an explicit list.
    ///
    /// Unrelated variables are ignored; an invalid value for a known one is an error.
    pub fn apply_env<I>(mut self, vars: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(field) = key.strip_prefix(ENV_OVERRIDE_PREFIX) {
                if !field.is_empty() {
                    self.overrides.insert(env_field_name(field), value);
                }
                continue;
            }

            let Some(setting) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match setting {
                "TAX_MODE" => {
                    self.tax_mode = TaxMode::from_code(&value).ok_or_else(|| invalid(&key, &value))?;
                }
                "ALT_NAME_PRIORITY" => {
                    self.alt_name_priority =
                        AltNamePriority::from_code(&value).ok_or_else(|| invalid(&key, &value))?;
                }
                "GROUP_KEYS" => {
                    let keys = split_list(&value);
                    if keys.is_empty() {
                        return Err(invalid(&key, &value));
                    }
                    self.group_key_aliases = keys;
                }
                _ => {}
            }
        }
        Ok(self)
    }

    /// Set one override from a `field=value` pair.
    pub fn set_override(&mut self, pair: &str) -> ConfigResult<()> {
        let (field, value) = pair
            .split_once('=')
            .filter(|(field, _)| !field.trim().is_empty())
            .ok_or_else(|| invalid("override", pair))?;
        self.overrides
            .insert(field.trim().to_string(), value.trim().to_string());
        Ok(())
    }

    /// Join aliases for a table, if configured.
    pub fn join_aliases(&self, table: &str) -> Option<&[String]> {
        self.join_key_aliases
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, aliases)| aliases.as_slice())
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `EXTERNAL_CLIENT_ID` → `externalClientId`.
fn env_field_name(screaming: &str) -> String {
    let mut out = String::with_capacity(screaming.len());
    for (i, word) in screaming.split('_').filter(|w| !w.is_empty()).enumerate() {
        let lower = word.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
