//! Typed collector pack schema.
//!
//! A pack file looks like:
//!
//! ```yaml
//! supported_versions:
//!   min: "19.0"
//!   max: "19.9"
//! collectors:
//!   top:
//!     layers:
//!       sessions:
//!         order: 1
//!         sql: SELECT * FROM v$session
//!       waits:
//!         order: 2
//!         single_row: true
//!         sql: SELECT COUNT(*) AS waiting FROM v$session WHERE wait_class <> 'Idle'
//!   checks:
//!     queries:
//!       long_running:
//!         description: Statements running for more than a minute
//!         sql: SELECT sql_id FROM v$session WHERE last_call_et > :threshold
//! ```
//!
//! Decoding is two-stage: the raw YAML value is inspected first so unknown
//! keys can be warned about, then the typed structs are produced. Packs
//! without `supported_versions` are rejected by the loader.

use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};
use sqlgate_common::constants::LOADING;

use crate::version::VersionNumber;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedVersions {
    pub min: String,
    pub max: String,
}

impl SupportedVersions {
    pub fn min_version(&self) -> VersionNumber {
        VersionNumber::parse_dotted(&self.min).unwrap_or_default()
    }

    pub fn max_version(&self) -> VersionNumber {
        VersionNumber::parse_dotted(&self.max).unwrap_or_default()
    }

    pub fn contains(&self, version: &VersionNumber) -> bool {
        &self.min_version() <= version && version <= &self.max_version()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub render_hint: Option<serde_json::Value>,
    pub sql: String,
    #[serde(default)]
    pub single_row: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub description: Option<String>,
    pub sql: String,
    #[serde(default)]
    pub single_row: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectorDefinition {
    #[serde(default)]
    pub layers: BTreeMap<String, LayerConfig>,
    #[serde(default)]
    pub queries: BTreeMap<String, QueryConfig>,
}

impl CollectorDefinition {
    /// A collector with neither layers nor queries yields no result.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.queries.is_empty()
    }

    /// Layers in execution order: `order` ascending with null last,
    /// tie-broken by layer id.
    pub fn ordered_layers(&self) -> Vec<(&String, &LayerConfig)> {
        let mut layers: Vec<_> = self.layers.iter().collect();
        layers.sort_by(|(id_a, a), (id_b, b)| {
            let order_a = a.order.unwrap_or(i64::MAX);
            let order_b = b.order.unwrap_or(i64::MAX);
            order_a.cmp(&order_b).then_with(|| id_a.cmp(id_b))
        });
        layers
    }
}

/// The file-level schema, before the loader attaches provenance.
#[derive(Debug, Clone, Deserialize)]
pub struct PackFile {
    #[serde(default)]
    pub supported_versions: Option<SupportedVersions>,
    #[serde(default)]
    pub collectors: BTreeMap<String, CollectorDefinition>,
}

/// One loaded pack: the parsed file plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorPack {
    pub db_type: String,
    pub source_file: String,
    pub supported_versions: SupportedVersions,
    pub collectors: BTreeMap<String, CollectorDefinition>,
}

impl CollectorPack {
    /// The pack id: the source file name with the YAML extension stripped.
    /// `collector_ref` values are `<pack_id>:<collector_id>`.
    pub fn pack_id(&self) -> &str {
        self.source_file
            .strip_suffix(".yaml")
            .or_else(|| self.source_file.strip_suffix(".yml"))
            .unwrap_or(&self.source_file)
    }
}

const PACK_KEYS: [&str; 2] = ["supported_versions", "collectors"];
const COLLECTOR_KEYS: [&str; 2] = ["layers", "queries"];
const LAYER_KEYS: [&str; 4] = ["order", "render_hint", "sql", "single_row"];
const QUERY_KEYS: [&str; 3] = ["description", "sql", "single_row"];

/// Parse a pack file. Unknown keys are logged (the typed decode ignores
/// them); missing required keys fail the parse.
pub fn parse_pack_file(contents: &str, origin: &str) -> Result<PackFile, serde_yaml::Error> {
    let raw: serde_yaml::Value = serde_yaml::from_str(contents)?;
    warn_unknown_keys(&raw, origin);
    serde_yaml::from_value(raw)
}

fn warn_unknown_keys(raw: &serde_yaml::Value, origin: &str) {
    check_keys(raw, &PACK_KEYS, origin, "");
    let Some(collectors) = raw.get("collectors").and_then(|v| v.as_mapping()) else {
        return;
    };
    for (collector_id, collector) in collectors {
        let collector_id = collector_id.as_str().unwrap_or("?");
        check_keys(collector, &COLLECTOR_KEYS, origin, collector_id);
        for (section, keys) in [("layers", &LAYER_KEYS[..]), ("queries", &QUERY_KEYS[..])] {
            let Some(entries) = collector.get(section).and_then(|v| v.as_mapping()) else {
                continue;
            };
            for (entry_id, entry) in entries {
                let path = format!("{collector_id}.{}", entry_id.as_str().unwrap_or("?"));
                check_keys(entry, keys, origin, &path);
            }
        }
    }
}

fn check_keys(value: &serde_yaml::Value, allowed: &[&str], origin: &str, path: &str) {
    let Some(mapping) = value.as_mapping() else {
        return;
    };
    for key in mapping.keys() {
        let Some(key) = key.as_str() else { continue };
        if !allowed.contains(&key) {
            let at = if path.is_empty() { String::new() } else { format!(" at '{path}'") };
            log::warn!(target: LOADING, "{origin}: unknown key '{key}'{at} ignored");
        }
    }
}
