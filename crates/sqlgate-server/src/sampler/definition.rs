//! Sampler definitions and the default-merge rules.
//!
//! Defaults ship in `samplers/default.json`; an upsert merges caller fields
//! over the default, field-wise, with non-null caller values winning.
//! Definitions are immutable once an instance starts; a config change
//! replaces the instance (stop, new definition, start).

use std::collections::HashMap;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use sqlgate_common::constants::LOADING;
use sqlgate_error::{ErrorCode, GateResult, err, gate_err};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub interval_sec: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Drop a tick while the previous one is still collecting.
    #[default]
    Skip,
    /// Run the delayed tick as soon as the previous one finishes.
    Queue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPolicy {
    #[serde(default)]
    pub on_overlap: OverlapPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerDefinition {
    pub sampler_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    pub schedule: Schedule,
    #[serde(default)]
    pub run_policy: RunPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_policy: Option<serde_json::Value>,
    pub target: SamplerTarget,
}

impl SamplerDefinition {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn validate(&self) -> GateResult<()> {
        if self.schedule.interval_sec == 0 {
            return err!(
                ErrorCode::InvalidArgument,
                "sampler '{}': schedule.interval_sec must be > 0",
                self.sampler_id
            );
        }
        if self.target.collector_id.is_none() && self.target.collector_ref.is_none() {
            return err!(
                ErrorCode::InvalidArgument,
                "sampler '{}': target needs collector_id or collector_ref",
                self.sampler_id
            );
        }
        Ok(())
    }

    /// Merge caller fields over this definition; non-null caller fields win.
    pub fn merged_with(&self, patch: &SamplerDefinitionPatch) -> SamplerDefinition {
        SamplerDefinition {
            sampler_id: self.sampler_id.clone(),
            enabled: patch.enabled.or(self.enabled),
            schedule: patch.schedule.unwrap_or(self.schedule),
            run_policy: patch.run_policy.unwrap_or(self.run_policy),
            result_policy: patch
                .result_policy
                .clone()
                .or_else(|| self.result_policy.clone()),
            target: patch.target.clone().unwrap_or_else(|| self.target.clone()),
        }
    }
}

/// Caller-supplied overrides for an upsert. Every field optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SamplerDefinitionPatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub run_policy: Option<RunPolicy>,
    #[serde(default)]
    pub result_policy: Option<serde_json::Value>,
    #[serde(default)]
    pub target: Option<SamplerTarget>,
}

#[derive(Debug, Deserialize)]
struct DefaultsFile {
    samplers: Vec<SamplerDefinition>,
}

/// Load `samplers/default.json`. A missing file yields an empty map (and a
/// warning); a malformed file is an error.
pub fn load_default_definitions(path: &Path) -> GateResult<HashMap<String, SamplerDefinition>> {
    if !path.is_file() {
        log::warn!(
            target: LOADING,
            "sampler defaults file {} not found; no samplers available",
            path.display()
        );
        return Ok(HashMap::new());
    }
    let contents = sqlgate_common::stdfs::read_to_string(path)?;
    let parsed: DefaultsFile = serde_json::from_str(&contents).map_err(|e| {
        gate_err!(
            ErrorCode::SerializationError,
            "failed to parse sampler defaults {}: {e}",
            path.display()
        )
    })?;
    let mut defaults = HashMap::new();
    for definition in parsed.samplers {
        definition.validate()?;
        defaults.insert(definition.sampler_id.clone(), definition);
    }
    log::info!(
        target: LOADING,
        "loaded {} sampler default(s) from {}",
        defaults.len(),
        path.display()
    );
    Ok(defaults)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_definition() -> SamplerDefinition {
        SamplerDefinition {
            sampler_id: "activity".to_string(),
            enabled: Some(true),
            schedule: Schedule { interval_sec: 30 },
            run_policy: RunPolicy::default(),
            result_policy: None,
            target: SamplerTarget {
                collector_id: Some("top".to_string()),
                collector_ref: None,
            },
        }
    }

    #[test]
    fn test_merge_caller_fields_win() {
        let default = base_definition();
        let patch = SamplerDefinitionPatch {
            schedule: Some(Schedule { interval_sec: 5 }),
            target: Some(SamplerTarget {
                collector_id: None,
                collector_ref: Some("activity:top".to_string()),
            }),
            ..Default::default()
        };
        let merged = default.merged_with(&patch);
        assert_eq!(merged.schedule.interval_sec, 5);
        assert_eq!(merged.target.collector_ref.as_deref(), Some("activity:top"));
        // Untouched fields come from the default.
        assert_eq!(merged.enabled, Some(true));
        assert_eq!(merged.run_policy.on_overlap, OverlapPolicy::Skip);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut definition = base_definition();
        definition.schedule.interval_sec = 0;
        let err = definition.validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_validate_requires_target() {
        let mut definition = base_definition();
        definition.target = SamplerTarget::default();
        assert!(definition.validate().is_err());
    }

    #[test]
    fn test_load_defaults_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.json");
        std::fs::write(
            &path,
            r#"{"samplers": [
                {"sampler_id": "activity",
                 "schedule": {"interval_sec": 30},
                 "run_policy": {"on_overlap": "skip"},
                 "target": {"collector_id": "top"}}
            ]}"#,
        )
        .unwrap();

        let defaults = load_default_definitions(&path).unwrap();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults["activity"].schedule.interval_sec, 30);
    }

    #[test]
    fn test_load_defaults_missing_file_is_empty() {
        let defaults = load_default_definitions(Path::new("/nonexistent/default.json")).unwrap();
        assert!(defaults.is_empty());
    }
}
