//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AdlensSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{adlens_home, AdlensSettings};

/// Resolve the path to the settings file (`~/.adlens/settings.json`).
pub fn settings_path() -> PathBuf {
    adlens_home().join("settings.json")
}

/// An `ADLENS_*` variable that was set but could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IgnoredEnvVar {
    pub key: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl IgnoredEnvVar {
    /// Report through `tracing`. Call once a subscriber is installed.
    pub fn warn(&self) {
        tracing::warn!(
            key = self.key,
            value = %self.value,
            expected = self.expected,
            "invalid env var, ignoring"
        );
    }
}

/// Settings plus the env overrides that were rejected while loading them.
///
/// Loading normally happens before logging is set up, so the rejections are
/// handed back instead of logged.
#[derive(Clone, Debug)]
pub struct LoadedSettings {
    pub settings: AdlensSettings,
    pub ignored_env: Vec<IgnoredEnvVar>,
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LoadedSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<LoadedSettings> {
    let defaults = serde_json::to_value(AdlensSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: AdlensSettings = serde_json::from_value(merged)?;
    let ignored_env = apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(LoadedSettings {
        settings,
        ignored_env,
    })
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored (file/default value stays) and returned.
pub fn apply_env_overrides(settings: &mut AdlensSettings) -> Vec<IgnoredEnvVar> {
    apply_overrides_from(settings, |name| std::env::var(name).ok())
}

/// Same as [`apply_env_overrides`] over an arbitrary variable lookup.
pub fn apply_overrides_from<F>(settings: &mut AdlensSettings, lookup: F) -> Vec<IgnoredEnvVar>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = EnvReader {
        lookup,
        ignored: Vec::new(),
    };
    if let Some(v) = env.string("ADLENS_DATABASE_PATH") {
        settings.database.path = v;
    }
    if let Some(v) = env.string("ADLENS_LLM_BASE_URL") {
        settings.llm.base_url = v;
    }
    if let Some(v) = env.string("ADLENS_LLM_MODEL") {
        settings.llm.model = v;
    }
    if let Some(v) = env.u64("ADLENS_LLM_TIMEOUT_MS", 1000, 3_600_000) {
        settings.llm.timeout_ms = v;
    }
    if let Some(v) = env.bool("ADLENS_CHARTS_ENABLED") {
        settings.charts.enabled = v;
    }
    if let Some(v) = env.string("ADLENS_CHARTS_DIR") {
        settings.charts.output_dir = v;
    }
    if let Some(v) = env.string("ADLENS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    env.ignored
}

fn validate(settings: &AdlensSettings) -> Result<()> {
    if !(0.0..=2.0).contains(&settings.llm.temperature) {
        return Err(SettingsError::InvalidValue(format!(
            "llm.temperature must be within 0..=2, got {}",
            settings.llm.temperature
        )));
    }
    if settings.llm.model.trim().is_empty() {
        return Err(SettingsError::InvalidValue("llm.model is empty".into()));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
    ignored: Vec<IgnoredEnvVar>,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&mut self, name: &'static str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            self.ignored.push(IgnoredEnvVar {
                key: name,
                value: val,
                expected: "boolean",
            });
        }
        result
    }

    fn u64(&mut self, name: &'static str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            self.ignored.push(IgnoredEnvVar {
                key: name,
                value: val,
                expected: "integer in range",
            });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"llm": {"model": "a", "baseUrl": "http://x"}});
        let source = serde_json::json!({"llm": {"model": "b"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["llm"]["model"], "b");
        assert_eq!(merged["llm"]["baseUrl"], "http://x");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json"))
            .unwrap()
            .settings;
        assert_eq!(settings.llm.timeout_ms, AdlensSettings::default().llm.timeout_ms);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"charts": {"outputDir": "/srv/charts"}, "pipeline": {"emptyDataMessage": "nothing"}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap().settings;
        assert_eq!(settings.charts.output_dir, "/srv/charts");
        assert!(settings.charts.enabled);
        assert_eq!(settings.pipeline.empty_data_message, "nothing");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result, Err(SettingsError::Json(_))));
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"llm": {"temperature": 7.5}}"#).unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result, Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn parse_bool_variants() {
        for v in ["true", "1", "YES", "on"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["false", "0", "No", "OFF"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("5000", 1000, 10_000), Some(5000));
        assert_eq!(parse_u64_range("999", 1000, 10_000), None);
        assert_eq!(parse_u64_range("abc", 0, 10), None);
    }

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = AdlensSettings::default();
        let ignored = apply_overrides_from(
            &mut settings,
            env(&[
                ("ADLENS_LLM_MODEL", "mistral"),
                ("ADLENS_CHARTS_ENABLED", "off"),
                ("ADLENS_LLM_TIMEOUT_MS", "5000"),
            ]),
        );
        assert!(ignored.is_empty());
        assert_eq!(settings.llm.model, "mistral");
        assert!(!settings.charts.enabled);
        assert_eq!(settings.llm.timeout_ms, 5000);
    }

    #[test]
    fn invalid_env_values_are_returned_not_applied() {
        let mut settings = AdlensSettings::default();
        let ignored = apply_overrides_from(
            &mut settings,
            env(&[("ADLENS_CHARTS_ENABLED", "maybe"), ("ADLENS_LLM_TIMEOUT_MS", "5")]),
        );
        assert!(settings.charts.enabled);
        assert_eq!(settings.llm.timeout_ms, 120_000);
        assert_eq!(ignored.len(), 2);
        assert_eq!(ignored[0].key, "ADLENS_LLM_TIMEOUT_MS");
        assert_eq!(ignored[0].value, "5");
        assert_eq!(ignored[1].key, "ADLENS_CHARTS_ENABLED");
        assert_eq!(ignored[1].expected, "boolean");
    }

    #[test]
    fn empty_string_env_is_unset() {
        let mut settings = AdlensSettings::default();
        let ignored = apply_overrides_from(&mut settings, env(&[("ADLENS_LLM_MODEL", "")]));
        assert!(ignored.is_empty());
        assert_eq!(settings.llm.model, "llama3.2:3b");
    }
}
