//! Settings type definitions.
//!
//! All types use camelCase JSON field names and `#[serde(default)]`, so a
//! partial settings file only needs the keys it overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdlensSettings {
    /// Relational store location.
    pub database: DatabaseSettings,
    /// Chat-model endpoint used by the planner and the synthesizer.
    pub llm: LlmSettings,
    /// Chart rendering.
    pub charts: ChartSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Pipeline behavior.
    pub pipeline: PipelineSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database holding campaign data.
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: adlens_home().join("campaigns.db").to_string_lossy().into_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// Base URL of an Ollama-compatible server.
    pub base_url: String,
    /// Model identifier shared by planner and synthesizer.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Per-request timeout.
    pub timeout_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            temperature: 0.0,
            timeout_ms: 120_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartSettings {
    /// When false, chart plans are honored by the router but nothing is drawn.
    pub enabled: bool,
    /// Directory receiving one `<run_id>.svg` per rendered chart.
    pub output_dir: String,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: adlens_home().join("charts").to_string_lossy().into_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` wins when set.
    pub level: String,
    /// Per-target level overrides, e.g. `{"adlens_llm": "debug"}`.
    pub modules: BTreeMap<String, String>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Persist warn+ events to SQLite.
    pub persist_warnings: bool,
    /// Path to the log database.
    pub log_db_path: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            modules: BTreeMap::new(),
            json: false,
            persist_warnings: true,
            log_db_path: adlens_home().join("logs.db").to_string_lossy().into_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Narrative returned when retrieval produced no rows.
    pub empty_data_message: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            empty_data_message:
                "No data was found for this query. Please try another question.".to_string(),
        }
    }
}

/// `~/.adlens`, falling back to `/tmp/.adlens` without a home directory.
pub fn adlens_home() -> std::path::PathBuf {
    std::env::var("HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("/tmp"))
        .join(".adlens")
}
