//! # adlens-settings
//!
//! Configuration for the adlens pipeline, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`AdlensSettings::default()`]
//! 2. **User file**: `~/.adlens/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ADLENS_*` overrides (highest priority)
//!
//! Settings are a plain value. Load them once at startup and pass them into
//! whatever needs them; two pipelines in one process may use different
//! settings.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_settings, load_settings_from_path, settings_path, IgnoredEnvVar, LoadedSettings,
};
pub use types::*;
