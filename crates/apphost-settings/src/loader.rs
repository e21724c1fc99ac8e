//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HostSettings::default()`]
//! 2. If `~/.apphost/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::HostSettings;

/// Upper bound accepted for the staleness window (one hour).
const MAX_STALENESS_WINDOW_MS: u64 = 3_600_000;

/// Resolve the path to the settings file (`~/.apphost/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".apphost").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HostSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<HostSettings> {
    let mut settings = load_file_layer(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    validate(&settings)?;
    Ok(settings)
}

/// Defaults with the user file (if any) merged on top. No env overrides.
pub fn load_file_layer(path: &Path) -> Result<HostSettings> {
    let defaults = serde_json::to_value(HostSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply `APPHOST_*` overrides read through `lookup`.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_overrides(settings: &mut HostSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read_string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read_string("APPHOST_WWW_DIR") {
        settings.apps.www_dir = v;
    }
    if let Some(v) = read_string("APPHOST_ENTRY_FILE") {
        settings.apps.entry_file = v;
    }
    if let Some(raw) = read_string("APPHOST_STALENESS_WINDOW_MS") {
        match parse_u64_range(&raw, 0, MAX_STALENESS_WINDOW_MS) {
            Some(v) => settings.apps.staleness_window_ms = v,
            None => {
                warn!(key = "APPHOST_STALENESS_WINDOW_MS", value = %raw, "invalid u64 env var, ignoring");
            }
        }
    }
    if let Some(v) = read_string("APPHOST_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject settings the host cannot run with.
pub fn validate(settings: &HostSettings) -> Result<()> {
    let entry = settings.apps.entry_file.trim();
    if entry.is_empty() {
        return Err(SettingsError::InvalidValue("apps.entryFile is empty".into()));
    }
    if entry.contains('/') {
        return Err(SettingsError::InvalidValue(format!(
            "apps.entryFile must be a bare file name, got {entry}"
        )));
    }
    if settings.apps.staleness_window_ms > MAX_STALENESS_WINDOW_MS {
        return Err(SettingsError::InvalidValue(format!(
            "apps.stalenessWindowMs {} exceeds {MAX_STALENESS_WINDOW_MS}",
            settings.apps.staleness_window_ms
        )));
    }
    Ok(())
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
