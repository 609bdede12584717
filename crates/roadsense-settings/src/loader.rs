//! Settings loading: file read, deep merge over defaults, env overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::errors::Result;
use crate::types::RoadsenseSettings;

/// Default settings file location: `~/.roadsense/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".roadsense").join("settings.json")
}

/// Deep-merge `overlay` into `base` in place.
///
/// Objects merge recursively; any other value type replaces the base value
/// wholesale (arrays included, so an upstream list in the file replaces the
/// default list rather than appending to it).
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        let _ = base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

/// Load settings from the default path with env overrides applied.
pub fn load_settings() -> Result<RoadsenseSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific file, deep-merged over compiled defaults,
/// then apply `ROADSENSE_*` env overrides. A missing file is not an error:
/// defaults (plus env) are returned.
pub fn load_settings_from_path(path: &Path) -> Result<RoadsenseSettings> {
    let mut merged = serde_json::to_value(RoadsenseSettings::default())?;

    if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let file_value: Value = serde_json::from_str(&raw)?;
        deep_merge(&mut merged, file_value);
    }

    let mut settings: RoadsenseSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Apply `ROADSENSE_*` environment variable overrides (highest priority).
fn apply_env_overrides(settings: &mut RoadsenseSettings) {
    if let Ok(host) = std::env::var("ROADSENSE_HOST")
        && !host.is_empty()
    {
        settings.server.host = host;
    }
    if let Ok(port) = std::env::var("ROADSENSE_PORT") {
        match port.parse() {
            Ok(port) => settings.server.port = port,
            Err(_) => warn!(value = %port, "ignoring non-numeric ROADSENSE_PORT"),
        }
    }
    if let Ok(url) = std::env::var("ROADSENSE_STORAGE_URL")
        && !url.is_empty()
    {
        settings.storage.url = url;
    }
    if let Ok(key) = std::env::var("ROADSENSE_STORAGE_KEY")
        && !key.is_empty()
    {
        settings.storage.api_key = key;
    }
    if let Ok(level) = std::env::var("ROADSENSE_LOG_LEVEL")
        && !level.is_empty()
    {
        settings.logging.level = level;
    }
}
