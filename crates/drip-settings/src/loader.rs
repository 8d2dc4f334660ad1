//! Settings loading: defaults → file deep-merge → env overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, SettingsError};
use crate::types::DripSettings;

/// Default settings file location: `~/.drip/settings.json`.
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".drip").join("settings.json")
}

/// Deep-merge `overlay` onto `base`.
///
/// Objects merge recursively; any other value in `overlay` replaces the
/// corresponding `base` value.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Load settings from the default path with env overrides applied.
pub fn load_settings() -> Result<DripSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific file path.
///
/// A missing file is not an error — defaults are used. A present but
/// unreadable or malformed file is an error, so a typo in `settings.json`
/// fails loudly instead of silently running on defaults. Environment
/// overrides are applied last in both cases.
pub fn load_settings_from_path(path: &Path) -> Result<DripSettings> {
    let defaults = serde_json::to_value(DripSettings::default())
        .expect("default settings always serialize");

    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let overlay: Value =
            serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        deep_merge(defaults, overlay)
    } else {
        defaults
    };

    let mut settings: DripSettings = serde_json::from_value(merged).map_err(|source| {
        SettingsError::Parse {
            path: path.display().to_string(),
            source,
        }
    })?;

    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Apply `DRIP_*` environment overrides (highest priority).
///
/// `PORT` is honored as a fallback for `DRIP_SERVER_PORT` to keep the
/// original deployment contract working.
fn apply_env_overrides(settings: &mut DripSettings) {
    let port_var = std::env::var("DRIP_SERVER_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok();
    if let Some(raw) = port_var {
        match raw.parse::<u16>() {
            Ok(port) => settings.server.port = port,
            Err(_) => tracing::warn!(value = %raw, "ignoring unparseable port override"),
        }
    }

    if let Ok(url) = std::env::var("DRIP_GATEWAY_URL") {
        settings.transport.gateway_url = url;
    }
    if let Ok(dir) = std::env::var("DRIP_STORE_DIR") {
        settings.session.store_dir = dir;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_disjoint_keys() {
        let a = serde_json::json!({"x": 1});
        let b = serde_json::json!({"y": 2});
        let merged = deep_merge(a, b);
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }

    #[test]
    fn deep_merge_nested_override() {
        let a = serde_json::json!({"server": {"port": 3000}, "keep": true});
        let b = serde_json::json!({"server": {"port": 9999}});
        let merged = deep_merge(a, b);
        assert_eq!(merged["server"]["port"], 9999);
        assert_eq!(merged["keep"], true);
    }

    #[test]
    fn deep_merge_scalar_replaces_object() {
        let a = serde_json::json!({"v": {"nested": 1}});
        let b = serde_json::json!({"v": 5});
        assert_eq!(deep_merge(a, b)["v"], 5);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn file_values_merged_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"dispatch": {"minDelayMs": 2500}}"#).unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.dispatch.min_delay_ms, 2500);
        // Untouched sections keep defaults.
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result, Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn settings_path_under_home() {
        let path = settings_path();
        assert!(path.ends_with(".drip/settings.json"));
    }
}
