//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RmxSettings::default()`]
//! 2. If `~/.rmx/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::RmxSettings;

/// Resolve the path to the settings file (`~/.rmx/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".rmx").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RmxSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<RmxSettings> {
    let defaults = serde_json::to_value(RmxSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RmxSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
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

/// Reject settings the broker cannot run with.
pub fn validate(settings: &RmxSettings) -> Result<()> {
    if settings.broker.default_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "broker.defaultCapacity must be positive".to_string(),
        ));
    }
    if settings.broker.write_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "broker.writeTimeoutMs must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are logged and ignored (fall back to file/default)
pub fn apply_env_overrides(settings: &mut RmxSettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("RMX_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("RMX_PORT", 0, 65535) {
        settings.server.port = v;
    }

    // ── Broker ──────────────────────────────────────────────────────
    if let Some(v) = read_env_usize("RMX_MAX_ROOMS", 0, 1_000_000) {
        settings.broker.max_rooms = v;
    }
    if let Some(v) = read_env_usize("RMX_DEFAULT_CAPACITY", 1, 10_000) {
        settings.broker.default_capacity = v;
    }
    if let Some(v) = read_env_bool("RMX_EXCLUDE_SENDER") {
        settings.broker.exclude_sender = v;
    }
    if let Some(v) = read_env_bool("RMX_AUTO_CLOSE") {
        settings.broker.auto_close_when_empty = v;
    }
    if let Some(v) = read_env_u64("RMX_WRITE_TIMEOUT_MS", 1, 600_000) {
        settings.broker.write_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("RMX_READ_TIMEOUT_MS", 0, 86_400_000) {
        settings.broker.read_timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("RMX_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("RMX_LOG_JSON") {
        settings.logging.json = v;
    }
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

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_overrides_nested_keys() {
        let target = json!({"broker": {"defaultCapacity": 2, "excludeSender": true}});
        let source = json!({"broker": {"defaultCapacity": 8}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["broker"]["defaultCapacity"], 8);
        assert_eq!(merged["broker"]["excludeSender"], true);
    }

    #[test]
    fn deep_merge_skips_null() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let merged = deep_merge(json!({"a": [1, 2]}), json!({"a": [3]}));
        assert_eq!(merged["a"], json!([3]));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.broker.default_capacity, 2);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"broker": {"autoCloseWhenEmpty": true, "maxRooms": 16}, "server": {"port": 9000}}"#,
        )
        .unwrap();
        let settings = load_settings_from_path(&path).unwrap();
        assert!(settings.broker.auto_close_when_empty);
        assert_eq!(settings.broker.max_rooms, 16);
        assert!(settings.broker.exclude_sender);
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn zero_default_capacity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"broker": {"defaultCapacity": 0}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range("abc", 0, 10), None);
        assert_eq!(parse_usize_range("5", 1, 4), None);
    }
}
