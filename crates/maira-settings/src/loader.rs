//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LinkSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::fmt::Display;
use std::io::ErrorKind;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::LinkSettings;

/// Resolve the path to the settings file (`~/.maira/link.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".maira").join("link.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LinkSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Unreadable or malformed files are errors
/// naming the path. The result is validated.
pub fn load_settings_from_path(path: &Path) -> Result<LinkSettings> {
    let defaults = serde_json::to_value(LinkSettings::default()).map_err(SettingsError::Defaults)?;

    let merged = match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "loading settings from file");
            let user: Value =
                serde_json::from_str(&content).map_err(|e| SettingsError::parse(path, e))?;
            deep_merge(defaults, user)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            defaults
        }
        Err(e) => return Err(SettingsError::read(path, e)),
    };

    let mut settings: LinkSettings =
        serde_json::from_value(merged).map_err(|e| SettingsError::parse(path, e))?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
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
/// Numeric overrides outside their range are ignored with a warning and the
/// file or default value stays.
pub fn apply_env_overrides(settings: &mut LinkSettings) {
    // ── Server / participant ────────────────────────────────────────
    if let Some(v) = read_env_string("MAIRA_SERVER_URL") {
        settings.server.url = v;
    }
    if let Some(v) = read_env_string("MAIRA_USER_ID") {
        settings.participant.id = v;
    }
    if let Some(v) = read_env_string("MAIRA_USER") {
        settings.participant.display_name = v;
    }
    if let Some(v) = read_env_string("MAIRA_OPERATION") {
        settings.participant.operation_id = v;
    }
    if let Some(v) = read_env_string("MAIRA_ELEMENT") {
        settings.participant.working_element_id = v;
    }

    // ── Transport ───────────────────────────────────────────────────
    if let Some(v) = read_env_in("MAIRA_RECONNECT_ATTEMPTS", 1..=1000) {
        settings.transport.reconnection_attempts = v;
    }
    if let Some(v) = read_env_in("MAIRA_RECONNECT_DELAY_MS", 10..=600_000) {
        settings.transport.reconnection_delay_ms = v;
    }
    if let Some(v) = read_env_in("MAIRA_RECONNECT_DELAY_MAX_MS", 10..=3_600_000) {
        settings.transport.reconnection_delay_max_ms = v;
    }
    if let Some(v) = read_env_in("MAIRA_CONNECT_TIMEOUT_MS", 100..=600_000) {
        settings.transport.timeout_ms = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = read_env_in("MAIRA_HEARTBEAT_INTERVAL_MS", 1000..=600_000) {
        settings.session.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_env_in("MAIRA_QUEUE_CAPACITY", 1..=1_000_000) {
        settings.session.queue_capacity_per_category = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("MAIRA_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Env parsing ─────────────────────────────────────────────────────────────

/// Parse `val` and accept it only inside `range`.
pub fn parse_in_range<T>(val: &str, range: &RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    val.trim().parse().ok().filter(|n| range.contains(n))
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_in<T>(name: &str, range: RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd + Display,
{
    let val = std::env::var(name).ok()?;
    let parsed = parse_in_range(&val, &range);
    if parsed.is_none() {
        tracing::warn!(
            key = name,
            value = %val,
            min = %range.start(),
            max = %range.end(),
            "env override out of range or not a number, ignoring"
        );
    }
    parsed
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
