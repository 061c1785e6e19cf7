//! Settings parsing with deep merge and environment variable overrides.
//!
//! Parsing flow:
//! 1. Start with compiled [`PipelineSettings::default()`]
//! 2. Deep-merge the host-supplied JSON over the defaults
//! 3. Apply `RELAY_*` environment overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::str::FromStr;

use relay_core::LogLevel;
use relay_format::OutputFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::PipelineSettings;

/// Parse settings from a JSON document, then apply env overrides.
pub fn load_settings(json: &str) -> Result<PipelineSettings> {
    let user: Value = serde_json::from_str(json)?;
    load_settings_from_value(user)
}

/// Like [`load_settings`] for an already-parsed JSON value.
pub fn load_settings_from_value(user: Value) -> Result<PipelineSettings> {
    let mut settings = merge_over_defaults(user)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Parse settings from a JSON document without consulting the environment.
pub fn parse_settings(json: &str) -> Result<PipelineSettings> {
    let user: Value = serde_json::from_str(json)?;
    let settings = merge_over_defaults(user)?;
    settings.validate()?;
    Ok(settings)
}

fn merge_over_defaults(user: Value) -> Result<PipelineSettings> {
    let defaults = serde_json::to_value(PipelineSettings::default())?;
    let merged = deep_merge(defaults, user);
    debug!("settings merged over defaults");
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

/// Apply `RELAY_*` environment variable overrides.
///
/// Invalid values are logged and ignored (the parsed value stays).
pub fn apply_env_overrides(settings: &mut PipelineSettings) {
    apply_overrides_with(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// `lookup` maps a variable name to its value; [`apply_env_overrides`] passes
/// the process environment.
pub fn apply_overrides_with(
    settings: &mut PipelineSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let env = EnvReader { lookup };

    // ── Router ──────────────────────────────────────────────────────
    if let Some(v) = env.level("RELAY_MIN_LEVEL") {
        settings.minimum_level = v;
    }
    if let Some(v) = env.format("RELAY_FORMAT") {
        settings.format = v;
    }

    // ── Sinks ───────────────────────────────────────────────────────
    if let Some(v) = env.bool("RELAY_CONSOLE_ENABLED") {
        settings.console.enabled = v;
    }
    if let Some(v) = env.bool("RELAY_FILE_ENABLED") {
        settings.file.enabled = v;
    }
    if let Some(v) = env.string("RELAY_FILE_PATH") {
        settings.file.path = v;
    }
    if let Some(v) = env.u64("RELAY_MAX_FILE_SIZE_MB", 0, 1024 * 1024) {
        settings.file.max_file_size_mb = v;
    }
    if let Some(v) = env.usize("RELAY_RETENTION_COUNT", 0, 100_000) {
        settings.file.retention_count = v;
    }

    // ── Dispatcher ──────────────────────────────────────────────────
    if let Some(v) = env.usize("RELAY_DISPATCHER_CAPACITY", 1, 10_000_000) {
        settings.dispatcher.capacity = v;
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

/// Parse a level name (case-insensitive; `warning` and `fatal` accepted).
pub fn parse_level(val: &str) -> Option<LogLevel> {
    LogLevel::from_str(val.trim()).ok()
}

/// Parse `text` or `json` (case-insensitive).
pub fn parse_format(val: &str) -> Option<OutputFormat> {
    match val.trim().to_lowercase().as_str() {
        "text" => Some(OutputFormat::Text),
        "json" => Some(OutputFormat::Json),
        _ => None,
    }
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
    }

    fn string(&self, name: &str) -> Option<String> {
        self.raw(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, kind: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = self.raw(name)?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, kind, "invalid env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, "boolean", parse_bool)
    }

    fn level(&self, name: &str) -> Option<LogLevel> {
        self.parsed(name, "level", parse_level)
    }

    fn format(&self, name: &str) -> Option<OutputFormat> {
        self.parsed(name, "format", parse_format)
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, "u64", |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, "usize", |v| parse_usize_range(v, min, max))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
