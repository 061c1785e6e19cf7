//! Settings types.
//!
//! Every struct deserializes with `#[serde(default)]`, so a partial JSON
//! document fills the rest from compiled defaults.

use indexmap::IndexMap;
use relay_core::LogLevel;
use relay_format::{DEFAULT_TEMPLATE, OutputFormat};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root configuration for a logging pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Router-wide minimum level, the last step of threshold resolution.
    pub minimum_level: LogLevel,
    /// Output mode shared by the console and file sinks.
    pub format: OutputFormat,
    /// Template for categories without an override. `{timestamp:...}`
    /// takes a date-style pattern (`HH:mm:ss.fff`) or, when it contains `%`,
    /// a `chrono` strftime pattern.
    pub default_template: String,
    /// Per-category template overrides, applied in order.
    pub category_templates: IndexMap<String, String>,
    /// Categories registered at startup.
    pub categories: Vec<CategorySettings>,
    /// Console sink.
    pub console: ConsoleSettings,
    /// Rotating file sink.
    pub file: FileSettings,
    /// Subscriber queue.
    pub dispatcher: DispatcherSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            minimum_level: LogLevel::Trace,
            format: OutputFormat::Text,
            default_template: DEFAULT_TEMPLATE.to_string(),
            category_templates: IndexMap::new(),
            categories: Vec::new(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
            dispatcher: DispatcherSettings::default(),
        }
    }
}

impl PipelineSettings {
    /// Reject values no component can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.dispatcher.capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "dispatcher capacity must be at least 1".to_string(),
            ));
        }
        if let Some(index) = self.categories.iter().position(|c| c.name.trim().is_empty()) {
            return Err(SettingsError::InvalidValue(format!(
                "categories[{index}] has an empty name"
            )));
        }
        if self.category_templates.keys().any(|k| k.trim().is_empty()) {
            return Err(SettingsError::InvalidValue(
                "category template key is empty".to_string(),
            ));
        }
        if self.file.enabled && self.file.path.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "file sink is enabled but has no path".to_string(),
            ));
        }
        Ok(())
    }
}

/// One category registered at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategorySettings {
    /// Category name.
    pub name: String,
    /// Minimum level for this category.
    pub minimum_level: LogLevel,
    /// Disabled categories drop every message.
    pub enabled: bool,
    /// Display color for viewers.
    pub color: String,
}

impl Default for CategorySettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            minimum_level: LogLevel::Info,
            enabled: true,
            color: "default".to_string(),
        }
    }
}

/// Console sink settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleSettings {
    /// Whether a console sink is created.
    pub enabled: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// File sink settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSettings {
    /// Whether a file sink is requested. Storage availability still applies.
    pub enabled: bool,
    /// Active log file path.
    pub path: String,
    /// Size-based rotation.
    pub rotation_enabled: bool,
    /// Rotation threshold in MB. 0 rotates on every write.
    pub max_file_size_mb: u64,
    /// Archives kept after rotation. 0 keeps all.
    pub retention_count: usize,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "logs/relay.log".to_string(),
            rotation_enabled: true,
            max_file_size_mb: 10,
            retention_count: 5,
        }
    }
}

/// Subscriber queue settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatcherSettings {
    /// Pending notifications held before new ones are dropped.
    pub capacity: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}
