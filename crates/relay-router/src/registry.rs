//! Category metadata store.
//!
//! Every getter answers for unknown names with the documented defaults
//! (level `Info`, color `"default"`, enabled). Every setter upserts: touching
//! an unknown name creates it with those defaults plus the one change.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use relay_core::{LogLevel, RelayError, Result};
use serde::{Deserialize, Serialize};

/// Color reported for categories that never set one.
pub const DEFAULT_COLOR: &str = "default";

/// Level reported for categories that never set one.
pub const DEFAULT_MINIMUM_LEVEL: LogLevel = LogLevel::Info;

/// Filter and display metadata for one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMetadata {
    /// Category name, also the registry key.
    pub name: String,
    /// Messages below this level are dropped (unless a router filter applies).
    pub minimum_level: LogLevel,
    /// Disabled categories drop every message.
    pub enabled: bool,
    /// Display color for viewers.
    pub color: String,
}

impl CategoryMetadata {
    /// Metadata with every field at its default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            minimum_level: DEFAULT_MINIMUM_LEVEL,
            enabled: true,
            color: DEFAULT_COLOR.to_string(),
        }
    }

    /// Set the minimum level.
    #[must_use]
    pub fn with_minimum_level(mut self, level: LogLevel) -> Self {
        self.minimum_level = level;
        self
    }

    /// Set the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the display color.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// Thread-safe map of category name to [`CategoryMetadata`].
#[derive(Debug, Default)]
pub struct CategoryRegistry {
    categories: DashMap<String, CategoryMetadata>,
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RelayError::invalid_argument("category name is empty"));
    }
    Ok(())
}

impl CategoryRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name` with a minimum level and default display.
    pub fn register_category(&self, name: &str, minimum_level: LogLevel) -> Result<()> {
        self.register_metadata(CategoryMetadata::new(name).with_minimum_level(minimum_level))
    }

    /// Insert or replace a full metadata record, keyed by its name.
    pub fn register_metadata(&self, metadata: CategoryMetadata) -> Result<()> {
        require_name(&metadata.name)?;
        let _ = self.categories.insert(metadata.name.clone(), metadata);
        Ok(())
    }

    /// Remove `name`. Returns whether it was registered.
    pub fn unregister_category(&self, name: &str) -> bool {
        self.categories.remove(name).is_some()
    }

    /// Move `old`'s metadata to `new`, replacing anything already at `new`.
    ///
    /// Returns `Ok(false)` without changes when `old` is not registered.
    pub fn rename_category(&self, old: &str, new: &str) -> Result<bool> {
        require_name(new)?;
        if old == new {
            return Ok(self.categories.contains_key(old));
        }
        let Some((_, mut metadata)) = self.categories.remove(old) else {
            return Ok(false);
        };
        new.clone_into(&mut metadata.name);
        let _ = self.categories.insert(new.to_string(), metadata);
        Ok(true)
    }

    // ── Getters (never fail) ────────────────────────────────────────

    /// Minimum level, or `Info` for unknown names.
    pub fn minimum_level(&self, name: &str) -> LogLevel {
        self.categories
            .get(name)
            .map_or(DEFAULT_MINIMUM_LEVEL, |m| m.minimum_level)
    }

    /// Display color, or `"default"` for unknown names.
    pub fn color(&self, name: &str) -> String {
        self.categories
            .get(name)
            .map_or_else(|| DEFAULT_COLOR.to_string(), |m| m.color.clone())
    }

    /// Enabled flag, `true` for unknown names.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.categories.get(name).is_none_or(|m| m.enabled)
    }

    /// Stored metadata, or a default record carrying `name`.
    pub fn metadata(&self, name: &str) -> CategoryMetadata {
        self.categories
            .get(name)
            .map_or_else(|| CategoryMetadata::new(name), |m| m.value().clone())
    }

    /// Whether `name` has an entry.
    pub fn is_registered(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.categories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.categories.clear();
    }

    /// `(enabled, minimum_level)` for a registered name, without cloning.
    pub(crate) fn filter_state(&self, name: &str) -> Option<(bool, LogLevel)> {
        self.categories
            .get(name)
            .map(|m| (m.enabled, m.minimum_level))
    }

    // ── Setters (upsert) ────────────────────────────────────────────

    /// Set the minimum level, creating the category if needed.
    pub fn set_minimum_level(&self, name: &str, level: LogLevel) -> Result<()> {
        self.upsert(name, |m| m.minimum_level = level)
    }

    /// Set the display color, creating the category if needed.
    pub fn set_color(&self, name: &str, color: impl Into<String>) -> Result<()> {
        let color = color.into();
        self.upsert(name, move |m| m.color = color)
    }

    /// Set the enabled flag, creating the category if needed.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.upsert(name, |m| m.enabled = enabled)
    }

    fn upsert(&self, name: &str, apply: impl FnOnce(&mut CategoryMetadata)) -> Result<()> {
        require_name(name)?;
        match self.categories.entry(name.to_string()) {
            Entry::Occupied(mut entry) => apply(entry.get_mut()),
            Entry::Vacant(entry) => {
                let mut metadata = CategoryMetadata::new(name);
                apply(&mut metadata);
                let _ = entry.insert(metadata);
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
