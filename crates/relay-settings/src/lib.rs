//! # relay-settings
//!
//! Plain-value configuration for a relay pipeline.
//!
//! Settings come from three layers (in priority order):
//! 1. **Compiled defaults**: [`PipelineSettings::default()`]
//! 2. **Host JSON**: deep-merged over defaults by [`load_settings`]
//! 3. **Environment variables**: `RELAY_*` overrides (highest priority)
//!
//! Where the JSON comes from is the host's business; this crate never touches
//! the file system.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_with, deep_merge, load_settings,
    load_settings_from_value, parse_settings,
};
pub use types::{
    CategorySettings, ConsoleSettings, DispatcherSettings, FileSettings, PipelineSettings,
};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
