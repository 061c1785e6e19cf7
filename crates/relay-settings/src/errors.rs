//! Settings error types.

use thiserror::Error;

/// Errors that can occur when parsing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The supplied settings were not valid JSON, or had the wrong shape.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A settings value was invalid (e.g., out of range).
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
