//! Log severity levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::RelayError;

/// Severity of a log message.
///
/// Ordering follows severity, so `level >= threshold` is the filter test.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum LogLevel {
    /// Detailed entry/exit points.
    #[serde(alias = "trace")]
    Trace = 0,
    /// Intermediate values, decisions.
    #[serde(alias = "debug")]
    Debug = 1,
    /// Outcomes, summaries.
    #[default]
    #[serde(alias = "info")]
    Info = 2,
    /// Non-fatal issues.
    #[serde(alias = "warn", alias = "warning")]
    Warn = 3,
    /// Errors.
    #[serde(alias = "error")]
    Error = 4,
    /// Unrecoverable errors.
    #[serde(alias = "critical", alias = "fatal")]
    Critical = 5,
}

impl LogLevel {
    /// Every level, least severe first.
    pub const ALL: [Self; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Critical,
    ];

    /// Numeric value for external consumers (higher = more severe).
    #[must_use]
    pub const fn as_num(self) -> i32 {
        (self as i32 + 1) * 10
    }

    /// Compact representation for atomic storage.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`LogLevel::as_u8`]. Out-of-range values saturate to `Critical`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            4 => Self::Error,
            _ => Self::Critical,
        }
    }

    /// Convert from string (case-insensitive), falling back to `Info`.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or(Self::Info)
    }

    /// Standard name, as rendered by the `{level}` token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "Trace",
            Self::Debug => "Debug",
            Self::Info => "Info",
            Self::Warn => "Warn",
            Self::Error => "Error",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" | "information" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "critical" | "fatal" => Ok(Self::Critical),
            other => Err(RelayError::InvalidArgument(format!(
                "unknown log level: {other:?}"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
    }

    #[test]
    fn log_level_numeric() {
        assert_eq!(LogLevel::Trace.as_num(), 10);
        assert_eq!(LogLevel::Info.as_num(), 30);
        assert_eq!(LogLevel::Critical.as_num(), 60);
    }

    #[test]
    fn u8_conversion_is_stable() {
        for level in LogLevel::ALL {
            assert_eq!(LogLevel::from_u8(level.as_u8()), level);
        }
        assert_eq!(LogLevel::from_u8(200), LogLevel::Critical);
    }

    #[test]
    fn log_level_display() {
        assert_eq!(LogLevel::Info.to_string(), "Info");
        assert_eq!(LogLevel::Critical.to_string(), "Critical");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("Fatal".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn from_str_lossy_defaults_to_info() {
        assert_eq!(LogLevel::from_str_lossy("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_lossy("unknown"), LogLevel::Info);
    }

    #[test]
    fn serde_accepts_both_casings() {
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"Warn\"");
        let a: LogLevel = serde_json::from_str("\"Error\"").unwrap();
        let b: LogLevel = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(a, b);
    }
}
