//! JSON-lines rendering.
//!
//! The object shape is fixed and independent of any template. Optional
//! fields are omitted when absent, never written as `null`.

use relay_core::{ContextMap, LogMessage};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonRecord<'a> {
    level: &'static str,
    category: &'a str,
    message: &'a str,
    timestamp: String,
    frame: u64,
    thread_id: u64,
    thread_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a ContextMap>,
}

impl<'a> JsonRecord<'a> {
    fn from_message(msg: &'a LogMessage) -> Self {
        let caller = msg.caller();
        Self {
            level: msg.level().as_str(),
            category: msg.category(),
            message: msg.message(),
            timestamp: crate::engine::iso_timestamp(msg),
            frame: msg.frame().unwrap_or(0),
            thread_id: msg.thread().id,
            thread_name: msg.thread().name.as_deref().unwrap_or(""),
            file: caller.file.as_deref(),
            method: caller.member.as_deref(),
            line: caller.line,
            stack: msg.stack_trace(),
            context: (!msg.context().is_empty()).then_some(msg.context()),
        }
    }
}

/// Render a message as one JSON object (no trailing newline).
pub fn to_json_line(msg: &LogMessage) -> String {
    serde_json::to_string(&JsonRecord::from_message(msg)).unwrap_or_else(|e| {
        format!(
            r#"{{"level":"Error","category":"Logging","message":"{}"}}"#,
            escape_json(&e.to_string())
        )
    })
}

/// Escape a string for embedding between JSON double quotes.
///
/// Quotes, backslashes, and every control character are escaped, so the result
/// is valid JSON string content for any input.
pub fn escape_json(s: &str) -> String {
    let quoted = serde_json::Value::String(s.to_owned()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
