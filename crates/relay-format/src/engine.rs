//! Template engine.
//!
//! # Tokens
//!
//! | Token | Renders |
//! |-------|---------|
//! | `{timestamp}` / `{timestamp:HH:mm:ss.fff}` | ISO-8601 UTC, or a custom date pattern |
//! | `{level}` `{category}` `{message}` | the message fields |
//! | `{frame}` `{threadId}` | numeric, `frame` empty when absent |
//! | `{thread}` | `name(id)`, or just `id` for unnamed threads |
//! | `{file}` `{method}` `{line}` | call site, empty when absent |
//! | `{memoryMB}` | live resident memory, two decimals |
//! | `{stack}` | stack trace, empty when absent |
//! | `{context}` | every context entry as `key=value`, joined by `", "` |
//! | `{anyContextKey}` | that context entry's value |
//!
//! Standard token names match case-insensitively; context keys match
//! exactly. Unknown or malformed tokens are copied through verbatim.
//!
//! # Timestamp patterns
//!
//! A subformat containing `%` is a `chrono` strftime pattern
//! (`{timestamp:%H:%M:%S}`). Anything else uses date-style letters, as in
//! `yyyyMMdd-HHmmss-fff`:
//!
//! | Letters | Renders |
//! |---------|---------|
//! | `yyyy` `yy` | year, four or two digits |
//! | `MM` `M` `MMM` `MMMM` | month: padded, unpadded, `Mar`, `March` |
//! | `dd` `d` `ddd` `dddd` | day: padded, unpadded, `Sat`, `Saturday` |
//! | `HH` `H` / `hh` `h` | 24-hour / 12-hour hour |
//! | `mm` `m` `ss` `s` | minute, second |
//! | `fff` `ffffff` `fffffffff` | milliseconds, microseconds, nanoseconds |
//! | `tt` | `AM` / `PM` |
//!
//! Shorter `f` runs round up to milliseconds. Other characters are literal.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use regex::{Captures, Regex};
use relay_core::{LogMessage, RelayError, Result};
use serde::{Deserialize, Serialize};

use crate::json::to_json_line;
use crate::memory::{MemoryProbe, SystemMemoryProbe};

/// Template used when neither the caller nor the category supplies one.
pub const DEFAULT_TEMPLATE: &str = "[{timestamp}] [{level}] [{category}] {message}";

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}:]+)(?::([^{}]*))?\}").expect("valid token pattern"));

/// Output mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Literal template substitution.
    #[default]
    Text,
    /// Fixed-shape JSON object, one per line.
    Json,
}

/// Formats log messages from templates.
///
/// Safe to share across threads: the default template sits behind a
/// read-write lock, per-category overrides in a concurrent map.
pub struct TemplateEngine {
    default_template: RwLock<Arc<str>>,
    category_templates: DashMap<String, Arc<str>>,
    memory: Arc<dyn MemoryProbe>,
}

impl TemplateEngine {
    /// Engine with [`DEFAULT_TEMPLATE`] and a live memory probe.
    pub fn new() -> Self {
        Self::with_default_template(DEFAULT_TEMPLATE)
    }

    /// Engine with a custom default template.
    pub fn with_default_template(template: impl Into<String>) -> Self {
        Self {
            default_template: RwLock::new(Arc::from(template.into())),
            category_templates: DashMap::new(),
            memory: Arc::new(SystemMemoryProbe::new()),
        }
    }

    /// Replace the memory probe behind `{memoryMB}`.
    #[must_use]
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = probe;
        self
    }

    /// Current process-wide default template.
    pub fn default_template(&self) -> String {
        self.default_template.read().to_string()
    }

    /// Replace the default template. Takes effect for the next format call.
    pub fn set_default_template(&self, template: impl Into<String>) {
        *self.default_template.write() = Arc::from(template.into());
    }

    /// Override the template for one category.
    pub fn set_category_template(
        &self,
        category: &str,
        template: impl Into<String>,
    ) -> Result<()> {
        if category.trim().is_empty() {
            return Err(RelayError::invalid_argument("category name is empty"));
        }
        let _ = self
            .category_templates
            .insert(category.to_string(), Arc::from(template.into()));
        Ok(())
    }

    /// The override for `category`, if one is set.
    pub fn category_template(&self, category: &str) -> Option<String> {
        self.category_templates
            .get(category)
            .map(|entry| entry.value().to_string())
    }

    /// Remove a category override. Returns whether one existed.
    pub fn clear_category_template(&self, category: &str) -> bool {
        self.category_templates.remove(category).is_some()
    }

    /// Template that applies to `category`: its override, else the default.
    pub fn template_for(&self, category: &str) -> Arc<str> {
        if let Some(entry) = self.category_templates.get(category) {
            return Arc::clone(entry.value());
        }
        Arc::clone(&self.default_template.read())
    }

    /// Format with the template that applies to the message's category.
    pub fn format(&self, msg: &LogMessage, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => to_json_line(msg),
            OutputFormat::Text => self.render_text(msg, &self.template_for(msg.category())),
        }
    }

    /// Format with an explicit template. JSON mode ignores the template.
    pub fn format_with_template(
        &self,
        msg: &LogMessage,
        format: OutputFormat,
        template: &str,
    ) -> String {
        match format {
            OutputFormat::Json => to_json_line(msg),
            OutputFormat::Text => self.render_text(msg, template),
        }
    }

    /// Substitute every recognized token in `template`.
    pub fn render_text(&self, msg: &LogMessage, template: &str) -> String {
        TOKEN_PATTERN
            .replace_all(template, |caps: &Captures<'_>| {
                let name = &caps[1];
                let subformat = caps.get(2).map(|m| m.as_str());
                match self.render_token(msg, name, subformat) {
                    Some(value) => value.into_owned(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Value for one token, or `None` to leave it verbatim.
    fn render_token<'m>(
        &self,
        msg: &'m LogMessage,
        name: &str,
        subformat: Option<&str>,
    ) -> Option<Cow<'m, str>> {
        let caller = msg.caller();
        let value = match name.to_ascii_lowercase().as_str() {
            "timestamp" => match subformat.filter(|s| !s.is_empty()) {
                Some(pattern) => Cow::Owned(format_timestamp(msg.timestamp(), pattern)?),
                None => Cow::Owned(iso_timestamp(msg)),
            },
            "level" => Cow::Borrowed(msg.level().as_str()),
            "category" => Cow::Borrowed(msg.category()),
            "message" => Cow::Borrowed(msg.message()),
            "frame" => Cow::Owned(msg.frame().map(|f| f.to_string()).unwrap_or_default()),
            "threadid" => Cow::Owned(msg.thread().id.to_string()),
            "thread" => Cow::Owned(match &msg.thread().name {
                Some(thread_name) => format!("{thread_name}({})", msg.thread().id),
                None => msg.thread().id.to_string(),
            }),
            "file" => Cow::Borrowed(caller.file.as_deref().unwrap_or("")),
            "method" => Cow::Borrowed(caller.member.as_deref().unwrap_or("")),
            "line" => Cow::Owned(caller.line.map(|l| l.to_string()).unwrap_or_default()),
            "memorymb" => Cow::Owned(format!("{:.2}", self.memory.resident_mb())),
            "stack" => Cow::Borrowed(msg.stack_trace().unwrap_or("")),
            "context" => Cow::Owned(join_context(msg)),
            _ => Cow::Owned(msg.context().get(name)?.to_string()),
        };
        Some(value)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-01-15T12:00:00.000Z`.
pub(crate) fn iso_timestamp(msg: &LogMessage) -> String {
    msg.timestamp().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render a timestamp subformat, or `None` if the pattern is invalid.
fn format_timestamp(ts: DateTime<Utc>, pattern: &str) -> Option<String> {
    let strftime = if pattern.contains('%') {
        Cow::Borrowed(pattern)
    } else {
        Cow::Owned(date_pattern_to_strftime(pattern))
    };
    let items: Vec<Item<'_>> = StrftimeItems::new(&strftime).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    let mut out = String::new();
    write!(out, "{}", ts.format_with_items(items.iter())).ok()?;
    Some(out)
}

/// Translate date-style letters (`yyyy`, `MM`, `HH`, `fff`, ...) to strftime.
fn date_pattern_to_strftime(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let spec = match (c, run) {
            ('y', 1..=3) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', 2) => "%d",
            ('d', 3) => "%a",
            ('d', _) => "%A",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('f', 1..=3) => "%3f",
            ('f', 4..=6) => "%6f",
            ('f', _) => "%9f",
            ('t', _) => "%p",
            _ => {
                out.push(c);
                i += 1;
                continue;
            }
        };
        out.push_str(spec);
        i += run;
    }
    out
}

fn join_context(msg: &LogMessage) -> String {
    let mut out = String::new();
    for (i, (key, value)) in msg.context().iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{key}={value}");
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
