//! The immutable log message value.
//!
//! A [`LogMessage`] is built once per log call by the producer and never
//! mutated afterwards; the router hands out shared references only.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::context::{ContextMap, ContextValue};
use crate::level::LogLevel;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// Identity of the thread that produced a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Process-unique id, assigned on a thread's first log call.
    pub id: u64,
    /// Thread name, if the thread was named.
    pub name: Option<String>,
}

impl ThreadInfo {
    /// Capture the calling thread.
    pub fn current() -> Self {
        let id = THREAD_ID.with(|cell| {
            let mut id = cell.get();
            if id == 0 {
                id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
                cell.set(id);
            }
            id
        });
        Self {
            id,
            name: std::thread::current().name().map(str::to_string),
        }
    }
}

/// Source location of the log call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallerInfo {
    /// Source file.
    pub file: Option<String>,
    /// Enclosing function or method.
    pub member: Option<String>,
    /// Line number.
    pub line: Option<u32>,
}

/// One log event.
#[derive(Clone, Debug, PartialEq)]
pub struct LogMessage {
    level: LogLevel,
    category: String,
    message: String,
    timestamp: DateTime<Utc>,
    frame: Option<u64>,
    thread: ThreadInfo,
    caller: CallerInfo,
    stack_trace: Option<String>,
    context: ContextMap,
}

impl LogMessage {
    /// Message stamped with the current time and thread.
    pub fn new(level: LogLevel, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::builder(level, category, message).build()
    }

    /// Start building a message with optional fields.
    pub fn builder(
        level: LogLevel,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> LogMessageBuilder {
        LogMessageBuilder {
            inner: Self {
                level,
                category: category.into(),
                message: message.into(),
                timestamp: Utc::now(),
                frame: None,
                thread: ThreadInfo::current(),
                caller: CallerInfo::default(),
                stack_trace: None,
                context: ContextMap::new(),
            },
        }
    }

    /// Severity.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Category name.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Message text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// UTC creation time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Frame counter, when the producer has one.
    pub fn frame(&self) -> Option<u64> {
        self.frame
    }

    /// Producing thread.
    pub fn thread(&self) -> &ThreadInfo {
        &self.thread
    }

    /// Call site.
    pub fn caller(&self) -> &CallerInfo {
        &self.caller
    }

    /// Captured stack trace, if any.
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    /// Ordered context entries.
    pub fn context(&self) -> &ContextMap {
        &self.context
    }
}

/// Builder for [`LogMessage`].
#[derive(Debug)]
#[must_use]
pub struct LogMessageBuilder {
    inner: LogMessage,
}

impl LogMessageBuilder {
    /// Override the timestamp.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.inner.timestamp = timestamp;
        self
    }

    /// Attach a frame counter.
    pub fn frame(mut self, frame: u64) -> Self {
        self.inner.frame = Some(frame);
        self
    }

    /// Override the producing thread.
    pub fn thread(mut self, id: u64, name: Option<&str>) -> Self {
        self.inner.thread = ThreadInfo {
            id,
            name: name.map(str::to_string),
        };
        self
    }

    /// Attach an explicit call site.
    pub fn caller(
        mut self,
        file: impl Into<String>,
        member: impl Into<String>,
        line: u32,
    ) -> Self {
        self.inner.caller = CallerInfo {
            file: Some(file.into()),
            member: Some(member.into()),
            line: Some(line),
        };
        self
    }

    /// Record the file and line of the code calling this method.
    #[track_caller]
    pub fn capture_caller(mut self) -> Self {
        let location = std::panic::Location::caller();
        self.inner.caller.file = Some(location.file().to_string());
        self.inner.caller.line = Some(location.line());
        self
    }

    /// Attach a stack trace. Empty traces are ignored.
    pub fn stack_trace(mut self, trace: impl Into<String>) -> Self {
        let trace = trace.into();
        self.inner.stack_trace = (!trace.is_empty()).then_some(trace);
        self
    }

    /// Add a context entry. Re-adding a key replaces its value in place.
    pub fn context(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        let _ = self.inner.context.insert(key.into(), value.into());
        self
    }

    /// Finish building.
    pub fn build(self) -> LogMessage {
        self.inner
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_captures_thread() {
        let msg = LogMessage::new(LogLevel::Info, "Test", "hi");
        assert_eq!(msg.level(), LogLevel::Info);
        assert_eq!(msg.category(), "Test");
        assert_eq!(msg.message(), "hi");
        assert!(msg.thread().id > 0);
        assert!(msg.frame().is_none());
        assert!(msg.context().is_empty());
    }

    #[test]
    fn thread_id_is_stable_per_thread() {
        let a = ThreadInfo::current();
        let b = ThreadInfo::current();
        assert_eq!(a.id, b.id);

        let other = std::thread::spawn(|| ThreadInfo::current().id).join().unwrap();
        assert_ne!(a.id, other);
    }

    #[test]
    fn named_thread_is_recorded() {
        let name = std::thread::Builder::new()
            .name("render".into())
            .spawn(|| LogMessage::new(LogLevel::Debug, "a", "b").thread().name.clone())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(name.as_deref(), Some("render"));
    }

    #[test]
    fn builder_sets_optional_fields() {
        let msg = LogMessage::builder(LogLevel::Error, "Net", "down")
            .frame(120)
            .caller("net.rs", "connect", 42)
            .stack_trace("at connect\nat main")
            .context("retries", 3)
            .build();
        assert_eq!(msg.frame(), Some(120));
        assert_eq!(msg.caller().member.as_deref(), Some("connect"));
        assert_eq!(msg.caller().line, Some(42));
        assert_eq!(msg.stack_trace(), Some("at connect\nat main"));
        assert_eq!(msg.context()["retries"], ContextValue::Int(3));
    }

    #[test]
    fn empty_stack_trace_is_dropped() {
        let msg = LogMessage::builder(LogLevel::Info, "a", "b")
            .stack_trace("")
            .build();
        assert!(msg.stack_trace().is_none());
    }

    #[test]
    fn context_keeps_insertion_order() {
        let msg = LogMessage::builder(LogLevel::Info, "a", "b")
            .context("z", 1)
            .context("a", 2)
            .context("z", 3)
            .build();
        let keys: Vec<&str> = msg.context().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(msg.context()["z"], ContextValue::Int(3));
    }

    #[test]
    fn capture_caller_records_this_file() {
        let msg = LogMessage::builder(LogLevel::Info, "a", "b")
            .capture_caller()
            .build();
        assert!(msg.caller().file.as_deref().unwrap().ends_with("message.rs"));
        assert!(msg.caller().line.is_some());
    }
}
