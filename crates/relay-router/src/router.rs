//! Message routing.
//!
//! # Threshold resolution
//!
//! For a message in category `c`, first match wins:
//! 1. `c` is disabled in the registry: drop, whatever the level
//! 2. a router filter is set for `c`: that level
//! 3. `c` is registered: its registry minimum level
//! 4. the router's global minimum level (`Trace` unless changed)
//!
//! A message passes when `level >= threshold`.
//!
//! # Delivery
//!
//! Sinks are written synchronously, in registration order, on the caller's
//! thread. Subscribers are notified later on the dispatcher's owner thread,
//! through its bounded queue. A failing or panicking sink or subscriber is
//! skipped; it never reaches the caller of [`LogRouter::route`].
//!
//! # Failure reports
//!
//! Sink errors, sink panics, sink warnings ([`Sink::take_warnings`]), and
//! subscriber panics are routed back through the same router as messages in
//! [`LOGGING_CATEGORY`]: `Warn` for errors, `Error` for panics. They obey the
//! usual filters. A failure hit while delivering a report is only traced, so
//! reporting never recurses. Subscriber panics on `Logging` messages are only
//! traced too, so a handler that always panics cannot keep the queue busy.

use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use relay_core::{LogLevel, LogMessage, RelayError, Result};
use relay_sinks::Sink;

use crate::dispatcher::Dispatcher;
use crate::registry::CategoryRegistry;
use crate::subscription::{SubscriberEntry, SubscriberList, Subscription};

/// Category the pipeline reports its own problems under.
pub const LOGGING_CATEGORY: &str = "Logging";

type SinkList = Arc<[Arc<dyn Sink>]>;

thread_local! {
    static REPORTING: Cell<bool> = const { Cell::new(false) };
}

fn same_sink(a: &Arc<dyn Sink>, b: &Arc<dyn Sink>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// A caught failure waiting to be routed as a log entry.
struct Incident {
    level: LogLevel,
    text: String,
}

impl Incident {
    fn warn(text: String) -> Self {
        Self {
            level: LogLevel::Warn,
            text,
        }
    }

    fn error(text: String) -> Self {
        Self {
            level: LogLevel::Error,
            text,
        }
    }
}

/// Filters messages and fans them out to sinks and subscribers.
pub struct LogRouter {
    inner: Arc<RouterInner>,
    next_subscriber_id: AtomicU64,
}

struct RouterInner {
    registry: Arc<CategoryRegistry>,
    dispatcher: Arc<Dispatcher>,
    sinks: RwLock<SinkList>,
    category_filters: DashMap<String, LogLevel>,
    global_minimum: AtomicU8,
    subscribers: Arc<SubscriberList>,
}

impl LogRouter {
    /// Router over a shared registry and dispatcher.
    pub fn new(registry: Arc<CategoryRegistry>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                registry,
                dispatcher,
                sinks: RwLock::new(Arc::from(Vec::<Arc<dyn Sink>>::new())),
                category_filters: DashMap::new(),
                global_minimum: AtomicU8::new(LogLevel::Trace.as_u8()),
                subscribers: Arc::new(SubscriberList::default()),
            }),
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// The category registry consulted during resolution.
    pub fn registry(&self) -> &Arc<CategoryRegistry> {
        &self.inner.registry
    }

    /// The dispatcher subscriber notifications are queued on.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.inner.dispatcher
    }

    // ── Routing ─────────────────────────────────────────────────────

    /// Filter and deliver one message. Returns whether it passed the filter.
    pub fn route(&self, message: &LogMessage) -> bool {
        self.inner.route(message)
    }

    /// Build a message on the calling thread and route it.
    pub fn log(&self, level: LogLevel, category: &str, message: impl Into<String>) -> bool {
        self.route(&LogMessage::new(level, category, message))
    }

    /// Minimum level a message in `category` needs, or `None` if the category
    /// is disabled.
    pub fn resolve_threshold(&self, category: &str) -> Option<LogLevel> {
        self.inner.resolve_threshold(category)
    }

    // ── Filters ─────────────────────────────────────────────────────

    /// Set the level used for categories without a more specific rule.
    pub fn set_global_minimum_level(&self, level: LogLevel) {
        self.inner.global_minimum.store(level.as_u8(), Ordering::Relaxed);
    }

    /// Current global minimum level.
    pub fn global_minimum_level(&self) -> LogLevel {
        self.inner.global_minimum_level()
    }

    /// Override the threshold for one category, ahead of the registry.
    pub fn set_category_filter(&self, category: &str, level: LogLevel) -> Result<()> {
        if category.trim().is_empty() {
            return Err(RelayError::invalid_argument("category name is empty"));
        }
        let _ = self.inner.category_filters.insert(category.to_string(), level);
        Ok(())
    }

    /// Remove a category override. Returns whether one was set.
    pub fn clear_category_filter(&self, category: &str) -> bool {
        self.inner.category_filters.remove(category).is_some()
    }

    /// The router filter for `category`, if set.
    pub fn category_filter(&self, category: &str) -> Option<LogLevel> {
        self.inner.category_filters.get(category).map(|level| *level)
    }

    // ── Sinks ───────────────────────────────────────────────────────

    /// Append `sink` to the fan-out. Registering the same instance again is a
    /// no-op; returns whether it was added.
    pub fn register_sink(&self, sink: Arc<dyn Sink>) -> bool {
        let mut sinks = self.inner.sinks.write();
        if sinks.iter().any(|s| same_sink(s, &sink)) {
            return false;
        }
        tracing::debug!(sink = sink.name(), "sink registered");
        let mut next: Vec<Arc<dyn Sink>> = sinks.iter().cloned().collect();
        next.push(sink);
        *sinks = next.into();
        true
    }

    /// Remove `sink`. Returns whether it was registered. The sink is not
    /// disposed.
    pub fn unregister_sink(&self, sink: &Arc<dyn Sink>) -> bool {
        let mut sinks = self.inner.sinks.write();
        if !sinks.iter().any(|s| same_sink(s, sink)) {
            return false;
        }
        let next: Vec<Arc<dyn Sink>> = sinks
            .iter()
            .filter(|s| !same_sink(s, sink))
            .cloned()
            .collect();
        *sinks = next.into();
        tracing::debug!(sink = sink.name(), "sink unregistered");
        true
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.inner.sinks.read().len()
    }

    /// Flush every registered sink. Failures are reported like write
    /// failures.
    pub fn flush_all(&self) {
        let sinks = Arc::clone(&self.inner.sinks.read());
        let mut incidents = Vec::new();
        for sink in sinks.iter() {
            match catch_unwind(AssertUnwindSafe(|| sink.flush())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(sink = sink.name(), error = %e, "sink flush failed");
                    incidents.push(Incident::warn(format!(
                        "Sink '{}' failed to flush: {e}",
                        sink.name()
                    )));
                }
                Err(payload) => {
                    let err = RelayError::from_panic(sink.name(), payload.as_ref());
                    tracing::warn!(sink = sink.name(), error = %err, "sink panicked during flush");
                    incidents.push(Incident::error(format!(
                        "Sink '{}' panicked during flush: {err}",
                        sink.name()
                    )));
                }
            }
        }
        self.inner.report(incidents);
    }

    // ── Subscribers ─────────────────────────────────────────────────

    /// Receive every message that passes filtering, on the dispatcher's
    /// owner thread. Delivery stops when the returned handle is disposed or
    /// dropped.
    pub fn subscribe(
        &self,
        handler: impl Fn(&LogMessage) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.add(id, Box::new(handler))
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl RouterInner {
    fn global_minimum_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_minimum.load(Ordering::Relaxed))
    }

    fn resolve_threshold(&self, category: &str) -> Option<LogLevel> {
        let registered = self.registry.filter_state(category);
        if let Some((false, _)) = registered {
            return None;
        }
        if let Some(level) = self.category_filters.get(category) {
            return Some(*level);
        }
        if let Some((_, level)) = registered {
            return Some(level);
        }
        Some(self.global_minimum_level())
    }

    fn route(self: &Arc<Self>, message: &LogMessage) -> bool {
        let Some(threshold) = self.resolve_threshold(message.category()) else {
            return false;
        };
        if message.level() < threshold {
            return false;
        }

        let sinks = Arc::clone(&self.sinks.read());
        let mut incidents = Vec::new();
        for sink in sinks.iter() {
            write_isolated(sink.as_ref(), message, &mut incidents);
        }

        let subscribers = self.subscribers.snapshot();
        if !subscribers.is_empty() {
            let message = message.clone();
            let router = Arc::downgrade(self);
            let _ = self.dispatcher.enqueue(move || {
                deliver_all(&subscribers, &message, &router);
            });
        }

        self.report(incidents);
        true
    }

    /// Route each incident as a `Logging` message, unless this thread is
    /// already reporting.
    fn report(self: &Arc<Self>, incidents: Vec<Incident>) {
        if incidents.is_empty() || REPORTING.get() {
            return;
        }
        REPORTING.set(true);
        for incident in incidents {
            let _ = self.route(&LogMessage::new(
                incident.level,
                LOGGING_CATEGORY,
                incident.text,
            ));
        }
        REPORTING.set(false);
    }
}

fn deliver_all(
    subscribers: &[Arc<SubscriberEntry>],
    message: &LogMessage,
    router: &Weak<RouterInner>,
) {
    let mut incidents = Vec::new();
    for entry in subscribers {
        let Some(err) = entry.deliver(message) else {
            continue;
        };
        if message.category() != LOGGING_CATEGORY {
            incidents.push(Incident::error(format!(
                "Subscriber panicked on {} message: {err}",
                message.category()
            )));
        }
    }
    if let Some(router) = router.upgrade() {
        router.report(incidents);
    }
}

fn write_isolated(sink: &dyn Sink, message: &LogMessage, incidents: &mut Vec<Incident>) {
    match catch_unwind(AssertUnwindSafe(|| sink.write(message))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(
                sink = sink.name(),
                category = message.category(),
                error = %e,
                "sink write failed"
            );
            incidents.push(Incident::warn(format!(
                "Sink '{}' failed to write: {e}",
                sink.name()
            )));
        }
        Err(payload) => {
            let err = RelayError::from_panic(sink.name(), payload.as_ref());
            tracing::warn!(sink = sink.name(), error = %err, "sink panicked during write");
            incidents.push(Incident::error(format!(
                "Sink '{}' panicked during write: {err}",
                sink.name()
            )));
        }
    }

    match catch_unwind(AssertUnwindSafe(|| sink.take_warnings())) {
        Ok(warnings) => {
            incidents.extend(warnings.into_iter().map(|w| Incident::warn(w.to_string())));
        }
        Err(payload) => {
            let err = RelayError::from_panic(sink.name(), payload.as_ref());
            tracing::warn!(sink = sink.name(), error = %err, "sink panicked draining warnings");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relay_sinks::MemorySink;

    fn router() -> LogRouter {
        LogRouter::new(Arc::new(CategoryRegistry::new()), Arc::new(Dispatcher::new()))
    }

    #[test]
    fn default_allows_everything() {
        let router = router();
        assert_eq!(router.global_minimum_level(), LogLevel::Trace);
        assert_eq!(router.resolve_threshold("Anything"), Some(LogLevel::Trace));
    }

    #[test]
    fn precedence_chain() {
        let router = router();
        router.set_global_minimum_level(LogLevel::Error);
        assert_eq!(router.resolve_threshold("AI"), Some(LogLevel::Error));

        router.registry().register_category("AI", LogLevel::Debug).unwrap();
        assert_eq!(router.resolve_threshold("AI"), Some(LogLevel::Debug));

        router.set_category_filter("AI", LogLevel::Warn).unwrap();
        assert_eq!(router.resolve_threshold("AI"), Some(LogLevel::Warn));

        router.registry().set_enabled("AI", false).unwrap();
        assert_eq!(router.resolve_threshold("AI"), None);

        router.registry().set_enabled("AI", true).unwrap();
        assert!(router.clear_category_filter("AI"));
        assert_eq!(router.resolve_threshold("AI"), Some(LogLevel::Debug));
    }

    #[test]
    fn router_filter_applies_to_unregistered_category() {
        let router = router();
        router.set_category_filter("Net", LogLevel::Critical).unwrap();
        assert_eq!(router.category_filter("Net"), Some(LogLevel::Critical));
        assert!(!router.registry().is_registered("Net"));
        assert!(!router.log(LogLevel::Error, "Net", "filtered"));
        assert!(router.log(LogLevel::Critical, "Net", "passes"));
    }

    #[test]
    fn blank_filter_name_rejected() {
        assert!(router().set_category_filter("  ", LogLevel::Info).is_err());
    }

    #[test]
    fn same_sink_registered_once() {
        let router = router();
        let memory = Arc::new(MemorySink::new(10).unwrap());
        let sink: Arc<dyn Sink> = memory.clone();
        assert!(router.register_sink(Arc::clone(&sink)));
        assert!(!router.register_sink(Arc::clone(&sink)));
        assert_eq!(router.sink_count(), 1);

        assert!(router.log(LogLevel::Info, "Core", "once"));
        assert_eq!(memory.len(), 1);

        assert!(router.unregister_sink(&sink));
        assert!(!router.unregister_sink(&sink));
        assert_eq!(router.sink_count(), 0);
    }

    #[test]
    fn dropped_message_reaches_no_sink() {
        let router = router();
        let memory = Arc::new(MemorySink::new(10).unwrap());
        let _ = router.register_sink(memory.clone());
        router.registry().set_enabled("Quiet", false).unwrap();

        assert!(!router.log(LogLevel::Critical, "Quiet", "blocked"));
        assert!(memory.is_empty());
    }
}
