//! Subscriber registrations and their disposable handles.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use relay_core::{LogMessage, RelayError};

/// Callback invoked with each delivered message.
pub type Handler = dyn Fn(&LogMessage) + Send + Sync + 'static;

pub(crate) struct SubscriberEntry {
    id: u64,
    active: AtomicBool,
    handler: Box<Handler>,
}

impl SubscriberEntry {
    /// Run the handler unless disposed. A panic is caught, logged, and
    /// returned.
    pub(crate) fn deliver(&self, message: &LogMessage) -> Option<RelayError> {
        if !self.active.load(Ordering::Acquire) {
            return None;
        }
        let payload = catch_unwind(AssertUnwindSafe(|| (self.handler)(message))).err()?;
        let err = RelayError::from_panic(format!("subscriber {}", self.id), payload.as_ref());
        tracing::warn!(
            subscriber = self.id,
            category = message.category(),
            error = %err,
            "subscriber panicked"
        );
        Some(err)
    }
}

/// Copy-on-write list of live subscribers.
///
/// Readers take an `Arc` snapshot, so delivery never holds the lock.
#[derive(Default)]
pub(crate) struct SubscriberList {
    entries: RwLock<Arc<[Arc<SubscriberEntry>]>>,
}

impl SubscriberList {
    pub(crate) fn snapshot(&self) -> Arc<[Arc<SubscriberEntry>]> {
        Arc::clone(&self.entries.read())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn add(self: &Arc<Self>, id: u64, handler: Box<Handler>) -> Subscription {
        let entry = Arc::new(SubscriberEntry {
            id,
            active: AtomicBool::new(true),
            handler,
        });
        {
            let mut entries = self.entries.write();
            let mut next: Vec<Arc<SubscriberEntry>> = entries.iter().cloned().collect();
            next.push(Arc::clone(&entry));
            *entries = next.into();
        }
        Subscription {
            entry,
            list: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.id == id) {
            let next: Vec<Arc<SubscriberEntry>> =
                entries.iter().filter(|e| e.id != id).cloned().collect();
            *entries = next.into();
        }
    }
}

/// Handle for one subscriber. Dropping it unsubscribes.
///
/// Disposal is idempotent and safe while a delivery is in flight: a message
/// already queued for this subscriber is skipped once disposal is observed.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    entry: Arc<SubscriberEntry>,
    list: Weak<SubscriberList>,
}

impl Subscription {
    /// Stop delivery to this subscriber.
    pub fn dispose(&self) {
        if !self.entry.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(list) = self.list.upgrade() {
            list.remove(self.entry.id);
        }
        tracing::trace!(subscriber = self.entry.id, "subscription disposed");
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        !self.entry.active.load(Ordering::Acquire)
    }

    /// Router-assigned id, unique per router.
    pub fn id(&self) -> u64 {
        self.entry.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.entry.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use relay_core::LogLevel;

    fn counting(count: &Arc<AtomicUsize>) -> Box<Handler> {
        let count = Arc::clone(count);
        Box::new(move |_| {
            let _ = count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn dispose_is_idempotent() {
        let list = Arc::new(SubscriberList::default());
        let count = Arc::new(AtomicUsize::new(0));
        let sub = list.add(1, counting(&count));
        assert_eq!(list.len(), 1);

        sub.dispose();
        sub.dispose();
        assert!(sub.is_disposed());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn snapshot_taken_before_dispose_skips_delivery() {
        let list = Arc::new(SubscriberList::default());
        let count = Arc::new(AtomicUsize::new(0));
        let sub = list.add(1, counting(&count));

        let snapshot = list.snapshot();
        drop(sub);

        let msg = LogMessage::new(LogLevel::Info, "Sub", "late");
        for entry in snapshot.iter() {
            assert!(entry.deliver(&msg).is_none());
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_handler_returns_error() {
        let list = Arc::new(SubscriberList::default());
        let _sub = list.add(3, Box::new(|_| panic!("handler exploded")));

        let msg = LogMessage::new(LogLevel::Info, "Sub", "x");
        let err = list.snapshot()[0].deliver(&msg).unwrap();
        assert_eq!(err.to_string(), "callback subscriber 3 panicked: handler exploded");
    }

    #[test]
    fn handle_outliving_list_disposes_cleanly() {
        let list = Arc::new(SubscriberList::default());
        let count = Arc::new(AtomicUsize::new(0));
        let sub = list.add(7, counting(&count));
        drop(list);
        sub.dispose();
        assert!(sub.is_disposed());
        assert_eq!(sub.id(), 7);
    }
}
