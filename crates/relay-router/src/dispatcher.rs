//! Single-consumer work queue.
//!
//! Producers on any thread [`enqueue`](Dispatcher::enqueue) closures; one
//! designated thread runs them in FIFO order from
//! [`process_queue`](Dispatcher::process_queue), typically once per frame or
//! tick. The queue is bounded: when full, the incoming item is dropped and the
//! queued ones are kept.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use relay_core::{RelayError, Result};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Pending items held before new ones are dropped.
pub const DEFAULT_CAPACITY: usize = 1000;

// tokio's bounded channel rejects larger capacities
const MAX_CAPACITY: usize = usize::MAX >> 4;

/// A unit of deferred work.
pub type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// Bounded queue drained by one owner thread.
#[derive(Debug)]
pub struct Dispatcher {
    tx: mpsc::Sender<WorkItem>,
    rx: Mutex<mpsc::Receiver<WorkItem>>,
    owner: OnceLock<ThreadId>,
    dropped: AtomicU64,
    overflowing: AtomicBool,
}

impl Dispatcher {
    /// Dispatcher with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(DEFAULT_CAPACITY);
        Self::from_channel(tx, rx)
    }

    /// Dispatcher holding at most `capacity` pending items.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(RelayError::invalid_argument(format!(
                "dispatcher capacity must be between 1 and {MAX_CAPACITY}, got {capacity}"
            )));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self::from_channel(tx, rx))
    }

    fn from_channel(tx: mpsc::Sender<WorkItem>, rx: mpsc::Receiver<WorkItem>) -> Self {
        Self {
            tx,
            rx: Mutex::new(rx),
            owner: OnceLock::new(),
            dropped: AtomicU64::new(0),
            overflowing: AtomicBool::new(false),
        }
    }

    /// Queue `item` without blocking. Returns `false` if it was dropped.
    pub fn enqueue(&self, item: impl FnOnce() + Send + 'static) -> bool {
        self.enqueue_boxed(Box::new(item))
    }

    /// [`enqueue`](Self::enqueue) for an already boxed item.
    pub fn enqueue_boxed(&self, item: WorkItem) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => {
                if self.overflowing.load(Ordering::Relaxed)
                    && self.overflowing.swap(false, Ordering::Relaxed)
                {
                    tracing::debug!(
                        dropped = self.dropped(),
                        "dispatcher queue accepting items again"
                    );
                }
                true
            }
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                if !self.overflowing.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        capacity = self.capacity(),
                        "dispatcher queue full, dropping new items"
                    );
                }
                false
            }
            // The receiver lives as long as `self`
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Make the calling thread the owner.
    ///
    /// Returns `false` if another thread already owns the queue.
    pub fn bind_to_current_thread(&self) -> bool {
        let me = thread::current().id();
        *self.owner.get_or_init(|| me) == me
    }

    /// Whether the calling thread is the owner (or could become it).
    pub fn is_owner_thread(&self) -> bool {
        self.owner
            .get()
            .is_none_or(|owner| *owner == thread::current().id())
    }

    /// Run every item queued before this call, oldest first.
    ///
    /// The first thread to call this (or [`bind_to_current_thread`]) becomes
    /// the owner; calls from any other thread run nothing. Items queued while
    /// the drain runs wait for the next call. A panicking item is logged and
    /// the drain continues. Returns the number of items run.
    ///
    /// [`bind_to_current_thread`]: Self::bind_to_current_thread
    pub fn process_queue(&self) -> usize {
        if !self.bind_to_current_thread() {
            tracing::warn!("process_queue called off the owner thread, ignoring");
            return 0;
        }

        let batch: Vec<WorkItem> = {
            // Only reentrant drains (an item calling process_queue) contend here
            let Some(mut rx) = self.rx.try_lock() else {
                return 0;
            };
            let count = self.pending();
            let mut batch = Vec::with_capacity(count);
            while batch.len() < count {
                match rx.try_recv() {
                    Ok(item) => batch.push(item),
                    Err(_) => break,
                }
            }
            batch
        };

        let ran = batch.len();
        for item in batch {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(item)) {
                let err = RelayError::from_panic("dispatcher item", payload.as_ref());
                tracing::warn!(error = %err, "dispatcher item panicked");
            }
        }
        ran
    }

    /// Items waiting to run.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Items dropped because the queue was full, since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Maximum pending items.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use assert_matches::assert_matches;
    use relay_core::logging::capture_logs;

    #[test]
    fn zero_capacity_rejected() {
        assert_matches!(Dispatcher::with_capacity(0), Err(RelayError::InvalidArgument(_)));
    }

    #[test]
    fn default_capacity() {
        assert_eq!(Dispatcher::new().capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn runs_in_fifo_order() {
        let dispatcher = Dispatcher::with_capacity(8).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..5 {
            let order = Arc::clone(&order);
            assert!(dispatcher.enqueue(move || order.lock().push(n)));
        }
        assert_eq!(dispatcher.pending(), 5);
        assert_eq!(dispatcher.process_queue(), 5);
        assert_eq!(*order.lock(), [0, 1, 2, 3, 4]);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn full_queue_drops_newest() {
        let (logs, _guard) = capture_logs();
        let dispatcher = Dispatcher::with_capacity(3).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let results: Vec<bool> = (0..5)
            .map(|n| {
                let seen = Arc::clone(&seen);
                dispatcher.enqueue(move || seen.lock().push(n))
            })
            .collect();

        assert_eq!(results, [true, true, true, false, false]);
        assert_eq!(dispatcher.dropped(), 2);
        // One warning for the transition into overflow, not one per drop
        assert_eq!(logs.count_at_level(tracing::Level::WARN), 1);

        let _ = dispatcher.process_queue();
        assert_eq!(*seen.lock(), [0, 1, 2]);

        assert!(dispatcher.enqueue(|| {}));
    }

    #[test]
    fn panicking_item_does_not_halt_drain() {
        let (logs, _guard) = capture_logs();
        let dispatcher = Dispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let _ = dispatcher.enqueue(move || {
            let _ = c.fetch_add(1, Ordering::SeqCst);
        });
        let _ = dispatcher.enqueue(|| panic!("bad item"));
        let c = Arc::clone(&count);
        let _ = dispatcher.enqueue(move || {
            let _ = c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(dispatcher.process_queue(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(logs.has_event(tracing::Level::WARN, "dispatcher item panicked"));
    }

    #[test]
    fn items_enqueued_during_drain_wait_for_next_tick() {
        let dispatcher = Arc::new(Dispatcher::new());
        let ran = Arc::new(AtomicUsize::new(0));

        let d = Arc::clone(&dispatcher);
        let r = Arc::clone(&ran);
        let _ = dispatcher.enqueue(move || {
            let r2 = Arc::clone(&r);
            let _ = d.enqueue(move || {
                let _ = r2.fetch_add(1, Ordering::SeqCst);
            });
            let _ = r.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(dispatcher.process_queue(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.pending(), 1);
        assert_eq!(dispatcher.process_queue(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn only_owner_thread_drains() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.bind_to_current_thread());
        let _ = dispatcher.enqueue(|| {});

        std::thread::scope(|scope| {
            let dispatcher = &dispatcher;
            let handle = scope.spawn(move || {
                assert!(!dispatcher.is_owner_thread());
                assert!(!dispatcher.bind_to_current_thread());
                dispatcher.process_queue()
            });
            assert_eq!(handle.join().unwrap(), 0);
        });

        assert!(dispatcher.is_owner_thread());
        assert_eq!(dispatcher.process_queue(), 1);
    }

    #[test]
    fn concurrent_producers_single_consumer() {
        let dispatcher = Dispatcher::with_capacity(10_000).unwrap();
        let total = Arc::new(AtomicUsize::new(0));
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let dispatcher = &dispatcher;
                let total = Arc::clone(&total);
                let _ = scope.spawn(move || {
                    for _ in 0..500 {
                        let total = Arc::clone(&total);
                        assert!(dispatcher.enqueue(move || {
                            let _ = total.fetch_add(1, Ordering::SeqCst);
                        }));
                    }
                });
            }
        });
        assert_eq!(dispatcher.process_queue(), 4000);
        assert_eq!(total.load(Ordering::SeqCst), 4000);
    }
}
