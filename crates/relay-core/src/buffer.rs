//! Fixed-capacity ring buffer for recent-history windows.

use std::collections::VecDeque;

use crate::errors::{RelayError, Result};

/// Ring buffer that always holds the `capacity` most recently added items.
///
/// Not synchronized; wrap it in a lock when shared.
#[derive(Clone, Debug)]
pub struct CircularBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> CircularBuffer<T> {
    /// Create a buffer holding at most `capacity` items.
    ///
    /// Fails with [`RelayError::InvalidArgument`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RelayError::invalid_argument(
                "circular buffer capacity must be at least 1",
            ));
        }
        Ok(Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append an item, evicting the oldest once the buffer is full.
    pub fn add(&mut self, item: T) {
        if self.items.len() == self.capacity {
            let _ = self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Remove every item. The buffer stays usable.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of items retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest-first without copying.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Most recently added item.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }
}

impl<T: Clone> CircularBuffer<T> {
    /// Snapshot of the contents, oldest first.
    ///
    /// The returned `Vec` is independent of later mutation.
    pub fn get_all(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
