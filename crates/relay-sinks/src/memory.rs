//! In-memory sink backed by a ring buffer.

use parking_lot::Mutex;
use relay_core::{CircularBuffer, LogMessage, Result};

use crate::sink::Sink;

/// Keeps the most recent messages, oldest evicted first.
///
/// Useful for in-process log viewers and for tests that want to see what was
/// routed without touching the file system.
#[derive(Debug)]
pub struct MemorySink {
    name: String,
    buffer: Mutex<CircularBuffer<LogMessage>>,
}

impl MemorySink {
    /// Sink holding at most `capacity` messages. Fails when `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            name: "memory".to_string(),
            buffer: Mutex::new(CircularBuffer::new(capacity)?),
        })
    }

    /// Replace the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Snapshot of retained messages, oldest first.
    pub fn recent(&self) -> Vec<LogMessage> {
        self.buffer.lock().get_all()
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Drop everything retained.
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, message: &LogMessage) -> Result<()> {
        self.buffer.lock().add(message.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
