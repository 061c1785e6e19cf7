//! The sink contract.

use relay_core::{LogMessage, RelayError, Result};

/// A synchronous delivery target.
///
/// `write` runs on the producer's thread inside `LogRouter::route`, so
/// implementations must be thread-safe and should be quick. Errors and panics
/// are caught per sink by the router; they never reach the producer.
pub trait Sink: Send + Sync {
    /// Stable name used in diagnostics.
    fn name(&self) -> &str;

    /// Deliver one message.
    fn write(&self, message: &LogMessage) -> Result<()>;

    /// Force buffered output to durable storage.
    fn flush(&self) -> Result<()>;

    /// Release resources. Must be idempotent; later writes become no-ops.
    fn dispose(&self) {}

    /// Drain problems hit while a write still succeeded, such as a failed
    /// rotation. The router reports these as log entries after each write.
    fn take_warnings(&self) -> Vec<RelayError> {
        Vec::new()
    }
}
