//! # relay-core
//!
//! Foundation types shared by every crate in the relay logging pipeline.
//!
//! - **Levels**: [`LogLevel`], ordered `Trace < Debug < Info < Warn < Error < Critical`
//! - **Messages**: [`LogMessage`], the immutable value produced once per log call
//! - **Context**: [`ContextValue`] entries kept in insertion order
//! - **Ring buffer**: [`CircularBuffer`] for recent-history windows
//! - **Errors**: [`RelayError`] taxonomy via `thiserror`
//! - **Diagnostics**: [`logging`] sets up `tracing` for the pipeline's own warnings

#![deny(unsafe_code)]

pub mod buffer;
pub mod context;
pub mod errors;
pub mod level;
pub mod logging;
pub mod message;

pub use buffer::CircularBuffer;
pub use context::{ContextMap, ContextValue};
pub use errors::{RelayError, Result};
pub use level::LogLevel;
pub use message::{CallerInfo, LogMessage, LogMessageBuilder, ThreadInfo};
