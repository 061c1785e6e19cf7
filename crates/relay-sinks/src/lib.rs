//! # relay-sinks
//!
//! Synchronous, non-dropping delivery targets.
//!
//! Every sink implements [`Sink`]: a name, `write`, `flush`, and an optional
//! `dispose`. The router treats all sinks uniformly and never owns their
//! lifetime; whoever registers a sink disposes it.
//!
//! - [`FileSink`]: line-oriented file output with size-based rotation and
//!   count-based retention of archives
//! - [`ConsoleSink`]: stdout/stderr output
//! - [`MemorySink`]: keeps the most recent messages for in-process views
//! - [`StorageProbe`]: tells factories whether writable storage exists

#![deny(unsafe_code)]

pub mod archive;
pub mod console;
pub mod file;
pub mod memory;
pub mod sink;
pub mod storage;

pub use console::ConsoleSink;
pub use file::{FileSink, FileSinkConfig};
pub use memory::MemorySink;
pub use sink::Sink;
pub use storage::{FsStorageProbe, StaticStorageProbe, StorageProbe};
