//! Sink construction with platform policy.
//!
//! A file sink is only built where writable storage exists. When it does not,
//! the factory returns `None` and reports it once through the router, so the
//! warning shows up in whatever sinks are already attached.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use relay_core::LogLevel;
use relay_format::{OutputFormat, TemplateEngine};
use relay_sinks::{ConsoleSink, FileSink, FileSinkConfig, FsStorageProbe, StorageProbe};

use crate::router::{LOGGING_CATEGORY, LogRouter};

/// Builds sinks that share one template engine.
pub struct SinkFactory {
    router: Arc<LogRouter>,
    engine: Arc<TemplateEngine>,
    probe: Arc<dyn StorageProbe>,
    storage_warned: AtomicBool,
}

impl SinkFactory {
    /// Factory probing the real file system.
    pub fn new(router: Arc<LogRouter>, engine: Arc<TemplateEngine>) -> Self {
        Self::with_probe(router, engine, Arc::new(FsStorageProbe))
    }

    /// Factory with a custom storage probe.
    pub fn with_probe(
        router: Arc<LogRouter>,
        engine: Arc<TemplateEngine>,
        probe: Arc<dyn StorageProbe>,
    ) -> Self {
        Self {
            router,
            engine,
            probe,
            storage_warned: AtomicBool::new(false),
        }
    }

    /// Console sink writing through the shared engine.
    pub fn create_console_sink(&self, format: OutputFormat) -> Arc<ConsoleSink> {
        Arc::new(ConsoleSink::new(Arc::clone(&self.engine)).format(format))
    }

    /// File sink for `config`, or `None` when storage is unavailable or the
    /// file cannot be opened.
    pub fn create_file_sink(&self, config: FileSinkConfig) -> Option<Arc<FileSink>> {
        let dir = config
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        if !self.probe.writable_storage(dir) {
            if !self.storage_warned.swap(true, Ordering::AcqRel) {
                let _ = self.router.log(
                    LogLevel::Warn,
                    LOGGING_CATEGORY,
                    format!(
                        "File logging disabled: no writable storage at {}",
                        dir.display()
                    ),
                );
            }
            return None;
        }

        match FileSink::new(config, Arc::clone(&self.engine)) {
            Ok(sink) => Some(Arc::new(sink)),
            Err(e) => {
                let _ = self.router.log(
                    LogLevel::Error,
                    LOGGING_CATEGORY,
                    format!("Failed to open log file: {e}"),
                );
                None
            }
        }
    }
}
