//! A fully wired pipeline built from settings.
//!
//! [`Pipeline`] is the explicit context object hosts pass around instead of
//! a process-wide logger. It owns the sinks it created and disposes them on
//! [`shutdown`](Pipeline::shutdown) or drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use relay_core::{LogLevel, LogMessage, RelayError, Result};
use relay_format::TemplateEngine;
use relay_settings::PipelineSettings;
use relay_sinks::{FileSink, FileSinkConfig, FsStorageProbe, Sink, StorageProbe};

use crate::dispatcher::Dispatcher;
use crate::factory::SinkFactory;
use crate::registry::{CategoryMetadata, CategoryRegistry};
use crate::router::LogRouter;
use crate::subscription::Subscription;

/// Registry, engine, dispatcher, router, and the configured sinks.
pub struct Pipeline {
    registry: Arc<CategoryRegistry>,
    engine: Arc<TemplateEngine>,
    dispatcher: Arc<Dispatcher>,
    router: Arc<LogRouter>,
    factory: SinkFactory,
    file_sink: Option<Arc<FileSink>>,
    owned_sinks: Mutex<Vec<Arc<dyn Sink>>>,
    shut_down: AtomicBool,
}

impl Pipeline {
    /// Build from settings, probing the real file system for storage.
    pub fn from_settings(settings: &PipelineSettings) -> Result<Self> {
        Self::with_storage_probe(settings, Arc::new(FsStorageProbe))
    }

    /// Build from settings with a custom storage probe.
    pub fn with_storage_probe(
        settings: &PipelineSettings,
        probe: Arc<dyn StorageProbe>,
    ) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| RelayError::invalid_argument(e.to_string()))?;

        let registry = Arc::new(CategoryRegistry::new());
        for category in &settings.categories {
            registry.register_metadata(
                CategoryMetadata::new(category.name.as_str())
                    .with_minimum_level(category.minimum_level)
                    .with_enabled(category.enabled)
                    .with_color(category.color.as_str()),
            )?;
        }

        let engine = Arc::new(TemplateEngine::with_default_template(
            settings.default_template.as_str(),
        ));
        for (category, template) in &settings.category_templates {
            engine.set_category_template(category, template.as_str())?;
        }

        let dispatcher = Arc::new(Dispatcher::with_capacity(settings.dispatcher.capacity)?);
        let router = Arc::new(LogRouter::new(
            Arc::clone(&registry),
            Arc::clone(&dispatcher),
        ));
        router.set_global_minimum_level(settings.minimum_level);

        let factory = SinkFactory::with_probe(Arc::clone(&router), Arc::clone(&engine), probe);
        let mut owned_sinks: Vec<Arc<dyn Sink>> = Vec::new();

        // Console first, so a file-sink warning has somewhere to go
        if settings.console.enabled {
            let console: Arc<dyn Sink> = factory.create_console_sink(settings.format);
            let _ = router.register_sink(Arc::clone(&console));
            owned_sinks.push(console);
        }

        let mut file_sink = None;
        if settings.file.enabled {
            let config = FileSinkConfig::new(settings.file.path.as_str())
                .rotation_enabled(settings.file.rotation_enabled)
                .max_file_size_mb(settings.file.max_file_size_mb)
                .retention_count(settings.file.retention_count)
                .format(settings.format);
            if let Some(sink) = factory.create_file_sink(config) {
                let as_dyn: Arc<dyn Sink> = sink.clone();
                let _ = router.register_sink(Arc::clone(&as_dyn));
                owned_sinks.push(as_dyn);
                file_sink = Some(sink);
            }
        }

        tracing::debug!(
            sinks = owned_sinks.len(),
            categories = registry.len(),
            "pipeline built"
        );

        Ok(Self {
            registry,
            engine,
            dispatcher,
            router,
            factory,
            file_sink,
            owned_sinks: Mutex::new(owned_sinks),
            shut_down: AtomicBool::new(false),
        })
    }

    /// The router producers log through.
    pub fn router(&self) -> &Arc<LogRouter> {
        &self.router
    }

    /// Category metadata.
    pub fn registry(&self) -> &Arc<CategoryRegistry> {
        &self.registry
    }

    /// Shared template engine. Template changes apply to every sink.
    pub fn engine(&self) -> &Arc<TemplateEngine> {
        &self.engine
    }

    /// Subscriber queue. Call [`tick`](Self::tick) from its owner thread.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Factory for extra sinks sharing this pipeline's engine.
    pub fn factory(&self) -> &SinkFactory {
        &self.factory
    }

    /// The configured file sink, if one was built.
    pub fn file_sink(&self) -> Option<&Arc<FileSink>> {
        self.file_sink.as_ref()
    }

    /// Route one message.
    pub fn route(&self, message: &LogMessage) -> bool {
        self.router.route(message)
    }

    /// Build and route one message.
    pub fn log(&self, level: LogLevel, category: &str, message: impl Into<String>) -> bool {
        self.router.log(level, category, message)
    }

    /// Subscribe on the router.
    pub fn subscribe(
        &self,
        handler: impl Fn(&LogMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.router.subscribe(handler)
    }

    /// Attach a sink the pipeline will flush and dispose on shutdown.
    pub fn adopt_sink(&self, sink: Arc<dyn Sink>) -> bool {
        if !self.router.register_sink(Arc::clone(&sink)) {
            return false;
        }
        self.owned_sinks.lock().push(sink);
        true
    }

    /// Drain pending subscriber notifications. Returns how many ran.
    pub fn tick(&self) -> usize {
        self.dispatcher.process_queue()
    }

    /// Unregister, flush, and dispose every owned sink. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let sinks = std::mem::take(&mut *self.owned_sinks.lock());
        for sink in sinks {
            let _ = self.router.unregister_sink(&sink);
            if let Err(e) = sink.flush() {
                tracing::warn!(sink = sink.name(), error = %e, "flush on shutdown failed");
            }
            sink.dispose();
        }
        tracing::debug!("pipeline shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
