//! Console sink.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use relay_core::{LogLevel, LogMessage, Result};
use relay_format::{OutputFormat, TemplateEngine};

use crate::sink::Sink;

type BoxedWriter = Box<dyn Write + Send>;

/// Writes formatted lines to stdout, or to stderr for `Error` and above.
///
/// Built with [`ConsoleSink::with_writer`], every level goes to the one
/// injected writer instead.
pub struct ConsoleSink {
    name: String,
    engine: Arc<TemplateEngine>,
    format: OutputFormat,
    out: Mutex<BoxedWriter>,
    err: Option<Mutex<BoxedWriter>>,
}

impl ConsoleSink {
    /// Sink bound to the process's stdout and stderr.
    pub fn new(engine: Arc<TemplateEngine>) -> Self {
        Self {
            name: "console".to_string(),
            engine,
            format: OutputFormat::Text,
            out: Mutex::new(Box::new(std::io::stdout())),
            err: Some(Mutex::new(Box::new(std::io::stderr()))),
        }
    }

    /// Sink that sends every level to `writer`.
    pub fn with_writer(engine: Arc<TemplateEngine>, writer: impl Write + Send + 'static) -> Self {
        Self {
            name: "console".to_string(),
            engine,
            format: OutputFormat::Text,
            out: Mutex::new(Box::new(writer)),
            err: None,
        }
    }

    /// Set the line format.
    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, message: &LogMessage) -> Result<()> {
        let mut line = self.engine.format(message, self.format);
        line.push('\n');
        match &self.err {
            Some(err) if message.level() >= LogLevel::Error => {
                err.lock().write_all(line.as_bytes())?;
            }
            _ => self.out.lock().write_all(line.as_bytes())?,
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.out.lock().flush()?;
        if let Some(err) = &self.err {
            err.lock().flush()?;
        }
        Ok(())
    }
}
