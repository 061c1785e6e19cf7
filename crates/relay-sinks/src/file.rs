//! Rotating file sink.
//!
//! # Rotation
//!
//! After each write, if rotation is enabled and the active file has reached
//! `max_file_size_bytes` (0 rotates on every write), the file is flushed and
//! closed, renamed to an archive (see [`crate::archive`]), and a fresh file is
//! opened at the same path. Retention then deletes all but the newest
//! `retention_count` archives (0 keeps everything).
//!
//! Write, rotate, and retain all happen under one lock, so concurrent writers
//! never interleave partial lines or touch a handle another writer closed.
//!
//! A rotation or retention failure does not fail the write that triggered it:
//! the line is already on disk. The failure is queued for
//! [`Sink::take_warnings`] instead.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use relay_core::{LogMessage, RelayError, Result};
use relay_format::{OutputFormat, TemplateEngine};

use crate::archive::{ArchiveNaming, enforce_retention};
use crate::sink::Sink;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Queued warnings beyond this are discarded until drained.
const MAX_PENDING_WARNINGS: usize = 32;

/// Settings for a [`FileSink`].
#[derive(Clone, Debug)]
pub struct FileSinkConfig {
    /// Active log file.
    pub path: PathBuf,
    /// Whether size-based rotation runs at all.
    pub rotation_enabled: bool,
    /// Rotation threshold in bytes. 0 rotates after every write.
    pub max_file_size_bytes: u64,
    /// Archives to keep. 0 keeps all of them.
    pub retention_count: usize,
    /// Line format.
    pub format: OutputFormat,
}

impl FileSinkConfig {
    /// Defaults: rotation on at 10 MB, keep 5 archives, text lines.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rotation_enabled: true,
            max_file_size_bytes: 10 * BYTES_PER_MB,
            retention_count: 5,
            format: OutputFormat::Text,
        }
    }

    /// Set the rotation threshold in whole megabytes.
    #[must_use]
    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.max_file_size_bytes = mb.saturating_mul(BYTES_PER_MB);
        self
    }

    /// Set the rotation threshold in bytes.
    #[must_use]
    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }

    /// Set how many archives survive retention.
    #[must_use]
    pub fn retention_count(mut self, count: usize) -> Self {
        self.retention_count = count;
        self
    }

    /// Enable or disable rotation.
    #[must_use]
    pub fn rotation_enabled(mut self, enabled: bool) -> Self {
        self.rotation_enabled = enabled;
        self
    }

    /// Set the line format.
    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

struct FileState {
    writer: Option<BufWriter<File>>,
    size: u64,
    disposed: bool,
    last_stamp: String,
    seq: u32,
    warnings: Vec<RelayError>,
}

impl FileState {
    fn warn(&mut self, error: RelayError) {
        if self.warnings.len() < MAX_PENDING_WARNINGS {
            self.warnings.push(error);
        }
    }
}

/// Appends formatted lines to a file, rotating and pruning archives.
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    naming: ArchiveNaming,
    engine: Arc<TemplateEngine>,
    state: Mutex<FileState>,
}

impl FileSink {
    /// Open (or create) the active file in append mode.
    pub fn new(config: FileSinkConfig, engine: Arc<TemplateEngine>) -> Result<Self> {
        let naming = ArchiveNaming::for_path(&config.path);
        std::fs::create_dir_all(naming.dir())?;
        let (writer, size) = open_append(&config.path)?;
        tracing::debug!(path = %config.path.display(), size, "file sink opened");
        Ok(Self {
            name: format!("file:{}", config.path.display()),
            config,
            naming,
            engine,
            state: Mutex::new(FileState {
                writer: Some(writer),
                size,
                disposed: false,
                last_stamp: String::new(),
                seq: 0,
                warnings: Vec::new(),
            }),
        })
    }

    /// Replace the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Bytes written to the active file, including buffered bytes.
    pub fn current_size(&self) -> u64 {
        self.state.lock().size
    }

    /// Whether [`Sink::dispose`] ran.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// This sink's archives, newest first.
    pub fn archives(&self) -> Result<Vec<PathBuf>> {
        Ok(self.naming.list()?)
    }

    fn should_rotate(&self, size: u64) -> bool {
        self.config.rotation_enabled && size >= self.config.max_file_size_bytes
    }

    /// Close, archive, reopen, then prune. Caller holds the state lock.
    fn rotate(&self, state: &mut FileState) -> Result<()> {
        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
        }

        let stamp = ArchiveNaming::stamp(Utc::now());
        if stamp == state.last_stamp {
            state.seq += 1;
        } else {
            state.last_stamp.clone_from(&stamp);
            state.seq = 0;
        }
        let mut archive = self.naming.archive_path(&stamp, state.seq);
        while archive.exists() {
            state.seq += 1;
            archive = self.naming.archive_path(&stamp, state.seq);
        }

        let renamed = std::fs::rename(&self.config.path, &archive);

        // Reopen the active path whether or not the rename worked
        let (writer, size) = open_append(&self.config.path)?;
        state.writer = Some(writer);
        state.size = size;
        renamed?;

        tracing::debug!(archive = %archive.display(), "log file rotated");

        if self.config.retention_count > 0 {
            match enforce_retention(&self.naming, self.config.retention_count) {
                Ok(deleted) if !deleted.is_empty() => {
                    tracing::debug!(count = deleted.len(), "old log archives deleted");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(sink = %self.name, error = %e, "log archive retention failed");
                    state.warn(RelayError::Sink {
                        sink: self.name.clone(),
                        message: format!("archive retention failed: {e}"),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, message: &LogMessage) -> Result<()> {
        let mut line = self.engine.format(message, self.config.format);
        line.push('\n');

        let mut state = self.state.lock();
        if state.disposed {
            return Ok(());
        }
        if state.writer.is_none() {
            let (writer, size) = open_append(&self.config.path)?;
            state.writer = Some(writer);
            state.size = size;
        }
        if let Some(writer) = state.writer.as_mut() {
            writer.write_all(line.as_bytes())?;
        }
        state.size += line.len() as u64;

        if self.should_rotate(state.size) {
            if let Err(e) = self.rotate(&mut state) {
                tracing::warn!(sink = %self.name, error = %e, "log rotation failed");
                state.warn(RelayError::Sink {
                    sink: self.name.clone(),
                    message: format!("rotation failed: {e}"),
                });
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.disposed {
            return Ok(());
        }
        if let Some(writer) = state.writer.as_mut() {
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        if let Some(mut writer) = state.writer.take() {
            if let Err(e) = writer.flush() {
                tracing::warn!(sink = %self.name, error = %e, "final flush failed");
            }
        }
    }

    fn take_warnings(&self) -> Vec<RelayError> {
        std::mem::take(&mut self.state.lock().warnings)
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn open_append(path: &Path) -> std::io::Result<(BufWriter<File>, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let size = file.metadata()?.len();
    Ok((BufWriter::new(file), size))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::LogLevel;

    fn engine() -> Arc<TemplateEngine> {
        Arc::new(TemplateEngine::with_default_template("{level} {message}"))
    }

    fn msg(text: &str) -> LogMessage {
        LogMessage::new(LogLevel::Info, "File", text)
    }

    #[test]
    fn writes_lines_and_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let sink = FileSink::new(FileSinkConfig::new(&path), engine()).unwrap();

        sink.write(&msg("one")).unwrap();
        sink.write(&msg("two")).unwrap();
        sink.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Info one\nInfo two\n");
        assert_eq!(sink.current_size(), 18);
    }

    #[test]
    fn appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        std::fs::write(&path, "old\n").unwrap();

        let sink = FileSink::new(FileSinkConfig::new(&path), engine()).unwrap();
        assert_eq!(sink.current_size(), 4);
        sink.write(&msg("new")).unwrap();
        sink.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old\nInfo new\n");
    }

    #[test]
    fn creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.log");
        let sink = FileSink::new(FileSinkConfig::new(&path), engine()).unwrap();
        sink.write(&msg("x")).unwrap();
        sink.flush().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn json_lines_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let config = FileSinkConfig::new(&path).format(OutputFormat::Json);
        let sink = FileSink::new(config, engine()).unwrap();
        sink.write(&msg("quote \" here")).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(content.trim_end()).unwrap();
        assert_eq!(value["message"], "quote \" here");
    }

    #[test]
    fn rotate_every_write_with_retention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        let config = FileSinkConfig::new(&path)
            .max_file_size_mb(0)
            .retention_count(2);
        let sink = FileSink::new(config, engine()).unwrap();

        for n in 1..=5 {
            sink.write(&msg(&format!("write {n}"))).unwrap();
            assert_eq!(sink.archives().unwrap().len(), n.min(2));
        }
        assert!(path.exists());
        assert_eq!(sink.current_size(), 0);

        // The two survivors are the last two writes, newest first
        let archives = sink.archives().unwrap();
        assert_eq!(std::fs::read_to_string(&archives[0]).unwrap(), "Info write 5\n");
        assert_eq!(std::fs::read_to_string(&archives[1]).unwrap(), "Info write 4\n");
    }

    #[test]
    fn retention_zero_keeps_all_archives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        let config = FileSinkConfig::new(&path)
            .max_file_size_bytes(0)
            .retention_count(0);
        let sink = FileSink::new(config, engine()).unwrap();
        for _ in 0..6 {
            sink.write(&msg("x")).unwrap();
        }
        assert_eq!(sink.archives().unwrap().len(), 6);
    }

    #[test]
    fn rotation_threshold_in_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        // "Info abcd\n" is 10 bytes: rotate on the third write
        let config = FileSinkConfig::new(&path).max_file_size_bytes(25);
        let sink = FileSink::new(config, engine()).unwrap();

        sink.write(&msg("abcd")).unwrap();
        sink.write(&msg("abcd")).unwrap();
        assert!(sink.archives().unwrap().is_empty());
        sink.write(&msg("abcd")).unwrap();
        let archives = sink.archives().unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(std::fs::read_to_string(&archives[0]).unwrap().lines().count(), 3);
    }

    #[test]
    fn rotation_disabled_never_archives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        let config = FileSinkConfig::new(&path)
            .max_file_size_bytes(0)
            .rotation_enabled(false);
        let sink = FileSink::new(config, engine()).unwrap();
        for _ in 0..3 {
            sink.write(&msg("x")).unwrap();
        }
        assert!(sink.archives().unwrap().is_empty());
    }

    #[test]
    fn dispose_is_idempotent_and_silences_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let sink = FileSink::new(FileSinkConfig::new(&path), engine()).unwrap();
        sink.write(&msg("kept")).unwrap();

        sink.dispose();
        sink.dispose();
        assert!(sink.is_disposed());

        sink.write(&msg("dropped")).unwrap();
        sink.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Info kept\n");
    }

    #[test]
    fn failed_rotation_does_not_fail_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let config = FileSinkConfig::new(&path).max_file_size_bytes(0);
        let sink = FileSink::new(config, engine()).unwrap();
        assert!(sink.take_warnings().is_empty());

        // With the active file gone the archive rename cannot succeed
        std::fs::remove_file(&path).unwrap();
        sink.write(&msg("survives")).unwrap();

        let warnings = sink.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_matches::assert_matches!(
            &warnings[0],
            RelayError::Sink { message, .. } if message.starts_with("rotation failed")
        );
        assert!(sink.take_warnings().is_empty());
        assert!(sink.archives().unwrap().is_empty());

        // The active path was reopened and later writes land in it
        assert!(path.exists());
        sink.write(&msg("next")).unwrap();
        assert_eq!(sink.archives().unwrap().len(), 1);
        assert!(sink.take_warnings().is_empty());
    }

    #[test]
    fn pending_warnings_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let sink = FileSink::new(FileSinkConfig::new(&path).max_file_size_bytes(0), engine()).unwrap();
        for _ in 0..(MAX_PENDING_WARNINGS + 5) {
            std::fs::remove_file(&path).unwrap();
            sink.write(&msg("x")).unwrap();
        }
        assert_eq!(sink.take_warnings().len(), MAX_PENDING_WARNINGS);
    }

    #[test]
    fn dispose_while_writers_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let config = FileSinkConfig::new(&path)
            .max_file_size_bytes(256)
            .retention_count(0);
        let sink = FileSink::new(config, engine()).unwrap();

        std::thread::scope(|scope| {
            for t in 0..4 {
                let sink = &sink;
                let _ = scope.spawn(move || {
                    for i in 0..200 {
                        sink.write(&msg(&format!("t{t}-{i}"))).unwrap();
                    }
                });
            }
            let sink = &sink;
            let _ = scope.spawn(move || {
                std::thread::yield_now();
                sink.dispose();
                sink.dispose();
            });
        });
        assert!(sink.is_disposed());

        // Every line that made it out is whole
        let mut files = sink.archives().unwrap();
        files.push(path.clone());
        let mut total = 0;
        for file in files {
            for line in std::fs::read_to_string(file).unwrap().lines() {
                assert!(line.starts_with("Info t"), "{line}");
                total += 1;
            }
        }
        assert!(total <= 800);

        sink.write(&msg("after")).unwrap();
        assert!(!std::fs::read_to_string(&path).unwrap().contains("after"));
    }

    #[test]
    fn concurrent_writes_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let sink = FileSink::new(FileSinkConfig::new(&path).rotation_enabled(false), engine()).unwrap();

        std::thread::scope(|scope| {
            for t in 0..8 {
                let sink = &sink;
                let _ = scope.spawn(move || {
                    for i in 0..250 {
                        sink.write(&msg(&format!("t{t}-{i}-{}", "x".repeat(64)))).unwrap();
                    }
                });
            }
        });
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 8 * 250);
        assert!(lines.iter().all(|l| l.starts_with("Info t") && l.ends_with(&"x".repeat(64))));
    }

    #[test]
    fn concurrent_writes_with_rotation_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let config = FileSinkConfig::new(&path)
            .max_file_size_bytes(512)
            .retention_count(0);
        let sink = FileSink::new(config, engine()).unwrap();

        std::thread::scope(|scope| {
            for t in 0..4 {
                let sink = &sink;
                let _ = scope.spawn(move || {
                    for i in 0..100 {
                        sink.write(&msg(&format!("t{t}-{i}"))).unwrap();
                    }
                });
            }
        });
        sink.flush().unwrap();

        let mut total = std::fs::read_to_string(&path).unwrap().lines().count();
        for archive in sink.archives().unwrap() {
            total += std::fs::read_to_string(archive).unwrap().lines().count();
        }
        assert_eq!(total, 400);
    }
}
