//! Writable-storage detection.
//!
//! Factories ask a [`StorageProbe`] before creating a file sink, so platforms
//! without local storage degrade to "no file sink" instead of failing.

use std::path::Path;

/// Answers whether `dir` can hold log files.
pub trait StorageProbe: Send + Sync {
    /// `true` when files can be created in `dir`.
    fn writable_storage(&self, dir: &Path) -> bool;
}

/// Probes the real file system by creating and removing a marker file.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsStorageProbe;

const PROBE_FILE: &str = ".relay-write-probe";

impl StorageProbe for FsStorageProbe {
    fn writable_storage(&self, dir: &Path) -> bool {
        if std::fs::create_dir_all(dir).is_err() {
            return false;
        }
        let probe = dir.join(PROBE_FILE);
        match std::fs::write(&probe, b"") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                true
            }
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "storage probe write failed");
                false
            }
        }
    }
}

/// Fixed answer, for hosts that know their platform up front.
#[derive(Clone, Copy, Debug)]
pub struct StaticStorageProbe(pub bool);

impl StorageProbe for StaticStorageProbe {
    fn writable_storage(&self, _dir: &Path) -> bool {
        self.0
    }
}
