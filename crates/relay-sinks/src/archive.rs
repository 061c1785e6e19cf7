//! Archive naming and retention for rotated log files.
//!
//! Archives are named `{basename}_{yyyyMMdd-HHmmss-fff}{ext}`. When two
//! rotations land in the same millisecond the later one gets a `-{n}`
//! sequence after the timestamp, so names stay unique and ordered.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

/// Length of `yyyyMMdd-HHmmss-fff`.
const STAMP_LEN: usize = 19;

/// Splits a log path into the pieces archive names are built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveNaming {
    dir: PathBuf,
    basename: String,
    ext: String,
}

impl ArchiveNaming {
    /// Naming scheme for archives of `path`.
    pub fn for_path(path: &Path) -> Self {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let basename = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self { dir, basename, ext }
    }

    /// Directory holding the active file and its archives.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Timestamp component for an archive created at `now`.
    pub fn stamp(now: DateTime<Utc>) -> String {
        now.format("%Y%m%d-%H%M%S-%3f").to_string()
    }

    /// Archive path for `stamp` with sequence `seq` (0 means no suffix).
    pub fn archive_path(&self, stamp: &str, seq: u32) -> PathBuf {
        let name = if seq == 0 {
            format!("{}_{stamp}{}", self.basename, self.ext)
        } else {
            format!("{}_{stamp}-{seq}{}", self.basename, self.ext)
        };
        self.dir.join(name)
    }

    /// Parse one of this scheme's archive file names into its sort key.
    pub fn parse(&self, file_name: &str) -> Option<ArchiveKey> {
        let rest = file_name
            .strip_prefix(&self.basename)?
            .strip_prefix('_')?
            .strip_suffix(self.ext.as_str())?;
        if rest.len() < STAMP_LEN || !rest.is_char_boundary(STAMP_LEN) {
            return None;
        }
        let (stamp, suffix) = rest.split_at(STAMP_LEN);
        if !is_stamp(stamp) {
            return None;
        }
        let seq = if suffix.is_empty() {
            0
        } else {
            let digits = suffix.strip_prefix('-')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()?
        };
        Some(ArchiveKey {
            stamp: stamp.to_string(),
            seq,
        })
    }

    /// This scheme's archives in `dir()`, newest first.
    ///
    /// Sorted by modification time, then by the name's `(stamp, seq)` so
    /// archives written within one filesystem clock tick keep creation order.
    pub fn list(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut found: Vec<(SystemTime, ArchiveKey, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(key) = self.parse(&file_name.to_string_lossy()) else {
                continue;
            };
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, key, entry.path()));
        }
        found.sort_by(|a, b| newest_first(&(a.0, &a.1), &(b.0, &b.1)));
        Ok(found.into_iter().map(|(_, _, path)| path).collect())
    }
}

/// Sort key embedded in an archive file name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArchiveKey {
    /// `yyyyMMdd-HHmmss-fff`; lexicographic order is chronological.
    pub stamp: String,
    /// Same-millisecond sequence.
    pub seq: u32,
}

fn newest_first(a: &(SystemTime, &ArchiveKey), b: &(SystemTime, &ArchiveKey)) -> Ordering {
    b.0.cmp(&a.0).then_with(|| b.1.cmp(a.1))
}

fn is_stamp(s: &str) -> bool {
    s.bytes().enumerate().all(|(i, b)| match i {
        8 | 15 => b == b'-',
        _ => b.is_ascii_digit(),
    })
}

/// Delete all but the newest `keep` archives. `keep == 0` keeps everything.
///
/// Returns the deleted paths. A file that cannot be removed is logged and
/// skipped.
pub fn enforce_retention(naming: &ArchiveNaming, keep: usize) -> std::io::Result<Vec<PathBuf>> {
    if keep == 0 {
        return Ok(Vec::new());
    }
    let archives = naming.list()?;
    let mut deleted = Vec::new();
    for path in archives.into_iter().skip(keep) {
        match std::fs::remove_file(&path) {
            Ok(()) => deleted.push(path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete log archive");
            }
        }
    }
    Ok(deleted)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
