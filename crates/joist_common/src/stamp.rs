//! Point-in-time file metadata used for timestamp-based staleness checks.

use std::path::Path;
use std::time::{Duration, SystemTime};

/// Existence, size, and timestamps of a file at the moment it was probed.
///
/// Probing never fails: an unreadable or missing file yields a stamp with
/// `exists == false`, which every consumer treats as "must rebuild".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    /// Whether the path referred to an existing regular file.
    pub exists: bool,
    /// File length in bytes (0 when missing).
    pub size: u64,
    /// Last-write time, if the platform reports one.
    pub modified: Option<SystemTime>,
    /// Creation (birth) time, if the platform reports one.
    pub created: Option<SystemTime>,
}

impl FileStamp {
    /// A stamp describing a file that does not exist.
    pub const MISSING: FileStamp = FileStamp {
        exists: false,
        size: 0,
        modified: None,
        created: None,
    };

    /// Reads the metadata of `path`.
    pub fn probe(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Self {
                exists: true,
                size: meta.len(),
                modified: meta.modified().ok(),
                created: meta.created().ok(),
            },
            _ => Self::MISSING,
        }
    }

    /// The later of last-write and creation time.
    ///
    /// A file copied into place keeps its source's last-write time but gets a
    /// fresh creation time; the newer of the two is when it was produced.
    pub fn newest_time(&self) -> Option<SystemTime> {
        match (self.modified, self.created) {
            (Some(m), Some(c)) => Some(m.max(c)),
            (m, c) => m.or(c),
        }
    }

    /// Returns `true` if this file was last written more than `slack` after
    /// `reference`.
    ///
    /// Missing files and files without a last-write time are never newer.
    pub fn is_newer_than(&self, reference: SystemTime, slack: Duration) -> bool {
        match self.modified {
            Some(m) if self.exists => m > reference + slack,
            _ => false,
        }
    }
}
