//! Persisted record of the command that last produced each artifact.
//!
//! A step opting in to history checks is outdated whenever the fingerprint
//! of its command line differs from the one recorded for any of its outputs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use joist_common::{decode_blob, encode_blob, write_atomic, BlobError, ContentHash};
use tracing::{debug, warn};

use crate::error::StaleError;

/// Magic bytes identifying an action history blob.
const HISTORY_MAGIC: [u8; 4] = *b"JHST";

/// Bump on any change to the payload layout.
const HISTORY_FORMAT_VERSION: u32 = 1;

/// Source of last-recorded command fingerprints.
pub trait HistoryStore: Send + Sync {
    /// Records `fingerprint` as the producer of `artifact`.
    ///
    /// Returns `true` if it differs from the previous record, including when
    /// no record existed.
    fn update_producing_attributes(
        &self,
        artifact: &Path,
        fingerprint: ContentHash,
    ) -> Result<bool, StaleError>;
}

/// The bundled [`HistoryStore`]: an in-memory map persisted per project.
///
/// Probes take the read lock; only a changed fingerprint takes the write lock.
#[derive(Debug, Default)]
pub struct ActionHistory {
    path: Option<PathBuf>,
    entries: RwLock<HashMap<PathBuf, ContentHash>>,
    dirty: AtomicBool,
}

impl ActionHistory {
    /// Creates an empty history that is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the history stored at `path`.
    ///
    /// A missing file starts an empty history. A corrupt or incompatible
    /// file is discarded with a warning: every opted-in step then rebuilds once.
    pub fn load(path: &Path) -> Self {
        let entries = match Self::read_entries(path) {
            Ok(entries) => {
                debug!(path = %path.display(), entries = entries.len(), "loaded action history");
                entries
            }
            Err(StaleError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                HashMap::new()
            }
            Err(e) => {
                warn!("discarding action history: {e}");
                HashMap::new()
            }
        };
        Self {
            path: Some(path.to_path_buf()),
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    fn read_entries(path: &Path) -> Result<HashMap<PathBuf, ContentHash>, StaleError> {
        let raw = std::fs::read(path).map_err(|e| StaleError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let (_, payload) = decode_blob(&raw, HISTORY_MAGIC, HISTORY_FORMAT_VERSION).map_err(
            |source| StaleError::CorruptHistory {
                path: path.to_path_buf(),
                source,
            },
        )?;
        let (records, _): (Vec<(PathBuf, ContentHash)>, usize) =
            bincode::serde::decode_from_slice(payload, bincode::config::standard()).map_err(
                |e| StaleError::Serialization {
                    reason: e.to_string(),
                },
            )?;
        Ok(records.into_iter().collect())
    }

    /// The file this history persists to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The recorded fingerprint for `artifact`.
    pub fn get(&self, artifact: &Path) -> Option<ContentHash> {
        self.entries.read().ok()?.get(artifact).copied()
    }

    /// Number of recorded artifacts.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a record changed since loading or the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    /// Writes the history back to its file if anything changed.
    ///
    /// In-memory histories ignore this call.
    pub fn save(&self) -> Result<(), StaleError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.is_dirty() {
            return Ok(());
        }
        self.save_to(path)?;
        self.dirty.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Writes the history to `path` unconditionally.
    pub fn save_to(&self, path: &Path) -> Result<(), StaleError> {
        let mut records: Vec<(PathBuf, ContentHash)> = {
            let entries = self.entries.read().map_err(|_| StaleError::Poisoned)?;
            entries.iter().map(|(p, h)| (p.clone(), *h)).collect()
        };
        records.sort_by(|a, b| a.0.cmp(&b.0));

        let payload = bincode::serde::encode_to_vec(&records, bincode::config::standard())
            .map_err(|e| StaleError::Serialization {
                reason: e.to_string(),
            })?;
        let blob = encode_blob(
            HISTORY_MAGIC,
            HISTORY_FORMAT_VERSION,
            env!("CARGO_PKG_VERSION"),
            &payload,
        )
        .map_err(|e: BlobError| StaleError::Serialization {
            reason: e.to_string(),
        })?;
        write_atomic(path, &blob).map_err(|e| StaleError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), entries = records.len(), "saved action history");
        Ok(())
    }
}

impl HistoryStore for ActionHistory {
    fn update_producing_attributes(
        &self,
        artifact: &Path,
        fingerprint: ContentHash,
    ) -> Result<bool, StaleError> {
        {
            let entries = self.entries.read().map_err(|_| StaleError::Poisoned)?;
            if entries.get(artifact) == Some(&fingerprint) {
                return Ok(false);
            }
        }
        let mut entries = self.entries.write().map_err(|_| StaleError::Poisoned)?;
        let previous = entries.insert(artifact.to_path_buf(), fingerprint);
        if previous == Some(fingerprint) {
            // Another thread recorded the same value between the two locks.
            return Ok(false);
        }
        self.dirty.store(true, Ordering::Relaxed);
        Ok(true)
    }
}
