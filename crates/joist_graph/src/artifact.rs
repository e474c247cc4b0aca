//! Interned artifact paths with cached file stamps.
//!
//! Every file a step reads, writes, or deletes is interned once in an
//! [`ArtifactTable`]. The table caches each artifact's [`FileStamp`] so that
//! the many steps referencing a shared header only stat it once per run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use joist_common::FileStamp;

use crate::arena::Arena;
use crate::ids::ArtifactId;

/// Extensions identifying import libraries.
const IMPORT_LIBRARY_EXTENSIONS: &[&str] = &["lib"];

/// A file tracked by the graph.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    stamp: RwLock<Option<FileStamp>>,
}

impl Artifact {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            stamp: RwLock::new(None),
        }
    }

    /// The artifact's path as declared by the step that references it.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached stamp, probing the filesystem on first access.
    ///
    /// Concurrent first accesses may each probe; the first writer wins and
    /// later writers observe the same metadata.
    pub fn stamp(&self) -> FileStamp {
        if let Ok(guard) = self.stamp.read() {
            if let Some(stamp) = *guard {
                return stamp;
            }
        }
        let probed = FileStamp::probe(&self.path);
        match self.stamp.write() {
            Ok(mut guard) => *guard.get_or_insert(probed),
            Err(_) => probed,
        }
    }

    /// Forgets the cached stamp so the next access re-probes the file.
    pub fn reset_stamp(&self) {
        if let Ok(mut guard) = self.stamp.write() {
            *guard = None;
        }
    }

    /// Returns `true` if the path carries an import-library extension.
    pub fn has_import_library_extension(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                IMPORT_LIBRARY_EXTENSIONS
                    .iter()
                    .any(|candidate| ext.eq_ignore_ascii_case(candidate))
            })
    }
}

impl Clone for Artifact {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

/// Path interner for all artifacts referenced by a graph.
#[derive(Debug, Clone, Default)]
pub struct ArtifactTable {
    items: Arena<ArtifactId, Artifact>,
    by_path: HashMap<PathBuf, ArtifactId>,
}

impl ArtifactTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a table from paths in ID order, as persisted by the graph cache.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut table = Self::new();
        for path in paths {
            table.intern(path);
        }
        table
    }

    /// Returns the ID for `path`, allocating a new artifact if needed.
    pub fn intern(&mut self, path: impl AsRef<Path>) -> ArtifactId {
        let path = path.as_ref();
        if let Some(&id) = self.by_path.get(path) {
            return id;
        }
        let id = self.items.alloc(Artifact::new(path.to_path_buf()));
        self.by_path.insert(path.to_path_buf(), id);
        id
    }

    /// Looks up an already-interned path.
    pub fn lookup(&self, path: &Path) -> Option<ArtifactId> {
        self.by_path.get(path).copied()
    }

    /// Returns the artifact with the given ID.
    pub fn get(&self, id: ArtifactId) -> &Artifact {
        &self.items[id]
    }

    /// Returns the path of the artifact with the given ID.
    pub fn path(&self, id: ArtifactId) -> &Path {
        self.items[id].path()
    }

    /// Returns the (cached) stamp of the artifact with the given ID.
    pub fn stamp(&self, id: ArtifactId) -> FileStamp {
        self.items[id].stamp()
    }

    /// Forgets the cached stamps of the given artifacts.
    pub fn reset_stamps(&self, ids: impl IntoIterator<Item = ArtifactId>) {
        for id in ids {
            self.items[id].reset_stamp();
        }
    }

    /// Returns the number of interned artifacts.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no artifacts are interned.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All paths in ID order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.items.values().map(|a| a.path.clone()).collect()
    }

    /// Iterates over `(ID, &Artifact)` pairs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactId, &Artifact)> {
        self.items.iter()
    }
}
