//! Source-tree inventories recorded in a graph cache.
//!
//! A cache records, for every source directory it was built from, the
//! source files and subdirectories present at the time. Rescanning the same
//! directories later detects added and removed files.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Extensions scanned for reflection markup.
pub const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "inl"];

/// The source files and subdirectories of one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDirectory {
    /// The directory.
    pub path: PathBuf,
    /// Names of source files directly inside it, sorted.
    pub files: Vec<String>,
    /// Names of its subdirectories, sorted.
    pub subdirectories: Vec<String>,
}

impl SourceDirectory {
    fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            files: Vec::new(),
            subdirectories: Vec::new(),
        }
    }

    /// Lists `path`, keeping files whose extension is in `extensions`.
    pub fn scan(path: &Path, extensions: &[String]) -> io::Result<Self> {
        inventory(WalkDir::new(path).max_depth(1), extensions)?
            .remove(path)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} is not a directory", path.display()),
                )
            })
    }

    /// Full paths of the recorded source files.
    pub fn file_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(|name| self.path.join(name))
    }
}

/// Groups the entries of one walk by their parent directory.
///
/// Walks visit a directory before its contents, so every entry's parent is
/// already recorded when the entry arrives.
fn inventory(
    walker: WalkDir,
    extensions: &[String],
) -> io::Result<BTreeMap<PathBuf, SourceDirectory>> {
    let mut dirs: BTreeMap<PathBuf, SourceDirectory> = BTreeMap::new();
    for entry in walker.sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let is_dir = entry.file_type().is_dir();
        if is_dir {
            dirs.insert(path.to_path_buf(), SourceDirectory::empty(path));
        }
        if entry.depth() == 0 {
            continue;
        }
        let (Some(parent), Some(name)) = (path.parent(), entry.file_name().to_str()) else {
            continue;
        };
        let Some(dir) = dirs.get_mut(parent) else {
            continue;
        };
        if is_dir {
            dir.subdirectories.push(name.to_string());
        } else if has_extension(path, extensions) {
            dir.files.push(name.to_string());
        }
    }
    Ok(dirs)
}

/// Scans every directory under `roots`, sorted by path.
///
/// Roots are walked in parallel.
pub fn scan_tree(roots: &[PathBuf], extensions: &[String]) -> io::Result<Vec<SourceDirectory>> {
    let per_root: Vec<BTreeMap<PathBuf, SourceDirectory>> = roots
        .par_iter()
        .map(|root| inventory(WalkDir::new(root), extensions))
        .collect::<io::Result<_>>()?;

    let mut all: Vec<SourceDirectory> = per_root.into_iter().flat_map(BTreeMap::into_values).collect();
    all.sort_by(|a, b| a.path.cmp(&b.path));
    all.dedup_by(|a, b| a.path == b.path);
    Ok(all)
}

/// Returns `true` if `dir` or any directory below it holds a source file.
///
/// An unreadable directory counts as holding one.
pub fn contains_source_files(dir: &Path, extensions: &[String]) -> bool {
    WalkDir::new(dir).into_iter().any(|entry| match entry {
        Ok(entry) => !entry.file_type().is_dir() && has_extension(entry.path(), extensions),
        Err(_) => true,
    })
}

/// Returns `true` if `path` has one of `extensions` (case-insensitive).
pub fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.as_ref().eq_ignore_ascii_case(ext)))
}

/// Returns `true` if `path` is a header file.
pub fn is_header(path: &Path) -> bool {
    has_extension(path, HEADER_EXTENSIONS)
}

/// Returns `true` if the file at `path` contains any of `markers`.
pub fn contains_markup(path: &Path, markers: &[String]) -> io::Result<bool> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(markers.iter().any(|m| text.contains(m.as_str())))
}

/// The subset of `files` carrying reflection markup, scanned in parallel.
///
/// Unreadable files are left out.
pub fn find_markup_files(files: &[PathBuf], markers: &[String]) -> BTreeSet<PathBuf> {
    files
        .par_iter()
        .filter(|f| contains_markup(f, markers).unwrap_or(false))
        .cloned()
        .collect()
}

/// Every file under `dirs` with the given extension.
///
/// Missing directories contribute nothing.
pub fn find_files_with_extension(dirs: &[PathBuf], extension: &str) -> BTreeSet<PathBuf> {
    dirs.par_iter()
        .flat_map_iter(|root| {
            WalkDir::new(root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && has_extension(e.path(), &[extension]))
                .map(walkdir::DirEntry::into_path)
        })
        .collect()
}

/// Membership test for the files a developer is actively editing.
///
/// Working-set files are compiled individually rather than in unity blobs,
/// so a change in membership changes the graph.
pub trait WorkingSet: Sync {
    /// Returns `true` if `file` is in the working set.
    fn contains(&self, file: &Path) -> bool;
}

/// A working set with no members.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyWorkingSet;

impl WorkingSet for EmptyWorkingSet {
    fn contains(&self, _file: &Path) -> bool {
        false
    }
}

impl WorkingSet for BTreeSet<PathBuf> {
    fn contains(&self, file: &Path) -> bool {
        BTreeSet::contains(self, file)
    }
}
