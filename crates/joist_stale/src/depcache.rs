//! Header-dependency lists written by compilers.
//!
//! A compile step may declare a dependency-list file that the tool rewrites
//! on every run with the headers it actually included. The staleness
//! analyzer resolves that file through a [`DependencyCache`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::debug;

/// Source of parsed dependency lists.
pub trait DependencyCache: Send + Sync {
    /// Returns the files listed in `file`, or `None` if the list is missing
    /// or unreadable.
    fn try_get_dependencies(&self, file: &Path) -> Option<Vec<PathBuf>>;

    /// Warms the cache for many lists at once.
    fn prefetch(&self, files: &[PathBuf]) {
        files.par_iter().for_each(|file| {
            let _ = self.try_get_dependencies(file);
        });
    }
}

/// The bundled [`DependencyCache`]: parses each list once per invocation.
///
/// Accepts Makefile-style `.d` files (`target: dep dep \` with backslash
/// continuations and `\ `-escaped spaces) and plain one-path-per-line lists.
#[derive(Debug, Default)]
pub struct DepFileCache {
    entries: DashMap<PathBuf, Option<Arc<Vec<PathBuf>>>>,
}

impl DepFileCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lists read so far, including missing ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been read yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets every cached list, e.g. after the tools rewrote them.
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn read(file: &Path) -> Option<Arc<Vec<PathBuf>>> {
        match std::fs::read_to_string(file) {
            Ok(content) => Some(Arc::new(parse_dependency_list(&content))),
            Err(e) => {
                debug!(file = %file.display(), "dependency list unavailable: {e}");
                None
            }
        }
    }
}

impl DependencyCache for DepFileCache {
    fn try_get_dependencies(&self, file: &Path) -> Option<Vec<PathBuf>> {
        if let Some(entry) = self.entries.get(file) {
            return entry.as_ref().map(|list| list.as_ref().clone());
        }
        let parsed = Self::read(file);
        let entry = self
            .entries
            .entry(file.to_path_buf())
            .or_insert(parsed)
            .clone();
        entry.map(|list| list.as_ref().clone())
    }
}

/// Parses a dependency list in either supported form.
///
/// The Makefile form is recognised by a `target:` separator (a colon followed
/// by whitespace or end of line) on the first non-empty line; drive-letter
/// colons such as `C:\` do not count. Target names are dropped.
pub fn parse_dependency_list(content: &str) -> Vec<PathBuf> {
    let first = content.lines().map(str::trim).find(|l| !l.is_empty());
    let Some(first) = first else {
        return Vec::new();
    };
    if target_separator(first).is_none() {
        return content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect();
    }

    let joined = content.replace("\\\r\n", " ").replace("\\\n", " ");
    let mut paths = Vec::new();
    for line in joined.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let deps = match target_separator(line) {
            Some(index) => &line[index + 1..],
            None => line,
        };
        paths.extend(split_dep_tokens(deps).into_iter().map(PathBuf::from));
    }
    paths
}

/// Byte index of the `:` ending a Makefile target, if any.
fn target_separator(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    bytes.iter().enumerate().find_map(|(i, &b)| {
        let next = bytes.get(i + 1);
        let escaped = i > 0 && bytes[i - 1] == b'\\';
        (b == b':' && !escaped && next.map_or(true, |n| n.is_ascii_whitespace())).then_some(i)
    })
}

/// Splits on whitespace, honouring `\ ` as an escaped space.
fn split_dep_tokens(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.peek() == Some(&' ') {
            current.push(' ');
            chars.next();
        } else if ch.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
