//! The persisted snapshot of a linked action graph.
//!
//! A cache is written after a successful build and loaded at the start of the
//! next one. Loading runs the cheap checks (timestamps of the tool, project,
//! and configuration inputs; header; recorded arguments). [`GraphCache::validate`]
//! runs the expensive ones (directory rescans, dependency timestamps, markup
//! scans) once pre-build steps have had a chance to modify the tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use joist_common::{decode_blob, encode_blob, write_atomic, ContentHash, FileStamp};
use joist_graph::{link, ActionGraph, ArtifactTable, BuildStep, StepId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CacheError, CacheInvalid};
use crate::identity::GraphIdentity;
use crate::inventory::{
    contains_source_files, find_files_with_extension, find_markup_files, is_header, scan_tree,
    SourceDirectory, WorkingSet,
};

/// Magic bytes identifying a graph cache.
const CACHE_MAGIC: [u8; 4] = *b"JOST";

/// Bump on any change to [`GraphCache`]'s layout; older files are discarded.
pub const FORMAT_VERSION: u32 = 1;

/// Filesystem timestamp granularity tolerated by "newer than" checks.
const TIMESTAMP_SLACK: Duration = Duration::from_secs(1);

/// Everything needed to skip graph generation for one target configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphCache {
    /// The target configuration this cache belongs to.
    pub identity: GraphIdentity,
    /// When the cache was first written.
    pub created: SystemTime,
    /// When the cache was last written or patched.
    pub modified: SystemTime,
    /// Artifact paths in ID order; step artifact IDs index this list.
    pub artifacts: Vec<PathBuf>,
    /// Build steps in graph order.
    pub steps: Vec<BuildStep>,
    /// Inventories of every source directory the graph was built from.
    pub source_directories: Vec<SourceDirectory>,
    /// Header files found in the source directories.
    pub header_files: Vec<PathBuf>,
    /// Source files that were in the working set.
    pub working_set: BTreeSet<PathBuf>,
    /// Files outside the project whose changes invalidate the cache.
    pub external_dependencies: Vec<PathBuf>,
    /// Files rewritten by the build itself (checked against `modified`).
    pub internal_dependencies: Vec<PathBuf>,
    /// Directories searched for plugin descriptors.
    pub plugin_directories: Vec<PathBuf>,
    /// Plugin descriptors found at creation.
    pub plugin_files: BTreeSet<PathBuf>,
    /// Output files per module name.
    pub module_outputs: BTreeMap<String, Vec<PathBuf>>,
    /// Fingerprints of generated files whose contents were inlined into steps.
    pub generated_files: BTreeMap<PathBuf, ContentHash>,
    /// Headers carrying reflection markup.
    pub markup_files: BTreeSet<PathBuf>,
    /// Configuration files read while generating the graph.
    pub input_configs: Vec<PathBuf>,
    /// Configuration values the graph depends on.
    pub config_values: BTreeMap<String, String>,
    /// Command-line arguments the graph was generated with.
    pub build_arguments: Vec<String>,
    /// Platform-specific build metadata.
    pub platform_metadata: String,
    /// Build-extension modules available at creation.
    pub extension_modules: Vec<String>,
    /// Manifests written by the build.
    pub manifests: Vec<PathBuf>,
}

/// Inputs to [`GraphCache::load`]: the current values of everything the
/// cache records cheaply.
#[derive(Debug, Clone, Default)]
pub struct LoadContext {
    /// The configuration being built.
    pub identity: GraphIdentity,
    /// The running tool binary.
    pub tool_binary: Option<PathBuf>,
    /// Current build arguments.
    pub build_arguments: Vec<String>,
    /// Current tracked configuration values.
    pub config_values: BTreeMap<String, String>,
    /// Current platform build metadata.
    pub platform_metadata: String,
    /// Currently available extension modules.
    pub extension_modules: Vec<String>,
}

/// Inputs to [`GraphCache::validate`].
pub struct ValidityContext<'a> {
    /// Extensions counted as source files.
    pub source_extensions: &'a [String],
    /// Substrings marking reflection markup.
    pub markup_markers: &'a [String],
    /// Extension of plugin descriptors.
    pub plugin_extension: &'a str,
    /// The current working set.
    pub working_set: &'a dyn WorkingSet,
}

impl GraphCache {
    /// Snapshots `graph` for `identity`. All other records start empty.
    pub fn from_graph(graph: &ActionGraph, identity: GraphIdentity) -> Self {
        let now = SystemTime::now();
        Self {
            identity,
            created: now,
            modified: now,
            artifacts: graph.artifacts().paths(),
            steps: graph.steps().map(|(_, s)| s.clone()).collect(),
            source_directories: Vec::new(),
            header_files: Vec::new(),
            working_set: BTreeSet::new(),
            external_dependencies: Vec::new(),
            internal_dependencies: Vec::new(),
            plugin_directories: Vec::new(),
            plugin_files: BTreeSet::new(),
            module_outputs: BTreeMap::new(),
            generated_files: BTreeMap::new(),
            markup_files: BTreeSet::new(),
            input_configs: Vec::new(),
            config_values: BTreeMap::new(),
            build_arguments: Vec::new(),
            platform_metadata: String::new(),
            extension_modules: Vec::new(),
            manifests: Vec::new(),
        }
    }

    /// Records the inventories, headers, markup set, and working-set
    /// membership of the source trees under `roots`.
    pub fn capture_sources(
        &mut self,
        roots: &[PathBuf],
        ctx: &ValidityContext<'_>,
    ) -> Result<(), CacheError> {
        self.source_directories =
            scan_tree(roots, ctx.source_extensions).map_err(|e| CacheError::Io {
                path: roots.first().cloned().unwrap_or_default(),
                source: e,
            })?;
        let files: Vec<PathBuf> = self
            .source_directories
            .iter()
            .flat_map(|d| d.file_paths())
            .collect();
        self.header_files = files.iter().filter(|f| is_header(f)).cloned().collect();
        self.markup_files = find_markup_files(&self.header_files, ctx.markup_markers);
        self.working_set = files
            .into_iter()
            .filter(|f| ctx.working_set.contains(f))
            .collect();
        debug!(
            directories = self.source_directories.len(),
            headers = self.header_files.len(),
            markup = self.markup_files.len(),
            "captured source inventory"
        );
        Ok(())
    }

    /// Records the plugin descriptors currently found under `dirs`.
    pub fn capture_plugins(&mut self, dirs: &[PathBuf], extension: &str) {
        self.plugin_directories = dirs.to_vec();
        self.plugin_files = find_files_with_extension(dirs, extension);
    }

    /// Fingerprints `files` as inlined generated files.
    pub fn capture_generated_files(&mut self, files: &[PathBuf]) -> Result<(), CacheError> {
        for file in files {
            let hash = ContentHash::from_file(file).map_err(|e| CacheError::Io {
                path: file.clone(),
                source: e,
            })?;
            self.generated_files.insert(file.clone(), hash);
        }
        Ok(())
    }

    /// Copies the cheap records from `ctx` so a later load with the same
    /// context passes.
    pub fn record_context(&mut self, ctx: &LoadContext) {
        self.identity = ctx.identity.clone();
        self.build_arguments = ctx.build_arguments.clone();
        self.config_values = ctx.config_values.clone();
        self.platform_metadata = ctx.platform_metadata.clone();
        self.extension_modules = ctx.extension_modules.clone();
    }

    /// Rebuilds and links the cached graph.
    pub fn to_graph(&self) -> Result<ActionGraph, CacheError> {
        let table = ArtifactTable::from_paths(self.artifacts.iter().cloned());
        let mut graph = ActionGraph::new(table, self.steps.clone());
        link(&mut graph)?;
        Ok(graph)
    }

    /// Consumes the cache, returning the linked graph.
    pub fn into_graph(self) -> Result<ActionGraph, CacheError> {
        let table = ArtifactTable::from_paths(self.artifacts);
        let mut graph = ActionGraph::new(table, self.steps);
        link(&mut graph)?;
        Ok(graph)
    }

    /// Copies the record of step `id` from a patched `graph` into the cache
    /// and bumps the modification time.
    ///
    /// `graph` must have been rebuilt from this cache; artifacts it interned
    /// since are appended so IDs stay valid. Returns `false`, leaving the
    /// cache untouched, if `id` is not a step of both.
    pub fn patch_step(&mut self, graph: &ActionGraph, id: StepId) -> bool {
        if id.index() >= self.steps.len() || id.index() >= graph.len() {
            return false;
        }
        let table = graph.artifacts();
        for (artifact_id, artifact) in table.iter().skip(self.artifacts.len()) {
            debug_assert_eq!(artifact_id.index(), self.artifacts.len());
            self.artifacts.push(artifact.path().to_path_buf());
        }
        self.steps[id.index()] = graph.step(id).clone();
        self.modified = SystemTime::now();
        true
    }

    /// Persists the cache atomically.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let payload = bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(
            |e| CacheError::Serialization {
                reason: e.to_string(),
            },
        )?;
        let blob = encode_blob(CACHE_MAGIC, FORMAT_VERSION, env!("CARGO_PKG_VERSION"), &payload)
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        write_atomic(path, &blob).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!(path = %path.display(), steps = self.steps.len(), "saved graph cache");
        Ok(())
    }

    /// Loads the cache at `path`, running every load-time check.
    ///
    /// "Newer than the cache" compares against the cache file's own
    /// last-write time.
    pub fn load(path: &Path, ctx: &LoadContext) -> Result<Self, CacheInvalid> {
        let stamp = FileStamp::probe(path);
        let written = match (stamp.exists, stamp.modified) {
            (true, Some(t)) => t,
            (true, None) => SystemTime::UNIX_EPOCH,
            (false, _) => {
                return Err(CacheInvalid::Missing {
                    path: path.to_path_buf(),
                })
            }
        };
        let newer = |file: &Path| FileStamp::probe(file).is_newer_than(written, TIMESTAMP_SLACK);

        if let Some(tool) = ctx.tool_binary.as_deref().filter(|t| newer(*t)) {
            return Err(CacheInvalid::ToolNewer {
                path: tool.to_path_buf(),
            });
        }
        if let Some(project) = ctx.identity.project.as_deref().filter(|p| newer(*p)) {
            return Err(CacheInvalid::ProjectNewer {
                path: project.to_path_buf(),
            });
        }

        let cache = Self::inspect(path)?;

        if cache.identity != ctx.identity {
            return Err(CacheInvalid::IdentityChanged {
                recorded: cache.identity.to_string(),
                requested: ctx.identity.to_string(),
            });
        }
        if let Some(config) = cache.input_configs.iter().find(|c| newer(c.as_path())) {
            return Err(CacheInvalid::InputConfigNewer {
                path: config.clone(),
            });
        }
        if cache.build_arguments != ctx.build_arguments {
            return Err(CacheInvalid::BuildArgumentsChanged);
        }
        for manifest in &cache.manifests {
            let manifest_stamp = FileStamp::probe(manifest);
            if !manifest_stamp.exists {
                return Err(CacheInvalid::ManifestMissing {
                    path: manifest.clone(),
                });
            }
            if manifest_stamp.is_newer_than(written, TIMESTAMP_SLACK) {
                return Err(CacheInvalid::ManifestStale {
                    path: manifest.clone(),
                });
            }
        }
        if let Some(key) = first_changed_key(&cache.config_values, &ctx.config_values) {
            return Err(CacheInvalid::ConfigValueChanged { key });
        }
        if cache.platform_metadata != ctx.platform_metadata {
            return Err(CacheInvalid::PlatformMetadataChanged);
        }
        if sorted(&cache.extension_modules) != sorted(&ctx.extension_modules) {
            return Err(CacheInvalid::ExtensionModulesChanged);
        }

        debug!(path = %path.display(), steps = cache.steps.len(), "loaded graph cache");
        Ok(cache)
    }

    /// Decodes the cache at `path` without checking it against anything.
    pub fn inspect(path: &Path) -> Result<Self, CacheInvalid> {
        let raw = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CacheInvalid::Missing {
                path: path.to_path_buf(),
            },
            _ => CacheInvalid::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        let (_, payload) =
            decode_blob(&raw, CACHE_MAGIC, FORMAT_VERSION).map_err(CacheInvalid::BadFormat)?;
        let (cache, _): (GraphCache, usize) =
            bincode::serde::decode_from_slice(payload, bincode::config::standard()).map_err(
                |e| CacheInvalid::Corrupt {
                    reason: e.to_string(),
                },
            )?;
        Ok(cache)
    }

    /// Runs the post-load validity checks.
    ///
    /// Returns the first violation found. Directory rescans and markup scans
    /// run in parallel.
    pub fn validate(&self, ctx: &ValidityContext<'_>) -> Result<(), CacheInvalid> {
        self.validate_source_directories(ctx)?;

        for (file, recorded) in &self.generated_files {
            if ContentHash::from_file(file).ok().as_ref() != Some(recorded) {
                return Err(CacheInvalid::GeneratedFileChanged { path: file.clone() });
            }
        }
        for file in &self.external_dependencies {
            if changed_since(file, self.created) {
                return Err(CacheInvalid::ExternalDependencyChanged { path: file.clone() });
            }
        }
        for file in &self.internal_dependencies {
            if changed_since(file, self.modified) {
                return Err(CacheInvalid::InternalDependencyChanged { path: file.clone() });
            }
        }

        if !self.plugin_directories.is_empty() {
            let current = find_files_with_extension(&self.plugin_directories, ctx.plugin_extension);
            if let Some(new) = current.difference(&self.plugin_files).next() {
                return Err(CacheInvalid::NewPluginFile { path: new.clone() });
            }
        }

        self.validate_markup(ctx)?;

        let working_set_change = self
            .source_directories
            .iter()
            .flat_map(|d| d.file_paths())
            .find(|f| ctx.working_set.contains(f) != self.working_set.contains(f));
        if let Some(path) = working_set_change {
            return Err(CacheInvalid::WorkingSetChanged { path });
        }
        Ok(())
    }

    fn validate_source_directories(&self, ctx: &ValidityContext<'_>) -> Result<(), CacheInvalid> {
        let extensions = ctx.source_extensions;
        let violations: Vec<CacheInvalid> = self
            .source_directories
            .par_iter()
            .filter_map(|recorded| {
                let Ok(current) = SourceDirectory::scan(&recorded.path, extensions) else {
                    return Some(CacheInvalid::SourceDirectoryMissing {
                        path: recorded.path.clone(),
                    });
                };
                if current.files != recorded.files {
                    return Some(CacheInvalid::SourceFilesChanged {
                        path: recorded.path.clone(),
                    });
                }
                current
                    .subdirectories
                    .iter()
                    .filter(|name| recorded.subdirectories.binary_search(name).is_err())
                    .map(|name| recorded.path.join(name))
                    .find(|dir| contains_source_files(dir, extensions))
                    .map(|path| CacheInvalid::NewSourceDirectory { path })
            })
            .collect();
        match violations.into_iter().next() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Headers written since the cache was modified must still agree with
    /// the recorded markup set.
    fn validate_markup(&self, ctx: &ValidityContext<'_>) -> Result<(), CacheInvalid> {
        let touched: Vec<PathBuf> = self
            .header_files
            .par_iter()
            .filter(|h| changed_since(h, self.modified))
            .cloned()
            .collect();
        if touched.is_empty() {
            return Ok(());
        }
        let marked = find_markup_files(&touched, ctx.markup_markers);
        match touched
            .into_iter()
            .find(|h| marked.contains(h) != self.markup_files.contains(h))
        {
            Some(path) => Err(CacheInvalid::MarkupChanged { path }),
            None => Ok(()),
        }
    }
}

/// Missing, or last written after `since`.
fn changed_since(file: &Path, since: SystemTime) -> bool {
    let stamp = FileStamp::probe(file);
    !stamp.exists || stamp.is_newer_than(since, TIMESTAMP_SLACK)
}

fn first_changed_key(
    recorded: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> Option<String> {
    recorded
        .iter()
        .find(|(k, v)| current.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .or_else(|| {
            current
                .keys()
                .find(|k| !recorded.contains_key(*k))
                .cloned()
        })
}

fn sorted(items: &[String]) -> Vec<&str> {
    let mut v: Vec<&str> = items.iter().map(String::as_str).collect();
    v.sort_unstable();
    v
}
