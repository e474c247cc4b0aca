//! Error types for graph-cache operations.

use std::path::PathBuf;

use joist_common::BlobError;

/// Errors writing or rebuilding a graph cache.
///
/// Reading a cache never produces these; see [`CacheInvalid`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while writing the cache or scanning sources.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The payload could not be encoded.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// The cached steps no longer form a valid graph.
    #[error("cached graph is invalid: {0}")]
    Graph(#[from] joist_graph::GraphError),
}

/// Why a persisted graph cache cannot be used.
///
/// Never fatal: the caller regenerates the graph from scratch. Each variant
/// names the first check that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheInvalid {
    /// No cache file exists.
    #[error("{path} does not exist")]
    Missing {
        /// The expected cache file.
        path: PathBuf,
    },
    /// The cache file exists but could not be read.
    #[error("{path} is unreadable: {reason}")]
    Unreadable {
        /// The cache file.
        path: PathBuf,
        /// The I/O failure.
        reason: String,
    },
    /// The build tool was rebuilt after the cache was written.
    #[error("tool binary {path} is newer than the cache")]
    ToolNewer {
        /// The tool binary.
        path: PathBuf,
    },
    /// The project file changed after the cache was written.
    #[error("project file {path} is newer than the cache")]
    ProjectNewer {
        /// The project file.
        path: PathBuf,
    },
    /// The header is damaged, foreign, or from another format version.
    #[error("cache header rejected: {0}")]
    BadFormat(BlobError),
    /// The header is fine but the payload does not decode.
    #[error("cache payload is corrupt: {reason}")]
    Corrupt {
        /// The decode failure.
        reason: String,
    },
    /// The cache belongs to another target configuration.
    #[error("cache was written for {recorded}, not {requested}")]
    IdentityChanged {
        /// Identity stored in the cache.
        recorded: String,
        /// Identity being loaded.
        requested: String,
    },
    /// A tracked input configuration file changed.
    #[error("input config {path} is newer than the cache")]
    InputConfigNewer {
        /// The configuration file.
        path: PathBuf,
    },
    /// The command-line build arguments differ.
    #[error("build arguments changed")]
    BuildArgumentsChanged,
    /// A referenced manifest is gone.
    #[error("manifest {path} is missing")]
    ManifestMissing {
        /// The manifest.
        path: PathBuf,
    },
    /// A referenced manifest was rewritten after the cache.
    #[error("manifest {path} is newer than the cache")]
    ManifestStale {
        /// The manifest.
        path: PathBuf,
    },
    /// A tracked configuration value differs.
    #[error("config value {key} changed")]
    ConfigValueChanged {
        /// The configuration key.
        key: String,
    },
    /// The platform build-metadata string differs.
    #[error("platform build metadata changed")]
    PlatformMetadataChanged,
    /// The set of available build-extension modules differs.
    #[error("available extension modules changed")]
    ExtensionModulesChanged,
    /// A recorded source directory no longer exists.
    #[error("source directory {path} was removed")]
    SourceDirectoryMissing {
        /// The directory.
        path: PathBuf,
    },
    /// Files were added to or removed from a recorded source directory.
    #[error("source files in {path} changed")]
    SourceFilesChanged {
        /// The directory.
        path: PathBuf,
    },
    /// A new subdirectory contains source files.
    #[error("new source directory {path}")]
    NewSourceDirectory {
        /// The new directory.
        path: PathBuf,
    },
    /// An inlined generated file changed or vanished.
    #[error("generated file {path} changed")]
    GeneratedFileChanged {
        /// The generated file.
        path: PathBuf,
    },
    /// An external dependency changed after the cache was created.
    #[error("external dependency {path} changed")]
    ExternalDependencyChanged {
        /// The dependency file.
        path: PathBuf,
    },
    /// An internal dependency changed after the cache was last modified.
    #[error("internal dependency {path} changed")]
    InternalDependencyChanged {
        /// The dependency file.
        path: PathBuf,
    },
    /// A plugin descriptor appeared.
    #[error("new plugin file {path}")]
    NewPluginFile {
        /// The plugin descriptor.
        path: PathBuf,
    },
    /// A header gained or lost reflection markup.
    #[error("reflection markup changed in {path}")]
    MarkupChanged {
        /// The header.
        path: PathBuf,
    },
    /// A source file entered or left the working set.
    #[error("working-set membership of {path} changed")]
    WorkingSetChanged {
        /// The source file.
        path: PathBuf,
    },
}
