//! Error types for engine runs.

use std::path::PathBuf;

use joist_cache::CacheError;
use joist_config::ConfigError;
use joist_graph::GraphError;
use joist_stale::StaleError;

/// Errors that abort an engine invocation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The step set is structurally invalid (cycle or output conflict).
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The action history could not be persisted.
    #[error(transparent)]
    Stale(#[from] StaleError),

    /// The graph cache could not be written or rebuilt.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A step that must leave its outputs behind did not.
    #[error("{step} did not produce {artifact}")]
    MissingOutput {
        /// The missing artifact.
        artifact: PathBuf,
        /// Label of the step that declared it.
        step: String,
    },

    /// The executor reported a failure.
    #[error("{executor} failed to execute {steps} step(s)")]
    ExecutionFailed {
        /// Name of the executor.
        executor: String,
        /// Number of steps handed to it.
        steps: usize,
    },

    /// Preparing outputs failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
