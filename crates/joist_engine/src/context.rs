//! Per-invocation state.
//!
//! Everything one engine run shares (configuration, the action history,
//! parsed dependency lists, the worker pool) lives in a [`BuildContext`]
//! created at the start of the run and dropped at the end.

use std::path::{Path, PathBuf};

use joist_cache::{ValidityContext, WorkingSet};
use joist_config::EngineConfig;
use joist_stale::{ActionHistory, DepFileCache, OutdatedOptions};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::EngineError;

/// State shared by one engine invocation.
pub struct BuildContext {
    root: PathBuf,
    config: EngineConfig,
    history: ActionHistory,
    dependencies: DepFileCache,
    pool: ThreadPool,
}

impl BuildContext {
    /// Creates a context rooted at `root`, loading the action history from
    /// the configured path.
    pub fn new(root: impl Into<PathBuf>, config: EngineConfig) -> Result<Self, EngineError> {
        let root = root.into();
        let history = ActionHistory::load(&resolve(&root, &config.history.path));
        Self::with_history(root, config, history)
    }

    /// Creates a context with an explicit history store.
    pub fn with_history(
        root: impl Into<PathBuf>,
        config: EngineConfig,
        history: ActionHistory,
    ) -> Result<Self, EngineError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.engine.threads)
            .thread_name(|i| format!("joist-worker-{i}"))
            .build()?;
        debug!(
            threads = pool.current_num_threads(),
            history = history.len(),
            "created build context"
        );
        Ok(Self {
            root: root.into(),
            config,
            history,
            dependencies: DepFileCache::new(),
            pool,
        })
    }

    /// The directory relative configuration paths resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The action history.
    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    /// The dependency-list cache.
    pub fn dependencies(&self) -> &DepFileCache {
        &self.dependencies
    }

    /// Number of worker threads.
    pub fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Staleness options derived from the configuration.
    pub fn outdated_options(&self) -> OutdatedOptions {
        OutdatedOptions {
            ignore_outdated_import_libraries: self.config.engine.ignore_outdated_import_libraries,
            timestamp_slack: self.config.engine.timestamp_slack(),
        }
    }

    /// Overrides the import-library option for this invocation.
    pub fn set_ignore_outdated_import_libraries(&mut self, ignore: bool) {
        self.config.engine.ignore_outdated_import_libraries = ignore;
    }

    /// Resolves a configured path against the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve(&self.root, path)
    }

    /// Where graph diagnostics are written.
    pub fn diagnostics_dir(&self) -> PathBuf {
        self.resolve(&self.config.engine.diagnostics_dir)
    }

    /// Where graph caches are stored.
    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(&self.config.cache.dir)
    }

    /// Cache validity inputs taken from the configuration.
    pub fn validity_context<'a>(&'a self, working_set: &'a dyn WorkingSet) -> ValidityContext<'a> {
        ValidityContext {
            source_extensions: &self.config.cache.source_extensions,
            markup_markers: &self.config.cache.markup_markers,
            plugin_extension: &self.config.cache.plugin_extension,
            working_set,
        }
    }

    /// Runs `op` inside the worker pool.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joist_config::load_config_from_str;
    use std::time::Duration;

    #[test]
    fn options_follow_config() {
        let config = load_config_from_str(
            "[engine]\nthreads = 2\nignore_outdated_import_libraries = true\ntimestamp_slack_ms = 250\n",
        )
        .unwrap();
        let ctx = BuildContext::with_history("/work", config, ActionHistory::in_memory()).unwrap();
        assert_eq!(ctx.parallelism(), 2);
        let options = ctx.outdated_options();
        assert!(options.ignore_outdated_import_libraries);
        assert_eq!(options.timestamp_slack, Duration::from_millis(250));
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let ctx = BuildContext::with_history(
            "/work/Game",
            EngineConfig::default(),
            ActionHistory::in_memory(),
        )
        .unwrap();
        assert_eq!(
            ctx.cache_dir(),
            Path::new("/work/Game").join(&ctx.config().cache.dir)
        );
        assert_eq!(ctx.resolve(Path::new("/abs/x")), PathBuf::from("/abs/x"));
    }

    #[test]
    fn history_is_loaded_from_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = BuildContext::new(dir.path(), EngineConfig::default()).unwrap();
        assert!(ctx.history().is_empty());
        assert_eq!(
            ctx.history().path(),
            Some(dir.path().join(&EngineConfig::default().history.path).as_path())
        );
    }

    #[test]
    fn override_import_library_option() {
        let mut ctx = BuildContext::with_history(
            "/work",
            EngineConfig::default(),
            ActionHistory::in_memory(),
        )
        .unwrap();
        assert!(!ctx.outdated_options().ignore_outdated_import_libraries);
        ctx.set_ignore_outdated_import_libraries(true);
        assert!(ctx.outdated_options().ignore_outdated_import_libraries);
    }
}
