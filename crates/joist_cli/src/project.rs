//! Shared helpers for locating the project and its configuration.

use std::path::{Path, PathBuf};

use joist_config::{load_config, load_config_file, EngineConfig};
use joist_engine::BuildContext;
use joist_stale::ActionHistory;

use crate::GlobalArgs;

/// The directory relative configuration paths resolve against.
///
/// An explicit `--config` file anchors the project at its directory;
/// otherwise the current directory is used.
pub fn project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(parent) = global
        .config
        .as_deref()
        .map(Path::new)
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
    {
        return Ok(parent.to_path_buf());
    }
    Ok(std::env::current_dir()?)
}

/// Loads `--config` if given, else `joist.toml` in `root` (or defaults).
pub fn engine_config(
    global: &GlobalArgs,
    root: &Path,
) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match &global.config {
        Some(path) => load_config_file(Path::new(path))?,
        None => load_config(root)?,
    };
    Ok(config)
}

/// A context that never touches the persisted history.
pub fn scratch_context(
    global: &GlobalArgs,
    root: &Path,
) -> Result<BuildContext, Box<dyn std::error::Error>> {
    let config = engine_config(global, root)?;
    Ok(BuildContext::with_history(
        root,
        config,
        ActionHistory::in_memory(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(config: Option<&str>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            log_level: None,
            config: config.map(str::to_string),
        }
    }

    #[test]
    fn config_file_anchors_root() {
        let root = project_root(&global(Some("/work/Game/joist.toml"))).unwrap();
        assert_eq!(root, PathBuf::from("/work/Game"));
    }

    #[test]
    fn bare_config_name_uses_current_dir() {
        let root = project_root(&global(Some("joist.toml"))).unwrap();
        assert_eq!(root, std::env::current_dir().unwrap());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let g = global(path.to_str());
        assert!(engine_config(&g, dir.path()).is_err());
        assert!(engine_config(&global(None), dir.path()).is_ok());
    }
}
