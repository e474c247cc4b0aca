//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::EngineConfig;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE: &str = "joist.toml";

/// Loads and validates a `joist.toml` configuration from a project directory.
///
/// A project without a `joist.toml` gets the default configuration.
pub fn load_config(project_dir: &Path) -> Result<EngineConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(EngineConfig::default());
    }
    load_config_file(&config_path)
}

/// Loads and validates an explicitly named configuration file.
///
/// Unlike [`load_config`], a missing file is an error.
pub fn load_config_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a `joist.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that configuration values are usable.
fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    let cache = &config.cache;
    if cache.source_extensions.is_empty() {
        return Err(invalid("cache.source_extensions", "must list at least one extension"));
    }
    if let Some(ext) = cache
        .source_extensions
        .iter()
        .find(|e| e.is_empty() || e.starts_with('.'))
    {
        return Err(invalid(
            "cache.source_extensions",
            format!("entry '{ext}' must be a bare extension such as \"cpp\""),
        ));
    }
    if cache.markup_markers.iter().any(|m| m.is_empty()) {
        return Err(invalid("cache.markup_markers", "an empty marker would match every header"));
    }
    let plugin = &cache.plugin_extension;
    if plugin.is_empty() || plugin.starts_with('.') {
        return Err(invalid(
            "cache.plugin_extension",
            format!("'{plugin}' must be a bare extension such as \"plugin\""),
        ));
    }
    if config.engine.diagnostics_dir.as_os_str().is_empty() {
        return Err(invalid("engine.diagnostics_dir", "must name a directory"));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_config_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.engine.threads, 0);
        assert!(!config.engine.ignore_outdated_import_libraries);
        assert!(config.engine.verify_link_outputs);
        assert_eq!(config.engine.timestamp_slack(), Duration::from_secs(1));
        assert_eq!(
            config.history.path,
            PathBuf::from("Intermediate/ActionHistory.bin")
        );
        assert!(config.cache.source_extensions.contains(&"cpp".to_string()));
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[engine]
threads = 8
ignore_outdated_import_libraries = true
verify_link_outputs = false
timestamp_slack_ms = 2000
diagnostics_dir = "out/diag"

[history]
path = "out/history.bin"

[cache]
dir = "out/graphs"
source_extensions = ["cpp", "h"]
markup_markers = ["GENERATED_BODY("]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.engine.threads, 8);
        assert!(config.engine.ignore_outdated_import_libraries);
        assert!(!config.engine.verify_link_outputs);
        assert_eq!(config.engine.timestamp_slack(), Duration::from_secs(2));
        assert_eq!(config.engine.diagnostics_dir, PathBuf::from("out/diag"));
        assert_eq!(config.history.path, PathBuf::from("out/history.bin"));
        assert_eq!(config.cache.dir, PathBuf::from("out/graphs"));
        assert_eq!(config.cache.source_extensions, vec!["cpp", "h"]);
        assert_eq!(config.cache.markup_markers, vec!["GENERATED_BODY("]);
    }

    #[test]
    fn empty_extensions_rejected() {
        let err = load_config_from_str("[cache]\nsource_extensions = []\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "cache.source_extensions",
                ..
            }
        ));
    }

    #[test]
    fn dotted_extension_rejected() {
        let err = load_config_from_str("[cache]\nsource_extensions = [\".cpp\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn empty_marker_rejected() {
        let err = load_config_from_str("[cache]\nmarkup_markers = [\"\"]\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "cache.markup_markers",
                ..
            }
        ));
    }

    #[test]
    fn dotted_plugin_extension_rejected() {
        let err = load_config_from_str("[cache]\nplugin_extension = \".plugin\"\n").unwrap_err();
        assert!(err.to_string().starts_with("invalid `cache.plugin_extension`"), "{err}");
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.engine.timestamp_slack_ms, 1000);
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_file(&dir.path().join("missing.toml")).unwrap_err();
        match err {
            ConfigError::Read { path, .. } => assert_eq!(path, dir.path().join("missing.toml")),
            other => panic!("expected read error, got {other:?}"),
        }

        let path = dir.path().join("ci.toml");
        std::fs::write(&path, "[cache]\nplugin_extension = \"uplugin\"\n").unwrap();
        assert_eq!(load_config_file(&path).unwrap().cache.plugin_extension, "uplugin");
    }

    #[test]
    fn load_from_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[engine]\nthreads = 3\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.engine.threads, 3);
    }
}
