//! Configuration types deserialized from `joist.toml`.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The top-level engine configuration parsed from `joist.toml`.
///
/// Every section is optional; a missing file section falls back to the
/// defaults documented on each field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Parallelism and staleness options.
    #[serde(default)]
    pub engine: EngineSection,
    /// Location of the persisted action history.
    #[serde(default)]
    pub history: HistorySection,
    /// Graph-cache location and rescan rules.
    #[serde(default)]
    pub cache: CacheSection,
}

/// The `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Worker pool size for parallel checks. `0` lets rayon choose.
    #[serde(default)]
    pub threads: usize,
    /// Skip dependents whose only outdated input is an import library.
    #[serde(default)]
    pub ignore_outdated_import_libraries: bool,
    /// Verify that link steps produced their declared outputs after execution.
    #[serde(default = "default_true")]
    pub verify_link_outputs: bool,
    /// Slack applied when comparing input timestamps against the last
    /// execution time, in milliseconds.
    #[serde(default = "default_slack_ms")]
    pub timestamp_slack_ms: u64,
    /// Directory where cycle and conflict dumps are written.
    #[serde(default = "default_diagnostics_dir")]
    pub diagnostics_dir: PathBuf,
}

impl EngineSection {
    /// Returns the timestamp slack as a [`Duration`].
    pub fn timestamp_slack(&self) -> Duration {
        Duration::from_millis(self.timestamp_slack_ms)
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            threads: 0,
            ignore_outdated_import_libraries: false,
            verify_link_outputs: true,
            timestamp_slack_ms: default_slack_ms(),
            diagnostics_dir: default_diagnostics_dir(),
        }
    }
}

/// The `[history]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySection {
    /// Path of the action history file, relative to the project directory.
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            path: default_history_path(),
        }
    }
}

/// The `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Directory holding one graph cache file per target configuration.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Extensions (without the dot) that count as source files when
    /// rescanning recorded source directories.
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
    /// Substrings that mark a header as carrying reflection markup.
    #[serde(default = "default_markup_markers")]
    pub markup_markers: Vec<String>,
    /// Extension (without the dot) of plugin descriptor files.
    #[serde(default = "default_plugin_extension")]
    pub plugin_extension: String,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            source_extensions: default_source_extensions(),
            markup_markers: default_markup_markers(),
            plugin_extension: default_plugin_extension(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_slack_ms() -> u64 {
    1000
}

fn default_diagnostics_dir() -> PathBuf {
    PathBuf::from("Intermediate/Diagnostics")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("Intermediate/ActionHistory.bin")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("Intermediate/GraphCache")
}

fn default_source_extensions() -> Vec<String> {
    ["c", "cc", "cpp", "h", "hpp", "inl", "ispc"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_plugin_extension() -> String {
    "plugin".to_string()
}

fn default_markup_markers() -> Vec<String> {
    ["REFLECT_CLASS(", "REFLECT_STRUCT(", "REFLECT_ENUM("]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
