//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors that can occur when loading or validating a `joist.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read, or an explicitly
    /// named file is missing.
    #[error("cannot read engine configuration {}: {source}", path.display())]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the engine schema.
    #[error("malformed joist.toml: {0}")]
    Parse(String),

    /// A setting parsed but cannot drive the engine.
    #[error("invalid `{field}`: {reason}")]
    InvalidValue {
        /// Dotted path of the setting, e.g. `cache.plugin_extension`.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
