//! Parsing and validation of `joist.toml` engine configuration files.
//!
//! This crate reads the engine configuration and produces a strongly-typed
//! [`EngineConfig`] covering parallelism, staleness options, the action
//! history location, and graph-cache scanning rules.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE};
pub use types::*;
