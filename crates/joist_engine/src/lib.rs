//! The joist action-graph engine.
//!
//! Ties the lower crates into one invocation:
//!
//! - [`BuildContext`] holds the configuration, action history, dependency
//!   cache and worker pool for one run.
//! - [`plan`] links raw steps, gathers the outdated ones and orders them.
//! - [`execute`] hands a [`Plan`] to an [`Executor`] and does the file
//!   bookkeeping around it.
//! - [`load_cached_graph`] / [`save_graph_cache`] skip graph generation when
//!   nothing relevant changed.
//! - [`plan_reload`] patches a graph for a live-reload build.

#![warn(missing_docs)]

pub mod cached;
pub mod context;
pub mod error;
pub mod executor;
pub mod hot_reload;
pub mod pipeline;

pub use cached::{check_graph_cache, graph_cache_path, load_cached_graph, save_graph_cache};
pub use context::BuildContext;
pub use error::EngineError;
pub use executor::{execute, prepare_outputs, verify_outputs, Executor};
pub use hot_reload::{apply_artifact_renames, plan_reload};
pub use pipeline::{link_steps, plan, plan_document, plan_graph, Plan};
