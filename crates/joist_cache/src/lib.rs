//! Persisted action-graph caches for joist.
//!
//! Generating an action graph means reading every project, module rule, and
//! source directory. A [`GraphCache`] snapshots the linked graph together with
//! everything that could change it, so an unchanged tree skips generation:
//!
//! 1. [`GraphCache::load`] runs the cheap checks while reading the file.
//! 2. [`GraphCache::validate`] rescans sources and dependency timestamps.
//! 3. [`GraphCache::into_graph`] rebuilds and relinks the graph.
//!
//! Any failure is a [`CacheInvalid`] reason; the caller logs it and
//! regenerates.

#![warn(missing_docs)]

pub mod error;
pub mod graph_cache;
pub mod identity;
pub mod inventory;

pub use error::{CacheError, CacheInvalid};
pub use graph_cache::{GraphCache, LoadContext, ValidityContext, FORMAT_VERSION};
pub use identity::{cache_file_name, GraphIdentity, CACHE_EXTENSION};
pub use inventory::{EmptyWorkingSet, SourceDirectory, WorkingSet};
