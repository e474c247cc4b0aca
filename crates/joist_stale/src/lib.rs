//! Incremental staleness analysis for linked action graphs.
//!
//! [`gather_outdated`] decides which steps must re-run from file timestamps,
//! command fingerprints recorded in an [`ActionHistory`], and the header
//! lists resolved through a [`DependencyCache`].

#![warn(missing_docs)]

pub mod depcache;
pub mod error;
pub mod history;
pub mod outdated;

pub use depcache::{parse_dependency_list, DepFileCache, DependencyCache};
pub use error::StaleError;
pub use history::{ActionHistory, HistoryStore};
pub use outdated::{gather_outdated, Outdated, OutdatedOptions, StaleAnalyzer, StaleReason};
