//! The action graph: build steps, the linker that resolves them into a
//! validated dependency graph, and the scheduler that orders outstanding work.
//!
//! The usual pipeline is [`check_for_conflicts`] over the raw step list,
//! [`ActionGraph::new`], [`link`], and finally [`sort`] over whichever subset
//! needs to run.

#![warn(missing_docs)]

pub mod arena;
pub mod artifact;
pub mod conflict;
pub mod error;
pub mod graph;
pub mod ids;
pub mod json;
pub mod link;
pub mod schedule;
pub mod step;

pub use artifact::{Artifact, ArtifactTable};
pub use conflict::{check_for_conflicts, differing_fields};
pub use error::{ConflictField, CycleEntry, GraphError, OutputConflict};
pub use graph::{ActionGraph, LinkedStep};
pub use ids::{ArtifactId, StepId};
pub use json::{ActionRecord, GraphDocument};
pub use link::{gather_dependents, gather_prerequisites, link};
pub use schedule::sort;
pub use step::{ArtifactMode, BuildStep, CommandLine, KindPolicy, StepKind};
