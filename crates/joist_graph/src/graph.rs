//! The action graph: build steps, their artifacts, and resolved edges.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::artifact::ArtifactTable;
use crate::ids::{ArtifactId, StepId};
use crate::step::BuildStep;

/// Graph-side state for one build step.
///
/// Holds the step's index into the build-step arena, the prerequisite steps
/// resolved by [`link`](crate::link::link), and the scheduling fields the
/// scheduler recomputes on every sort.
#[derive(Debug, Clone)]
pub struct LinkedStep {
    /// The build step this node wraps.
    pub step: StepId,
    pub(crate) prerequisites: Vec<StepId>,
    /// Number of steps in the last sorted list that transitively depend on this one.
    pub dependents: usize,
    /// Effective priority after propagation from high-priority dependents.
    pub high_priority: bool,
    /// Position key used by the scheduler's second pass.
    pub sort_key: usize,
}

impl LinkedStep {
    fn new(step: StepId) -> Self {
        Self {
            step,
            prerequisites: Vec::new(),
            dependents: 0,
            high_priority: false,
            sort_key: 0,
        }
    }

    /// Steps producing at least one of this step's prerequisite artifacts,
    /// ordered by ID.
    pub fn prerequisites(&self) -> &[StepId] {
        &self.prerequisites
    }
}

/// A set of build steps over a shared artifact table.
///
/// Construct with [`ActionGraph::new`], then call
/// [`link`](crate::link::link) to resolve edges. Steps are never added or
/// removed afterwards; [`ActionGraph::replace_step`] swaps a step's record
/// while its ID and edges stay put.
#[derive(Debug, Clone)]
pub struct ActionGraph {
    artifacts: ArtifactTable,
    steps: Arena<StepId, BuildStep>,
    nodes: Vec<LinkedStep>,
    pub(crate) producers: HashMap<ArtifactId, StepId>,
    pub(crate) linked: bool,
}

impl ActionGraph {
    /// Creates an unlinked graph from steps whose artifact IDs refer to `artifacts`.
    pub fn new(artifacts: ArtifactTable, steps: Vec<BuildStep>) -> Self {
        let steps: Arena<StepId, BuildStep> = steps.into_iter().collect();
        let nodes = steps.ids().map(LinkedStep::new).collect();
        Self {
            artifacts,
            steps,
            nodes,
            producers: HashMap::new(),
            linked: false,
        }
    }

    /// The artifact table shared by all steps.
    pub fn artifacts(&self) -> &ArtifactTable {
        &self.artifacts
    }

    /// Mutable access to the artifact table, e.g. to intern renamed outputs.
    pub fn artifacts_mut(&mut self) -> &mut ArtifactTable {
        &mut self.artifacts
    }

    /// Returns the build step with the given ID.
    pub fn step(&self, id: StepId) -> &BuildStep {
        &self.steps[id]
    }

    /// Returns the graph node for the given step.
    pub fn node(&self, id: StepId) -> &LinkedStep {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: StepId) -> &mut LinkedStep {
        &mut self.nodes[id.index()]
    }

    /// Resolved prerequisite steps of `id` (empty until linked).
    pub fn prerequisites(&self, id: StepId) -> &[StepId] {
        &self.nodes[id.index()].prerequisites
    }

    /// Iterates over all step IDs in declaration order.
    pub fn step_ids(&self) -> impl DoubleEndedIterator<Item = StepId> {
        self.steps.ids()
    }

    /// Iterates over `(ID, &BuildStep)` pairs in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = (StepId, &BuildStep)> {
        self.steps.iter()
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the graph holds no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns `true` once [`link`](crate::link::link) has resolved edges.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// The step producing `artifact`, if any (populated by linking).
    pub fn producer_of(&self, artifact: ArtifactId) -> Option<StepId> {
        self.producers.get(&artifact).copied()
    }

    /// Returns `true` if every artifact `consumer` reads from `producer` is
    /// an import library produced by an import-library-producing step.
    ///
    /// Such an edge only carries link-time symbol stubs, so a rebuild of the
    /// producer need not cascade into the consumer.
    pub fn is_import_library_edge(&self, consumer: StepId, producer: StepId) -> bool {
        let producer_step = self.step(producer);
        if !producer_step.produces_import_library {
            return false;
        }
        let consumed = self.step(consumer);
        let mut any = false;
        for &artifact in &producer_step.produced {
            if consumed.prerequisites.contains(&artifact) {
                if !self.artifacts.get(artifact).has_import_library_extension() {
                    return false;
                }
                any = true;
            }
        }
        any
    }

    /// Replaces the record of step `id`, keeping its ID and resolved edges.
    ///
    /// Returns the previous record. Callers must keep the produced and
    /// prerequisite artifacts structurally equivalent; edges are not recomputed.
    pub fn replace_step(&mut self, id: StepId, step: BuildStep) -> BuildStep {
        let old = self.steps.replace(id, step);
        let new_outputs: Vec<ArtifactId> = self.steps[id].produced.clone();
        if self.linked {
            self.producers.retain(|_, producer| *producer != id);
            for artifact in new_outputs {
                self.producers.entry(artifact).or_insert(id);
            }
        }
        old
    }

    /// Consumes the graph, returning its artifact table and steps.
    pub fn into_parts(self) -> (ArtifactTable, Vec<BuildStep>) {
        (self.artifacts, self.steps.values().cloned().collect())
    }
}
