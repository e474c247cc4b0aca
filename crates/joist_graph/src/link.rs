//! Edge resolution and cycle detection.
//!
//! [`link`] maps every produced artifact to its producing step, resolves each
//! step's prerequisite artifacts into prerequisite steps, and then proves the
//! result acyclic with a fixed-point pass over the steps.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{CycleEntry, GraphError};
use crate::graph::ActionGraph;
use crate::ids::{ArtifactId, StepId};

/// Resolves prerequisite edges in place and checks the graph for cycles.
///
/// Edges are deduplicated and ordered by [`StepId`], so linking the same step
/// list always yields the same graph. Edges are populated even when a cycle
/// is found, so callers can inspect them alongside the error.
pub fn link(graph: &mut ActionGraph) -> Result<(), GraphError> {
    let mut producers: HashMap<ArtifactId, StepId> = HashMap::new();
    for (id, step) in graph.steps() {
        for &artifact in &step.produced {
            producers.entry(artifact).or_insert(id);
        }
    }

    let ids: Vec<StepId> = graph.step_ids().collect();
    for &id in &ids {
        let mut prerequisites: Vec<StepId> = graph
            .step(id)
            .prerequisites
            .iter()
            .filter_map(|artifact| producers.get(artifact).copied())
            .collect();
        prerequisites.sort_unstable();
        prerequisites.dedup();
        graph.node_mut(id).prerequisites = prerequisites;
    }
    graph.producers = producers;
    graph.linked = true;

    let cyclic = find_cyclic_steps(graph);
    if cyclic.is_empty() {
        debug!(steps = graph.len(), "linked action graph");
        return Ok(());
    }

    let mut is_cyclic = vec![false; graph.len()];
    for id in &cyclic {
        is_cyclic[id.index()] = true;
    }
    let entries = cyclic
        .iter()
        .map(|&id| CycleEntry {
            step: id,
            command: graph.step(id).command.to_string(),
            cyclic_prerequisites: graph
                .prerequisites(id)
                .iter()
                .filter(|p| is_cyclic[p.index()])
                .map(|&p| (p, graph.step(p).command.to_string()))
                .collect(),
        })
        .collect();
    Err(GraphError::Cycle(entries))
}

/// Returns the steps that cannot be proven acyclic, in ID order.
///
/// Steps without prerequisite producers start out known-acyclic. Each full
/// pass admits every step whose prerequisite producers are all known-acyclic;
/// the loop ends when a pass admits nothing. Whatever remains sits on, or
/// downstream of, a cycle.
fn find_cyclic_steps(graph: &ActionGraph) -> Vec<StepId> {
    let mut acyclic: Vec<bool> = graph
        .step_ids()
        .map(|id| graph.prerequisites(id).is_empty())
        .collect();

    loop {
        let mut added = false;
        for id in graph.step_ids() {
            if acyclic[id.index()] {
                continue;
            }
            if graph
                .prerequisites(id)
                .iter()
                .all(|p| acyclic[p.index()])
            {
                acyclic[id.index()] = true;
                added = true;
            }
        }
        if !added {
            break;
        }
    }

    graph
        .step_ids()
        .filter(|id| !acyclic[id.index()])
        .collect()
}

/// Collects `roots` and every step they transitively depend on, in ID order.
pub fn gather_prerequisites(graph: &ActionGraph, roots: &[StepId]) -> Vec<StepId> {
    let mut visited = vec![false; graph.len()];
    let mut stack: Vec<StepId> = Vec::with_capacity(roots.len());
    for &root in roots {
        if !visited[root.index()] {
            visited[root.index()] = true;
            stack.push(root);
        }
    }
    while let Some(id) = stack.pop() {
        for &p in graph.prerequisites(id) {
            if !visited[p.index()] {
                visited[p.index()] = true;
                stack.push(p);
            }
        }
    }
    graph
        .step_ids()
        .filter(|id| visited[id.index()])
        .collect()
}

/// Collects every step that transitively depends on one of `roots`
/// (including the roots), in ID order.
pub fn gather_dependents(graph: &ActionGraph, roots: &[StepId]) -> Vec<StepId> {
    let mut dependents: Vec<Vec<StepId>> = vec![Vec::new(); graph.len()];
    for id in graph.step_ids() {
        for &p in graph.prerequisites(id) {
            dependents[p.index()].push(id);
        }
    }
    let mut visited = vec![false; graph.len()];
    let mut stack: Vec<StepId> = Vec::new();
    for &root in roots {
        if !visited[root.index()] {
            visited[root.index()] = true;
            stack.push(root);
        }
    }
    while let Some(id) = stack.pop() {
        for &d in &dependents[id.index()] {
            if !visited[d.index()] {
                visited[d.index()] = true;
                stack.push(d);
            }
        }
    }
    graph
        .step_ids()
        .filter(|id| visited[id.index()])
        .collect()
}
