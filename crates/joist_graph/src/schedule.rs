//! Throughput-oriented ordering of outstanding steps.
//!
//! The order produced here is a heuristic for keeping many workers busy; the
//! executor still enforces prerequisite order itself.

use std::cmp::Ordering;
use std::path::Path;

use crate::graph::ActionGraph;
use crate::ids::StepId;

/// Reorders `order` in place for parallel throughput.
///
/// 1. High priority spreads from each high-priority step to all of its
///    transitive prerequisites.
/// 2. Each step's dependent count becomes the number of steps in `order`
///    that transitively depend on it.
/// 3. Steps are sorted by dependent count (descending), then priority, then
///    produced path (descending), then prerequisite count (descending).
/// 4. Steps that cannot run remotely, and kinds that cluster early, are
///    moved to sit right after their latest prerequisite in the list.
pub fn sort(graph: &mut ActionGraph, order: &mut Vec<StepId>) {
    let mut in_list = vec![false; graph.len()];
    for &id in order.iter() {
        in_list[id.index()] = true;
    }

    for &id in order.iter() {
        let high = graph.step(id).high_priority;
        let node = graph.node_mut(id);
        node.high_priority = high;
        node.dependents = 0;
    }

    propagate_priority(graph, order);
    let dependents = count_dependents(graph, order, &in_list);
    for &id in order.iter() {
        graph.node_mut(id).dependents = dependents[id.index()];
    }

    {
        let view: &ActionGraph = graph;
        order.sort_by(|&a, &b| compare(view, a, b));
    }

    let mut position = vec![usize::MAX; graph.len()];
    for (index, &id) in order.iter().enumerate() {
        position[id.index()] = index;
    }

    let mut raised = vec![false; graph.len()];
    for &id in order.iter() {
        let step = graph.step(id);
        let mut key = position[id.index()];
        if !step.can_execute_remotely || step.kind.policy().cluster_early {
            let latest = graph
                .prerequisites(id)
                .iter()
                .filter(|p| in_list[p.index()])
                .map(|p| position[p.index()])
                .max();
            if let Some(latest) = latest {
                key = latest;
                raised[id.index()] = true;
            }
        }
        graph.node_mut(id).sort_key = key;
    }

    let view: &ActionGraph = graph;
    order.sort_by_key(|&id| {
        (
            view.node(id).sort_key,
            raised[id.index()],
            position[id.index()],
        )
    });
}

fn propagate_priority(graph: &mut ActionGraph, order: &[StepId]) {
    let mut visited = vec![false; graph.len()];
    let mut stack: Vec<StepId> = order
        .iter()
        .copied()
        .filter(|&id| graph.step(id).high_priority)
        .collect();
    while let Some(id) = stack.pop() {
        if visited[id.index()] {
            continue;
        }
        visited[id.index()] = true;
        let prerequisites = graph.prerequisites(id).to_vec();
        for p in prerequisites {
            graph.node_mut(p).high_priority = true;
            if !visited[p.index()] {
                stack.push(p);
            }
        }
    }
}

/// For every step, how many steps in `order` transitively depend on it.
///
/// Each root walks its prerequisite closure once, visiting every step at
/// most once per root.
fn count_dependents(graph: &ActionGraph, order: &[StepId], in_list: &[bool]) -> Vec<usize> {
    let mut counts = vec![0usize; graph.len()];
    let mut seen_by = vec![usize::MAX; graph.len()];
    let mut stack: Vec<StepId> = Vec::new();
    for (root_index, &root) in order.iter().enumerate() {
        seen_by[root.index()] = root_index;
        stack.push(root);
        while let Some(id) = stack.pop() {
            for &p in graph.prerequisites(id) {
                if seen_by[p.index()] == root_index {
                    continue;
                }
                seen_by[p.index()] = root_index;
                if in_list[p.index()] {
                    counts[p.index()] += 1;
                }
                stack.push(p);
            }
        }
    }
    counts
}

fn compare(graph: &ActionGraph, a: StepId, b: StepId) -> Ordering {
    let na = graph.node(a);
    let nb = graph.node(b);
    nb.dependents
        .cmp(&na.dependents)
        .then_with(|| nb.high_priority.cmp(&na.high_priority))
        .then_with(|| {
            let pa = primary_output(graph, a);
            let pb = primary_output(graph, b);
            let dir_a = pa.and_then(Path::parent);
            let dir_b = pb.and_then(Path::parent);
            dir_b
                .cmp(&dir_a)
                .then_with(|| pb.and_then(Path::file_name).cmp(&pa.and_then(Path::file_name)))
        })
        .then_with(|| nb.prerequisites.len().cmp(&na.prerequisites.len()))
        .then_with(|| a.cmp(&b))
}

fn primary_output(graph: &ActionGraph, id: StepId) -> Option<&Path> {
    graph
        .step(id)
        .produced
        .first()
        .map(|&artifact| graph.artifacts().path(artifact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactTable;
    use crate::link::link;
    use crate::step::{BuildStep, StepKind};

    fn id(raw: u32) -> StepId {
        StepId::from_raw(raw)
    }

    /// A feeds B and C; D needs B and C.
    fn diamond(remote: bool) -> ActionGraph {
        let mut t = ArtifactTable::new();
        let a = t.intern("obj/a.obj");
        let b = t.intern("obj/b.obj");
        let c = t.intern("obj/c.obj");
        let d = t.intern("obj/d.obj");
        let make = |step: BuildStep| if remote { step.with_remote_execution() } else { step };
        let steps = vec![
            make(BuildStep::new(StepKind::Compile, "cc", "a").with_produced(a)),
            make(
                BuildStep::new(StepKind::Compile, "cc", "b")
                    .with_prerequisite(a)
                    .with_produced(b),
            ),
            make(
                BuildStep::new(StepKind::Compile, "cc", "c")
                    .with_prerequisite(a)
                    .with_produced(c),
            ),
            make(
                BuildStep::new(StepKind::Compile, "cc", "d")
                    .with_prerequisite(b)
                    .with_prerequisite(c)
                    .with_produced(d),
            ),
        ];
        let mut graph = ActionGraph::new(t, steps);
        link(&mut graph).unwrap();
        graph
    }

    fn position(order: &[StepId], step: StepId) -> usize {
        order.iter().position(|&s| s == step).unwrap()
    }

    #[test]
    fn diamond_orders_dependencies_first() {
        for remote in [false, true] {
            let mut graph = diamond(remote);
            let mut order: Vec<StepId> = graph.step_ids().collect();
            sort(&mut graph, &mut order);
            assert_eq!(order[0], id(0));
            assert!(position(&order, id(3)) > position(&order, id(1)));
            assert!(position(&order, id(3)) > position(&order, id(2)));
        }
    }

    #[test]
    fn diamond_tie_breaks_by_output_path() {
        let mut graph = diamond(true);
        let mut order: Vec<StepId> = graph.step_ids().collect();
        sort(&mut graph, &mut order);
        // b.obj and c.obj tie on dependents; later name sorts first.
        assert_eq!(order, vec![id(0), id(2), id(1), id(3)]);
    }

    #[test]
    fn sort_is_stable_across_runs() {
        let mut graph = diamond(false);
        let mut first: Vec<StepId> = graph.step_ids().rev().collect();
        sort(&mut graph, &mut first);
        let mut second = first.clone();
        second.reverse();
        sort(&mut graph, &mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn dependent_counts_are_transitive() {
        let mut graph = diamond(true);
        let mut order: Vec<StepId> = graph.step_ids().collect();
        sort(&mut graph, &mut order);
        assert_eq!(graph.node(id(0)).dependents, 3);
        assert_eq!(graph.node(id(1)).dependents, 1);
        assert_eq!(graph.node(id(2)).dependents, 1);
        assert_eq!(graph.node(id(3)).dependents, 0);
    }

    #[test]
    fn dependents_only_count_listed_steps() {
        let mut graph = diamond(true);
        let mut order = vec![id(0), id(1)];
        sort(&mut graph, &mut order);
        assert_eq!(graph.node(id(0)).dependents, 1);
    }

    #[test]
    fn priority_propagates_to_prerequisites() {
        let mut t = ArtifactTable::new();
        let a = t.intern("a.obj");
        let b = t.intern("b.obj");
        let z = t.intern("z.obj");
        let steps = vec![
            BuildStep::new(StepKind::Compile, "cc", "a").with_produced(a).with_remote_execution(),
            BuildStep::new(StepKind::Generate, "gen", "b")
                .with_prerequisite(a)
                .with_produced(b)
                .with_high_priority()
                .with_remote_execution(),
            BuildStep::new(StepKind::Compile, "cc", "z").with_produced(z).with_remote_execution(),
        ];
        let mut graph = ActionGraph::new(t, steps);
        link(&mut graph).unwrap();
        let mut order: Vec<StepId> = graph.step_ids().collect();
        sort(&mut graph, &mut order);
        assert!(graph.node(id(0)).high_priority);
        assert!(!graph.node(id(2)).high_priority);
        // a and z both have zero or one dependents; a has one, so it leads.
        assert_eq!(order[0], id(0));
        // b (high priority, 0 dependents) beats z (0 dependents).
        assert!(position(&order, id(1)) < position(&order, id(2)));
    }

    #[test]
    fn link_steps_cluster_after_latest_prerequisite() {
        let mut t = ArtifactTable::new();
        let objs: Vec<_> = (0..3).map(|i| t.intern(format!("obj/m{i}.obj"))).collect();
        let other = t.intern("obj/z_other.obj");
        let exe = t.intern("bin/app.exe");
        let mut steps: Vec<BuildStep> = objs
            .iter()
            .enumerate()
            .map(|(i, &o)| {
                BuildStep::new(StepKind::Compile, "cc", format!("m{i}"))
                    .with_produced(o)
                    .with_remote_execution()
            })
            .collect();
        steps.push(
            BuildStep::new(StepKind::Compile, "cc", "other")
                .with_produced(other)
                .with_remote_execution(),
        );
        let mut link_step = BuildStep::new(StepKind::Link, "ld", "app").with_produced(exe);
        for &o in &objs {
            link_step = link_step.with_prerequisite(o);
        }
        steps.push(link_step);
        let mut graph = ActionGraph::new(t, steps);
        link(&mut graph).unwrap();

        let mut order: Vec<StepId> = graph.step_ids().collect();
        sort(&mut graph, &mut order);
        let link_pos = position(&order, id(4));
        for i in 0..3 {
            assert!(position(&order, id(i)) < link_pos);
        }
        // The unrelated compile is pushed behind the clustered link.
        assert!(link_pos < position(&order, id(3)));
    }
}
