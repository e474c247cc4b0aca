//! Patching a linked graph for a live-reload build.
//!
//! A running process keeps its loaded modules locked, so a reload build
//! writes each module under a new name. The rename map comes from outside;
//! here every step that produces or consumes a renamed artifact gets a new
//! record with the new paths and a rewritten command line. IDs and edges are
//! untouched, so the graph does not need relinking.

use std::collections::HashMap;
use std::path::PathBuf;

use joist_graph::{ActionGraph, ArtifactId, StepId};
use tracing::debug;

use crate::context::BuildContext;
use crate::pipeline::{plan_graph, Plan};

/// Applies `renames` (old path to new path) to every step touching a renamed
/// artifact. Returns the patched steps in ID order.
pub fn apply_artifact_renames(
    graph: &mut ActionGraph,
    renames: &HashMap<PathBuf, PathBuf>,
) -> Vec<StepId> {
    let mut mapping: HashMap<ArtifactId, ArtifactId> = HashMap::new();
    let mut text: Vec<(String, String)> = Vec::new();
    for (old, new) in renames {
        let Some(old_id) = graph.artifacts().lookup(old) else {
            continue;
        };
        let new_id = graph.artifacts_mut().intern(new);
        mapping.insert(old_id, new_id);
        text.push((old.display().to_string(), new.display().to_string()));
        if let (Some(old_name), Some(new_name)) = (old.file_name(), new.file_name()) {
            if old_name != new_name {
                text.push((
                    old_name.to_string_lossy().into_owned(),
                    new_name.to_string_lossy().into_owned(),
                ));
            }
        }
    }
    if mapping.is_empty() {
        return Vec::new();
    }
    // Full paths first so a bare file name never rewrites part of one.
    text.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let ids: Vec<StepId> = graph.step_ids().collect();
    let mut patched = Vec::new();
    for id in ids {
        let step = graph.step(id);
        let touches = step
            .produced
            .iter()
            .chain(&step.prerequisites)
            .chain(&step.deletes)
            .any(|a| mapping.contains_key(a));
        if !touches {
            continue;
        }
        let mut step = step.clone();
        for list in [&mut step.produced, &mut step.prerequisites, &mut step.deletes] {
            for artifact in list.iter_mut() {
                if let Some(&new) = mapping.get(artifact) {
                    *artifact = new;
                }
            }
        }
        step.command.arguments = rewrite(&step.command.arguments, &text);
        debug!(step = %id, action = %step.label(), "patched for reload");
        graph.replace_step(id, step);
        patched.push(id);
    }
    patched
}

/// Replaces every occurrence of each old string in one pass, longest first.
fn rewrite(arguments: &str, replacements: &[(String, String)]) -> String {
    let mut out = String::with_capacity(arguments.len());
    let mut rest = arguments;
    'outer: while !rest.is_empty() {
        for (old, new) in replacements {
            if !old.is_empty() && rest.starts_with(old.as_str()) {
                out.push_str(new);
                rest = &rest[old.len()..];
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Patches `graph` and plans only the patched steps.
pub fn plan_reload(
    ctx: &BuildContext,
    mut graph: ActionGraph,
    renames: &HashMap<PathBuf, PathBuf>,
) -> Plan {
    let patched = apply_artifact_renames(&mut graph, renames);
    plan_graph(ctx, graph, Some(&patched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use joist_graph::{link, ArtifactTable, BuildStep, StepKind};
    use std::path::Path;

    fn graph() -> ActionGraph {
        let mut t = ArtifactTable::new();
        let obj = t.intern("Intermediate/Core.obj");
        let dll = t.intern("Binaries/Game-Core.dll");
        let exe = t.intern("Binaries/Game.exe");
        let steps = vec![
            BuildStep::new(StepKind::Compile, "cl", "/c Core.cpp /Fo Intermediate/Core.obj")
                .with_produced(obj),
            BuildStep::new(
                StepKind::Link,
                "link",
                "/DLL /OUT:Binaries/Game-Core.dll Intermediate/Core.obj",
            )
            .with_prerequisite(obj)
            .with_produced(dll),
            BuildStep::new(StepKind::Link, "link", "/OUT:Binaries/Game.exe Game-Core.dll")
                .with_prerequisite(dll)
                .with_produced(exe),
        ];
        let mut g = ActionGraph::new(t, steps);
        link(&mut g).unwrap();
        g
    }

    #[test]
    fn renamed_outputs_and_arguments_are_patched() {
        let mut g = graph();
        let renames = HashMap::from([(
            PathBuf::from("Binaries/Game-Core.dll"),
            PathBuf::from("Binaries/Game-Core.patch_1.dll"),
        )]);
        let patched = apply_artifact_renames(&mut g, &renames);
        assert_eq!(patched, vec![StepId::from_raw(1), StepId::from_raw(2)]);

        let producer = g.step(StepId::from_raw(1));
        assert_eq!(
            g.artifacts().path(producer.produced[0]),
            Path::new("Binaries/Game-Core.patch_1.dll")
        );
        assert_eq!(
            producer.command.arguments,
            "/DLL /OUT:Binaries/Game-Core.patch_1.dll Intermediate/Core.obj"
        );
        assert_eq!(
            g.step(StepId::from_raw(2)).command.arguments,
            "/OUT:Binaries/Game.exe Game-Core.patch_1.dll"
        );

        // Edges survive and point at the patched producer.
        assert_eq!(g.prerequisites(StepId::from_raw(2)), &[StepId::from_raw(1)]);
        let new_dll = g.artifacts().lookup(Path::new("Binaries/Game-Core.patch_1.dll")).unwrap();
        assert_eq!(g.producer_of(new_dll), Some(StepId::from_raw(1)));
    }

    #[test]
    fn unknown_paths_patch_nothing() {
        let mut g = graph();
        let renames = HashMap::from([(PathBuf::from("nope.dll"), PathBuf::from("nope2.dll"))]);
        assert!(apply_artifact_renames(&mut g, &renames).is_empty());
        assert_eq!(g.artifacts().len(), 3);
    }

    #[test]
    fn rewrite_prefers_longest_match() {
        let replacements = vec![
            ("dir/a.dll".to_string(), "dir/a.p.dll".to_string()),
            ("a.dll".to_string(), "a.p.dll".to_string()),
        ];
        assert_eq!(
            rewrite("dir/a.dll a.dll xa.dllx", &replacements),
            "dir/a.p.dll a.p.dll xa.p.dllx"
        );
    }
}
