//! Output-conflict detection for step lists merged from independent sources.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::artifact::ArtifactTable;
use crate::error::{ConflictField, GraphError, OutputConflict};
use crate::ids::ArtifactId;
use crate::step::BuildStep;

/// Checks that every produced artifact has one consistent producer.
///
/// When two steps claim the same artifact:
/// - if the seven graph-relevant fields match, the later step is a duplicate
///   and is removed (its extra outputs are folded into the earlier step);
/// - if either step's kind is conflict-exempt, both are kept;
/// - otherwise the pair is recorded as a conflict.
///
/// Returns the number of duplicates merged, or every conflict found.
pub fn check_for_conflicts(
    steps: &mut Vec<BuildStep>,
    artifacts: &ArtifactTable,
) -> Result<usize, GraphError> {
    let mut producer: HashMap<ArtifactId, usize> = HashMap::new();
    let mut duplicate_of: Vec<Option<usize>> = vec![None; steps.len()];
    let mut conflicts: Vec<OutputConflict> = Vec::new();

    for index in 0..steps.len() {
        let target = steps[index].produced.iter().find_map(|artifact| {
            producer.get(artifact).copied().filter(|&existing| {
                existing != index && differing_fields(&steps[existing], &steps[index]).is_empty()
            })
        });
        duplicate_of[index] = target;

        for &artifact in &steps[index].produced {
            let Some(&existing) = producer.get(&artifact) else {
                producer.insert(artifact, target.unwrap_or(index));
                continue;
            };
            if existing == index || Some(existing) == target {
                continue;
            }
            let fields = differing_fields(&steps[existing], &steps[index]);
            if fields.is_empty() {
                continue;
            }
            if steps[existing].kind.policy().conflict_exempt || steps[index].kind.policy().conflict_exempt {
                debug!(
                    artifact = %artifacts.path(artifact).display(),
                    "keeping both producers of exempt kind"
                );
                continue;
            }
            conflicts.push(OutputConflict {
                artifact: artifacts.path(artifact).to_path_buf(),
                fields,
                first: steps[existing].describe(artifacts),
                second: steps[index].describe(artifacts),
            });
        }
    }

    if !conflicts.is_empty() {
        return Err(GraphError::OutputConflicts(conflicts));
    }

    let mut merged = 0;
    for index in 0..steps.len() {
        if let Some(target) = duplicate_of[index] {
            let extra: Vec<ArtifactId> = steps[index]
                .produced
                .iter()
                .copied()
                .filter(|a| !steps[target].produced.contains(a))
                .collect();
            steps[target].produced.extend(extra);
            merged += 1;
        }
    }
    let mut index = 0;
    steps.retain(|_| {
        let keep = duplicate_of[index].is_none();
        index += 1;
        keep
    });
    if merged > 0 {
        debug!(merged, "merged duplicate build steps");
    }
    Ok(merged)
}

/// Lists the graph-relevant fields that differ between two steps.
///
/// Artifact lists are compared as sets; declaration order does not matter.
pub fn differing_fields(a: &BuildStep, b: &BuildStep) -> Vec<ConflictField> {
    let mut fields = Vec::new();
    if a.kind != b.kind {
        fields.push(ConflictField::Kind);
    }
    if as_set(&a.prerequisites) != as_set(&b.prerequisites) {
        fields.push(ConflictField::Prerequisites);
    }
    if as_set(&a.deletes) != as_set(&b.deletes) {
        fields.push(ConflictField::Deletes);
    }
    if a.dependency_list != b.dependency_list {
        fields.push(ConflictField::DependencyListFile);
    }
    if a.working_dir != b.working_dir {
        fields.push(ConflictField::WorkingDirectory);
    }
    if a.command.path != b.command.path {
        fields.push(ConflictField::CommandPath);
    }
    if a.command.arguments != b.command.arguments {
        fields.push(ConflictField::CommandArguments);
    }
    fields
}

fn as_set(ids: &[ArtifactId]) -> BTreeSet<ArtifactId> {
    ids.iter().copied().collect()
}
