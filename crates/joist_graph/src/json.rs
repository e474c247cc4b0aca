//! The companion JSON form of a step list.
//!
//! Rule evaluation hands the engine a document of the shape
//! `{"Environment": {..}, "Actions": [..]}`. Each action names its files by
//! path; importing interns those paths into a fresh [`ArtifactTable`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactTable;
use crate::error::GraphError;
use crate::graph::ActionGraph;
use crate::ids::ArtifactId;
use crate::step::{ArtifactMode, BuildStep, CommandLine, StepKind};

/// A whole exported graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GraphDocument {
    /// Environment variables the actions expect, sorted by name.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// The actions, in step order.
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
}

/// One build step in path form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    /// Unique action ID within the document.
    pub id: u32,
    /// Step kind.
    pub kind: StepKind,
    /// Artifact-store participation.
    #[serde(default)]
    pub artifact_mode: ArtifactMode,
    /// Directory the command runs in.
    #[serde(default)]
    pub working_directory: PathBuf,
    /// Executable path.
    pub command_path: PathBuf,
    /// Argument string.
    #[serde(default)]
    pub command_arguments: String,
    /// Tool version string.
    #[serde(default)]
    pub command_version: String,
    /// Tool name for progress output.
    #[serde(default)]
    pub command_description: String,
    /// Progress text.
    #[serde(default)]
    pub status_description: String,
    /// May run on a remote executor.
    #[serde(default)]
    pub can_execute_remotely: bool,
    /// May run on a distributed farm.
    #[serde(default)]
    pub can_execute_distributed: bool,
    /// Relative cost.
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Prerequisites should run early.
    #[serde(default)]
    pub high_priority: bool,
    /// Opt in to command-fingerprint checks.
    #[serde(default)]
    pub use_action_history: bool,
    /// One output is an import library.
    #[serde(default)]
    pub produces_import_library: bool,
    /// Actions whose outputs this one reads. Filled from linked edges on
    /// export; on import each listed action's produced items are added to
    /// this action's prerequisites.
    #[serde(default)]
    pub prerequisite_action_ids: Vec<u32>,
    /// Files read.
    #[serde(default)]
    pub prerequisite_items: Vec<PathBuf>,
    /// Files written.
    #[serde(default)]
    pub produced_items: Vec<PathBuf>,
    /// Files removed before running.
    #[serde(default)]
    pub delete_items: Vec<PathBuf>,
    /// Tool-written header list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_list_file: Option<PathBuf>,
}

fn default_weight() -> f32 {
    1.0
}

impl GraphDocument {
    /// Parses a document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, GraphError> {
        serde_json::from_str(text).map_err(|e| GraphError::Document(e.to_string()))
    }

    /// Reads and parses a document file.
    pub fn read(path: &Path) -> Result<Self, GraphError> {
        let text = std::fs::read_to_string(path).map_err(|e| GraphError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&text)
    }

    /// Serializes the document as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, GraphError> {
        serde_json::to_string_pretty(self).map_err(|e| GraphError::Document(e.to_string()))
    }

    /// Exports a graph. Step IDs become action IDs; linked edges become
    /// `prerequisiteActionIds`.
    pub fn from_graph(graph: &ActionGraph, environment: BTreeMap<String, String>) -> Self {
        let artifacts = graph.artifacts();
        let paths = |ids: &[ArtifactId]| -> Vec<PathBuf> {
            ids.iter().map(|&id| artifacts.path(id).to_path_buf()).collect()
        };
        let actions = graph
            .steps()
            .map(|(id, step)| ActionRecord {
                id: id.as_raw(),
                kind: step.kind,
                artifact_mode: step.artifact_mode,
                working_directory: step.working_dir.clone(),
                command_path: step.command.path.clone(),
                command_arguments: step.command.arguments.clone(),
                command_version: step.command.version.clone(),
                command_description: step.command_description.clone(),
                status_description: step.status_description.clone(),
                can_execute_remotely: step.can_execute_remotely,
                can_execute_distributed: step.can_execute_distributed,
                weight: step.weight,
                high_priority: step.high_priority,
                use_action_history: step.use_action_history,
                produces_import_library: step.produces_import_library,
                prerequisite_action_ids: graph.prerequisites(id).iter().map(|p| p.as_raw()).collect(),
                prerequisite_items: paths(&step.prerequisites),
                produced_items: paths(&step.produced),
                delete_items: paths(&step.deletes),
                dependency_list_file: step
                    .dependency_list
                    .map(|dep| artifacts.path(dep).to_path_buf()),
            })
            .collect();
        Self {
            environment,
            actions,
        }
    }

    /// Interns every path and returns the steps in document order.
    ///
    /// Fails with [`GraphError::Document`] on a repeated action ID or a
    /// `prerequisiteActionIds` entry naming no action.
    pub fn into_steps(self) -> Result<(ArtifactTable, Vec<BuildStep>), GraphError> {
        let mut index_of: HashMap<u32, usize> = HashMap::with_capacity(self.actions.len());
        for (index, action) in self.actions.iter().enumerate() {
            if index_of.insert(action.id, index).is_some() {
                return Err(GraphError::Document(format!("duplicate action id {}", action.id)));
            }
        }

        let mut table = ArtifactTable::new();
        let mut steps = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            let mut prerequisites: Vec<ArtifactId> =
                action.prerequisite_items.iter().map(|p| table.intern(p)).collect();
            for referenced in &action.prerequisite_action_ids {
                let Some(&index) = index_of.get(referenced) else {
                    return Err(GraphError::Document(format!(
                        "action {} references unknown action {referenced}",
                        action.id
                    )));
                };
                for path in &self.actions[index].produced_items {
                    let artifact = table.intern(path);
                    if !prerequisites.contains(&artifact) {
                        prerequisites.push(artifact);
                    }
                }
            }
            steps.push(BuildStep {
                kind: action.kind,
                artifact_mode: action.artifact_mode,
                prerequisites,
                produced: action.produced_items.iter().map(|p| table.intern(p)).collect(),
                deletes: action.delete_items.iter().map(|p| table.intern(p)).collect(),
                dependency_list: action.dependency_list_file.as_ref().map(|p| table.intern(p)),
                working_dir: action.working_directory.clone(),
                command: CommandLine {
                    path: action.command_path.clone(),
                    arguments: action.command_arguments.clone(),
                    version: action.command_version.clone(),
                },
                status_description: action.status_description.clone(),
                command_description: action.command_description.clone(),
                can_execute_remotely: action.can_execute_remotely,
                can_execute_distributed: action.can_execute_distributed,
                high_priority: action.high_priority,
                weight: action.weight,
                use_action_history: action.use_action_history,
                produces_import_library: action.produces_import_library,
            });
        }
        Ok((table, steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StepId;
    use crate::link::link;

    const SAMPLE: &str = r#"{
        "Environment": { "PATH": "/usr/bin" },
        "Actions": [
            {
                "id": 10,
                "kind": "Compile",
                "workingDirectory": "/engine",
                "commandPath": "cl.exe",
                "commandArguments": "/c a.cpp",
                "prerequisiteItems": ["a.cpp"],
                "producedItems": ["a.obj"],
                "dependencyListFile": "a.d"
            },
            {
                "id": 20,
                "kind": "Link",
                "commandPath": "link.exe",
                "commandArguments": "a.obj",
                "prerequisiteActionIds": [10],
                "producedItems": ["app.exe"],
                "useActionHistory": true
            }
        ]
    }"#;

    #[test]
    fn import_resolves_action_references() {
        let doc = GraphDocument::from_json(SAMPLE).unwrap();
        assert_eq!(doc.environment["PATH"], "/usr/bin");
        let (table, steps) = doc.into_steps().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].weight, 1.0);
        assert!(steps[1].use_action_history);
        let obj = table.lookup(Path::new("a.obj")).unwrap();
        assert_eq!(steps[1].prerequisites, vec![obj]);
        assert_eq!(
            steps[0].dependency_list.map(|d| table.path(d).to_path_buf()),
            Some(PathBuf::from("a.d"))
        );

        let mut graph = ActionGraph::new(table, steps);
        link(&mut graph).unwrap();
        assert_eq!(graph.prerequisites(StepId::from_raw(1)), &[StepId::from_raw(0)]);
    }

    #[test]
    fn export_fills_action_ids_from_edges() {
        let (table, steps) = GraphDocument::from_json(SAMPLE).unwrap().into_steps().unwrap();
        let mut graph = ActionGraph::new(table, steps);
        link(&mut graph).unwrap();

        let exported = GraphDocument::from_graph(&graph, BTreeMap::new());
        assert_eq!(exported.actions[1].prerequisite_action_ids, vec![0]);
        assert_eq!(exported.actions[1].prerequisite_items, vec![PathBuf::from("a.obj")]);

        let json = exported.to_json().unwrap();
        assert!(json.contains("\"Actions\""));
        assert!(json.contains("\"commandArguments\": \"/c a.cpp\""));
        assert!(!json.contains("\"dependencyListFile\": null"));
    }

    #[test]
    fn unknown_action_reference_is_rejected() {
        let text = r#"{"Actions": [{"id": 1, "kind": "Link", "commandPath": "ld",
            "prerequisiteActionIds": [7]}]}"#;
        let err = GraphDocument::from_json(text).unwrap().into_steps().unwrap_err();
        assert!(matches!(err, GraphError::Document(msg) if msg.contains("unknown action 7")));
    }

    #[test]
    fn duplicate_action_id_is_rejected() {
        let text = r#"{"Actions": [
            {"id": 1, "kind": "Compile", "commandPath": "cc"},
            {"id": 1, "kind": "Compile", "commandPath": "cc"}
        ]}"#;
        let err = GraphDocument::from_json(text).unwrap().into_steps().unwrap_err();
        assert!(matches!(err, GraphError::Document(_)));
    }

    #[test]
    fn malformed_json_is_a_document_error() {
        assert!(matches!(
            GraphDocument::from_json("{\"Actions\": 3}"),
            Err(GraphError::Document(_))
        ));
    }
}
