//! Build steps, step kinds, and the per-kind policy table.

use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use joist_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactTable;
use crate::ids::ArtifactId;

/// The closed set of step kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StepKind {
    /// Compile one translation unit to an object file.
    Compile,
    /// Link objects and libraries into an executable or library.
    Link,
    /// Assemble an application bundle.
    CreateAppBundle,
    /// Extract debug information from a linked binary.
    GenerateDebugInfo,
    /// Write build metadata (receipts, manifests).
    WriteMetadata,
    /// Run a code generator.
    Generate,
    /// Run a post-build command.
    PostBuild,
}

/// Behavior switches that differ by [`StepKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPolicy {
    /// The kind this entry describes.
    pub kind: StepKind,
    /// Two steps of this kind may claim the same output without failing the
    /// conflict check.
    pub conflict_exempt: bool,
    /// A zero-length object file produced by this kind means a crashed tool.
    pub zero_length_outputs_are_stale: bool,
    /// The scheduler pulls this kind forward to sit right after its
    /// prerequisites.
    pub cluster_early: bool,
    /// Declared outputs must exist after a successful execution.
    pub verify_outputs: bool,
}

const POLICIES: [KindPolicy; 7] = [
    KindPolicy {
        kind: StepKind::Compile,
        conflict_exempt: false,
        zero_length_outputs_are_stale: true,
        cluster_early: false,
        verify_outputs: false,
    },
    KindPolicy {
        kind: StepKind::Link,
        conflict_exempt: false,
        zero_length_outputs_are_stale: false,
        cluster_early: true,
        verify_outputs: true,
    },
    KindPolicy {
        kind: StepKind::CreateAppBundle,
        conflict_exempt: true,
        zero_length_outputs_are_stale: false,
        cluster_early: false,
        verify_outputs: false,
    },
    KindPolicy {
        kind: StepKind::GenerateDebugInfo,
        conflict_exempt: false,
        zero_length_outputs_are_stale: false,
        cluster_early: false,
        verify_outputs: false,
    },
    KindPolicy {
        kind: StepKind::WriteMetadata,
        conflict_exempt: true,
        zero_length_outputs_are_stale: false,
        cluster_early: false,
        verify_outputs: false,
    },
    KindPolicy {
        kind: StepKind::Generate,
        conflict_exempt: false,
        zero_length_outputs_are_stale: false,
        cluster_early: false,
        verify_outputs: false,
    },
    KindPolicy {
        kind: StepKind::PostBuild,
        conflict_exempt: false,
        zero_length_outputs_are_stale: false,
        cluster_early: false,
        verify_outputs: false,
    },
];

impl StepKind {
    /// All kinds, in declaration order.
    pub const ALL: [StepKind; 7] = [
        StepKind::Compile,
        StepKind::Link,
        StepKind::CreateAppBundle,
        StepKind::GenerateDebugInfo,
        StepKind::WriteMetadata,
        StepKind::Generate,
        StepKind::PostBuild,
    ];

    /// Returns the policy entry for this kind.
    pub fn policy(self) -> &'static KindPolicy {
        &POLICIES[self as usize]
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a step participates in artifact-based (content-addressed) caching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactMode {
    /// Outputs are never shared through an artifact store.
    #[default]
    None,
    /// Outputs may be shared; inputs are keyed by relative path.
    Enabled,
    /// Outputs may be shared; inputs are keyed by absolute path.
    AbsolutePath,
    /// Like `Enabled`, and the step's inputs propagate to its dependents' keys.
    PropagateInputs,
}

/// The command a step runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandLine {
    /// Path of the executable.
    pub path: PathBuf,
    /// Argument string passed to the executable.
    pub arguments: String,
    /// Tool version string; part of the command fingerprint.
    pub version: String,
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arguments.is_empty() {
            write!(f, "{}", self.path.display())
        } else {
            write!(f, "{} {}", self.path.display(), self.arguments)
        }
    }
}

/// One command invocation and the files it reads, writes, and deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStep {
    /// What sort of work this step performs.
    pub kind: StepKind,
    /// Artifact-store participation.
    pub artifact_mode: ArtifactMode,
    /// Files read by the command.
    pub prerequisites: Vec<ArtifactId>,
    /// Files written by the command.
    pub produced: Vec<ArtifactId>,
    /// Files removed before the command runs.
    pub deletes: Vec<ArtifactId>,
    /// Tool-written list of headers the command actually included.
    pub dependency_list: Option<ArtifactId>,
    /// Directory the command runs in.
    pub working_dir: PathBuf,
    /// The command itself.
    pub command: CommandLine,
    /// Short progress text, e.g. the source file name.
    pub status_description: String,
    /// Tool name shown next to the status text.
    pub command_description: String,
    /// May be sent to a remote executor.
    pub can_execute_remotely: bool,
    /// May be sent to a distributed build farm.
    pub can_execute_distributed: bool,
    /// Prerequisites of this step should run as early as possible.
    pub high_priority: bool,
    /// Relative cost used by executors for load balancing.
    pub weight: f32,
    /// Compare the command fingerprint against the action history.
    pub use_action_history: bool,
    /// One of the produced files is an import library.
    pub produces_import_library: bool,
}

impl BuildStep {
    /// Creates a step with the given kind and command, and no file roles.
    pub fn new(kind: StepKind, command_path: impl Into<PathBuf>, arguments: impl Into<String>) -> Self {
        Self {
            kind,
            artifact_mode: ArtifactMode::None,
            prerequisites: Vec::new(),
            produced: Vec::new(),
            deletes: Vec::new(),
            dependency_list: None,
            working_dir: PathBuf::new(),
            command: CommandLine {
                path: command_path.into(),
                arguments: arguments.into(),
                version: String::new(),
            },
            status_description: String::new(),
            command_description: String::new(),
            can_execute_remotely: false,
            can_execute_distributed: false,
            high_priority: false,
            weight: 1.0,
            use_action_history: false,
            produces_import_library: false,
        }
    }

    /// Adds a prerequisite artifact.
    pub fn with_prerequisite(mut self, artifact: ArtifactId) -> Self {
        self.prerequisites.push(artifact);
        self
    }

    /// Adds a produced artifact.
    pub fn with_produced(mut self, artifact: ArtifactId) -> Self {
        self.produced.push(artifact);
        self
    }

    /// Adds an artifact deleted before the command runs.
    pub fn with_delete(mut self, artifact: ArtifactId) -> Self {
        self.deletes.push(artifact);
        self
    }

    /// Sets the dependency-list file.
    pub fn with_dependency_list(mut self, artifact: ArtifactId) -> Self {
        self.dependency_list = Some(artifact);
        self
    }

    /// Sets the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Sets the tool version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.command.version = version.into();
        self
    }

    /// Opts the step in to command-fingerprint checks.
    pub fn with_action_history(mut self) -> Self {
        self.use_action_history = true;
        self
    }

    /// Marks the step as producing an import library.
    pub fn with_import_library(mut self) -> Self {
        self.produces_import_library = true;
        self
    }

    /// Marks the step as high priority.
    pub fn with_high_priority(mut self) -> Self {
        self.high_priority = true;
        self
    }

    /// Allows the step to run remotely.
    pub fn with_remote_execution(mut self) -> Self {
        self.can_execute_remotely = true;
        self
    }

    /// Sets the status description.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status_description = status.into();
        self
    }

    /// Fingerprint of command path, arguments, and tool version.
    pub fn fingerprint(&self) -> ContentHash {
        let path = self.command.path.to_string_lossy();
        ContentHash::from_parts(&[&path, &self.command.arguments, &self.command.version])
    }

    /// A one-line label for logs: the status text if set, otherwise the command.
    pub fn label(&self) -> String {
        if self.status_description.is_empty() {
            self.command.to_string()
        } else {
            format!("{} {}", self.command_description, self.status_description)
                .trim()
                .to_string()
        }
    }

    /// Multi-line dump of every graph-relevant field, suitable for diffing
    /// two conflicting producers side by side.
    pub fn describe(&self, artifacts: &ArtifactTable) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Kind: {}", self.kind);
        let _ = writeln!(out, "WorkingDirectory: {}", self.working_dir.display());
        let _ = writeln!(out, "CommandPath: {}", self.command.path.display());
        let _ = writeln!(out, "CommandArguments: {}", self.command.arguments);
        let _ = writeln!(out, "CommandVersion: {}", self.command.version);
        write_paths(&mut out, "PrerequisiteItems", &self.prerequisites, artifacts);
        write_paths(&mut out, "ProducedItems", &self.produced, artifacts);
        write_paths(&mut out, "DeleteItems", &self.deletes, artifacts);
        let dep = self
            .dependency_list
            .map(|id| artifacts.path(id).display().to_string())
            .unwrap_or_default();
        let _ = writeln!(out, "DependencyListFile: {dep}");
        out
    }

    /// Paths of the produced artifacts, for logs.
    pub fn produced_paths<'a>(&'a self, artifacts: &'a ArtifactTable) -> impl Iterator<Item = &'a Path> {
        self.produced.iter().map(|&id| artifacts.path(id))
    }
}

fn write_paths(out: &mut String, heading: &str, ids: &[ArtifactId], artifacts: &ArtifactTable) {
    let mut paths: Vec<_> = ids.iter().map(|&id| artifacts.path(id)).collect();
    paths.sort();
    let _ = writeln!(out, "{heading}:");
    for path in paths {
        let _ = writeln!(out, "\t{}", path.display());
    }
}
