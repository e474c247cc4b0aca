//! Structural errors that make an action graph unusable.

use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use crate::ids::StepId;

/// A graph-relevant field that differs between two producers of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictField {
    /// The step kind.
    Kind,
    /// The prerequisite artifact set.
    Prerequisites,
    /// The delete artifact set.
    Deletes,
    /// The dependency-list file.
    DependencyListFile,
    /// The working directory.
    WorkingDirectory,
    /// The command executable.
    CommandPath,
    /// The command arguments.
    CommandArguments,
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictField::Kind => "kind",
            ConflictField::Prerequisites => "prerequisite items",
            ConflictField::Deletes => "delete items",
            ConflictField::DependencyListFile => "dependency list file",
            ConflictField::WorkingDirectory => "working directory",
            ConflictField::CommandPath => "command path",
            ConflictField::CommandArguments => "command arguments",
        };
        f.write_str(name)
    }
}

/// Two steps that claim the same output but disagree on how to make it.
#[derive(Debug, Clone)]
pub struct OutputConflict {
    /// The contested artifact.
    pub artifact: PathBuf,
    /// Every field that differs between the two producers.
    pub fields: Vec<ConflictField>,
    /// Dump of the first producer (see [`BuildStep::describe`](crate::step::BuildStep::describe)).
    pub first: String,
    /// Dump of the second producer.
    pub second: String,
}

/// One step that could not be proven acyclic.
#[derive(Debug, Clone)]
pub struct CycleEntry {
    /// The step.
    pub step: StepId,
    /// Its full command line.
    pub command: String,
    /// Prerequisite steps that are themselves cyclic, with their command lines.
    pub cyclic_prerequisites: Vec<(StepId, String)>,
}

/// Errors that invalidate the whole action graph.
///
/// Fatal to the current invocation: nothing is executed once one of these
/// is returned.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Some steps depend on themselves through their prerequisites.
    #[error("action graph contains a dependency cycle involving {} step(s)", .0.len())]
    Cycle(Vec<CycleEntry>),

    /// Independent step sets disagree about how to produce an artifact.
    #[error("{} artifact(s) have conflicting producers: {}", .0.len(), conflict_summary(.0))]
    OutputConflicts(Vec<OutputConflict>),

    /// A serialized step list could not be read.
    #[error("invalid action graph document: {0}")]
    Document(String),

    /// A diagnostic dump could not be written.
    #[error("failed to write graph diagnostics to {path}: {source}")]
    Io {
        /// The file or directory being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

fn conflict_summary(conflicts: &[OutputConflict]) -> String {
    conflicts
        .iter()
        .map(|c| {
            let fields: Vec<String> = c.fields.iter().map(|f| f.to_string()).collect();
            format!("{} ({})", c.artifact.display(), fields.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl GraphError {
    /// Full multi-line report including command lines.
    pub fn report(&self) -> String {
        let mut out = String::new();
        match self {
            GraphError::Cycle(entries) => {
                let _ = writeln!(out, "Action graph contains a dependency cycle!");
                for entry in entries {
                    let _ = writeln!(out, "Action: {}", entry.command);
                    let _ = writeln!(out, "\twith cyclic prerequisites:");
                    for (_, command) in &entry.cyclic_prerequisites {
                        let _ = writeln!(out, "\t\t{command}");
                    }
                }
            }
            GraphError::OutputConflicts(conflicts) => {
                for conflict in conflicts {
                    let fields: Vec<String> = conflict.fields.iter().map(|f| f.to_string()).collect();
                    let _ = writeln!(
                        out,
                        "Unable to merge actions producing {}: {} differ",
                        conflict.artifact.display(),
                        fields.join(", ")
                    );
                    let _ = writeln!(out, "--- first producer\n{}", conflict.first);
                    let _ = writeln!(out, "--- second producer\n{}", conflict.second);
                }
            }
            other => {
                let _ = writeln!(out, "{other}");
            }
        }
        out
    }

    /// Writes the report to `dir`, returning the files written.
    ///
    /// Cycles produce `cycle.txt`. Each conflict produces a
    /// `<n>-<artifact>.first.txt` / `<n>-<artifact>.second.txt` pair that can
    /// be handed straight to a diff tool, where `<n>` is the conflict's index
    /// and `<artifact>` its full path with separators flattened to `_`.
    pub fn write_diagnostics(&self, dir: &Path) -> Result<Vec<PathBuf>, GraphError> {
        std::fs::create_dir_all(dir).map_err(|e| GraphError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let mut written = Vec::new();
        match self {
            GraphError::Cycle(_) => {
                let path = dir.join("cycle.txt");
                write_file(&path, &self.report())?;
                written.push(path);
            }
            GraphError::OutputConflicts(conflicts) => {
                for (index, conflict) in conflicts.iter().enumerate() {
                    let stem = format!("{index}-{}", sanitize(&conflict.artifact));
                    let first = dir.join(format!("{stem}.first.txt"));
                    let second = dir.join(format!("{stem}.second.txt"));
                    write_file(&first, &conflict.first)?;
                    write_file(&second, &conflict.second)?;
                    written.push(first);
                    written.push(second);
                }
            }
            _ => {}
        }
        Ok(written)
    }
}

fn sanitize(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('_')
        .to_string()
}

fn write_file(path: &Path, contents: &str) -> Result<(), GraphError> {
    std::fs::write(path, contents).map_err(|e| GraphError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
