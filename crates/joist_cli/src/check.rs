//! `joist check`: link a step list without planning it.
//!
//! Cycles and output conflicts are written to the diagnostics directory
//! for side-by-side diffing.

use joist_engine::link_steps;
use joist_graph::GraphDocument;

use crate::project::{project_root, scratch_context};
use crate::{CheckArgs, GlobalArgs};

/// Runs the `joist check` command.
pub fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let root = project_root(global)?;
    let ctx = scratch_context(global, &root)?;
    let (artifacts, steps) = GraphDocument::read(&args.actions)?.into_steps()?;
    let submitted = steps.len();
    let graph = link_steps(&ctx, artifacts, steps)?;

    if !global.quiet {
        eprintln!(
            "   Checked {} steps ({} after merging duplicates), {} artifacts",
            submitted,
            graph.len(),
            graph.artifacts().len()
        );
    }
    println!("ok");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_actions(dir: &Path, second_args: &str) -> std::path::PathBuf {
        let text = format!(
            r#"{{"Actions": [
                {{"id": 1, "kind": "Compile", "commandPath": "cc", "commandArguments": "-O2 a.c", "producedItems": ["a.o"]}},
                {{"id": 2, "kind": "Compile", "commandPath": "cc", "commandArguments": "{second_args}", "producedItems": ["a.o"]}}
            ]}}"#
        );
        let path = dir.join("actions.json");
        std::fs::write(&path, text).unwrap();
        path
    }

    fn global_for(dir: &Path) -> GlobalArgs {
        let config = dir.join("joist.toml");
        std::fs::write(&config, "").unwrap();
        GlobalArgs {
            quiet: true,
            verbose: false,
            log_level: None,
            config: config.to_str().map(str::to_string),
        }
    }

    #[test]
    fn duplicates_merge_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let args = CheckArgs {
            actions: write_actions(dir.path(), "-O2 a.c"),
        };
        assert_eq!(run(&args, &global_for(dir.path())).unwrap(), 0);
    }

    #[test]
    fn conflicts_fail_and_leave_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let args = CheckArgs {
            actions: write_actions(dir.path(), "-O0 a.c"),
        };
        let err = run(&args, &global_for(dir.path())).unwrap_err();
        assert!(err.to_string().contains("a.o"), "{err}");
        let dumps: Vec<String> = std::fs::read_dir(dir.path().join("Intermediate/Diagnostics"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(dumps.iter().any(|n| n.ends_with("a.o.first.txt")), "{dumps:?}");
        assert!(dumps.iter().any(|n| n.ends_with("a.o.second.txt")), "{dumps:?}");
    }
}
