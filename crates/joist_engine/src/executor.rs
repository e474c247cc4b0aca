//! Handing a plan to a process-execution backend.
//!
//! Backends implement [`Executor`]. The engine does the bookkeeping around
//! them: stale outputs are deleted and output directories created before the
//! run, cached file stamps are reset after it, and outputs of kinds that
//! must leave files behind are verified.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use joist_graph::{ActionGraph, StepId};
use tracing::{debug, info};

use crate::context::BuildContext;
use crate::error::EngineError;
use crate::pipeline::Plan;

/// A backend that runs build steps.
pub trait Executor: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Runs `steps` in an order compatible with their prerequisites, using
    /// at most `parallelism` concurrent processes.
    ///
    /// Returns `true` if every step succeeded.
    fn execute(&self, graph: &ActionGraph, steps: &[StepId], parallelism: usize) -> bool;
}

/// Deletes the produced and delete-listed files of `steps` and creates the
/// directories their outputs go into.
pub fn prepare_outputs(graph: &ActionGraph, steps: &[StepId]) -> Result<(), EngineError> {
    let artifacts = graph.artifacts();
    let mut directories: BTreeSet<PathBuf> = BTreeSet::new();
    let mut deleted = 0usize;
    for &id in steps {
        let step = graph.step(id);
        for &artifact in step.produced.iter().chain(&step.deletes) {
            if remove_if_present(artifacts.path(artifact))? {
                deleted += 1;
            }
        }
        for path in step.produced_paths(artifacts) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                directories.insert(parent.to_path_buf());
            }
        }
    }
    for dir in &directories {
        std::fs::create_dir_all(dir).map_err(|e| EngineError::Io {
            path: dir.clone(),
            source: e,
        })?;
    }
    artifacts.reset_stamps(
        steps
            .iter()
            .flat_map(|&id| graph.step(id).produced.iter().chain(&graph.step(id).deletes))
            .copied(),
    );
    debug!(deleted, directories = directories.len(), "prepared outputs");
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<bool, EngineError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(EngineError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Checks that every step whose kind verifies outputs left them behind.
pub fn verify_outputs(graph: &ActionGraph, steps: &[StepId]) -> Result<(), EngineError> {
    let artifacts = graph.artifacts();
    for &id in steps {
        let step = graph.step(id);
        if !step.kind.policy().verify_outputs {
            continue;
        }
        if let Some(&missing) = step
            .produced
            .iter()
            .find(|&&a| !artifacts.stamp(a).exists)
        {
            return Err(EngineError::MissingOutput {
                artifact: artifacts.path(missing).to_path_buf(),
                step: step.label(),
            });
        }
    }
    Ok(())
}

/// Runs `plan` on `executor`.
///
/// The action history is saved whether or not execution succeeds; the
/// outputs of failed steps were deleted beforehand, so they stay outdated.
pub fn execute(
    ctx: &BuildContext,
    plan: &Plan,
    executor: &dyn Executor,
) -> Result<(), EngineError> {
    if plan.is_empty() {
        info!("action graph is up to date");
        return Ok(());
    }
    let graph = &plan.graph;
    prepare_outputs(graph, &plan.order)?;

    info!(
        executor = executor.name(),
        steps = plan.order.len(),
        parallelism = ctx.parallelism(),
        "executing"
    );
    let succeeded = executor.execute(graph, &plan.order, ctx.parallelism());

    graph.artifacts().reset_stamps(
        plan.order
            .iter()
            .flat_map(|&id| graph.step(id).produced.iter())
            .copied(),
    );
    ctx.dependencies().clear();
    ctx.history().save()?;

    if !succeeded {
        return Err(EngineError::ExecutionFailed {
            executor: executor.name().to_string(),
            steps: plan.order.len(),
        });
    }
    if ctx.config().engine.verify_link_outputs {
        verify_outputs(graph, &plan.order)?;
    }
    info!(steps = plan.order.len(), "execution finished");
    Ok(())
}
