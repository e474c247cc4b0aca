//! From raw steps to an ordered plan.
//!
//! 1. Merge duplicate producers and reject output conflicts
//! 2. Link the graph and reject cycles
//! 3. Gather outdated steps
//! 4. Sort them for throughput
//!
//! Structural failures in steps 1 and 2 write their diagnostics to the
//! configured directory before aborting.

use joist_graph::{
    check_for_conflicts, link, sort, ActionGraph, ArtifactTable, BuildStep, GraphDocument,
    GraphError, StepId,
};
use joist_stale::{Outdated, StaleAnalyzer};
use tracing::{error, info, warn};

use crate::context::BuildContext;
use crate::error::EngineError;

/// A linked graph together with the steps that must run, in order.
#[derive(Debug)]
pub struct Plan {
    /// The linked graph.
    pub graph: ActionGraph,
    /// Every outdated step with its reason, in ID order.
    pub outdated: Vec<Outdated>,
    /// The outdated steps in execution order.
    pub order: Vec<StepId>,
}

impl Plan {
    /// Returns `true` if nothing needs to run.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Merges duplicates, then links `steps` into a graph.
pub fn link_steps(
    ctx: &BuildContext,
    artifacts: ArtifactTable,
    mut steps: Vec<BuildStep>,
) -> Result<ActionGraph, EngineError> {
    let merged = check_for_conflicts(&mut steps, &artifacts).map_err(|e| invalid(ctx, e))?;
    if merged > 0 {
        info!(merged, "merged duplicate steps");
    }
    let mut graph = ActionGraph::new(artifacts, steps);
    link(&mut graph).map_err(|e| invalid(ctx, e))?;
    info!(steps = graph.len(), artifacts = graph.artifacts().len(), "linked action graph");
    Ok(graph)
}

/// Links `steps` and plans every step.
pub fn plan(
    ctx: &BuildContext,
    artifacts: ArtifactTable,
    steps: Vec<BuildStep>,
) -> Result<Plan, EngineError> {
    let graph = link_steps(ctx, artifacts, steps)?;
    Ok(plan_graph(ctx, graph, None))
}

/// Imports a JSON step list and plans it.
pub fn plan_document(ctx: &BuildContext, document: GraphDocument) -> Result<Plan, EngineError> {
    let (artifacts, steps) = document.into_steps()?;
    plan(ctx, artifacts, steps)
}

/// Plans an already linked graph.
///
/// With `subset`, only those steps and their transitive prerequisites are
/// considered.
pub fn plan_graph(ctx: &BuildContext, mut graph: ActionGraph, subset: Option<&[StepId]>) -> Plan {
    let targets: Vec<StepId> = match subset {
        Some(ids) => ids.to_vec(),
        None => graph.step_ids().collect(),
    };
    let outdated = ctx.install(|| {
        StaleAnalyzer::new(&graph, ctx.history(), ctx.dependencies(), ctx.outdated_options())
            .gather_outdated(&targets)
    });
    let mut order: Vec<StepId> = outdated.iter().map(|o| o.step).collect();
    sort(&mut graph, &mut order);
    info!(
        considered = targets.len(),
        outdated = order.len(),
        "planned action graph"
    );
    Plan {
        graph,
        outdated,
        order,
    }
}

/// Logs a structural error and dumps its diagnostics.
fn invalid(ctx: &BuildContext, err: GraphError) -> EngineError {
    error!("{}", err.report());
    let dir = ctx.diagnostics_dir();
    match err.write_diagnostics(&dir) {
        Ok(files) if !files.is_empty() => {
            info!(dir = %dir.display(), files = files.len(), "wrote graph diagnostics");
        }
        Ok(_) => {}
        Err(e) => warn!("could not write graph diagnostics: {e}"),
    }
    EngineError::Graph(err)
}
