//! Reusing and persisting graph caches.

use std::path::PathBuf;

use joist_cache::{CacheInvalid, GraphCache, GraphIdentity, LoadContext, WorkingSet};
use joist_graph::ActionGraph;
use tracing::{debug, info};

use crate::context::BuildContext;
use crate::error::EngineError;

/// Path of the cache for `identity` under the configured cache directory.
pub fn graph_cache_path(ctx: &BuildContext, identity: &GraphIdentity) -> PathBuf {
    identity.cache_path(&ctx.cache_dir())
}

/// Loads and fully validates the cache for `load.identity`.
pub fn check_graph_cache(
    ctx: &BuildContext,
    load: &LoadContext,
    working_set: &dyn WorkingSet,
) -> Result<GraphCache, CacheInvalid> {
    let path = graph_cache_path(ctx, &load.identity);
    let cache = GraphCache::load(&path, load)?;
    let validity = ctx.validity_context(working_set);
    ctx.install(|| cache.validate(&validity))?;
    Ok(cache)
}

/// Returns the cached graph if every check passes.
///
/// An unusable cache is not an error: the reason is logged and the caller
/// regenerates the graph.
pub fn load_cached_graph(
    ctx: &BuildContext,
    load: &LoadContext,
    working_set: &dyn WorkingSet,
) -> Option<(GraphCache, ActionGraph)> {
    let cache = match check_graph_cache(ctx, load, working_set) {
        Ok(cache) => cache,
        Err(reason) => {
            debug!(identity = %load.identity, "graph cache unusable: {reason}");
            return None;
        }
    };
    match cache.to_graph() {
        Ok(graph) => {
            info!(identity = %load.identity, steps = graph.len(), "reusing cached action graph");
            Some((cache, graph))
        }
        Err(e) => {
            debug!(identity = %load.identity, "cached graph does not link: {e}");
            None
        }
    }
}

/// Writes `cache` to its configured location.
pub fn save_graph_cache(ctx: &BuildContext, cache: &GraphCache) -> Result<PathBuf, EngineError> {
    let path = graph_cache_path(ctx, &cache.identity);
    cache.save(&path)?;
    Ok(path)
}
