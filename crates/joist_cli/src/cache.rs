//! `joist cache`: is a persisted graph cache still usable?
//!
//! The identity and recorded configuration values are taken from the file
//! itself; the build arguments come from `--arg`. Prints `valid` or the
//! first invalidation reason, and exits non-zero in the latter case.

use joist_cache::{CacheInvalid, GraphCache, LoadContext};
use joist_engine::BuildContext;

use crate::project::{project_root, scratch_context};
use crate::{CacheArgs, GlobalArgs};

/// Runs the `joist cache` command.
pub fn run(args: &CacheArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let root = match &args.project {
        Some(dir) => dir.clone(),
        None => project_root(global)?,
    };
    let ctx = scratch_context(global, &root)?;

    match verdict(&ctx, args) {
        Ok(cache) => {
            if !global.quiet {
                eprintln!(
                    "   Cache for {} holds {} steps",
                    cache.identity,
                    cache.steps.len()
                );
            }
            println!("valid");
            Ok(0)
        }
        Err(reason) => {
            println!("invalid: {reason}");
            Ok(1)
        }
    }
}

fn verdict(ctx: &BuildContext, args: &CacheArgs) -> Result<GraphCache, CacheInvalid> {
    let recorded = GraphCache::inspect(&args.file)?;
    let load = LoadContext {
        identity: recorded.identity.clone(),
        tool_binary: std::env::current_exe().ok(),
        build_arguments: args.args.clone(),
        config_values: recorded.config_values.clone(),
        platform_metadata: recorded.platform_metadata.clone(),
        extension_modules: recorded.extension_modules.clone(),
    };
    let cache = GraphCache::load(&args.file, &load)?;
    let validity = ctx.validity_context(&recorded.working_set);
    ctx.install(|| cache.validate(&validity))?;
    Ok(cache)
}
