//! joist CLI: inspect and plan action graphs.
//!
//! Provides `joist plan` to compute the ordered set of outdated steps,
//! `joist check` to validate a step list, and `joist cache` to test whether
//! a persisted graph cache is still usable.

#![warn(missing_docs)]

mod cache;
mod check;
mod logging;
mod plan;
mod project;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// joist: an incremental build-graph engine.
#[derive(Parser, Debug)]
#[command(name = "joist", version, about = "joist action graph engine")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Explicit log level; overrides `--verbose` and `--quiet`.
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Path to a custom `joist.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the outdated steps of a step list in execution order.
    Plan(PlanArgs),
    /// Link a step list and report cycles or output conflicts.
    Check(CheckArgs),
    /// Check whether a graph cache file is still valid.
    Cache(CacheArgs),
}

/// Arguments for `joist plan`.
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Step list in the companion JSON form.
    pub actions: PathBuf,

    /// Action history file (default: the configured path).
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Do not relink consumers when only an import library changed.
    #[arg(long)]
    pub ignore_import_libraries: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for `joist check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Step list in the companion JSON form.
    pub actions: PathBuf,
}

/// Arguments for `joist cache`.
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// The graph cache file.
    pub file: PathBuf,

    /// Project directory used to resolve `joist.toml` and relative paths.
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Build argument the cache must have been generated with (repeatable).
    #[arg(long = "arg", allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Everything.
    Trace,
    /// Stale reasons and cache invalidation reasons.
    Debug,
    /// Pipeline milestones.
    Info,
    /// Degraded faults only.
    Warn,
    /// Errors only.
    Error,
}

/// Plan output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Explicit log level.
    pub log_level: Option<LogLevel>,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        log_level: cli.log_level,
        config: cli.config,
    };
    logging::init_logging(&global);

    let result = match cli.command {
        Command::Plan(ref args) => plan::run(args, &global),
        Command::Check(ref args) => check::run(args, &global),
        Command::Cache(ref args) => cache::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
