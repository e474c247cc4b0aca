//! Tracing setup for the `joist` binary.
//!
//! `RUST_LOG` wins when set. Otherwise the joist crates log at the level
//! chosen by `--log-level`, `--verbose` or `--quiet`, defaulting to `info`.
//! Everything goes to stderr so stdout stays machine-readable.

use std::env;
use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{GlobalArgs, LogLevel};

static INIT: Once = Once::new();

/// Installs the global subscriber. Later calls do nothing.
pub fn init_logging(global: &GlobalArgs) {
    INIT.call_once(|| {
        let level = level_for(global);
        let mut filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            if let Ok(directive) = format!("joist={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    });
}

/// The level selected by the global flags.
pub fn level_for(global: &GlobalArgs) -> Level {
    match global.log_level {
        Some(LogLevel::Trace) => Level::TRACE,
        Some(LogLevel::Debug) => Level::DEBUG,
        Some(LogLevel::Info) => Level::INFO,
        Some(LogLevel::Warn) => Level::WARN,
        Some(LogLevel::Error) => Level::ERROR,
        None if global.verbose => Level::DEBUG,
        None if global.quiet => Level::ERROR,
        None => Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(verbose: bool, quiet: bool, log_level: Option<LogLevel>) -> GlobalArgs {
        GlobalArgs {
            quiet,
            verbose,
            log_level,
            config: None,
        }
    }

    #[test]
    fn flags_select_level() {
        assert_eq!(level_for(&global(false, false, None)), Level::INFO);
        assert_eq!(level_for(&global(true, false, None)), Level::DEBUG);
        assert_eq!(level_for(&global(false, true, None)), Level::ERROR);
    }

    #[test]
    fn explicit_level_wins() {
        assert_eq!(
            level_for(&global(true, false, Some(LogLevel::Warn))),
            Level::WARN
        );
        assert_eq!(
            level_for(&global(false, true, Some(LogLevel::Trace))),
            Level::TRACE
        );
    }

    #[test]
    fn init_is_idempotent() {
        let g = global(false, true, None);
        init_logging(&g);
        init_logging(&g);
    }
}
