//! Diagnostic logging setup.
//!
//! User-facing progress goes to stdout through `println!`; tracing output is
//! for diagnostics only and always goes to stderr.

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding tracing filter directives.
pub const TOOLUP_LOG_ENV: &str = "TOOLUP_LOG";

/// Maps `-v` occurrences and `--quiet` to a level.
#[must_use]
pub fn level_filter(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Builds the filter. Explicit verbosity flags take precedence over
/// `TOOLUP_LOG`; without flags the variable's directives are appended to the
/// default level.
///
/// # Errors
///
/// Returns an error if `TOOLUP_LOG` contains invalid directives.
pub fn env_filter(verbose: u8, quiet: bool, env_directives: Option<&str>) -> Result<EnvFilter> {
    let level = level_filter(verbose, quiet);
    let builder = EnvFilter::builder().with_default_directive(level.into());

    let flags_set = verbose > 0 || quiet;
    match env_directives.filter(|d| !d.is_empty() && !flags_set) {
        Some(directives) => builder
            .parse(directives)
            .with_context(|| format!("Invalid {TOOLUP_LOG_ENV} directives: {directives}")),
        None => Ok(builder.parse_lossy("")),
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if `TOOLUP_LOG` is invalid.
pub fn init(verbose: u8, quiet: bool) -> Result<()> {
    let directives = std::env::var(TOOLUP_LOG_ENV).ok();
    let filter = env_filter(verbose, quiet, directives.as_deref())?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .without_time();

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
    Ok(())
}
