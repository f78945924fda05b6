//! Diagnostic logging setup.
//!
//! Logs go to stderr so that scan output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over the command-line verbosity flags.

use anyhow::{bail, Context, Result};
use std::io;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Pick the base level from `-v`/`-q` flags and the configured default.
pub fn level_for(verbosity: u8, quiet: bool, default_level: &str) -> Result<Level> {
    if quiet {
        return Ok(Level::ERROR);
    }
    match verbosity {
        0 => parse_level(default_level),
        1 => Ok(Level::DEBUG),
        _ => Ok(Level::TRACE),
    }
}

fn parse_level(level: &str) -> Result<Level> {
    let level = match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        other => bail!("invalid log level: {}", other),
    };
    Ok(level)
}

/// Install the global subscriber.
pub fn init(verbosity: u8, quiet: bool, default_level: &str) -> Result<()> {
    let level = level_for(verbosity, quiet, default_level)?;
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env()
        .context("invalid RUST_LOG filter")?;

    let layer = fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_target(verbosity > 1);

    Registry::default()
        .with(filter)
        .with(layer)
        .try_init()
        .context("logging already initialized")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_flags() {
        assert_eq!(level_for(0, false, "warn").unwrap(), Level::WARN);
        assert_eq!(level_for(1, false, "warn").unwrap(), Level::DEBUG);
        assert_eq!(level_for(3, false, "warn").unwrap(), Level::TRACE);
        assert_eq!(level_for(2, true, "warn").unwrap(), Level::ERROR);
        assert_eq!(level_for(0, false, "Info").unwrap(), Level::INFO);
    }

    #[test]
    fn test_invalid_default_level() {
        assert!(level_for(0, false, "loud").is_err());
        // Flags win over a bad configured default.
        assert!(level_for(1, false, "loud").is_ok());
    }
}
