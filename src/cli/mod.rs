//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `portsift scan <targets>...` - Scan hosts for open ports
//! - `portsift profiles [show <name>]` - Inspect timing profiles

mod profiles;
mod scan;

pub use profiles::ProfilesCommand;
pub use scan::ScanCommand;

use crate::config::AppSettings;
use crate::scanner::ScanStatus;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// portsift - a concurrent TCP/UDP port scanner.
///
/// Scans hosts, hostnames and CIDR ranges with tunable timing profiles and
/// optional service fingerprinting, and reports results as text, JSON or CSV.
#[derive(Parser, Debug)]
#[command(name = "portsift")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A concurrent TCP/UDP port scanner", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan targets for open ports
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// List or inspect timing profiles
    #[command(alias = "p")]
    Profiles(ProfilesCommand),
}

impl Cli {
    /// Settings from `--config`, or the default location.
    pub fn load_settings(&self) -> Result<AppSettings> {
        match &self.config {
            Some(path) => AppSettings::load_from(path)
                .with_context(|| format!("failed to load settings from {}", path.display())),
            None => AppSettings::load().context("failed to load settings"),
        }
    }

    /// Run the selected subcommand.
    pub async fn run(self, settings: &AppSettings) -> Result<ScanStatus> {
        match &self.command {
            Commands::Scan(cmd) => cmd.execute(settings, self.quiet).await,
            Commands::Profiles(cmd) => {
                cmd.execute(settings)?;
                Ok(ScanStatus::Completed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use crate::types::ProtocolSelection;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_flags() {
        let cli = Cli::try_parse_from([
            "portsift", "-vv", "scan", "10.0.0.1", "gw.lan", "-p", "22,80", "--protocol", "both",
            "-T", "polite", "-c", "8", "-t", "250", "--jitter", "true", "-F", "-o", "json",
            "--deadline", "30",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Scan(scan) = cli.command else {
            panic!("expected scan subcommand");
        };
        assert_eq!(scan.targets, vec!["10.0.0.1", "gw.lan"]);
        assert_eq!(scan.ports, "22,80");
        assert_eq!(scan.protocol, ProtocolSelection::Both);
        assert_eq!(scan.timing.as_deref(), Some("polite"));
        assert_eq!(scan.concurrency, Some(8));
        assert_eq!(scan.timeout, Some(250));
        assert_eq!(scan.jitter, Some(true));
        assert!(scan.fingerprint);
        assert_eq!(scan.output, Some(OutputFormat::Json));
        assert_eq!(scan.deadline, Some(30));
    }

    #[test]
    fn test_scan_requires_target() {
        assert!(Cli::try_parse_from(["portsift", "scan"]).is_err());
        assert!(Cli::try_parse_from(["portsift", "-q", "-v", "profiles"]).is_err());
    }
}
