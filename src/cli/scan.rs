//! Scan subcommand implementation.
//!
//! Handles the `portsift scan <targets>...` command.

use crate::config::{AppSettings, TimingOverrides};
use crate::fingerprint::FingerprintConfig;
use crate::output::{self, OutputFormat, TextOptions};
use crate::scanner::{ScanReport, ScanRequest, ScanSession, ScanStatus};
use crate::types::{ProtocolSelection, TargetResolver};
use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Scan targets for open ports.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Targets to scan (IP, hostname, or CIDR notation)
    ///
    /// Examples:
    ///   192.168.1.1        Single IP address
    ///   example.com        Hostname
    ///   192.168.1.0/24     CIDR range
    ///   10.0.0.1,10.0.0.2  Comma-separated list
    #[arg(value_name = "TARGETS", required = true, num_args = 1..)]
    pub targets: Vec<String>,

    /// Ports to scan (e.g., "80", "80,443", "1-1000", "top-100", "all")
    #[arg(short, long, default_value = "1-1000")]
    pub ports: String,

    /// Transport protocols to probe
    #[arg(long, value_enum, default_value_t = ProtocolSelection::Tcp)]
    pub protocol: ProtocolSelection,

    /// Timing profile (paranoid, sneaky, polite, normal, aggressive, insane, T0-T5, or custom)
    #[arg(short = 'T', long = "timing", value_name = "PROFILE")]
    pub timing: Option<String>,

    /// Maximum number of concurrent probes
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Probe timeout in milliseconds
    #[arg(short = 't', long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Pause between a worker's probes in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay: Option<u64>,

    /// Randomize the inter-probe delay by +/-50%
    #[arg(long, value_name = "BOOL")]
    pub jitter: Option<bool>,

    /// Extra attempts for filtered TCP ports
    #[arg(long)]
    pub retries: Option<u32>,

    /// Global cap on probes per second
    #[arg(long, value_name = "PPS")]
    pub max_rate: Option<u32>,

    /// Identify services on open ports
    #[arg(short = 'F', long)]
    pub fingerprint: bool,

    /// Banner read timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub banner_timeout: Option<u64>,

    /// Output format for results
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Write results to a file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub output_file: Option<PathBuf>,

    /// Show closed ports in text output
    #[arg(long)]
    pub show_closed: bool,

    /// Stop dispatching new probes after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Largest number of hosts the targets may expand to
    #[arg(long)]
    pub max_hosts: Option<u64>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl ScanCommand {
    /// Build the scan request, applying settings where no flag was given.
    pub fn request(&self, settings: &AppSettings) -> Result<ScanRequest> {
        let overrides = TimingOverrides {
            concurrency: self.concurrency,
            timeout_ms: self.timeout,
            delay_ms: self.delay,
            jitter: self.jitter,
            retries: self.retries,
            max_rate: self.max_rate,
        };
        let profile = self
            .timing
            .clone()
            .unwrap_or_else(|| settings.timing_profile.clone());

        let mut request = ScanRequest::new(self.targets.clone(), self.ports.clone())
            .with_protocols(self.protocol)
            .with_timing(profile, overrides);

        if self.fingerprint {
            let banner_ms = self.banner_timeout.unwrap_or(settings.banner_timeout_ms);
            if banner_ms == 0 {
                bail!("banner timeout must be positive");
            }
            request = request.with_fingerprinting(FingerprintConfig {
                banner_timeout: Duration::from_millis(banner_ms),
                active_probes: true,
            });
        }

        match self.deadline.or(settings.deadline_secs) {
            Some(0) => bail!("deadline must be positive"),
            Some(secs) => request = request.with_deadline(Duration::from_secs(secs)),
            None => {}
        }
        Ok(request)
    }

    /// Execute the scan command.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> Result<ScanStatus> {
        let format = match self.output {
            Some(format) => format,
            None => settings
                .output_format
                .parse()
                .context("invalid output format in settings")?,
        };
        let request = self.request(settings)?;
        let catalog = settings.timing_catalog()?;
        let resolver = TargetResolver::system(self.max_hosts.unwrap_or(settings.max_hosts));

        let session = ScanSession::prepare(&request, &catalog, &resolver).await?;

        let interactive = !quiet && format == OutputFormat::Text && console::user_attended_stderr();
        if interactive {
            print_scan_header(&session, &request.timing_profile);
        }

        let cancel = session.cancellation_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping scan");
                cancel.cancel();
            }
        });
        let progress = if interactive {
            Some(spawn_progress(&session)?)
        } else {
            None
        };

        let report = session.run().await;

        interrupt.abort();
        if let Some((bar, ticker)) = progress {
            ticker.abort();
            bar.finish_and_clear();
        }

        self.write_output(&report, format, quiet)?;
        if !quiet {
            print_summary(&report, format);
        }
        Ok(report.status)
    }

    fn write_output(&self, report: &ScanReport, format: OutputFormat, quiet: bool) -> Result<()> {
        match &self.output_file {
            Some(path) => {
                let options = TextOptions {
                    show_closed: self.show_closed,
                    color: false,
                };
                let file = File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                output::write_report(&mut writer, report, format, &options)?;
                writer.flush()?;
                if !quiet {
                    output::print_info(&format!("Results written to {}", path.display()));
                }
            }
            None => {
                let options = TextOptions {
                    show_closed: self.show_closed,
                    color: !self.no_color && console::colors_enabled(),
                };
                let stdout = io::stdout();
                let mut out = stdout.lock();
                output::write_report(&mut out, report, format, &options)?;
                out.flush()?;
            }
        }
        Ok(())
    }
}

/// Progress bar on stderr fed by the session's running counters.
fn spawn_progress(session: &ScanSession) -> Result<(ProgressBar, JoinHandle<()>)> {
    let bar = ProgressBar::new(session.expected_results() as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )?
        .progress_chars("=>-"),
    );

    let progress = session.progress();
    let ticker_bar = bar.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            interval.tick().await;
            let snapshot = progress.progress();
            ticker_bar.set_position(snapshot.completed as u64);
            if snapshot.open > 0 {
                ticker_bar.set_message(format!("{} open", snapshot.open));
            }
        }
    });
    Ok((bar, ticker))
}

/// Print a scan header before scanning begins.
fn print_scan_header(session: &ScanSession, profile: &str) {
    eprintln!();
    eprintln!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("portsift").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!(
        "{} Targets: {}",
        style("•").dim(),
        style(session.targets().len()).white().bold()
    );
    eprintln!(
        "{} Timing: {} ({} workers, {} ms timeout)",
        style("•").dim(),
        style(profile).yellow(),
        session.limits().max_concurrent_probes,
        session.limits().probe_timeout.as_millis()
    );
    eprintln!(
        "{} Probing {} port/protocol pairs...",
        style("•").dim(),
        style(session.expected_results()).white().bold()
    );
    eprintln!();
}

fn print_summary(report: &ScanReport, format: OutputFormat) {
    let stats = &report.stats;
    if report.status == ScanStatus::PartiallyCompleted {
        output::print_warning(&format!(
            "Scan incomplete: {} of {} pairs were not probed",
            stats.skipped, stats.expected
        ));
    }
    // The text report already carries its own summary block.
    if format != OutputFormat::Text {
        output::print_info(&format!(
            "Scan {} {}: {} open of {} results in {:.2}s",
            report.id.short(),
            report.status,
            stats.open,
            stats.completed,
            report.duration_ms as f64 / 1000.0
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};

    fn scan_command(args: &[&str]) -> ScanCommand {
        let cli = Cli::try_parse_from(["portsift", "scan"].iter().chain(args)).unwrap();
        match cli.command {
            Commands::Scan(cmd) => cmd,
            Commands::Profiles(_) => panic!("expected scan subcommand"),
        }
    }

    #[test]
    fn test_flags_override_settings() {
        let settings = AppSettings {
            timing_profile: "sneaky".to_string(),
            deadline_secs: Some(60),
            ..AppSettings::default()
        };

        let request = scan_command(&["10.0.0.1", "-T", "aggressive", "--deadline", "5"])
            .request(&settings)
            .unwrap();
        assert_eq!(request.timing_profile, "aggressive");
        assert_eq!(request.deadline, Some(Duration::from_secs(5)));

        let request = scan_command(&["10.0.0.1"]).request(&settings).unwrap();
        assert_eq!(request.timing_profile, "sneaky");
        assert_eq!(request.deadline, Some(Duration::from_secs(60)));
        assert!(request.fingerprint.is_none());
    }

    #[test]
    fn test_fingerprint_uses_settings_banner_timeout() {
        let settings = AppSettings {
            banner_timeout_ms: 700,
            ..AppSettings::default()
        };
        let request = scan_command(&["10.0.0.1", "-F"]).request(&settings).unwrap();
        assert_eq!(
            request.fingerprint.map(|f| f.banner_timeout),
            Some(Duration::from_millis(700))
        );

        let err = scan_command(&["10.0.0.1", "-F", "--banner-timeout", "0"])
            .request(&settings)
            .unwrap_err();
        assert!(err.to_string().contains("banner timeout"));
    }

    #[test]
    fn test_overrides_forwarded() {
        let request = scan_command(&["10.0.0.1", "-c", "4", "--delay", "0", "--max-rate", "10"])
            .request(&AppSettings::default())
            .unwrap();
        assert_eq!(request.overrides.concurrency, Some(4));
        assert_eq!(request.overrides.delay_ms, Some(0));
        assert_eq!(request.overrides.max_rate, Some(10));
        assert_eq!(request.overrides.timeout_ms, None);
    }

    #[tokio::test]
    async fn test_invalid_ports_fail_before_scanning() {
        let err = scan_command(&["10.0.0.1", "-p", "100-90"])
            .execute(&AppSettings::default(), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("100"));
    }
}
