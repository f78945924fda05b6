//! Plain text output formatting.
//!
//! Produces a human-readable report grouped by target, with optional colors.

use crate::scanner::{ProbeResult, ScanReport, ScanStatus};
use crate::services::service_name;
use crate::types::PortState;
use console::{style, Style};
use std::io::{self, Write};

const HEAVY_RULE: &str = "═══════════════════════════════════════════════════════════════════════";
const LIGHT_RULE: &str = "───────────────────────────────────────────────────────────────────────";

/// Longest banner shown in the detail column.
const DETAIL_WIDTH: usize = 40;

/// Text rendering options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextOptions {
    /// List closed ports instead of summarizing them.
    pub show_closed: bool,
    /// Emit ANSI colors.
    pub color: bool,
}

/// Applies styles only when color is enabled.
struct Painter {
    color: bool,
}

impl Painter {
    fn paint(&self, style: Style, text: &str) -> String {
        if self.color {
            style.force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn state_style(state: PortState) -> Style {
        match state {
            PortState::Open => Style::new().green().bold(),
            PortState::OpenFiltered => Style::new().green(),
            PortState::Closed => Style::new().red(),
            PortState::Filtered => Style::new().yellow(),
            PortState::Error => Style::new().magenta(),
        }
    }
}

/// Write a report as a text table grouped by target.
pub fn write_text<W: Write>(out: &mut W, report: &ScanReport, options: &TextOptions) -> io::Result<()> {
    let painter = Painter {
        color: options.color,
    };
    let rule = |p: &Painter, s: &str| p.paint(Style::new().cyan(), s);
    let label = |p: &Painter, s: &str| p.paint(Style::new().bold(), s);

    writeln!(out)?;
    writeln!(out, "{}", rule(&painter, HEAVY_RULE))?;
    writeln!(out, "  {}", painter.paint(Style::new().cyan().bold(), "portsift scan report"))?;
    writeln!(out, "{}", rule(&painter, HEAVY_RULE))?;
    writeln!(out)?;

    let status_style = match report.status {
        ScanStatus::Completed => Style::new().green(),
        ScanStatus::PartiallyCompleted => Style::new().yellow(),
        ScanStatus::Failed => Style::new().red(),
    };
    let stats = &report.stats;
    writeln!(out, "  {} {}", label(&painter, "Scan ID: "), report.id.short())?;
    writeln!(
        out,
        "  {} {}",
        label(&painter, "Status:  "),
        painter.paint(status_style, &report.status.to_string())
    )?;
    writeln!(
        out,
        "  {} {:.2}s",
        label(&painter, "Duration:"),
        report.duration_ms as f64 / 1000.0
    )?;
    writeln!(
        out,
        "  {} {} of {} pairs",
        label(&painter, "Results: "),
        stats.completed,
        stats.expected
    )?;
    writeln!(
        out,
        "            {} open, {} closed, {} filtered, {} open|filtered, {} error",
        stats.open, stats.closed, stats.filtered, stats.open_filtered, stats.error
    )?;
    if stats.skipped > 0 {
        writeln!(out, "            {} not probed", stats.skipped)?;
    }

    for group in report.results.chunk_by(|a, b| a.target == b.target) {
        write_target(out, &painter, group, options)?;
    }

    writeln!(out)?;
    writeln!(out, "{}", rule(&painter, HEAVY_RULE))?;
    Ok(())
}

fn write_target<W: Write>(
    out: &mut W,
    painter: &Painter,
    results: &[ProbeResult],
    options: &TextOptions,
) -> io::Result<()> {
    let Some(first) = results.first() else {
        return Ok(());
    };

    let heading = match &first.hostname {
        Some(name) if *name != first.target => format!("{} ({})", first.target, name),
        _ => first.target.clone(),
    };
    writeln!(out)?;
    writeln!(
        out,
        "  {} {}",
        painter.paint(Style::new().bold(), "Target"),
        painter.paint(Style::new().white().bold(), &heading)
    )?;
    writeln!(out, "  {}", painter.paint(Style::new().dim(), LIGHT_RULE))?;
    writeln!(
        out,
        "  {}",
        painter.paint(
            Style::new().bold(),
            &format!("{:<11} {:<14} {:<16} {}", "PORT", "STATE", "SERVICE", "DETAIL")
        )
    )?;

    let mut hidden = 0usize;
    for result in results {
        if result.state == PortState::Closed && !options.show_closed {
            hidden += 1;
            continue;
        }
        let port = format!("{}/{}", result.port, result.protocol);
        let state = format!("{:<14}", result.state.to_string());
        let service = result
            .service
            .as_ref()
            .map(|s| s.name.as_str())
            .or_else(|| service_name(result.port.as_u16(), result.protocol))
            .unwrap_or("");

        writeln!(
            out,
            "  {:<11} {} {:<16} {}",
            port,
            painter.paint(Painter::state_style(result.state), &state),
            service,
            painter.paint(Style::new().dim(), &detail(result))
        )?;
    }

    if hidden > 0 {
        let noun = if hidden == 1 { "port" } else { "ports" };
        writeln!(
            out,
            "  {}",
            painter.paint(Style::new().dim(), &format!("{} closed {} not shown", hidden, noun))
        )?;
    }
    Ok(())
}

/// Version, banner or local error, whichever says the most.
fn detail(result: &ProbeResult) -> String {
    let text = result
        .service
        .as_ref()
        .and_then(|s| s.version.as_deref())
        .or(result.banner.as_deref())
        .or(result.error.as_deref())
        .unwrap_or("");
    truncate_string(text, DETAIL_WIDTH)
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to a maximum number of characters, adding an ellipsis
/// if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
