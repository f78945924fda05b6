//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV rendering of scan
//! reports. Formatters write to any `io::Write` and never touch the network.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::{read_csv, write_csv, CsvRow};
pub use json_format::{read_json, write_json};
pub use plain::{print_error, print_info, print_warning, write_text, TextOptions};

use crate::error::ConfigError;
use crate::scanner::ScanReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table grouped by target
    #[default]
    Text,
    /// JSON array of results
    Json,
    /// CSV, one row per result
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(ConfigError::UnknownFormat(s.to_string())),
        }
    }
}

/// Write a report in the given format.
pub fn write_report<W: Write>(
    out: &mut W,
    report: &ScanReport,
    format: OutputFormat,
    options: &TextOptions,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => write_text(out, report, options),
        OutputFormat::Json => write_json(out, &report.results),
        OutputFormat::Csv => write_csv(out, &report.results),
    }
}

/// Render a report to a string.
pub fn render(report: &ScanReport, format: OutputFormat, options: &TextOptions) -> io::Result<String> {
    let mut buf = Vec::new();
    write_report(&mut buf, report, format, options)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
