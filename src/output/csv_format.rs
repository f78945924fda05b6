//! CSV output formatting.

use crate::fingerprint::Confidence;
use crate::scanner::ProbeResult;
use crate::types::{PortState, Protocol};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

/// One CSV row. Field order defines the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvRow {
    pub target: String,
    pub port: u16,
    pub protocol: Protocol,
    pub state: PortState,
    pub response_time_ms: u64,
    pub service: Option<String>,
    pub version: Option<String>,
    pub confidence: Option<Confidence>,
}

impl From<&ProbeResult> for CsvRow {
    fn from(result: &ProbeResult) -> Self {
        let service = result.service.as_ref();
        Self {
            target: result.target.clone(),
            port: result.port.as_u16(),
            protocol: result.protocol,
            state: result.state,
            response_time_ms: result.response_time_ms,
            service: service.map(|s| s.name.clone()),
            version: service.and_then(|s| s.version.clone()),
            confidence: service.map(|s| s.confidence),
        }
    }
}

/// Write results as CSV with a header row.
pub fn write_csv<W: Write>(out: &mut W, results: &[ProbeResult]) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);

    // Written explicitly so an empty result set still gets a header.
    wtr.write_record([
        "target",
        "port",
        "protocol",
        "state",
        "response_time_ms",
        "service",
        "version",
        "confidence",
    ])?;
    for result in results {
        wtr.serialize(CsvRow::from(result))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Parse a CSV result document.
pub fn read_csv<R: Read>(input: R) -> csv::Result<Vec<CsvRow>> {
    csv::Reader::from_reader(input).deserialize().collect()
}
