//! JSON output formatting.

use crate::scanner::ProbeResult;
use std::io::{self, Write};

/// Write results as a pretty-printed JSON array.
pub fn write_json<W: Write>(out: &mut W, results: &[ProbeResult]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, results)?;
    writeln!(out)
}

/// Parse a JSON result document.
pub fn read_json(input: &str) -> serde_json::Result<Vec<ProbeResult>> {
    serde_json::from_str(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures;

    #[test]
    fn test_json_document_shape() {
        let report = fixtures::report();
        let mut buf = Vec::new();
        write_json(&mut buf, &report.results).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 4);

        let ssh = &entries[0];
        assert_eq!(ssh["target"], "10.0.0.1");
        assert_eq!(ssh["hostname"], "gw.lan");
        assert_eq!(ssh["state"], "open");
        assert_eq!(ssh["service"]["name"], "ssh");
        assert_eq!(ssh["service"]["version"], "OpenSSH 8.9p1");
        assert_eq!(ssh["service"]["confidence"], "exact");

        assert_eq!(entries[1]["protocol"], "udp");
        assert_eq!(entries[1]["state"], "open|filtered");
        assert!(entries[1].get("service").is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let report = fixtures::report();
        let mut buf = Vec::new();
        write_json(&mut buf, &report.results).unwrap();

        let parsed = read_json(std::str::from_utf8(&buf).unwrap()).unwrap();
        assert_eq!(parsed, report.results);
    }
}
