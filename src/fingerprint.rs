//! Service fingerprinting for open ports.
//!
//! A banner is matched against an ordered signature table, most specific
//! patterns first; the first match wins and yields an exact identification.
//! Banners that match nothing fall back to the port's registered service
//! name. Fingerprinting only ever annotates a result, it never changes the
//! port's state.

use crate::banner::{grab_banner, sanitize_banner};
use crate::services::service_name;
use crate::types::{Port, Protocol};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error};

/// Default time to wait for a banner.
pub const DEFAULT_BANNER_TIMEOUT: Duration = Duration::from_millis(1500);

/// How an identification was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// A signature matched the banner.
    Exact,
    /// A banner arrived but matched nothing; the name is the port's guess.
    Heuristic,
    /// No banner arrived.
    Unknown,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Exact => write!(f, "exact"),
            Confidence::Heuristic => write!(f, "heuristic"),
            Confidence::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identified service on an open port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub confidence: Confidence,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, version: Option<String>, confidence: Confidence) -> Self {
        Self {
            name: name.into(),
            version,
            confidence,
        }
    }

    /// Nothing could be learned about the service.
    pub fn unknown() -> Self {
        Self::new("unknown", None, Confidence::Unknown)
    }
}

/// Fingerprinting options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintConfig {
    /// How long to wait for a banner, and for the reply to a probe.
    pub banner_timeout: Duration,
    /// Send a client-first probe when the service stays silent.
    pub active_probes: bool,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            banner_timeout: DEFAULT_BANNER_TIMEOUT,
            active_probes: true,
        }
    }
}

struct Signature {
    service: &'static str,
    product: Option<&'static str>,
    pattern: Regex,
}

/// (service, product, pattern). Order matters: the first match wins, so
/// vendor-specific patterns precede generic ones for the same service.
/// Capture group 1, when present and non-empty, is the version.
const SIGNATURE_TABLE: &[(&str, Option<&str>, &str)] = &[
    ("ssh", Some("OpenSSH"), r"^SSH-[\d.]+-OpenSSH[_-]([\w.]+)"),
    ("ssh", Some("Dropbear"), r"^SSH-[\d.]+-dropbear[_-]?([\w.]*)"),
    ("ssh", None, r"^SSH-([\d.]+)-"),
    ("ftp", Some("vsftpd"), r"^220[ -].*\(vsFTPd ([\d.]+)\)"),
    ("ftp", Some("ProFTPD"), r"^220[ -].*ProFTPD ([\d.]+\w*)"),
    ("ftp", Some("Pure-FTPd"), r"^220[ -].*Pure-FTPd"),
    ("ftp", Some("FileZilla"), r"^220[ -].*FileZilla Server(?: version)? ([\d.]+)"),
    ("smtp", Some("Postfix"), r"^220[ -].*ESMTP Postfix"),
    ("smtp", Some("Exim"), r"^220[ -].*Exim ([\d.]+)"),
    ("smtp", Some("Sendmail"), r"^220[ -].*Sendmail ([\w./]+)"),
    ("smtp", None, r"(?i)^220[ -].*\bE?SMTP\b"),
    ("ftp", None, r"(?i)^220[ -].*\bftp\b"),
    ("http", Some("nginx"), r"(?im)^Server: nginx/?([\d.]*)"),
    ("http", Some("Apache httpd"), r"(?im)^Server: Apache/?([\d.]*)"),
    ("http", Some("Microsoft IIS"), r"(?im)^Server: Microsoft-IIS/([\d.]+)"),
    ("http", Some("lighttpd"), r"(?im)^Server: lighttpd/?([\d.]*)"),
    ("http", Some("Caddy"), r"(?im)^Server: Caddy"),
    ("http", None, r"^HTTP/[\d.]+ \d{3}"),
    ("rtsp", None, r"^RTSP/1\.0 \d{3}"),
    ("sip", None, r"^SIP/2\.0 \d{3}"),
    ("pop3", Some("Dovecot"), r"^\+OK.*Dovecot"),
    ("pop3", None, r"^\+OK"),
    ("imap", Some("Dovecot"), r"^\* OK.*Dovecot"),
    ("imap", None, r"^\* OK.*IMAP"),
    ("redis", Some("Redis"), r"^(?:\+PONG|-NOAUTH|-ERR.*(?:redis|command))"),
    ("memcached", Some("memcached"), r"^VERSION ([\d.]+)"),
    ("mysql", Some("MySQL"), r"(?s)^.{4}\n([0-9]+\.[0-9]+\.[0-9]+[\w.-]*)\x00"),
    ("vnc", None, r"^RFB (\d{3}\.\d{3})"),
    ("telnet", None, r"(?i)^.{0,128}\blogin:"),
];

static SIGNATURES: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    SIGNATURE_TABLE
        .iter()
        .filter_map(|&(service, product, pattern)| match Regex::new(pattern) {
            Ok(pattern) => Some(Signature {
                service,
                product,
                pattern,
            }),
            Err(e) => {
                error!(service, error = %e, "invalid service signature skipped");
                None
            }
        })
        .collect()
});

/// Match a raw banner against the signature table.
pub fn match_signature(banner: &str) -> Option<ServiceInfo> {
    SIGNATURES.iter().find_map(|signature| {
        let captures = signature.pattern.captures(banner)?;
        let captured = captures
            .get(1)
            .map(|m| m.as_str())
            .filter(|v| !v.is_empty());
        let version = match (signature.product, captured) {
            (Some(product), Some(version)) => Some(format!("{} {}", product, version)),
            (Some(product), None) => Some(product.to_string()),
            (None, Some(version)) => Some(version.to_string()),
            (None, None) => None,
        };
        Some(ServiceInfo::new(signature.service, version, Confidence::Exact))
    })
}

/// Identify a service from a banner, falling back to the port's registered
/// name when no signature matches.
pub fn identify(port: Port, protocol: Protocol, banner: Option<&str>) -> ServiceInfo {
    match banner.filter(|b| !b.trim().is_empty()) {
        Some(banner) => match_signature(banner).unwrap_or_else(|| heuristic(port, protocol)),
        None => ServiceInfo::unknown(),
    }
}

fn heuristic(port: Port, protocol: Protocol) -> ServiceInfo {
    let name = service_name(port.as_u16(), protocol).unwrap_or("unknown");
    ServiceInfo::new(name, None, Confidence::Heuristic)
}

/// Annotates open ports with service identifications.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    config: FingerprintConfig,
}

impl Fingerprinter {
    pub fn new(config: FingerprintConfig) -> Self {
        Self { config }
    }

    /// Grab a banner from an open TCP port and identify the service.
    ///
    /// Returns the identification and the sanitized banner, if one arrived.
    pub async fn fingerprint_tcp(
        &self,
        ip: IpAddr,
        port: Port,
        connect_timeout: Duration,
    ) -> (ServiceInfo, Option<String>) {
        let addr = SocketAddr::new(ip, port.as_u16());
        let raw = grab_banner(
            addr,
            connect_timeout,
            self.config.banner_timeout,
            self.config.active_probes,
        )
        .await;

        match raw {
            Some(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let info = identify(port, Protocol::Tcp, Some(&text));
                debug!(%addr, service = %info.name, confidence = %info.confidence, "fingerprinted");
                (info, Some(sanitize_banner(&bytes)))
            }
            None => (ServiceInfo::unknown(), None),
        }
    }

    /// Identify a UDP service from the reply that marked it open.
    ///
    /// Any reply at all is evidence of a listener, so an unmatched or empty
    /// reply still yields the port's heuristic name.
    pub fn fingerprint_udp(&self, port: Port, reply: Option<&str>) -> ServiceInfo {
        reply
            .and_then(match_signature)
            .unwrap_or_else(|| heuristic(port, Protocol::Udp))
    }
}
