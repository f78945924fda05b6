//! Target specification types with CIDR and hostname support.
//!
//! Provides flexible target parsing supporting:
//! - Single IP addresses (IPv4 and IPv6)
//! - CIDR notation (192.168.1.0/24)
//! - Hostnames (example.com)
//! - Multiple targets, comma or whitespace separated

use crate::error::{ParseError, ResolutionError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Address part of a scan target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetAddr {
    /// A concrete address that will be probed.
    Resolved(IpAddr),
    /// Resolution failed; every pair on this target is reported as `error`.
    Unresolved { reason: String },
}

/// A single scan target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Original hostname or expression, kept for display.
    pub hostname: Option<String>,
    /// The resolved address, or why there is none.
    pub addr: TargetAddr,
}

impl Target {
    /// A target given as an IP literal or produced by CIDR expansion.
    pub fn from_ip(ip: IpAddr) -> Self {
        Self {
            hostname: None,
            addr: TargetAddr::Resolved(ip),
        }
    }

    /// A hostname that resolved to `ip`.
    pub fn named(hostname: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            hostname: Some(hostname.into()),
            addr: TargetAddr::Resolved(ip),
        }
    }

    /// A placeholder for an expression that could not be resolved.
    pub fn unresolved(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            hostname: Some(expression.into()),
            addr: TargetAddr::Unresolved {
                reason: reason.into(),
            },
        }
    }

    /// The address to probe, if resolution succeeded.
    pub fn ip(&self) -> Option<IpAddr> {
        match self.addr {
            TargetAddr::Resolved(ip) => Some(ip),
            TargetAddr::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.ip().is_some()
    }

    /// Short identifier used in result documents: the address when known,
    /// otherwise the original expression.
    pub fn label(&self) -> String {
        match (&self.addr, &self.hostname) {
            (TargetAddr::Resolved(ip), _) => ip.to_string(),
            (TargetAddr::Unresolved { .. }, Some(name)) => name.clone(),
            (TargetAddr::Unresolved { .. }, None) => "<unresolved>".to_string(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.addr, &self.hostname) {
            (TargetAddr::Resolved(ip), Some(name)) => write!(f, "{} ({})", name, ip),
            (TargetAddr::Resolved(ip), None) => write!(f, "{}", ip),
            (TargetAddr::Unresolved { .. }, _) => write!(f, "{} (unresolved)", self.label()),
        }
    }
}

/// One parsed target expression.
///
/// Supports:
/// - Single IP: "192.168.1.1"
/// - CIDR: "192.168.1.0/24"
/// - Hostname: "example.com"
/// - IPv6: "::1", "2001:db8::/120"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// A single IP address.
    Single(IpAddr),
    /// A CIDR network range.
    Cidr(IpNetwork),
    /// A hostname to be resolved.
    Hostname(String),
}

impl TargetSpec {
    /// Parse a target specification from a string.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Single(ip));
        }

        if s.contains('/') {
            let network: IpNetwork = s
                .parse()
                .map_err(|_| ParseError::InvalidCidr(s.to_string()))?;
            return Ok(Self::Cidr(network));
        }

        if is_valid_hostname(s) {
            return Ok(Self::Hostname(s.to_ascii_lowercase()));
        }

        Err(ParseError::InvalidTarget(s.to_string()))
    }

    /// Parse every expression in `inputs`, each of which may itself hold a
    /// comma or whitespace separated list.
    pub fn parse_list<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<Self>, ParseError> {
        let specs = inputs
            .iter()
            .flat_map(|input| {
                input
                    .as_ref()
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .map(|token| Self::parse(&token))
            .collect::<Result<Vec<_>, _>>()?;

        if specs.is_empty() {
            return Err(ParseError::NoTargets);
        }
        Ok(specs)
    }

    /// Number of hosts this expression stands for.
    pub fn host_count(&self) -> u128 {
        match self {
            Self::Single(_) | Self::Hostname(_) => 1,
            Self::Cidr(network) => cidr_host_count(network),
        }
    }
}

impl FromStr for TargetSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{}", ip),
            Self::Cidr(network) => write!(f, "{}", network),
            Self::Hostname(hostname) => write!(f, "{}", hostname),
        }
    }
}

/// Total addresses in the block, saturating for /0 IPv6.
fn cidr_block_size(network: &IpNetwork) -> u128 {
    let bits: u32 = if network.is_ipv4() { 32 } else { 128 };
    let host_bits = bits - u32::from(network.prefix());
    if host_bits >= 128 {
        u128::MAX
    } else {
        1u128 << host_bits
    }
}

/// Usable host addresses: IPv4 blocks wider than /31 lose their network and
/// broadcast addresses.
fn cidr_host_count(network: &IpNetwork) -> u128 {
    let size = cidr_block_size(network);
    match network {
        IpNetwork::V4(net) if net.prefix() < 31 => size - 2,
        _ => size,
    }
}

fn expand_cidr(network: &IpNetwork) -> Vec<Target> {
    match network {
        IpNetwork::V4(net) if net.prefix() < 31 => {
            let (first, last) = (net.network(), net.broadcast());
            net.iter()
                .filter(|addr| *addr != first && *addr != last)
                .map(|addr| Target::from_ip(IpAddr::V4(addr)))
                .collect()
        }
        _ => network.iter().map(Target::from_ip).collect(),
    }
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    // Each label must be 1-63 characters
    for label in s.split('.') {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        // Must start and end with alphanumeric
        if !label.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return false;
        }
        if !label.chars().last().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return false;
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}

/// Name resolution backend.
#[async_trait]
pub trait HostLookup: Send + Sync {
    /// Resolve `host` to its addresses, in preference order.
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolutionError>;
}

/// Lookup through the system resolver configuration.
pub struct DnsLookup {
    resolver: TokioAsyncResolver,
}

impl DnsLookup {
    /// Build from `/etc/resolv.conf` (or the platform equivalent), falling
    /// back to the resolver's default upstreams.
    pub fn from_system() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            debug!(error = %e, "system resolver config unavailable, using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }
}

#[async_trait]
impl HostLookup for DnsLookup {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolutionError> {
        let response =
            self.resolver
                .lookup_ip(host)
                .await
                .map_err(|e| ResolutionError::Lookup {
                    host: host.to_string(),
                    reason: e.to_string(),
                })?;
        Ok(response.iter().collect())
    }
}

/// Expands parsed target expressions into concrete, deduplicated targets.
pub struct TargetResolver {
    max_hosts: u64,
    lookup: Arc<dyn HostLookup>,
}

impl TargetResolver {
    /// Default cap on the hosts a single CIDR block, and the whole target
    /// list, may expand to.
    pub const DEFAULT_MAX_HOSTS: u64 = 65536;

    /// Concurrent hostname lookups.
    const LOOKUP_CONCURRENCY: usize = 16;

    pub fn new(max_hosts: u64, lookup: Arc<dyn HostLookup>) -> Self {
        Self { max_hosts, lookup }
    }

    /// Resolver backed by the system DNS configuration.
    pub fn system(max_hosts: u64) -> Self {
        Self::new(max_hosts, Arc::new(DnsLookup::from_system()))
    }

    /// Expand a single expression.
    pub async fn expand(&self, spec: &TargetSpec) -> Result<Vec<Target>, ResolutionError> {
        match spec {
            TargetSpec::Single(ip) => Ok(vec![Target::from_ip(*ip)]),

            TargetSpec::Cidr(network) => {
                let hosts = cidr_host_count(network);
                if hosts > u128::from(self.max_hosts) {
                    return Err(ResolutionError::CidrTooLarge {
                        block: network.to_string(),
                        hosts,
                        max: self.max_hosts,
                    });
                }
                Ok(expand_cidr(network))
            }

            TargetSpec::Hostname(hostname) => {
                let ips = self.lookup.lookup(hostname).await?;
                // The first address is the resolver's preferred one
                let ip = ips
                    .first()
                    .copied()
                    .ok_or_else(|| ResolutionError::NoAddresses(hostname.clone()))?;
                debug!(%hostname, %ip, candidates = ips.len(), "resolved hostname");
                Ok(vec![Target::named(hostname.clone(), ip)])
            }
        }
    }

    /// Resolve every expression, keeping input order.
    ///
    /// Expressions that fail become unresolved placeholders. The call fails
    /// when no expression yields an address, or when the distinct addresses
    /// together exceed the host cap.
    pub async fn resolve(&self, specs: &[TargetSpec]) -> Result<Vec<Target>, ResolutionError> {
        let expanded: Vec<(String, Result<Vec<Target>, ResolutionError>)> = stream::iter(specs)
            .map(|spec| async move { (spec.to_string(), self.expand(spec).await) })
            .buffered(Self::LOOKUP_CONCURRENCY)
            .collect()
            .await;

        let mut seen_ips = HashSet::new();
        let mut seen_unresolved = HashSet::new();
        let mut targets = Vec::new();

        for (expression, outcome) in expanded {
            match outcome {
                Ok(batch) => {
                    for target in batch {
                        if let Some(ip) = target.ip() {
                            if seen_ips.insert(ip) {
                                targets.push(target);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(%expression, error = %e, "target resolution failed");
                    if seen_unresolved.insert(expression.clone()) {
                        targets.push(Target::unresolved(expression, e.to_string()));
                    }
                }
            }
        }

        if !targets.iter().any(Target::is_resolved) {
            return Err(ResolutionError::NoTargets(specs.len()));
        }

        if seen_ips.len() as u64 > self.max_hosts {
            return Err(ResolutionError::TooManyHosts {
                hosts: seen_ips.len(),
                max: self.max_hosts,
            });
        }

        Ok(targets)
    }
}
