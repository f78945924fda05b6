//! Prober trait abstraction and probe result types.
//!
//! Defines a common interface for the TCP and UDP probe implementations,
//! enabling the scheduler to dispatch per protocol and tests to substitute
//! scripted probers.

use crate::fingerprint::ServiceInfo;
use crate::types::{Port, PortState, Protocol, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// What a single probe observed, before it is tied to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub state: PortState,
    pub response_time_ms: u64,
    /// Sanitized response payload (UDP) if any.
    pub banner: Option<String>,
    /// Local failure description for `error` outcomes.
    pub detail: Option<String>,
}

impl ProbeOutcome {
    pub fn new(state: PortState, started: Instant) -> Self {
        Self {
            state,
            response_time_ms: elapsed_ms(started),
            banner: None,
            detail: None,
        }
    }

    /// An `error` outcome carrying the local failure.
    pub fn error(started: Instant, detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(PortState::Error, started)
        }
    }

    pub fn with_banner(mut self, banner: Option<String>) -> Self {
        self.banner = banner;
        self
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Final result for one (target, port, protocol) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    /// Target address, or the original expression for unresolved targets.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub port: Port,
    pub protocol: Protocol,
    pub state: PortState,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of probes issued for this pair, retries included.
    #[serde(default = "one")]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceInfo>,
}

fn one() -> u32 {
    1
}

impl ProbeResult {
    /// Tie an outcome to its target.
    pub fn new(target: &Target, port: Port, protocol: Protocol, outcome: ProbeOutcome) -> Self {
        Self {
            target: target.label(),
            hostname: target.hostname.clone(),
            port,
            protocol,
            state: outcome.state,
            response_time_ms: outcome.response_time_ms,
            banner: outcome.banner,
            error: outcome.detail,
            attempts: 1,
            service: None,
        }
    }

    /// Attach fingerprinting output.
    pub fn with_service(mut self, service: ServiceInfo) -> Self {
        self.service = Some(service);
        self
    }

    /// Check if the port is open.
    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

/// A single-protocol probe implementation.
///
/// Probes never touch shared state; they only report what they observed.
///
/// # Example
///
/// ```ignore
/// use portsift::scanner::{Prober, TcpConnectProber};
///
/// let outcome = TcpConnectProber::new().probe(ip, port, Duration::from_secs(1)).await;
/// println!("{}", outcome.state);
/// ```
#[async_trait]
pub trait Prober: Send + Sync {
    /// The protocol this prober speaks.
    fn protocol(&self) -> Protocol;

    /// Probe `ip:port`, spending at most `timeout` waiting on the network.
    async fn probe(&self, ip: IpAddr, port: Port, timeout: Duration) -> ProbeOutcome;
}
