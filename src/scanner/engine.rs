//! Protocol dispatch for single probes.

use crate::scanner::tcp::TcpConnectProber;
use crate::scanner::traits::{ProbeOutcome, ProbeResult, Prober};
use crate::scanner::udp::UdpProber;
use crate::types::{Port, Protocol, Target, TargetAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Routes each probe to the prober for its protocol.
#[derive(Clone)]
pub struct ProbeEngine {
    tcp: Arc<dyn Prober>,
    udp: Arc<dyn Prober>,
}

impl ProbeEngine {
    /// An engine using the operating system socket probers.
    pub fn new() -> Self {
        Self::with_probers(Arc::new(TcpConnectProber::new()), Arc::new(UdpProber::new()))
    }

    /// An engine with custom probers.
    pub fn with_probers(tcp: Arc<dyn Prober>, udp: Arc<dyn Prober>) -> Self {
        Self { tcp, udp }
    }

    fn prober(&self, protocol: Protocol) -> &dyn Prober {
        match protocol {
            Protocol::Tcp => self.tcp.as_ref(),
            Protocol::Udp => self.udp.as_ref(),
        }
    }

    /// Probe one port on one target.
    ///
    /// Unresolved targets produce an `error` result without any network
    /// activity.
    pub async fn probe(
        &self,
        target: &Target,
        port: Port,
        protocol: Protocol,
        timeout: Duration,
    ) -> ProbeResult {
        let outcome = match &target.addr {
            TargetAddr::Resolved(ip) => self.prober(protocol).probe(*ip, port, timeout).await,
            TargetAddr::Unresolved { reason } => {
                ProbeOutcome::error(Instant::now(), format!("unresolved target: {}", reason))
            }
        };
        ProbeResult::new(target, port, protocol, outcome)
    }
}

impl Default for ProbeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProbeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortState;
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};

    struct FixedProber(Protocol, PortState);

    #[async_trait]
    impl Prober for FixedProber {
        fn protocol(&self) -> Protocol {
            self.0
        }

        async fn probe(&self, _ip: IpAddr, _port: Port, _timeout: Duration) -> ProbeOutcome {
            ProbeOutcome::new(self.1, Instant::now())
        }
    }

    fn engine() -> ProbeEngine {
        ProbeEngine::with_probers(
            Arc::new(FixedProber(Protocol::Tcp, PortState::Open)),
            Arc::new(FixedProber(Protocol::Udp, PortState::OpenFiltered)),
        )
    }

    #[tokio::test]
    async fn test_dispatch_by_protocol() {
        let target = Target::from_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        let port = Port::new(53).unwrap();
        let timeout = Duration::from_millis(10);

        let tcp = engine().probe(&target, port, Protocol::Tcp, timeout).await;
        assert_eq!(tcp.state, PortState::Open);
        assert_eq!(tcp.protocol, Protocol::Tcp);

        let udp = engine().probe(&target, port, Protocol::Udp, timeout).await;
        assert_eq!(udp.state, PortState::OpenFiltered);
        assert_eq!(udp.protocol, Protocol::Udp);
    }

    #[tokio::test]
    async fn test_unresolved_target_is_error() {
        let target = Target::unresolved("nowhere.invalid", "no addresses");
        let result = engine()
            .probe(&target, Port::new(80).unwrap(), Protocol::Tcp, Duration::from_millis(10))
            .await;

        assert_eq!(result.state, PortState::Error);
        assert_eq!(result.target, "nowhere.invalid");
        assert!(result.error.unwrap().contains("no addresses"));
    }
}
