//! UDP prober.
//!
//! Sends a protocol-appropriate datagram and classifies the reply, the ICMP
//! error the OS surfaces for it, or the silence.
//!
//! # Detection Methods
//!
//! 1. **UDP Response**: any datagram back means the port is open
//! 2. **ICMP Port Unreachable**: surfaced as connection refused, port is closed
//! 3. **ICMP Host/Network Unreachable**: port is filtered
//! 4. **No Response**: port is either open or filtered (ambiguous)
//!
//! A single datagram is sent per probe; a silent port is not retransmitted to.

use crate::banner::sanitize_banner;
use crate::scanner::tcp::is_unreachable;
use crate::scanner::traits::{ProbeOutcome, Prober};
use crate::types::{Port, PortState, Protocol};
use async_trait::async_trait;
use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::trace;

/// Largest reply we keep.
const RECV_BUFFER: usize = 2048;

/// Known UDP service payloads that elicit a reply from a listening service.
struct UdpPayload {
    port: u16,
    payload: &'static [u8],
}

const UDP_PAYLOADS: &[UdpPayload] = &[
    // DNS status request
    UdpPayload {
        port: 53,
        payload: b"\x00\x00\x10\x00\x00\x00\x00\x00\x00\x00\x00\x00",
    },
    // TFTP read request
    UdpPayload {
        port: 69,
        payload: b"\x00\x01portsift\x00netascii\x00",
    },
    // NTP v4 client request
    UdpPayload {
        port: 123,
        payload: b"\xe3\x00\x04\xfa\x00\x01\x00\x00\x00\x01\x00\x00",
    },
    // NetBIOS node status query
    UdpPayload {
        port: 137,
        payload: b"\x80\xf0\x00\x10\x00\x01\x00\x00\x00\x00\x00\x00\x20CKAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA\x00\x00\x21\x00\x01",
    },
    // SNMPv1 get-request, community "public"
    UdpPayload {
        port: 161,
        payload: b"\x30\x26\x02\x01\x00\x04\x06public\xa0\x19\x02\x04\x00\x00\x00\x01\x02\x01\x00\x02\x01\x00\x30\x0b\x30\x09\x06\x05\x2b\x06\x01\x02\x01\x05\x00",
    },
    // SSDP discovery
    UdpPayload {
        port: 1900,
        payload: b"M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nMX: 1\r\nST: ssdp:all\r\n\r\n",
    },
    // SIP OPTIONS
    UdpPayload {
        port: 5060,
        payload: b"OPTIONS sip:nm SIP/2.0\r\nVia: SIP/2.0/UDP nm;branch=z9hG4bK\r\nFrom: <sip:nm@nm>;tag=root\r\nTo: <sip:nm2@nm2>\r\nCall-ID: 50000\r\nCSeq: 42 OPTIONS\r\nMax-Forwards: 70\r\nContent-Length: 0\r\n\r\n",
    },
];

/// Payload for ports without a dedicated probe.
const DEFAULT_PAYLOAD: &[u8] = b"\x00";

/// Get the payload to send to a port.
pub(crate) fn payload_for_port(port: u16) -> &'static [u8] {
    UDP_PAYLOADS
        .iter()
        .find(|p| p.port == port)
        .map(|p| p.payload)
        .unwrap_or(DEFAULT_PAYLOAD)
}

/// UDP prober.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpProber;

impl UdpProber {
    pub fn new() -> Self {
        Self
    }

    async fn connect(addr: SocketAddr) -> io::Result<UdpSocket> {
        let local: SocketAddr = match addr.ip() {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(addr).await?;
        Ok(socket)
    }
}

#[async_trait]
impl Prober for UdpProber {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    async fn probe(&self, ip: IpAddr, port: Port, wait: Duration) -> ProbeOutcome {
        let addr = SocketAddr::new(ip, port.as_u16());
        let start = Instant::now();

        let socket = match Self::connect(addr).await {
            Ok(socket) => socket,
            Err(e) => return ProbeOutcome::error(start, format!("socket allocation failed: {}", e)),
        };

        if let Err(e) = socket.send(payload_for_port(port.as_u16())).await {
            return outcome_for_error(start, &e);
        }

        let mut buf = [0u8; RECV_BUFFER];
        match timeout(wait, socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                let banner = (n > 0).then(|| sanitize_banner(&buf[..n]));
                ProbeOutcome::new(PortState::Open, start).with_banner(banner)
            }
            Ok(Err(e)) => {
                trace!(%addr, error = %e, "udp receive failed");
                outcome_for_error(start, &e)
            }
            Err(_) => ProbeOutcome::new(PortState::OpenFiltered, start),
        }
    }
}

fn outcome_for_error(start: Instant, e: &io::Error) -> ProbeOutcome {
    match classify_udp_error(e) {
        PortState::Error => ProbeOutcome::error(start, e.to_string()),
        state => ProbeOutcome::new(state, start),
    }
}

/// Map an error surfaced on a connected UDP socket to a port state.
pub(crate) fn classify_udp_error(e: &io::Error) -> PortState {
    match e.kind() {
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => PortState::Closed,
        ErrorKind::PermissionDenied => PortState::Filtered,
        _ if e.raw_os_error().is_some_and(is_unreachable) => PortState::Filtered,
        _ => PortState::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn port(n: u16) -> Port {
        Port::new(n).unwrap()
    }

    #[test]
    fn test_payload_selection() {
        assert_eq!(payload_for_port(53).len(), 12);
        assert!(payload_for_port(5060).starts_with(b"OPTIONS"));
        assert_eq!(payload_for_port(12345), DEFAULT_PAYLOAD);
    }

    #[test]
    fn test_classify_udp_errors() {
        let refused = io::Error::from(ErrorKind::ConnectionRefused);
        assert_eq!(classify_udp_error(&refused), PortState::Closed);

        let other = io::Error::new(ErrorKind::Other, "boom");
        assert_eq!(classify_udp_error(&other), PortState::Error);
    }

    #[tokio::test]
    async fn test_probe_responding_port() {
        let server = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let listening = server.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            if let Ok((_, peer)) = server.recv_from(&mut buf).await {
                let _ = server.send_to(b"pong\r\n", peer).await;
            }
        });

        let outcome = UdpProber::new()
            .probe(LOCALHOST, port(listening), Duration::from_secs(2))
            .await;
        assert_eq!(outcome.state, PortState::Open);
        assert_eq!(outcome.banner.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_probe_silent_port() {
        let server = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let listening = server.local_addr().unwrap().port();

        let outcome = UdpProber::new()
            .probe(LOCALHOST, port(listening), Duration::from_millis(200))
            .await;
        assert_eq!(outcome.state, PortState::OpenFiltered);
        drop(server);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_probe_closed_port() {
        let server = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let closed = server.local_addr().unwrap().port();
        drop(server);

        let outcome = UdpProber::new()
            .probe(LOCALHOST, port(closed), Duration::from_secs(2))
            .await;
        assert_eq!(outcome.state, PortState::Closed);
    }
}
