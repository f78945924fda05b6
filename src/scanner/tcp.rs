//! TCP connect prober.
//!
//! Performs standard TCP connect probes using the operating system's
//! socket API. This is the most reliable probing method but also
//! the most detectable as it completes the full TCP handshake.

use crate::scanner::traits::{ProbeOutcome, Prober};
use crate::types::{Port, PortState, Protocol};
use async_trait::async_trait;
use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpSocket;
use tokio::time::timeout;
use tracing::trace;

/// TCP connect prober.
///
/// Uses standard socket connect() calls to determine port state.
/// Does not require elevated privileges.
///
/// - `open`: the handshake completed
/// - `closed`: RST / connection refused
/// - `filtered`: timeout, host or network unreachable, or a local firewall
///   rejecting the packet
/// - `error`: the socket could not be created or failed unexpectedly
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProber;

impl TcpConnectProber {
    pub fn new() -> Self {
        Self
    }

    /// Create a non-blocking socket that resets on close, so probing many
    /// ports does not leave connections in TIME_WAIT.
    fn open_socket(addr: &SocketAddr) -> io::Result<TcpSocket> {
        let socket = Socket::new(
            Domain::for_address(*addr),
            Type::STREAM,
            Some(SockProtocol::TCP),
        )?;
        socket.set_nonblocking(true)?;
        socket.set_linger(Some(Duration::ZERO))?;
        Ok(TcpSocket::from_std_stream(socket.into()))
    }
}

#[async_trait]
impl Prober for TcpConnectProber {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn probe(&self, ip: IpAddr, port: Port, wait: Duration) -> ProbeOutcome {
        let addr = SocketAddr::new(ip, port.as_u16());
        let start = Instant::now();

        let socket = match Self::open_socket(&addr) {
            Ok(socket) => socket,
            Err(e) => return ProbeOutcome::error(start, format!("socket allocation failed: {}", e)),
        };

        match timeout(wait, socket.connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                ProbeOutcome::new(PortState::Open, start)
            }
            Ok(Err(e)) => {
                trace!(%addr, error = %e, "connect failed");
                match classify_connect_error(&e) {
                    PortState::Error => ProbeOutcome::error(start, e.to_string()),
                    state => ProbeOutcome::new(state, start),
                }
            }
            Err(_) => ProbeOutcome::new(PortState::Filtered, start),
        }
    }
}

/// Map a failed connect to a port state.
pub(crate) fn classify_connect_error(e: &io::Error) -> PortState {
    match e.kind() {
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => PortState::Closed,
        ErrorKind::TimedOut | ErrorKind::PermissionDenied => PortState::Filtered,
        _ if e.raw_os_error().is_some_and(is_unreachable) => PortState::Filtered,
        _ => PortState::Error,
    }
}

/// ICMP-style unreachable conditions reported by the OS.
#[cfg(unix)]
pub(crate) fn is_unreachable(code: i32) -> bool {
    matches!(
        code,
        libc::EHOSTUNREACH | libc::ENETUNREACH | libc::EHOSTDOWN | libc::ENETDOWN
    )
}

#[cfg(windows)]
pub(crate) fn is_unreachable(code: i32) -> bool {
    // WSAENETDOWN, WSAENETUNREACH, WSAEHOSTDOWN, WSAEHOSTUNREACH
    matches!(code, 10050 | 10051 | 10064 | 10065)
}

#[cfg(not(any(unix, windows)))]
pub(crate) fn is_unreachable(_code: i32) -> bool {
    false
}
