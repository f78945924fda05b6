//! Banner grabbing for TCP services.
//!
//! Reads whatever a service sends right after the handshake. Services that
//! wait for the client to speak first are sent a small protocol-appropriate
//! probe instead.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Maximum bytes to read for a banner.
const MAX_BANNER_SIZE: usize = 1024;

/// Longest banner kept for display.
const MAX_DISPLAY_LEN: usize = 256;

const HTTP_PROBE: &[u8] = b"HEAD / HTTP/1.0\r\n\r\n";
const REDIS_PROBE: &[u8] = b"PING\r\n";
const MEMCACHED_PROBE: &[u8] = b"version\r\n";

/// Connect to `addr` and read its banner.
///
/// Waits up to `read_timeout` for the service to speak; if it stays silent
/// and `active_probe` is set, sends the probe for the port and reads the
/// reply. Returns the raw bytes, or `None` if nothing arrived.
pub async fn grab_banner(
    addr: SocketAddr,
    connect_timeout: Duration,
    read_timeout: Duration,
    active_probe: bool,
) -> Option<Vec<u8>> {
    let stream = match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            trace!(%addr, error = %e, "banner connect failed");
            return None;
        }
        Err(_) => return None,
    };

    grab_banner_from_stream(stream, addr.port(), read_timeout, active_probe).await
}

/// Read a banner from an established stream.
pub async fn grab_banner_from_stream(
    mut stream: TcpStream,
    port: u16,
    read_timeout: Duration,
    active_probe: bool,
) -> Option<Vec<u8>> {
    let mut buffer = vec![0u8; MAX_BANNER_SIZE];

    if let Ok(Ok(n)) = timeout(read_timeout, stream.read(&mut buffer)).await {
        if n > 0 {
            buffer.truncate(n);
            return Some(buffer);
        }
        // The peer closed without a word; there is nobody to probe.
        return None;
    }

    if !active_probe {
        return None;
    }

    stream.write_all(probe_for_port(port)).await.ok()?;
    match timeout(read_timeout, stream.read(&mut buffer)).await {
        Ok(Ok(n)) if n > 0 => {
            buffer.truncate(n);
            Some(buffer)
        }
        _ => None,
    }
}

/// The client-first probe for a port.
pub(crate) fn probe_for_port(port: u16) -> &'static [u8] {
    match port {
        6379 => REDIS_PROBE,
        11211 => MEMCACHED_PROBE,
        _ => HTTP_PROBE,
    }
}

/// Make a raw banner printable: CR, LF and TAB become spaces, other
/// non-printable bytes become '.', runs of spaces collapse, and the result
/// is capped for display.
pub fn sanitize_banner(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len().min(MAX_DISPLAY_LEN));
    let mut prev_space = false;

    for &b in data.iter().take(MAX_DISPLAY_LEN) {
        let c = match b {
            b'\r' | b'\n' | b'\t' | b' ' => ' ',
            _ if b.is_ascii_graphic() => b as char,
            _ => '.',
        };
        if c == ' ' && prev_space {
            continue;
        }
        prev_space = c == ' ';
        result.push(c);
    }

    result.trim().to_string()
}
