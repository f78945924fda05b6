//! Transport protocols and the per-pair port state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transport protocol of a probe. `Tcp` orders before `Udp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(format!("unknown protocol: {}", s)),
        }
    }
}

/// Which protocols a scan covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolSelection {
    #[default]
    Tcp,
    Udp,
    Both,
}

impl ProtocolSelection {
    /// The selected protocols in output order.
    pub fn protocols(self) -> &'static [Protocol] {
        match self {
            Self::Tcp => &[Protocol::Tcp],
            Self::Udp => &[Protocol::Udp],
            Self::Both => &[Protocol::Tcp, Protocol::Udp],
        }
    }
}

/// Classified state of one (target, port, protocol) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// A service accepted the connection or answered the datagram.
    Open,
    /// The host actively refused (RST or ICMP port unreachable).
    Closed,
    /// No usable answer, possibly dropped by a firewall.
    Filtered,
    /// UDP silence: open-and-quiet and filtered look the same.
    #[serde(rename = "open|filtered")]
    OpenFiltered,
    /// Local failure or unresolved target; the pair was not measured.
    Error,
}

impl PortState {
    /// Whether another attempt may turn this outcome into a definite one.
    /// Only a TCP `filtered` qualifies; UDP silence is never retried.
    pub fn is_retryable(self, protocol: Protocol) -> bool {
        protocol == Protocol::Tcp && self == Self::Filtered
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
            Self::OpenFiltered => write!(f, "open|filtered"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for PortState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "filtered" => Ok(Self::Filtered),
            "open|filtered" => Ok(Self::OpenFiltered),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown port state: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_state_display() {
        assert_eq!(PortState::Open.to_string(), "open");
        assert_eq!(PortState::Closed.to_string(), "closed");
        assert_eq!(PortState::Filtered.to_string(), "filtered");
        assert_eq!(PortState::OpenFiltered.to_string(), "open|filtered");
        assert_eq!(PortState::Error.to_string(), "error");
    }

    #[test]
    fn test_port_state_serde_matches_display() {
        for state in [
            PortState::Open,
            PortState::Closed,
            PortState::Filtered,
            PortState::OpenFiltered,
            PortState::Error,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state));
            assert_eq!(state.to_string().parse::<PortState>().unwrap(), state);
        }
    }

    #[test]
    fn test_only_filtered_tcp_is_retryable() {
        assert!(PortState::Filtered.is_retryable(Protocol::Tcp));
        assert!(!PortState::Filtered.is_retryable(Protocol::Udp));
        assert!(!PortState::OpenFiltered.is_retryable(Protocol::Udp));
        assert!(!PortState::OpenFiltered.is_retryable(Protocol::Tcp));
        assert!(!PortState::Closed.is_retryable(Protocol::Tcp));
        assert!(!PortState::Error.is_retryable(Protocol::Tcp));
    }

    #[test]
    fn test_protocol_order() {
        assert!(Protocol::Tcp < Protocol::Udp);
        assert_eq!(
            ProtocolSelection::Both.protocols(),
            &[Protocol::Tcp, Protocol::Udp]
        );
    }
}
