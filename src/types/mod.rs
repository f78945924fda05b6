//! Core type definitions using newtype patterns for type safety.
//!
//! These types prevent common logic errors by making invalid states unrepresentable
//! at compile time.

mod port;
mod protocol;
mod scan_id;
mod target;

pub use port::{Port, PortError, PortRange, PortSpec};
pub use protocol::{PortState, Protocol, ProtocolSelection};
pub use scan_id::ScanId;
pub use target::{DnsLookup, HostLookup, Target, TargetAddr, TargetResolver, TargetSpec};
