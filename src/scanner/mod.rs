//! Probe engine and scan orchestration.
//!
//! This module provides TCP and UDP probers behind a common trait, the
//! timing controller that paces them, and the scheduler that runs a worker
//! pool over every (target, port, protocol) pair of a scan session.

pub mod aggregator;
pub mod engine;
pub mod rate_limiter;
pub(crate) mod scheduler;
pub mod session;
pub mod tcp;
pub mod timing;
pub mod traits;
pub mod udp;

pub use aggregator::{Aggregator, ScanKey, ScanStats};
pub use engine::ProbeEngine;
pub use rate_limiter::RateLimiter;
pub use session::{ScanReport, ScanRequest, ScanSession, ScanStatus};
pub use tcp::TcpConnectProber;
pub use timing::TimingController;
pub use traits::{ProbeOutcome, ProbeResult, Prober};
pub use udp::UdpProber;
