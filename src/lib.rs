//! # portsift - a concurrent TCP/UDP port scanner
//!
//! portsift probes (target, port, protocol) pairs with a bounded worker pool,
//! classifies each as open, closed, filtered, open|filtered or error, and can
//! identify the services behind open ports.
//!
//! ## Features
//!
//! - **Flexible Targeting**: IPs, hostnames, CIDR ranges, IPv4 and IPv6
//! - **TCP and UDP**: Connect probes and payload-driven UDP probes
//! - **Timing Profiles**: From paranoid to insane, with per-value overrides
//! - **Cancellation**: Deadlines and external cancellation keep partial results
//! - **Fingerprinting**: Banner signatures with confidence levels
//! - **Output Formats**: Text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portsift::config::TimingCatalog;
//! use portsift::scanner::{ScanRequest, ScanSession};
//! use portsift::types::TargetResolver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let request = ScanRequest::new(vec!["192.168.1.1".into()], "22,80,443");
//!     let resolver = TargetResolver::system(TargetResolver::DEFAULT_MAX_HOSTS);
//!     let session = ScanSession::prepare(&request, &TimingCatalog::default(), &resolver).await?;
//!
//!     let report = session.run().await;
//!     for result in report.open_ports() {
//!         println!("{}/{} is {}", result.port, result.protocol, result.state);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, targets, protocols and target resolution
//! - [`config`] - Timing profiles and application settings
//! - [`scanner`] - Probers, timing, scheduling and result aggregation
//! - [`fingerprint`] - Service identification from banners
//! - [`output`] - Text, JSON and CSV rendering
//! - [`error`] - Error types

pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod output;
pub mod scanner;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use error::{ConfigError, ParseError, ResolutionError, ScanError};
pub use fingerprint::{Confidence, ServiceInfo};
pub use scanner::{ProbeResult, Prober, ScanReport, ScanRequest, ScanSession, ScanStatus};
pub use types::{Port, PortSpec, PortState, Protocol, ScanId, Target, TargetSpec};
