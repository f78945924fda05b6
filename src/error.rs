//! Error types for portsift.
//!
//! Uses `thiserror` for ergonomic error definitions. Only configuration and
//! input problems are errors; per-probe network faults are reported as port
//! states instead.

use crate::types::PortError;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed target or port expression. Always raised before any probing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid port expression: {0}")]
    Port(#[from] PortError),

    #[error("invalid target '{0}'")]
    InvalidTarget(String),

    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("empty target specification")]
    NoTargets,
}

/// Hostname or CIDR expansion failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("failed to resolve hostname '{host}': {reason}")]
    Lookup { host: String, reason: String },

    #[error("no IP addresses found for hostname '{0}'")]
    NoAddresses(String),

    #[error("CIDR block {block} expands to {hosts} hosts (max: {max})")]
    CidrTooLarge { block: String, hosts: u128, max: u64 },

    #[error("targets expand to {hosts} hosts in total (max: {max})")]
    TooManyHosts { hosts: usize, max: u64 },

    #[error("none of the {0} target expression(s) resolved to an address")]
    NoTargets(usize),
}

/// Invalid timing configuration or settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown timing profile '{0}'")]
    UnknownProfile(String),

    #[error("invalid override for {field}: {value} (must be positive)")]
    InvalidOverride { field: &'static str, value: u64 },

    #[error("custom profile '{0}' shadows a built-in profile")]
    ShadowedProfile(String),

    #[error("unknown output format '{0}'")]
    UnknownFormat(String),

    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read config file {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid config format: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}

/// Umbrella error for a scan invocation.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<PortError> for ScanError {
    fn from(err: PortError) -> Self {
        Self::Parse(ParseError::Port(err))
    }
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
