//! Configuration management for portsift.
//!
//! Provides the timing profile catalog and XDG-compliant application
//! settings.

mod profiles;
mod settings;

pub use profiles::{
    concurrency_ceiling, CustomProfile, TimingCatalog, TimingLimits, TimingOverrides,
    TimingProfile, MAX_CONCURRENCY_CEILING,
};
pub use settings::{AppSettings, Paths};
