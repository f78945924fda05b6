//! Timing profiles.
//!
//! A profile bundles concurrency, timeout and pacing settings that trade
//! scan speed against detectability and reliability. Explicit overrides
//! always win over the named profile.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Hard upper bound on concurrent probes, whatever the profile asks for.
pub const MAX_CONCURRENCY_CEILING: usize = 4096;

/// File descriptors kept free for the runtime, resolver and output.
const RESERVED_FDS: u64 = 64;

/// Built-in timing profiles, slowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingProfile {
    Paranoid,
    Sneaky,
    Polite,
    Normal,
    Aggressive,
    Insane,
}

impl TimingProfile {
    pub const ALL: [TimingProfile; 6] = [
        Self::Paranoid,
        Self::Sneaky,
        Self::Polite,
        Self::Normal,
        Self::Aggressive,
        Self::Insane,
    ];

    /// Concrete limits for this profile.
    pub const fn limits(self) -> TimingLimits {
        let (concurrency, timeout_ms, delay_ms, jitter) = match self {
            Self::Paranoid => (1, 5000, 5000, true),
            Self::Sneaky => (4, 3000, 1000, true),
            Self::Polite => (32, 2000, 400, false),
            Self::Normal => (500, 3000, 0, false),
            Self::Aggressive => (1500, 1250, 0, false),
            Self::Insane => (5000, 500, 0, false),
        };
        TimingLimits {
            max_concurrent_probes: concurrency,
            probe_timeout: Duration::from_millis(timeout_ms),
            inter_probe_delay: Duration::from_millis(delay_ms),
            jitter,
            max_retries: 1,
            max_rate: None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Paranoid => "Serial probes, 5s apart with jitter",
            Self::Sneaky => "A handful of workers, 1s jittered pacing",
            Self::Polite => "Light load on the target network",
            Self::Normal => "Balanced default",
            Self::Aggressive => "Fast networks, shorter timeouts",
            Self::Insane => "LAN speed, very short timeouts",
        }
    }
}

impl fmt::Display for TimingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Paranoid => "paranoid",
            Self::Sneaky => "sneaky",
            Self::Polite => "polite",
            Self::Normal => "normal",
            Self::Aggressive => "aggressive",
            Self::Insane => "insane",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TimingProfile {
    type Err = ConfigError;

    /// Accepts profile names and nmap-style levels (`T0`..`T5`, `0`..`5`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let level = name.strip_prefix('t').unwrap_or(&name);
        match (name.as_str(), level) {
            ("paranoid", _) | (_, "0") => Ok(Self::Paranoid),
            ("sneaky", _) | (_, "1") => Ok(Self::Sneaky),
            ("polite", _) | (_, "2") => Ok(Self::Polite),
            ("normal", _) | (_, "3") => Ok(Self::Normal),
            ("aggressive", _) | (_, "4") => Ok(Self::Aggressive),
            ("insane", _) | (_, "5") => Ok(Self::Insane),
            _ => Err(ConfigError::UnknownProfile(s.to_string())),
        }
    }
}

/// Effective timing limits for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingLimits {
    /// Worker pool size.
    pub max_concurrent_probes: usize,
    /// Bound on a single probe.
    pub probe_timeout: Duration,
    /// Pause a worker takes between its probes.
    pub inter_probe_delay: Duration,
    /// Randomize the pause within +/-50%.
    pub jitter: bool,
    /// Extra attempts for a TCP `filtered` outcome.
    pub max_retries: u32,
    /// Global probes-per-second cap.
    pub max_rate: Option<NonZeroU32>,
}

impl Default for TimingLimits {
    fn default() -> Self {
        TimingProfile::Normal.limits()
    }
}

/// Explicit values that take precedence over a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingOverrides {
    pub concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub delay_ms: Option<u64>,
    pub jitter: Option<bool>,
    pub retries: Option<u32>,
    pub max_rate: Option<u32>,
}

impl TimingOverrides {
    /// Apply these overrides on top of `limits`.
    pub fn apply(&self, mut limits: TimingLimits) -> ConfigResult<TimingLimits> {
        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                return Err(ConfigError::InvalidOverride {
                    field: "concurrency",
                    value: 0,
                });
            }
            limits.max_concurrent_probes = concurrency;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms == 0 {
                return Err(ConfigError::InvalidOverride {
                    field: "timeout",
                    value: 0,
                });
            }
            limits.probe_timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(delay_ms) = self.delay_ms {
            limits.inter_probe_delay = Duration::from_millis(delay_ms);
        }
        if let Some(jitter) = self.jitter {
            limits.jitter = jitter;
        }
        if let Some(retries) = self.retries {
            limits.max_retries = retries;
        }
        if let Some(rate) = self.max_rate {
            let rate = NonZeroU32::new(rate).ok_or(ConfigError::InvalidOverride {
                field: "max_rate",
                value: 0,
            })?;
            limits.max_rate = Some(rate);
        }
        Ok(limits)
    }
}

/// A user-defined profile from the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProfile {
    /// Built-in profile this one starts from.
    pub base: TimingProfile,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub overrides: TimingOverrides,
}

/// Built-in profiles plus any custom ones, resolvable by name.
#[derive(Debug, Clone, Default)]
pub struct TimingCatalog {
    custom: BTreeMap<String, CustomProfile>,
}

impl TimingCatalog {
    /// Build a catalog, rejecting custom names that shadow built-ins.
    pub fn new(custom: BTreeMap<String, CustomProfile>) -> ConfigResult<Self> {
        let mut normalized = BTreeMap::new();
        for (name, profile) in custom {
            if name.parse::<TimingProfile>().is_ok() {
                return Err(ConfigError::ShadowedProfile(name));
            }
            normalized.insert(name.to_ascii_lowercase(), profile);
        }
        Ok(Self { custom: normalized })
    }

    pub fn custom_profiles(&self) -> impl Iterator<Item = (&str, &CustomProfile)> {
        self.custom.iter().map(|(name, profile)| (name.as_str(), profile))
    }

    /// Map a profile name plus overrides to effective limits.
    pub fn resolve(&self, name: &str, overrides: &TimingOverrides) -> ConfigResult<TimingLimits> {
        let limits = match name.parse::<TimingProfile>() {
            Ok(profile) => profile.limits(),
            Err(unknown) => {
                let custom = self
                    .custom
                    .get(&name.trim().to_ascii_lowercase())
                    .ok_or(unknown)?;
                custom.overrides.apply(custom.base.limits())?
            }
        };
        let mut limits = overrides.apply(limits)?;

        let ceiling = concurrency_ceiling();
        if limits.max_concurrent_probes > ceiling {
            warn!(
                requested = limits.max_concurrent_probes,
                ceiling, "clamping concurrency to the safety ceiling"
            );
            limits.max_concurrent_probes = ceiling;
        }
        Ok(limits)
    }
}

/// The concurrency ceiling for this process: the hard cap, further limited
/// by the open-file soft limit where one is known.
pub fn concurrency_ceiling() -> usize {
    match open_file_limit() {
        Some(limit) => {
            let usable = limit.saturating_sub(RESERVED_FDS).max(1);
            MAX_CONCURRENCY_CEILING.min(usize::try_from(usable).unwrap_or(usize::MAX))
        }
        None => MAX_CONCURRENCY_CEILING,
    }
}

#[cfg(unix)]
fn open_file_limit() -> Option<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit only writes into the struct we pass.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    if rc == 0 && limit.rlim_cur != libc::RLIM_INFINITY {
        Some(limit.rlim_cur as u64)
    } else {
        None
    }
}

#[cfg(not(unix))]
fn open_file_limit() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_names_and_levels() {
        assert_eq!("paranoid".parse::<TimingProfile>().unwrap(), TimingProfile::Paranoid);
        assert_eq!("Normal".parse::<TimingProfile>().unwrap(), TimingProfile::Normal);
        assert_eq!("T4".parse::<TimingProfile>().unwrap(), TimingProfile::Aggressive);
        assert_eq!("5".parse::<TimingProfile>().unwrap(), TimingProfile::Insane);
        for profile in TimingProfile::ALL {
            assert_eq!(profile.to_string().parse::<TimingProfile>().unwrap(), profile);
        }
    }

    #[test]
    fn test_unknown_profile() {
        let catalog = TimingCatalog::default();
        let err = catalog
            .resolve("ludicrous", &TimingOverrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(name) if name == "ludicrous"));
        assert!("t9".parse::<TimingProfile>().is_err());
    }

    #[test]
    fn test_profiles_slow_down_monotonically() {
        let limits: Vec<TimingLimits> = TimingProfile::ALL.iter().map(|p| p.limits()).collect();
        for pair in limits.windows(2) {
            assert!(pair[0].max_concurrent_probes <= pair[1].max_concurrent_probes);
            assert!(pair[0].inter_probe_delay >= pair[1].inter_probe_delay);
        }
        assert!(TimingProfile::Paranoid.limits().jitter);
        assert!(!TimingProfile::Normal.limits().jitter);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = TimingOverrides {
            concurrency: Some(8),
            timeout_ms: Some(250),
            delay_ms: Some(20),
            jitter: Some(true),
            retries: Some(3),
            max_rate: Some(50),
        };
        let limits = TimingCatalog::default().resolve("polite", &overrides).unwrap();
        assert_eq!(limits.max_concurrent_probes, 8);
        assert_eq!(limits.probe_timeout, Duration::from_millis(250));
        assert_eq!(limits.inter_probe_delay, Duration::from_millis(20));
        assert!(limits.jitter);
        assert_eq!(limits.max_retries, 3);
        assert_eq!(limits.max_rate, NonZeroU32::new(50));
    }

    #[test]
    fn test_non_positive_overrides_rejected() {
        let catalog = TimingCatalog::default();
        for overrides in [
            TimingOverrides {
                concurrency: Some(0),
                ..Default::default()
            },
            TimingOverrides {
                timeout_ms: Some(0),
                ..Default::default()
            },
            TimingOverrides {
                max_rate: Some(0),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                catalog.resolve("normal", &overrides),
                Err(ConfigError::InvalidOverride { value: 0, .. })
            ));
        }

        let zero_delay = TimingOverrides {
            delay_ms: Some(0),
            ..Default::default()
        };
        assert!(catalog.resolve("sneaky", &zero_delay).is_ok());
    }

    #[test]
    fn test_concurrency_is_clamped() {
        let catalog = TimingCatalog::default();
        let limits = catalog
            .resolve(
                "insane",
                &TimingOverrides {
                    concurrency: Some(1_000_000),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(limits.max_concurrent_probes <= MAX_CONCURRENCY_CEILING);
        assert_eq!(limits.max_concurrent_probes, concurrency_ceiling());
    }

    #[test]
    fn test_custom_profiles() {
        let mut custom = BTreeMap::new();
        custom.insert(
            "Lab".to_string(),
            CustomProfile {
                base: TimingProfile::Polite,
                description: "office lab".to_string(),
                overrides: TimingOverrides {
                    concurrency: Some(10),
                    ..Default::default()
                },
            },
        );
        let catalog = TimingCatalog::new(custom).unwrap();

        let limits = catalog.resolve("lab", &TimingOverrides::default()).unwrap();
        assert_eq!(limits.max_concurrent_probes, 10);
        assert_eq!(limits.inter_probe_delay, Duration::from_millis(400));

        let limits = catalog
            .resolve(
                "LAB",
                &TimingOverrides {
                    concurrency: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(limits.max_concurrent_probes, 2);
    }

    #[test]
    fn test_custom_profile_cannot_shadow_builtin() {
        let mut custom = BTreeMap::new();
        custom.insert(
            "T3".to_string(),
            CustomProfile {
                base: TimingProfile::Normal,
                description: String::new(),
                overrides: TimingOverrides::default(),
            },
        );
        assert!(matches!(
            TimingCatalog::new(custom),
            Err(ConfigError::ShadowedProfile(_))
        ));
    }

    #[test]
    fn test_custom_profile_deserialization() {
        let json = r#"{"base": "sneaky", "description": "slow", "delay_ms": 2500, "jitter": false}"#;
        let profile: CustomProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.base, TimingProfile::Sneaky);
        assert_eq!(profile.overrides.delay_ms, Some(2500));
        assert_eq!(profile.overrides.jitter, Some(false));
        assert_eq!(profile.overrides.concurrency, None);
    }
}
