//! Application settings and paths.
//!
//! Settings live in the XDG config directory and only supply defaults;
//! command-line flags always take precedence.

use super::profiles::{CustomProfile, TimingCatalog};
use crate::error::{ConfigError, ConfigResult};
use crate::types::TargetResolver;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/portsift)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the platform configuration directory.
    pub fn discover() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "portsift", "portsift")
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Timing profile used when none is given on the command line.
    pub timing_profile: String,
    /// Default output format (text, json, csv).
    pub output_format: String,
    /// Largest number of hosts the targets of one scan may expand to.
    pub max_hosts: u64,
    /// Banner read timeout in milliseconds.
    pub banner_timeout_ms: u64,
    /// Scan-wide deadline in seconds.
    pub deadline_secs: Option<u64>,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
    /// User-defined timing profiles.
    pub profiles: BTreeMap<String, CustomProfile>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timing_profile: "normal".to_string(),
            output_format: "text".to_string(),
            max_hosts: TargetResolver::DEFAULT_MAX_HOSTS,
            banner_timeout_ms: 1500,
            deadline_secs: None,
            log_level: "warn".to_string(),
            profiles: BTreeMap::new(),
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, or defaults if there is no
    /// settings file.
    pub fn load() -> ConfigResult<Self> {
        let file = match Paths::discover() {
            Ok(paths) => paths.settings_file(),
            Err(e) => {
                debug!(error = %e, "no config directory, using default settings");
                return Ok(Self::default());
            }
        };

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// The timing catalog built from the custom profiles in these settings.
    pub fn timing_catalog(&self) -> ConfigResult<TimingCatalog> {
        TimingCatalog::new(self.profiles.clone())
    }
}
