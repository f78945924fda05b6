//! Profiles subcommand implementation.
//!
//! Handles the `portsift profiles` command for inspecting timing profiles.

use crate::config::{AppSettings, TimingLimits, TimingOverrides, TimingProfile};
use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

/// List or inspect timing profiles.
#[derive(Parser, Debug)]
pub struct ProfilesCommand {
    #[command(subcommand)]
    pub action: Option<ProfilesAction>,
}

/// Profile actions.
#[derive(Subcommand, Debug)]
pub enum ProfilesAction {
    /// List built-in and custom profiles (default)
    List,

    /// Show the effective limits of a profile
    Show {
        /// Profile name or level (e.g. "polite", "T4")
        name: String,
    },
}

impl ProfilesCommand {
    /// Execute the profiles command.
    pub fn execute(&self, settings: &AppSettings) -> Result<()> {
        match &self.action {
            None | Some(ProfilesAction::List) => list_profiles(settings),
            Some(ProfilesAction::Show { name }) => show_profile(settings, name),
        }
    }
}

fn list_profiles(settings: &AppSettings) -> Result<()> {
    let catalog = settings.timing_catalog()?;

    println!(
        "\n{:<15} {:>11} {:>9} {:>8} {:<7} {}",
        "NAME", "CONCURRENCY", "TIMEOUT", "DELAY", "JITTER", "DESCRIPTION"
    );
    println!("{}", "-".repeat(80));

    for profile in TimingProfile::ALL {
        print_row(&profile.to_string(), &profile.limits(), profile.description());
    }
    for (name, custom) in catalog.custom_profiles() {
        let limits = catalog.resolve(name, &TimingOverrides::default())?;
        let description = if custom.description.is_empty() {
            format!("custom, based on {}", custom.base)
        } else {
            custom.description.clone()
        };
        print_row(name, &limits, &description);
    }

    println!();
    Ok(())
}

fn print_row(name: &str, limits: &TimingLimits, description: &str) {
    println!(
        "{:<15} {:>11} {:>7}ms {:>6}ms {:<7} {}",
        name,
        limits.max_concurrent_probes,
        limits.probe_timeout.as_millis(),
        limits.inter_probe_delay.as_millis(),
        if limits.jitter { "yes" } else { "no" },
        description
    );
}

fn show_profile(settings: &AppSettings, name: &str) -> Result<()> {
    let limits = settings
        .timing_catalog()?
        .resolve(name, &TimingOverrides::default())?;

    println!("\n{} {}", style("Profile:").bold(), name);
    println!("{}", "=".repeat(40));
    println!("Concurrency:  {}", limits.max_concurrent_probes);
    println!("Timeout:      {} ms", limits.probe_timeout.as_millis());
    println!("Delay:        {} ms", limits.inter_probe_delay.as_millis());
    println!("Jitter:       {}", if limits.jitter { "yes" } else { "no" });
    println!("Retries:      {}", limits.max_retries);
    println!(
        "Rate Limit:   {}",
        match limits.max_rate {
            Some(rate) => format!("{} probes/s", rate),
            None => "unlimited".to_string(),
        }
    );
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_unknown_profile_fails() {
        let err = show_profile(&AppSettings::default(), "ludicrous").unwrap_err();
        assert!(err.to_string().contains("ludicrous"));
    }

    #[test]
    fn test_list_with_custom_profiles() {
        let settings: AppSettings = serde_json::from_str(
            r#"{"profiles": {"lab": {"base": "polite", "concurrency": 12}}}"#,
        )
        .unwrap();
        assert!(list_profiles(&settings).is_ok());
        assert!(show_profile(&settings, "lab").is_ok());
    }
}
