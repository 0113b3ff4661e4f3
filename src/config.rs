use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::usage::UsagePolicy;

const DEFAULT_TIMEZONE: &str = "America/New_York";
const DEFAULT_GRACE_MINUTES: i64 = 10;
const DEFAULT_STALENESS_HOURS: i64 = 36;
const DEFAULT_OFF_THRESHOLD: f64 = 7.0;
const DEFAULT_ENERGY_EPSILON: f64 = 0.001;
const DEFAULT_GUEST_ZONE: &str = "Guest Room";
const DEFAULT_PRIMARY_ZONES: [&str; 2] = ["Master", "LR"];
const DEFAULT_EXCLUDED_ZONES: [&str; 1] = ["Hallway"];

/// The fixed zone roster, in display order.
pub const DEFAULT_ZONE_ROSTER: [&str; 12] = [
    "Stairs",
    "LR",
    "Kitchen",
    "Up Bath",
    "MANC",
    "Master",
    "Den",
    "Guest Hall",
    "Laundry",
    "Guest Bath",
    "Entryway",
    "Guest Room",
];

pub(crate) fn overrides_path() -> Option<PathBuf> {
    env_optional_string("HEATLEDGER_CONFIG_PATH").map(PathBuf::from)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigOverrides {
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    midnight_grace_minutes: Option<i64>,
    #[serde(default)]
    staleness_hours: Option<i64>,
    #[serde(default)]
    off_threshold: Option<f64>,
    #[serde(default)]
    energy_epsilon: Option<f64>,
    #[serde(default)]
    guest_zone: Option<String>,
    #[serde(default)]
    primary_zones: Option<[String; 2]>,
    #[serde(default)]
    excluded_zones: Option<Vec<String>>,
    #[serde(default)]
    zone_roster: Option<Vec<String>>,
}

fn load_overrides() -> Option<ConfigOverrides> {
    let path = overrides_path()?;
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read config overrides; using env defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse config overrides; using env defaults"
            );
            None
        }
    }
}

/// Every tunable the rollup exposes, with documented defaults. Resolution
/// order: JSON overrides file (HEATLEDGER_CONFIG_PATH), then environment,
/// then the defaults above.
#[derive(Debug, Clone)]
pub struct RollupConfig {
    pub timezone: Tz,
    pub midnight_grace_minutes: i64,
    pub staleness_hours: i64,
    pub off_threshold: f64,
    pub energy_epsilon: f64,
    pub guest_zone: String,
    pub primary_zones: [String; 2],
    pub excluded_zones: BTreeSet<String>,
    pub zone_roster: Vec<String>,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            midnight_grace_minutes: DEFAULT_GRACE_MINUTES,
            staleness_hours: DEFAULT_STALENESS_HOURS,
            off_threshold: DEFAULT_OFF_THRESHOLD,
            energy_epsilon: DEFAULT_ENERGY_EPSILON,
            guest_zone: DEFAULT_GUEST_ZONE.to_string(),
            primary_zones: DEFAULT_PRIMARY_ZONES.map(String::from),
            excluded_zones: DEFAULT_EXCLUDED_ZONES
                .into_iter()
                .map(String::from)
                .collect(),
            zone_roster: DEFAULT_ZONE_ROSTER.into_iter().map(String::from).collect(),
        }
    }
}

impl RollupConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        let timezone_name = env_string("HEATLEDGER_TIMEZONE", DEFAULT_TIMEZONE);
        config.timezone = timezone_name
            .parse::<Tz>()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("HEATLEDGER_TIMEZONE is not an IANA zone: {timezone_name}"))?;

        config.midnight_grace_minutes =
            env_i64("HEATLEDGER_GRACE_MINUTES", DEFAULT_GRACE_MINUTES).max(0);
        config.staleness_hours = env_i64("HEATLEDGER_STALENESS_HOURS", DEFAULT_STALENESS_HOURS).max(1);
        config.off_threshold = env_f64("HEATLEDGER_OFF_THRESHOLD", DEFAULT_OFF_THRESHOLD);
        config.energy_epsilon = env_f64("HEATLEDGER_ENERGY_EPSILON", DEFAULT_ENERGY_EPSILON).max(0.0);
        config.guest_zone = env_string("HEATLEDGER_GUEST_ZONE", DEFAULT_GUEST_ZONE);
        if let Some(list) = env_zone_list("HEATLEDGER_PRIMARY_ZONES") {
            match <[String; 2]>::try_from(list) {
                Ok(pair) => config.primary_zones = pair,
                Err(list) => {
                    anyhow::bail!(
                        "HEATLEDGER_PRIMARY_ZONES must name exactly two zones, got {}",
                        list.len()
                    );
                }
            }
        }
        if let Some(list) = env_zone_list("HEATLEDGER_EXCLUDED_ZONES") {
            config.excluded_zones = list.into_iter().collect();
        }
        if let Some(list) = env_zone_list("HEATLEDGER_ZONE_ROSTER") {
            config.zone_roster = list;
        }

        if let Some(overrides) = load_overrides() {
            apply_overrides(&mut config, overrides)?;
        }

        if config.zone_roster.is_empty() {
            anyhow::bail!("zone roster resolved to an empty list");
        }
        Ok(config)
    }

    pub fn midnight_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.midnight_grace_minutes)
    }

    pub fn staleness(&self) -> chrono::Duration {
        chrono::Duration::hours(self.staleness_hours)
    }

    pub fn usage_policy(&self) -> UsagePolicy {
        UsagePolicy {
            off_threshold: self.off_threshold,
            energy_epsilon: self.energy_epsilon,
            guest_zone: self.guest_zone.clone(),
            primary_zones: self.primary_zones.clone(),
        }
    }
}

fn apply_overrides(config: &mut RollupConfig, overrides: ConfigOverrides) -> Result<()> {
    if let Some(name) = overrides
        .timezone
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        config.timezone = name
            .parse::<Tz>()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("overrides timezone is not an IANA zone: {name}"))?;
    }
    if let Some(minutes) = overrides.midnight_grace_minutes {
        config.midnight_grace_minutes = minutes.max(0);
    }
    if let Some(hours) = overrides.staleness_hours {
        config.staleness_hours = hours.max(1);
    }
    if let Some(threshold) = overrides.off_threshold {
        config.off_threshold = threshold;
    }
    if let Some(epsilon) = overrides.energy_epsilon {
        config.energy_epsilon = epsilon.max(0.0);
    }
    if let Some(zone) = overrides
        .guest_zone
        .map(|z| z.trim().to_string())
        .filter(|z| !z.is_empty())
    {
        config.guest_zone = zone;
    }
    if let Some(pair) = overrides.primary_zones {
        config.primary_zones = pair;
    }
    if let Some(zones) = overrides.excluded_zones {
        config.excluded_zones = zones.into_iter().collect();
    }
    if let Some(roster) = overrides.zone_roster {
        config.zone_roster = roster;
    }
    Ok(())
}

fn env_string(key: &str, default: &str) -> String {
    env_optional_string(key).unwrap_or_else(|| default.to_string())
}

fn env_optional_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
}

fn env_zone_list(key: &str) -> Option<Vec<String>> {
    let raw = env_optional_string(key)?;
    let zones: Vec<String> = raw
        .split(',')
        .map(|z| z.trim().to_string())
        .filter(|z| !z.is_empty())
        .collect();
    if zones.is_empty() {
        None
    } else {
        Some(zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_match_documented_values() {
        let config = RollupConfig::default();
        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert_eq!(config.midnight_grace_minutes, 10);
        assert_eq!(config.staleness_hours, 36);
        assert_eq!(config.off_threshold, 7.0);
        assert_eq!(config.energy_epsilon, 0.001);
        assert_eq!(config.guest_zone, "Guest Room");
        assert_eq!(config.zone_roster.len(), 12);
        assert!(config.excluded_zones.contains("Hallway"));
    }

    #[test]
    fn overrides_file_applies_on_top_of_defaults() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            r#"{{"off_threshold": 0.0, "staleness_hours": 48, "excluded_zones": []}}"#
        )?;

        let mut config = RollupConfig::default();
        let overrides: ConfigOverrides =
            serde_json::from_str(&std::fs::read_to_string(file.path())?)?;
        apply_overrides(&mut config, overrides)?;
        assert_eq!(config.off_threshold, 0.0);
        assert_eq!(config.staleness_hours, 48);
        assert!(config.excluded_zones.is_empty());
        // Untouched fields keep their defaults.
        assert_eq!(config.midnight_grace_minutes, 10);
        Ok(())
    }

    #[test]
    fn bad_override_timezone_is_an_error() {
        let mut config = RollupConfig::default();
        let overrides = ConfigOverrides {
            timezone: Some("Not/AZone".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut config, overrides).is_err());
    }
}
