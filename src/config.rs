/// Service configuration loader - parses hazmon.toml
///
/// Separates station thresholds, feed locations, keyword lists and channel
/// settings from code, so operators can retune the service without
/// recompiling it. Every threshold triple is validated here; a service with
/// a malformed configuration refuses to start.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{HazardError, ThresholdSet};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "hazmon.toml";

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service: ServiceSection,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default, rename = "water_station")]
    pub water_stations: Vec<WaterStationConfig>,
    #[serde(default)]
    pub feeds: FeedUrls,
    #[serde(default)]
    pub channel: ChannelConfig,
}

/// Scheduler, timeout and storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    /// Forecast-office / observation station id passed to the warning and
    /// advisory feeds.
    pub station_id: String,

    /// How often the scheduler runs a scoring + monitoring pass (default: 60 s)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Deadline for any single collaborator call (default: 5000 ms)
    #[serde(default = "default_collaborator_timeout_ms")]
    pub collaborator_timeout_ms: u64,

    /// JSON file mirroring the notification history; memory-only when absent.
    pub history_path: Option<PathBuf>,

    /// TOML file holding notification settings; memory-only when absent.
    pub settings_path: Option<PathBuf>,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_collaborator_timeout_ms() -> u64 {
    5_000
}

/// Marker and keyword lists used by the warning and advisory factors.
///
/// Matching is case-insensitive substring matching.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Title fragments that make a warning "severe" (+15).
    pub severe_markers: Vec<String>,
    /// Title fragments that make a warning an "advisory" (+10).
    pub advisory_markers: Vec<String>,
    /// Hazard keywords searched in advisory text (+2 each, distinct).
    pub hazard_keywords: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let to_vec = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            severe_markers: to_vec(&["warning", "emergency", "警報"]),
            advisory_markers: to_vec(&["advisory", "watch", "注意報"]),
            hazard_keywords: to_vec(&[
                "heavy rain",
                "flood",
                "landslide",
                "typhoon",
                "tornado",
                "evacuation",
                "overflow",
                "thunderstorm",
                "high wind",
                "大雨",
                "洪水",
                "土砂",
                "暴風",
                "台風",
                "竜巻",
                "避難",
                "氾濫",
            ]),
        }
    }
}

/// River gauge thresholds (the water-level station registry).
#[derive(Debug, Clone, Deserialize)]
pub struct WaterStationConfig {
    pub name: String,
    pub watch: f64,
    pub caution: f64,
    pub danger: f64,
}

/// Optional upstream feed URLs. `{station}` is replaced by the
/// URL-encoded station id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedUrls {
    pub warnings: Option<String>,
    pub nowcast: Option<String>,
    pub water_level: Option<String>,
    pub advisories: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Log,
    PubSub,
}

/// Where fired alerts are delivered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub kind: ChannelKind,
    /// Publish URL; `{topic}` is replaced by the URL-encoded `topic`.
    pub url: Option<String>,
    pub topic: Option<String>,
    /// Bearer token; `HAZMON_CHANNEL_TOKEN` takes precedence when set.
    pub token: Option<String>,
}

/// Loads and validates the service configuration.
///
/// # Errors
/// `HazardError::Configuration` when the file is missing, malformed, or
/// contains thresholds that are not non-decreasing.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServiceConfig, HazardError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        HazardError::Configuration(format!("failed to read {}: {}", path.display(), e))
    })?;
    parse_config(&contents)
        .map_err(|e| HazardError::Configuration(format!("{}: {}", path.display(), e)))
}

/// Parses and validates configuration text.
pub fn parse_config(contents: &str) -> Result<ServiceConfig, HazardError> {
    let config: ServiceConfig = toml::from_str(contents)
        .map_err(|e| HazardError::Configuration(format!("failed to parse configuration: {}", e)))?;
    config.validate()?;
    Ok(config)
}

impl ServiceConfig {
    fn validate(&self) -> Result<(), HazardError> {
        if self.service.station_id.trim().is_empty() {
            return Err(HazardError::Configuration("service.station_id must not be empty".into()));
        }
        if self.service.poll_interval_secs == 0 {
            return Err(HazardError::Configuration("service.poll_interval_secs must be positive".into()));
        }
        if self.service.collaborator_timeout_ms == 0 {
            return Err(HazardError::Configuration(
                "service.collaborator_timeout_ms must be positive".into(),
            ));
        }

        let mut seen = HashSet::new();
        for station in &self.water_stations {
            if !seen.insert(station.name.as_str()) {
                return Err(HazardError::Configuration(format!(
                    "duplicate water_station '{}'",
                    station.name
                )));
            }
            ThresholdSet::try_from(station).map_err(|e| {
                HazardError::Configuration(format!("water_station '{}': {}", station.name, e))
            })?;
        }

        if self.channel.kind == ChannelKind::PubSub && self.channel.url.is_none() {
            return Err(HazardError::Configuration("channel.url is required for kind = \"pubsub\"".into()));
        }
        Ok(())
    }
}

/// Converts a configured station into the validated threshold type used by
/// the classifier.
impl TryFrom<&WaterStationConfig> for ThresholdSet {
    type Error = HazardError;

    fn try_from(config: &WaterStationConfig) -> Result<Self, Self::Error> {
        ThresholdSet::new(config.watch, config.caution, config.danger)
    }
}
