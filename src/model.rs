/// RiskLevel, ThresholdSet, Measurement, RiskScoreResult, NotificationRecord, HazardError
/// core data structures and error handling
///
/// Core data types for the hazard monitoring service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O: only types, their constructors, and the crate error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Ordinal risk level
// ---------------------------------------------------------------------------

/// Per-measurement risk level, in ascending order of severity.
///
/// The derived `Ord` is the total order `safe < watch < caution < danger`
/// used for max-of-two comparisons and for alert gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Watch,
    Caution,
    Danger,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Watch => "watch",
            RiskLevel::Caution => "caution",
            RiskLevel::Danger => "danger",
        }
    }

    /// Only `caution` and `danger` may trigger a notification.
    pub fn is_alertable(&self) -> bool {
        matches!(self, RiskLevel::Caution | RiskLevel::Danger)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// Ordered threshold triple `watch <= caution <= danger`.
///
/// The fields are private so the ordering can only be established through
/// [`ThresholdSet::new`]; deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds")]
pub struct ThresholdSet {
    watch: f64,
    caution: f64,
    danger: f64,
}

#[derive(Deserialize)]
struct RawThresholds {
    watch: f64,
    caution: f64,
    danger: f64,
}

impl TryFrom<RawThresholds> for ThresholdSet {
    type Error = HazardError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        ThresholdSet::new(raw.watch, raw.caution, raw.danger)
    }
}

impl ThresholdSet {
    /// Builds a threshold set, rejecting non-finite or decreasing values.
    pub fn new(watch: f64, caution: f64, danger: f64) -> Result<Self, HazardError> {
        if !(watch.is_finite() && caution.is_finite() && danger.is_finite()) {
            return Err(HazardError::Configuration(format!(
                "thresholds must be finite (watch={watch}, caution={caution}, danger={danger})"
            )));
        }
        if watch > caution || caution > danger {
            return Err(HazardError::Configuration(format!(
                "thresholds must satisfy watch <= caution <= danger \
                 (watch={watch}, caution={caution}, danger={danger})"
            )));
        }
        Ok(Self { watch, caution, danger })
    }

    /// Compile-time constructor for the built-in defaults, which are
    /// checked by the tests in `alert::thresholds`.
    pub(crate) const fn from_ordered(watch: f64, caution: f64, danger: f64) -> Self {
        Self { watch, caution, danger }
    }

    pub fn watch(&self) -> f64 {
        self.watch
    }

    pub fn caution(&self) -> f64 {
        self.caution
    }

    pub fn danger(&self) -> f64 {
        self.danger
    }
}

// ---------------------------------------------------------------------------
// Measurement types
// ---------------------------------------------------------------------------

/// Precipitation snapshot, in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainfallReading {
    #[serde(rename = "rainfall1h")]
    pub rainfall_1h: f64,
    #[serde(rename = "rainfall24h", default, skip_serializing_if = "Option::is_none")]
    pub rainfall_24h: Option<f64>,
}

/// River stage at one station, joined with that station's thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterLevelReading {
    #[serde(default)]
    pub station_name: String,
    pub current: f64,
    pub watch: f64,
    pub caution: f64,
    pub danger: f64,
}

impl WaterLevelReading {
    pub fn new(station_name: impl Into<String>, current: f64, thresholds: &ThresholdSet) -> Self {
        Self {
            station_name: station_name.into(),
            current,
            watch: thresholds.watch(),
            caution: thresholds.caution(),
            danger: thresholds.danger(),
        }
    }

    /// Re-validates the carried thresholds (readings may arrive over HTTP).
    pub fn thresholds(&self) -> Result<ThresholdSet, HazardError> {
        ThresholdSet::new(self.watch, self.caution, self.danger)
    }

    /// Current stage as a percentage of the danger stage, capped at 100.
    pub fn percent(&self) -> f64 {
        if self.danger <= 0.0 {
            return 100.0;
        }
        (self.current / self.danger * 100.0).clamp(0.0, 100.0)
    }
}

/// Wind snapshot, in metres per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindReading {
    pub speed: f64,
}

/// One active weather warning or advisory, identified by its title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningEntry {
    pub title: String,
}

/// One free-text advisory bulletin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryEntry {
    pub text: String,
}

/// Normalized measurement, tagged by monitored dimension.
///
/// Produced by the `ingest` normalizers; the core never sees raw feed shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Measurement {
    Rainfall(RainfallReading),
    WaterLevel(WaterLevelReading),
    Wind(WindReading),
    WarningList { warnings: Vec<WarningEntry> },
    AdvisoryText { advisories: Vec<AdvisoryEntry> },
}

/// Measurement types the notification monitor evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MonitorType {
    Rainfall,
    WaterLevel,
    Wind,
}

impl MonitorType {
    pub const ALL: [MonitorType; 3] = [MonitorType::Rainfall, MonitorType::WaterLevel, MonitorType::Wind];

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorType::Rainfall => "rainfall",
            MonitorType::WaterLevel => "waterLevel",
            MonitorType::Wind => "wind",
        }
    }
}

impl fmt::Display for MonitorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorType {
    type Err = HazardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rainfall" => Ok(MonitorType::Rainfall),
            "waterLevel" | "water_level" => Ok(MonitorType::WaterLevel),
            "wind" => Ok(MonitorType::Wind),
            other => Err(HazardError::Configuration(format!("unknown monitor type '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Composite score types
// ---------------------------------------------------------------------------

/// The five hazard factors, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreCategory {
    Warnings,
    Rainfall,
    WaterLevel,
    Wind,
    Keywords,
}

impl ScoreCategory {
    /// Maximum points the factor can contribute.
    pub fn cap(&self) -> u32 {
        match self {
            ScoreCategory::Warnings => 30,
            ScoreCategory::Rainfall => 25,
            ScoreCategory::WaterLevel => 25,
            ScoreCategory::Wind => 10,
            ScoreCategory::Keywords => 10,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ScoreCategory::Warnings => "⚠️",
            ScoreCategory::Rainfall => "🌧️",
            ScoreCategory::WaterLevel => "🌊",
            ScoreCategory::Wind => "💨",
            ScoreCategory::Keywords => "📢",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreCategory::Warnings => "warnings",
            ScoreCategory::Rainfall => "rainfall",
            ScoreCategory::WaterLevel => "waterLevel",
            ScoreCategory::Wind => "wind",
            ScoreCategory::Keywords => "keywords",
        }
    }
}

/// One contributing factor of the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetail {
    pub category: ScoreCategory,
    pub points: u32,
    pub reason: String,
    pub icon: String,
}

/// Coarse textual band of the 0–100 composite score.
///
/// Deliberately a separate type from [`RiskLevel`]: the two scales use
/// different breakpoints and are never converted into one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreBand {
    #[serde(rename = "safe")]
    Safe,
    #[serde(rename = "caution")]
    Caution,
    #[serde(rename = "dangerous")]
    Dangerous,
    #[serde(rename = "very dangerous")]
    VeryDangerous,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ScoreBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreBand::Safe => "safe",
            ScoreBand::Caution => "caution",
            ScoreBand::Dangerous => "dangerous",
            ScoreBand::VeryDangerous => "very dangerous",
            ScoreBand::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one aggregation pass. JSON shape is the public contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScoreResult {
    pub success: bool,
    pub total_score: u32,
    pub level: ScoreBand,
    pub details: Vec<ScoreDetail>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RiskScoreResult {
    /// Result returned when the aggregation as a whole faults.
    pub fn failed(timestamp: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            total_score: 0,
            level: ScoreBand::Unknown,
            details: Vec::new(),
            timestamp,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Notification types
// ---------------------------------------------------------------------------

/// Per-type notification switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeToggles {
    pub rainfall: bool,
    pub water_level: bool,
    pub wind: bool,
}

impl Default for TypeToggles {
    fn default() -> Self {
        Self {
            rainfall: true,
            water_level: true,
            wind: true,
        }
    }
}

impl TypeToggles {
    pub fn is_enabled(&self, kind: MonitorType) -> bool {
        match kind {
            MonitorType::Rainfall => self.rainfall,
            MonitorType::WaterLevel => self.water_level,
            MonitorType::Wind => self.wind,
        }
    }
}

/// User-supplied override values. Reaching one forces `danger`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOverrides {
    #[serde(rename = "rainfall1h", skip_serializing_if = "Option::is_none")]
    pub rainfall_1h: Option<f64>,
    #[serde(rename = "rainfall24h", skip_serializing_if = "Option::is_none")]
    pub rainfall_24h: Option<f64>,
    #[serde(rename = "waterLevel", skip_serializing_if = "Option::is_none")]
    pub water_level: Option<f64>,
    #[serde(rename = "windSpeed", skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
}

/// Notification preferences, owned by the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub types: TypeToggles,
    pub thresholds: ThresholdOverrides,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            types: TypeToggles::default(),
            thresholds: ThresholdOverrides::default(),
        }
    }
}

impl NotificationSettings {
    /// Rejects overrides that are negative or not finite.
    pub fn validate(&self) -> Result<(), HazardError> {
        let overrides = [
            ("rainfall1h", self.thresholds.rainfall_1h),
            ("rainfall24h", self.thresholds.rainfall_24h),
            ("waterLevel", self.thresholds.water_level),
            ("windSpeed", self.thresholds.wind_speed),
        ];
        for (name, value) in overrides {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(HazardError::Configuration(format!(
                        "threshold override '{name}' must be a non-negative number, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One fired alert, as kept in the notification history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MonitorType,
    pub level: RiskLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Why the monitor did or did not notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    NotificationsDisabled,
    NoData,
    TypeDisabled,
    SafeLevel,
    #[serde(rename = "duplicate_within_5min")]
    DuplicateWithin5Min,
    ThresholdExceeded,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::NotificationsDisabled => "notifications_disabled",
            DecisionReason::NoData => "no_data",
            DecisionReason::TypeDisabled => "type_disabled",
            DecisionReason::SafeLevel => "safe_level",
            DecisionReason::DuplicateWithin5Min => "duplicate_within_5min",
            DecisionReason::ThresholdExceeded => "threshold_exceeded",
        }
    }
}

/// Monitor verdict for one measurement snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub should_notify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    pub reason: DecisionReason,
}

impl Decision {
    pub fn suppressed(reason: DecisionReason) -> Self {
        Self {
            should_notify: false,
            risk_level: None,
            reason,
        }
    }

    pub fn at_level(should_notify: bool, level: RiskLevel, reason: DecisionReason) -> Self {
        Self {
            should_notify,
            risk_level: Some(level),
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised across the service.
///
/// Only `Configuration` is fatal; the others degrade the affected operation
/// and are logged or reported alongside an otherwise valid result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HazardError {
    /// A feed fetch failed or returned an unusable payload.
    #[error("data source '{source_name}' unavailable: {reason}")]
    DataSourceUnavailable { source_name: String, reason: String },

    /// Malformed thresholds, settings or service configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The history store could not be read or written.
    #[error("persistence fault: {0}")]
    Persistence(String),

    /// The notification channel rejected or failed to deliver an alert.
    #[error("dispatch fault: {0}")]
    Dispatch(String),

    /// A collaborator did not answer within its deadline.
    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: String, millis: u64 },

    /// Unexpected fault inside the aggregation pass.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HazardError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        HazardError::DataSourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
