//! The five sub-score calculators.
//!
//! Each calculator is a pure function of one normalized feed value and
//! returns a [`FactorScore`] bounded by its category cap. A factor that
//! contributes nothing carries no detail, so the breakdown only lists the
//! hazards that actually moved the score.

use std::collections::BTreeSet;

use crate::alert::thresholds::classify;
use crate::config::ScoringConfig;
use crate::model::{
    AdvisoryEntry, RiskLevel, ScoreCategory, ScoreDetail, WarningEntry, WaterLevelReading,
};

/// Points for a severe warning title.
pub const SEVERE_WARNING_POINTS: u32 = 15;
/// Points for an advisory title.
pub const ADVISORY_POINTS: u32 = 10;
/// Points per distinct hazard keyword in advisory text.
pub const KEYWORD_POINTS: u32 = 2;

/// Hourly rainfall bands (mm/h → points), descending.
const RAINFALL_BANDS: [(f64, u32); 4] = [(50.0, 25), (30.0, 20), (15.0, 15), (5.0, 10)];

/// Wind speed bands (m/s → points), descending.
const WIND_BANDS: [(f64, u32); 3] = [(14.0, 10), (10.0, 7), (7.0, 4)];

/// Score contributed by one factor.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorScore {
    pub score: u32,
    pub detail: Option<ScoreDetail>,
}

impl FactorScore {
    /// No contribution, e.g. when the feed was unavailable.
    pub fn zero() -> Self {
        Self {
            score: 0,
            detail: None,
        }
    }

    /// Caps `points` to the category and attaches a detail when non-zero.
    fn new(category: ScoreCategory, points: u32, reason: impl FnOnce() -> String) -> Self {
        let score = points.min(category.cap());
        if score == 0 {
            return Self::zero();
        }
        Self {
            score,
            detail: Some(ScoreDetail {
                category,
                points: score,
                reason: reason(),
                icon: category.icon().to_string(),
            }),
        }
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| !n.is_empty() && haystack.contains(&n.to_lowercase()))
}

fn band_points(value: f64, bands: &[(f64, u32)]) -> u32 {
    bands
        .iter()
        .find(|(floor, _)| value >= *floor)
        .map(|(_, points)| *points)
        .unwrap_or(0)
}

/// Active warnings: +15 per severe title, +10 per advisory title.
///
/// Scanning stops as soon as the cap is reached; titles matching neither
/// marker list contribute nothing.
pub fn score_warnings(warnings: &[WarningEntry], config: &ScoringConfig) -> FactorScore {
    let cap = ScoreCategory::Warnings.cap();
    let mut points = 0;
    let mut counted = Vec::new();

    for warning in warnings {
        if points >= cap {
            break;
        }
        let title = warning.title.to_lowercase();
        let value = if contains_any(&title, &config.severe_markers) {
            SEVERE_WARNING_POINTS
        } else if contains_any(&title, &config.advisory_markers) {
            ADVISORY_POINTS
        } else {
            continue;
        };
        points += value;
        counted.push(warning.title.as_str());
    }

    FactorScore::new(ScoreCategory::Warnings, points, || {
        format!("{} in effect: {}", counted.len(), counted.join(", "))
    })
}

/// Hourly rainfall banding: ≥50→25, ≥30→20, ≥15→15, ≥5→10.
pub fn score_rainfall(rainfall_1h: f64) -> FactorScore {
    FactorScore::new(ScoreCategory::Rainfall, band_points(rainfall_1h, &RAINFALL_BANDS), || {
        format!("Hourly rainfall {:.1} mm/h", rainfall_1h)
    })
}

/// Points for one gauge, staged by its own thresholds.
fn water_level_points(level: RiskLevel) -> u32 {
    match level {
        RiskLevel::Danger => 25,
        RiskLevel::Caution => 18,
        RiskLevel::Watch => 10,
        RiskLevel::Safe => 0,
    }
}

/// River stage: the most threatened gauge sets the factor.
///
/// Readings whose thresholds fail validation are ignored.
pub fn score_water_level(readings: &[WaterLevelReading]) -> FactorScore {
    let worst = readings
        .iter()
        .filter_map(|r| {
            let thresholds = r.thresholds().ok()?;
            let level = classify(r.current, &thresholds);
            Some((water_level_points(level), level, r))
        })
        .max_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.2.percent().partial_cmp(&b.2.percent()).unwrap_or(std::cmp::Ordering::Equal))
        });

    match worst {
        Some((points, level, reading)) => FactorScore::new(ScoreCategory::WaterLevel, points, || {
            format!(
                "{}: {:.2} ({:.0}% of danger stage, {})",
                reading.station_name,
                reading.current,
                reading.percent(),
                level
            )
        }),
        None => FactorScore::zero(),
    }
}

/// Wind banding: ≥14→10, ≥10→7, ≥7→4.
pub fn score_wind(speed: f64) -> FactorScore {
    FactorScore::new(ScoreCategory::Wind, band_points(speed, &WIND_BANDS), || {
        format!("Wind speed {:.1} m/s", speed)
    })
}

/// Advisory text: +2 per distinct hazard keyword found anywhere in the
/// combined text of all bulletins.
pub fn score_keywords(advisories: &[AdvisoryEntry], config: &ScoringConfig) -> FactorScore {
    let corpus = advisories
        .iter()
        .map(|a| a.text.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");

    let matched: BTreeSet<String> = config
        .hazard_keywords
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| !k.is_empty() && corpus.contains(k.as_str()))
        .collect();

    let points = (matched.len() as u32).saturating_mul(KEYWORD_POINTS);
    FactorScore::new(ScoreCategory::Keywords, points, || {
        format!(
            "Advisories mention: {}",
            matched.iter().cloned().collect::<Vec<_>>().join(", ")
        )
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
