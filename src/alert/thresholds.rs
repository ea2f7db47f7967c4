//! Ordinal threshold classification.
//!
//! **Per-measurement scale** - a single reading is compared against an
//! ordered [`ThresholdSet`] and mapped onto `safe < watch < caution < danger`.
//! This scale gates notifications. It is unrelated to the 0–100 composite
//! score bands in `scoring`, which have their own breakpoints.
//!
//! Boundaries are inclusive-lower: a value exactly at a tier belongs to it.

use crate::model::{HazardError, RiskLevel, ThresholdSet};

// ---------------------------------------------------------------------------
// Default thresholds
// ---------------------------------------------------------------------------

/// Hourly rainfall, mm/h.
pub const RAINFALL_1H: ThresholdSet = ThresholdSet::from_ordered(10.0, 30.0, 50.0);

/// Cumulative 24-hour rainfall, mm.
pub const RAINFALL_24H: ThresholdSet = ThresholdSet::from_ordered(80.0, 150.0, 250.0);

/// Sustained wind speed, m/s.
pub const WIND_SPEED: ThresholdSet = ThresholdSet::from_ordered(7.0, 10.0, 14.0);

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Maps a value onto the ordinal scale of `thresholds`.
///
/// Checks tiers in descending order of severity. A NaN value compares false
/// against every tier and classifies as `Safe`.
pub fn classify(value: f64, thresholds: &ThresholdSet) -> RiskLevel {
    if value >= thresholds.danger() {
        RiskLevel::Danger
    } else if value >= thresholds.caution() {
        RiskLevel::Caution
    } else if value >= thresholds.watch() {
        RiskLevel::Watch
    } else {
        RiskLevel::Safe
    }
}

/// Like [`classify`], for thresholds that have not been validated yet.
///
/// # Errors
/// `HazardError::Configuration` when the triple is not non-decreasing.
pub fn classify_raw(value: f64, watch: f64, caution: f64, danger: f64) -> Result<RiskLevel, HazardError> {
    let thresholds = ThresholdSet::new(watch, caution, danger)?;
    Ok(classify(value, &thresholds))
}

/// Classifies two independent sub-dimensions sharing one vocabulary and
/// returns the more severe level.
pub fn classify_max(
    first: f64,
    first_thresholds: &ThresholdSet,
    second: f64,
    second_thresholds: &ThresholdSet,
) -> RiskLevel {
    classify(first, first_thresholds).max(classify(second, second_thresholds))
}

/// Rainfall level from the hourly and (optional) 24-hour totals.
pub fn classify_rainfall(rainfall_1h: f64, rainfall_24h: Option<f64>) -> RiskLevel {
    match rainfall_24h {
        Some(total) => classify_max(rainfall_1h, &RAINFALL_1H, total, &RAINFALL_24H),
        None => classify(rainfall_1h, &RAINFALL_1H),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
