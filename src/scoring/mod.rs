/// Composite disaster-risk scoring.
///
/// ## Flow
/// 1. `collect` fans the four feed calls out to the worker pool and waits
///    on each with a shared deadline, producing a [`FeedSnapshot`]
/// 2. `score_snapshot` runs the five factor calculators in fixed order
///    (warnings, rainfall, water level, wind, keywords)
/// 3. The factor scores are summed, clamped to 0–100 and banded
///
/// A feed that fails or times out degrades only its own factor to zero.
/// The public entry point never returns an error: any fault in the pass as a
/// whole is turned into a `success: false` result.
///
/// Submodules:
/// - `factors` — the five pure sub-score calculators

pub mod factors;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use threadpool::ThreadPool;

use crate::clock::Clock;
use crate::config::ScoringConfig;
use crate::ingest::{spawn_call, FeedSources, InFlight, Nowcast, StationLevel};
use crate::model::{AdvisoryEntry, HazardError, RiskScoreResult, ScoreBand, ScoreDetail, WarningEntry};
use crate::stations::WaterStationRegistry;
use factors::{score_keywords, score_rainfall, score_warnings, score_water_level, score_wind, FactorScore};

/// Upper bound of the composite score.
pub const MAX_SCORE: u32 = 100;

// ---------------------------------------------------------------------------
// Score bands
// ---------------------------------------------------------------------------

/// Bands the clamped total: ≥70 very dangerous, ≥50 dangerous, ≥30 caution.
pub fn score_band(total: u32) -> ScoreBand {
    match total {
        t if t >= 70 => ScoreBand::VeryDangerous,
        t if t >= 50 => ScoreBand::Dangerous,
        t if t >= 30 => ScoreBand::Caution,
        _ => ScoreBand::Safe,
    }
}

/// Sums factor scores, clamps to 0–100, and keeps details in input order.
pub fn aggregate(factors: &[FactorScore]) -> (u32, Vec<ScoreDetail>) {
    let sum = factors
        .iter()
        .fold(0u32, |acc, f| acc.saturating_add(f.score));
    let details = factors.iter().filter_map(|f| f.detail.clone()).collect();
    (sum.min(MAX_SCORE), details)
}

// ---------------------------------------------------------------------------
// Feed snapshot
// ---------------------------------------------------------------------------

/// Outcome of one round of feed calls. Each field is independent.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub warnings: Result<Vec<WarningEntry>, HazardError>,
    pub nowcast: Result<Nowcast, HazardError>,
    pub water_levels: Result<Vec<StationLevel>, HazardError>,
    pub advisories: Result<Vec<AdvisoryEntry>, HazardError>,
}

/// Logs a degraded factor and yields a zero contribution.
fn degrade<T>(factor: &str, result: &Result<T, HazardError>, score: impl FnOnce(&T) -> FactorScore) -> FactorScore {
    match result {
        Ok(value) => score(value),
        Err(e) => {
            log::warn!("{} factor scored 0: {}", factor, e);
            FactorScore::zero()
        }
    }
}

/// A feed that missed its deadline counts as unavailable.
fn as_unavailable<T>(feed: &str, result: Result<T, HazardError>) -> Result<T, HazardError> {
    result.map_err(|e| match e {
        HazardError::Timeout { .. } => HazardError::unavailable(feed, e),
        other => other,
    })
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// One in-flight slot per feed.
#[derive(Default)]
struct FeedSlots {
    warnings: InFlight,
    nowcast: InFlight,
    water_level: InFlight,
    advisories: InFlight,
}

pub struct RiskScorer {
    sources: FeedSources,
    stations: WaterStationRegistry,
    config: ScoringConfig,
    clock: Arc<dyn Clock>,
    pool: ThreadPool,
    slots: FeedSlots,
    timeout: Duration,
}

impl RiskScorer {
    pub fn new(
        sources: FeedSources,
        stations: WaterStationRegistry,
        config: ScoringConfig,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            sources,
            stations,
            config,
            clock,
            // One worker per feed slot, so a hung feed cannot delay the others.
            pool: ThreadPool::with_name("hazmon-feeds".into(), 4),
            slots: FeedSlots::default(),
            timeout,
        }
    }

    pub fn stations(&self) -> &WaterStationRegistry {
        &self.stations
    }

    /// Computes the composite risk score from the current feeds.
    pub fn calculate_disaster_risk(&self) -> RiskScoreResult {
        let snapshot = self.collect();
        self.score_snapshot(&snapshot)
    }

    /// Calls all four feeds concurrently, each bounded by the same deadline.
    ///
    /// A feed whose call from an earlier pass has not returned yet is not
    /// called again and reads as unavailable for this pass.
    pub fn collect(&self) -> FeedSnapshot {
        let deadline = Instant::now() + self.timeout;
        let station_id = self.sources.station_id.clone();

        let warnings = {
            let source = Arc::clone(&self.sources.warnings);
            let id = station_id.clone();
            spawn_call(&self.pool, &self.slots.warnings, "warnings", move || source.get(&id))
        };
        let nowcast = {
            let source = Arc::clone(&self.sources.nowcast);
            spawn_call(&self.pool, &self.slots.nowcast, "nowcast", move || source.get())
        };
        let water_levels = {
            let source = Arc::clone(&self.sources.water_level);
            spawn_call(&self.pool, &self.slots.water_level, "water_level", move || source.get())
        };
        let advisories = {
            let source = Arc::clone(&self.sources.advisories);
            spawn_call(&self.pool, &self.slots.advisories, "advisories", move || source.get(&station_id))
        };

        FeedSnapshot {
            warnings: as_unavailable("warnings", warnings.wait_until(deadline)),
            nowcast: as_unavailable("nowcast", nowcast.wait_until(deadline)),
            water_levels: as_unavailable("water_level", water_levels.wait_until(deadline)),
            advisories: as_unavailable("advisories", advisories.wait_until(deadline)),
        }
    }

    /// Scores an already collected snapshot. Never fails.
    pub fn score_snapshot(&self, snapshot: &FeedSnapshot) -> RiskScoreResult {
        let timestamp = self.clock.now();
        match self.try_score(snapshot) {
            Ok((total_score, details)) => {
                let level = score_band(total_score);
                log::info!(
                    "risk score {} ({}) from {} contributing factor(s)",
                    total_score,
                    level,
                    details.len()
                );
                RiskScoreResult {
                    success: true,
                    total_score,
                    level,
                    details,
                    timestamp,
                    error: None,
                }
            }
            Err(e) => {
                log::error!("risk scoring failed: {}", e);
                RiskScoreResult::failed(timestamp, e.to_string())
            }
        }
    }

    fn try_score(&self, snapshot: &FeedSnapshot) -> Result<(u32, Vec<ScoreDetail>), HazardError> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            let factors = [
                degrade("warnings", &snapshot.warnings, |w| score_warnings(w, &self.config)),
                degrade("rainfall", &snapshot.nowcast, |n| score_rainfall(n.rainfall_1h)),
                degrade("water level", &snapshot.water_levels, |levels| {
                    score_water_level(&self.stations.readings(levels))
                }),
                degrade("wind", &snapshot.nowcast, |n| score_wind(n.wind_speed)),
                degrade("keywords", &snapshot.advisories, |a| score_keywords(a, &self.config)),
            ];
            aggregate(&factors)
        }))
        .map_err(|cause| {
            let message = cause
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "scoring pass panicked".to_string());
            HazardError::Internal(message)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScoreCategory;

    fn factor(category: ScoreCategory, points: u32) -> FactorScore {
        FactorScore {
            score: points,
            detail: Some(ScoreDetail {
                category,
                points,
                reason: "test".into(),
                icon: category.icon().into(),
            }),
        }
    }

    #[test]
    fn test_score_band_breakpoints() {
        assert_eq!(score_band(0), ScoreBand::Safe);
        assert_eq!(score_band(29), ScoreBand::Safe);
        assert_eq!(score_band(30), ScoreBand::Caution);
        assert_eq!(score_band(49), ScoreBand::Caution);
        assert_eq!(score_band(50), ScoreBand::Dangerous);
        assert_eq!(score_band(69), ScoreBand::Dangerous);
        assert_eq!(score_band(70), ScoreBand::VeryDangerous);
        assert_eq!(score_band(100), ScoreBand::VeryDangerous);
    }

    #[test]
    fn test_aggregate_clamps_to_one_hundred() {
        let factors = [
            factor(ScoreCategory::Warnings, 90),
            factor(ScoreCategory::Rainfall, 80),
            factor(ScoreCategory::Wind, u32::MAX),
        ];
        let (total, details) = aggregate(&factors);
        assert_eq!(total, 100);
        assert_eq!(details.len(), 3);
    }

    #[test]
    fn test_aggregate_stays_in_range_for_many_combinations() {
        for a in (0..=60).step_by(7) {
            for b in (0..=60).step_by(11) {
                for c in (0..=40).step_by(13) {
                    let (total, _) = aggregate(&[
                        factor(ScoreCategory::Warnings, a),
                        factor(ScoreCategory::Rainfall, b),
                        factor(ScoreCategory::Keywords, c),
                    ]);
                    assert!(total <= MAX_SCORE, "total {} out of range", total);
                    assert_eq!(total, (a + b + c).min(100));
                }
            }
        }
    }

    #[test]
    fn test_aggregate_keeps_evaluation_order_and_skips_zero_factors() {
        let factors = [
            factor(ScoreCategory::Warnings, 10),
            FactorScore::zero(),
            factor(ScoreCategory::WaterLevel, 25),
            factor(ScoreCategory::Wind, 4),
        ];
        let (total, details) = aggregate(&factors);
        assert_eq!(total, 39);
        let order: Vec<_> = details.iter().map(|d| d.category).collect();
        assert_eq!(
            order,
            vec![ScoreCategory::Warnings, ScoreCategory::WaterLevel, ScoreCategory::Wind],
            "details follow evaluation order, not magnitude"
        );
    }

    #[test]
    fn test_empty_aggregate_is_zero() {
        assert_eq!(aggregate(&[]), (0, Vec::new()));
    }
}
