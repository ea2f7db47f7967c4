/// Water-level station registry.
///
/// The river-stage feed reports only `{stationName, waterLevel}`. This
/// registry is the single source of truth for each station's watch /
/// caution / danger stages, and joins feed readings with those thresholds
/// to produce typed `WaterLevelReading`s. Stations the registry does not
/// know are dropped, since they cannot be classified.

use crate::config::WaterStationConfig;
use crate::ingest::StationLevel;
use crate::model::{HazardError, ThresholdSet, WaterLevelReading};

/// A monitored river gauge.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterStation {
    pub name: String,
    pub thresholds: ThresholdSet,
}

#[derive(Debug, Clone, Default)]
pub struct WaterStationRegistry {
    stations: Vec<WaterStation>,
}

impl WaterStationRegistry {
    pub fn new(stations: Vec<WaterStation>) -> Self {
        Self { stations }
    }

    /// Builds the registry from `[[water_station]]` entries.
    ///
    /// # Errors
    /// `HazardError::Configuration` if any entry has unordered thresholds.
    pub fn from_config(configs: &[WaterStationConfig]) -> Result<Self, HazardError> {
        let stations = configs
            .iter()
            .map(|c| {
                Ok(WaterStation {
                    name: c.name.clone(),
                    thresholds: ThresholdSet::try_from(c)?,
                })
            })
            .collect::<Result<Vec<_>, HazardError>>()?;
        Ok(Self { stations })
    }

    /// Looks up a station by name. Returns `None` if not found.
    pub fn find(&self, name: &str) -> Option<&WaterStation> {
        self.stations.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Joins feed readings with registry thresholds, preserving feed order.
    pub fn readings(&self, levels: &[StationLevel]) -> Vec<WaterLevelReading> {
        levels
            .iter()
            .filter_map(|level| match self.find(&level.station_name) {
                Some(station) => Some(WaterLevelReading::new(
                    station.name.clone(),
                    level.water_level,
                    &station.thresholds,
                )),
                None => {
                    log::debug!("no thresholds registered for station '{}'", level.station_name);
                    None
                }
            })
            .collect()
    }

    /// The reading closest to (or furthest past) its danger stage.
    pub fn worst_reading(&self, levels: &[StationLevel]) -> Option<WaterLevelReading> {
        self.readings(levels).into_iter().max_by(|a, b| {
            stage_ratio(a)
                .partial_cmp(&stage_ratio(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// Uncapped current/danger ratio, so two flooded stations still rank.
fn stage_ratio(reading: &WaterLevelReading) -> f64 {
    if reading.danger <= 0.0 {
        f64::INFINITY
    } else {
        reading.current / reading.danger
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
