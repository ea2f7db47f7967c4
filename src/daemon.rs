/// Scheduler for the hazard monitoring service.
///
/// Each tick:
/// 1. Collects one snapshot from the four feeds
/// 2. Scores it into a composite risk result
/// 3. Loads the current notification settings
/// 4. Derives rainfall, water-level and wind measurements from the same
///    snapshot and runs each through the notification monitor
///
/// A settings load failure skips step 4 for that tick only; scoring still
/// runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::channel::{channel_from_config, NotificationChannel};
use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::history::{FileHistory, HistoryStore, MemoryHistory};
use crate::ingest::feeds::http_sources;
use crate::ingest::FeedSources;
use crate::model::{
    Decision, HazardError, Measurement, MonitorType, NotificationRecord, RainfallReading,
    RiskScoreResult, WindReading,
};
use crate::monitor::{Evaluation, NotificationMonitor};
use crate::scoring::{FeedSnapshot, RiskScorer};
use crate::settings::{MemorySettings, SettingsPort, TomlSettingsStore};
use crate::stations::WaterStationRegistry;

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// Monitor outcome for one type within a tick.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeOutcome {
    #[serde(rename = "type")]
    pub kind: MonitorType,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<NotificationRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<String>,
}

impl TypeOutcome {
    fn new(kind: MonitorType, evaluation: Evaluation) -> Self {
        Self {
            kind,
            decision: evaluation.decision,
            record: evaluation.record,
            faults: evaluation.faults.iter().map(HazardError::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub score: RiskScoreResult,
    /// Empty when the monitoring pass was skipped.
    pub evaluations: Vec<TypeOutcome>,
}

impl TickReport {
    pub fn fired(&self) -> usize {
        self.evaluations.iter().filter(|o| o.decision.should_notify).count()
    }
}

/// The measurement for `kind` carried by `snapshot`, if its feed answered.
///
/// Water level uses the station closest to its danger stage.
pub fn measurement_from_snapshot(
    kind: MonitorType,
    snapshot: &FeedSnapshot,
    stations: &WaterStationRegistry,
) -> Option<Measurement> {
    match kind {
        MonitorType::Rainfall => snapshot.nowcast.as_ref().ok().map(|n| {
            Measurement::Rainfall(RainfallReading {
                rainfall_1h: n.rainfall_1h,
                rainfall_24h: n.rainfall_24h,
            })
        }),
        MonitorType::Wind => snapshot
            .nowcast
            .as_ref()
            .ok()
            .map(|n| Measurement::Wind(WindReading { speed: n.wind_speed })),
        MonitorType::WaterLevel => snapshot
            .water_levels
            .as_ref()
            .ok()
            .and_then(|levels| stations.worst_reading(levels))
            .map(Measurement::WaterLevel),
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

pub struct Daemon {
    scorer: Arc<RiskScorer>,
    monitor: Arc<NotificationMonitor>,
    settings: Arc<dyn SettingsPort>,
    poll_interval: Duration,
}

impl Daemon {
    pub fn new(
        scorer: Arc<RiskScorer>,
        monitor: Arc<NotificationMonitor>,
        settings: Arc<dyn SettingsPort>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            scorer,
            monitor,
            settings,
            poll_interval,
        }
    }

    /// Wires HTTP feeds, stores and the channel from the service config.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, HazardError> {
        let service = &config.service;
        let timeout = Duration::from_millis(service.collaborator_timeout_ms);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let http = http_sources(&config.feeds, timeout)?;
        let sources = FeedSources {
            station_id: service.station_id.clone(),
            warnings: Arc::new(http.warnings),
            nowcast: Arc::new(http.nowcast),
            water_level: Arc::new(http.water_level),
            advisories: Arc::new(http.advisories),
        };
        let stations = WaterStationRegistry::from_config(&config.water_stations)?;
        let scorer = RiskScorer::new(sources, stations, config.scoring.clone(), Arc::clone(&clock), timeout);

        let history: Arc<dyn HistoryStore> = match &service.history_path {
            Some(path) => Arc::new(FileHistory::open(path)),
            None => Arc::new(MemoryHistory::new()),
        };
        let channel: Arc<dyn NotificationChannel> = Arc::from(channel_from_config(&config.channel, timeout)?);
        let monitor = NotificationMonitor::new(history, channel, clock, timeout);

        let settings: Arc<dyn SettingsPort> = match &service.settings_path {
            Some(path) => Arc::new(TomlSettingsStore::new(path)),
            None => Arc::new(MemorySettings::default()),
        };
        // Refuse to start on a malformed settings file.
        settings.load()?;

        Ok(Self::new(
            Arc::new(scorer),
            Arc::new(monitor),
            settings,
            Duration::from_secs(service.poll_interval_secs),
        ))
    }

    pub fn scorer(&self) -> Arc<RiskScorer> {
        Arc::clone(&self.scorer)
    }

    pub fn monitor(&self) -> Arc<NotificationMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn settings(&self) -> Arc<dyn SettingsPort> {
        Arc::clone(&self.settings)
    }

    /// Runs one scoring pass and one monitoring pass.
    pub fn tick(&self) -> TickReport {
        let snapshot = self.scorer.collect();
        let score = self.scorer.score_snapshot(&snapshot);

        let settings = match self.settings.load() {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("notification settings unavailable, monitoring skipped: {}", e);
                return TickReport {
                    score,
                    evaluations: Vec::new(),
                };
            }
        };

        let evaluations = MonitorType::ALL
            .into_iter()
            .map(|kind| {
                let measurement = measurement_from_snapshot(kind, &snapshot, self.scorer.stations());
                let evaluation = self.monitor.evaluate_measurement(kind, measurement.as_ref(), &settings);
                TypeOutcome::new(kind, evaluation)
            })
            .collect();

        TickReport { score, evaluations }
    }

    /// Main loop (runs indefinitely).
    pub fn run(&self) {
        log::info!(
            "🚀 starting hazard monitor: {} water station(s), polling every {}s",
            self.scorer.stations().len(),
            self.poll_interval.as_secs()
        );

        loop {
            let started = Instant::now();
            let report = self.tick();
            log::info!(
                "✓ tick complete: score {} ({}), {} alert(s) fired",
                report.score.total_score,
                report.score.level,
                report.fired()
            );

            if let Some(remaining) = self.poll_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
