/// Integration tests for the notification lifecycle
///
/// These tests drive `NotificationMonitor` through the public API with a
/// manual clock, a recording channel and on-disk stores, and verify:
/// 1. The 5-minute duplicate window
/// 2. Settings from settings.toml (master switch, overrides)
/// 3. History bounds and ordering
/// 4. History persistence across restarts and graceful degradation
/// 5. Delivery faults are reported without retracting a decision
///
/// Run with: cargo test --test notification_lifecycle

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use hazmon_service::channel::NotificationChannel;
use hazmon_service::clock::ManualClock;
use hazmon_service::history::{FileHistory, HistoryStore, MemoryHistory, HISTORY_CAPACITY};
use hazmon_service::model::{
    DecisionReason, HazardError, Measurement, MonitorType, NotificationSettings, RainfallReading, RiskLevel,
    ThresholdSet, WaterLevelReading, WindReading,
};
use hazmon_service::monitor::NotificationMonitor;
use hazmon_service::settings::{SettingsPort, TomlSettingsStore};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<Value>>,
}

impl RecordingChannel {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl NotificationChannel for RecordingChannel {
    fn dispatch(&self, _kind: MonitorType, payload: &Value) -> Result<(), HazardError> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Channel whose upstream never answers.
struct HangingChannel;

impl NotificationChannel for HangingChannel {
    fn dispatch(&self, _kind: MonitorType, _payload: &Value) -> Result<(), HazardError> {
        thread::sleep(Duration::from_secs(3));
        Ok(())
    }
}

/// Channel whose calls never return.
struct DeadChannel;

impl NotificationChannel for DeadChannel {
    fn dispatch(&self, _kind: MonitorType, _payload: &Value) -> Result<(), HazardError> {
        loop {
            thread::park();
        }
    }
}

fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 20, 6, 0, 0).unwrap()))
}

fn monitor_with(
    history: Arc<dyn HistoryStore>,
    channel: Arc<dyn NotificationChannel>,
    clock: Arc<ManualClock>,
) -> NotificationMonitor {
    NotificationMonitor::new(history, channel, clock, Duration::from_millis(500))
}

fn rainfall(mm: f64) -> Measurement {
    Measurement::Rainfall(RainfallReading {
        rainfall_1h: mm,
        rainfall_24h: None,
    })
}

fn kingston_mines(stage: f64) -> Measurement {
    Measurement::WaterLevel(WaterLevelReading::new(
        "Illinois River at Kingston Mines, IL",
        stage,
        &ThresholdSet::new(14.0, 16.0, 20.0).unwrap(),
    ))
}

fn settings_file(dir: &Path, contents: &str) -> TomlSettingsStore {
    let path = dir.join("settings.toml");
    fs::write(&path, contents).unwrap();
    TomlSettingsStore::new(path)
}

// ---------------------------------------------------------------------------
// 1. Duplicate window
// ---------------------------------------------------------------------------

#[test]
fn test_duplicate_window_is_five_minutes() {
    let clock = manual_clock();
    let channel = Arc::new(RecordingChannel::default());
    let monitor = monitor_with(Arc::new(MemoryHistory::new()), channel.clone(), clock.clone());
    let settings = NotificationSettings::default();
    let storm = rainfall(55.0);

    let first = monitor.evaluate_measurement(MonitorType::Rainfall, Some(&storm), &settings);
    assert!(first.decision.should_notify);
    assert_eq!(first.decision.risk_level, Some(RiskLevel::Danger));

    clock.advance(chrono::Duration::seconds(299));
    let second = monitor.evaluate_measurement(MonitorType::Rainfall, Some(&storm), &settings);
    assert!(!second.decision.should_notify);
    assert_eq!(second.decision.reason, DecisionReason::DuplicateWithin5Min);
    assert_eq!(second.decision.risk_level, Some(RiskLevel::Danger));

    clock.advance(chrono::Duration::seconds(1));
    let third = monitor.evaluate_measurement(MonitorType::Rainfall, Some(&storm), &settings);
    assert!(third.decision.should_notify, "exactly 5 minutes later the alert is no longer a duplicate");

    assert_eq!(channel.count(), 2);
    assert_eq!(monitor.query_history().len(), 2);
}

#[test]
fn test_decide_does_not_record() {
    let clock = manual_clock();
    let monitor = monitor_with(Arc::new(MemoryHistory::new()), Arc::new(RecordingChannel::default()), clock);
    let settings = NotificationSettings::default();

    for _ in 0..3 {
        let d = monitor.decide(MonitorType::WaterLevel, Some(&kingston_mines(17.0)), &settings);
        assert!(d.should_notify);
    }
    assert!(monitor.query_history().is_empty());
}

#[test]
fn test_concurrent_evaluations_fire_once() {
    let clock = manual_clock();
    let channel = Arc::new(RecordingChannel::default());
    let monitor = Arc::new(monitor_with(Arc::new(MemoryHistory::new()), channel.clone(), clock));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                monitor
                    .evaluate_measurement(
                        MonitorType::WaterLevel,
                        Some(&kingston_mines(21.0)),
                        &NotificationSettings::default(),
                    )
                    .decision
                    .should_notify
            })
        })
        .collect();
    let fired = handles.into_iter().map(|h| h.join().unwrap()).filter(|fired| *fired).count();

    assert_eq!(fired, 1, "only one of the concurrent snapshots may fire");
    assert_eq!(channel.count(), 1);
}

// ---------------------------------------------------------------------------
// 2. Settings
// ---------------------------------------------------------------------------

#[test]
fn test_master_switch_from_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = settings_file(dir.path(), "enabled = false\n");
    let settings = store.load().unwrap();

    let monitor = monitor_with(Arc::new(MemoryHistory::new()), Arc::new(RecordingChannel::default()), manual_clock());
    for (kind, m) in [
        (MonitorType::Rainfall, rainfall(120.0)),
        (MonitorType::WaterLevel, kingston_mines(25.0)),
        (MonitorType::Wind, Measurement::Wind(WindReading { speed: 30.0 })),
    ] {
        let eval = monitor.evaluate_measurement(kind, Some(&m), &settings);
        assert!(!eval.decision.should_notify);
        assert_eq!(eval.decision.reason, DecisionReason::NotificationsDisabled);
    }
    assert!(monitor.query_history().is_empty());
}

#[test]
fn test_rainfall_override_from_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = settings_file(dir.path(), "[thresholds]\nrainfall1h = 35.0\n");
    let settings = store.load().unwrap();
    let monitor = monitor_with(Arc::new(MemoryHistory::new()), Arc::new(RecordingChannel::default()), manual_clock());

    let plain = monitor.decide(MonitorType::Rainfall, Some(&rainfall(40.0)), &NotificationSettings::default());
    assert_eq!(plain.risk_level, Some(RiskLevel::Caution), "40 mm/h is caution by default");

    let overridden = monitor.evaluate_measurement(MonitorType::Rainfall, Some(&rainfall(40.0)), &settings);
    assert_eq!(overridden.decision.risk_level, Some(RiskLevel::Danger));
    assert_eq!(overridden.decision.reason, DecisionReason::ThresholdExceeded);

    let below = monitor.decide(MonitorType::Rainfall, Some(&rainfall(20.0)), &settings);
    assert_eq!(below.risk_level, Some(RiskLevel::Watch), "below the override the defaults apply");
}

#[test]
fn test_type_toggle_from_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = settings_file(dir.path(), "[types]\nwaterLevel = false\n");
    let settings = store.load().unwrap();
    let monitor = monitor_with(Arc::new(MemoryHistory::new()), Arc::new(RecordingChannel::default()), manual_clock());

    let d = monitor.decide(MonitorType::WaterLevel, Some(&kingston_mines(21.0)), &settings);
    assert_eq!(d.reason, DecisionReason::TypeDisabled);
    let d = monitor.decide(MonitorType::Rainfall, Some(&rainfall(60.0)), &settings);
    assert!(d.should_notify, "other types stay enabled");
}

// ---------------------------------------------------------------------------
// 3. History bounds
// ---------------------------------------------------------------------------

#[test]
fn test_history_keeps_ten_newest() {
    let clock = manual_clock();
    let monitor = monitor_with(Arc::new(MemoryHistory::new()), Arc::new(RecordingChannel::default()), clock.clone());
    let settings = NotificationSettings::default();

    for _ in 0..12 {
        let eval = monitor.evaluate_measurement(MonitorType::Rainfall, Some(&rainfall(60.0)), &settings);
        assert!(eval.decision.should_notify);
        clock.advance(chrono::Duration::minutes(6));
    }

    let history = monitor.query_history();
    assert_eq!(history.len(), HISTORY_CAPACITY);
    for pair in history.windows(2) {
        assert!(pair[0].timestamp > pair[1].timestamp, "history must be newest first");
    }
}

// ---------------------------------------------------------------------------
// 4. Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_history_survives_restart_and_still_deduplicates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let clock = manual_clock();
    let settings = NotificationSettings::default();

    {
        let monitor = monitor_with(
            Arc::new(FileHistory::open(&path)),
            Arc::new(RecordingChannel::default()),
            clock.clone(),
        );
        assert!(monitor.evaluate_measurement(MonitorType::WaterLevel, Some(&kingston_mines(17.5)), &settings).decision.should_notify);
    }

    clock.advance(chrono::Duration::minutes(2));
    let reopened = monitor_with(
        Arc::new(FileHistory::open(&path)),
        Arc::new(RecordingChannel::default()),
        clock,
    );
    assert_eq!(reopened.query_history().len(), 1);
    let eval = reopened.evaluate_measurement(MonitorType::WaterLevel, Some(&kingston_mines(17.5)), &settings);
    assert_eq!(eval.decision.reason, DecisionReason::DuplicateWithin5Min);
}

#[test]
fn test_unwritable_history_degrades_to_memory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let history = Arc::new(FileHistory::open(blocker.join("history.json")));
    let monitor = monitor_with(history.clone(), Arc::new(RecordingChannel::default()), manual_clock());
    let settings = NotificationSettings::default();

    let first = monitor.evaluate_measurement(MonitorType::Rainfall, Some(&rainfall(55.0)), &settings);
    assert!(first.decision.should_notify, "a disk fault never blocks an alert");
    assert!(matches!(first.faults.as_slice(), [HazardError::Persistence(_)]));
    assert!(!history.is_persistent());

    let wind = Measurement::Wind(WindReading { speed: 15.0 });
    let second = monitor.evaluate_measurement(MonitorType::Wind, Some(&wind), &settings);
    assert!(second.decision.should_notify);
    assert!(second.faults.is_empty(), "the fault is reported once, then the store is memory-only");
    assert_eq!(monitor.query_history().len(), 2);
}

// ---------------------------------------------------------------------------
// 5. Delivery faults
// ---------------------------------------------------------------------------

#[test]
fn test_hanging_channel_times_out_as_dispatch_fault() {
    let monitor = monitor_with(Arc::new(MemoryHistory::new()), Arc::new(HangingChannel), manual_clock());
    let eval = monitor.evaluate_measurement(
        MonitorType::Wind,
        Some(&Measurement::Wind(WindReading { speed: 12.0 })),
        &NotificationSettings::default(),
    );
    assert!(eval.decision.should_notify);
    assert_eq!(eval.decision.risk_level, Some(RiskLevel::Caution));
    assert!(matches!(eval.faults.as_slice(), [HazardError::Dispatch(_)]));
    assert_eq!(monitor.query_history().len(), 1);
}

#[test]
fn test_dead_channel_never_exhausts_dispatch_workers() {
    let clock = manual_clock();
    let monitor = monitor_with(Arc::new(MemoryHistory::new()), Arc::new(DeadChannel), clock.clone());
    let settings = NotificationSettings::default();
    let readings = [
        (MonitorType::Wind, Measurement::Wind(WindReading { speed: 15.0 })),
        (MonitorType::Rainfall, rainfall(55.0)),
        (MonitorType::WaterLevel, kingston_mines(21.0)),
    ];

    // Three rounds over every type: twice as many alerts as dispatch workers.
    for round in 0..3 {
        for (kind, measurement) in &readings {
            let started = Instant::now();
            let eval = monitor.evaluate_measurement(*kind, Some(measurement), &settings);
            assert!(
                started.elapsed() < Duration::from_secs(2),
                "round {} {:?} waited {:?}",
                round,
                kind,
                started.elapsed()
            );
            assert!(eval.decision.should_notify);
            assert!(matches!(eval.faults.as_slice(), [HazardError::Dispatch(_)]));
        }
        clock.advance(chrono::Duration::minutes(6));
    }
    assert_eq!(monitor.query_history().len(), 9);
}
