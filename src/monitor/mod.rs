/// Real-time notification monitor.
///
/// ## Decision sequence (per measurement snapshot)
///
/// 1. Notifications switched off            → `notifications_disabled`
/// 2. No measurement (or the wrong kind)     → `no_data`
/// 3. This type switched off                 → `type_disabled`
/// 4. Classify: default thresholds, unless a user override is reached, in
///    which case the level is forced to `danger`
/// 5. `safe` / `watch`                       → `safe_level`
/// 6. Same `(type, level)` fired < 5 min ago → `duplicate_within_5min`
/// 7. Otherwise fire                         → `threshold_exceeded`
///
/// There is no persisted state machine: each evaluation depends only on the
/// measurement, the settings passed in, and the history at call time.
///
/// ## Firing
///
/// Steps 6 and 7 run under a gate so two concurrent snapshots of the same
/// type cannot both pass the dedup check. The record is appended before the
/// gate is released; dispatch then runs on a worker with a timeout. History
/// and dispatch faults are returned in [`Evaluation::faults`] and never
/// retract a `should_notify: true` decision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use threadpool::ThreadPool;

use crate::alert::thresholds::{classify, classify_rainfall, WIND_SPEED};
use crate::channel::NotificationChannel;
use crate::clock::Clock;
use crate::history::HistoryStore;
use crate::ingest::{call_with_timeout, InFlight};
use crate::model::{
    Decision, DecisionReason, HazardError, Measurement, MonitorType, NotificationRecord,
    NotificationSettings, RiskLevel, ThresholdOverrides,
};

/// Repeated alerts for the same `(type, level)` are suppressed this long.
pub const DEDUP_WINDOW_MINUTES: i64 = 5;

// ---------------------------------------------------------------------------
// Classification with overrides
// ---------------------------------------------------------------------------

/// Risk level of `measurement` for monitored type `kind`.
///
/// Returns `None` when the measurement does not describe `kind`, or when a
/// water-level reading carries unordered thresholds.
pub fn measurement_level(
    kind: MonitorType,
    measurement: &Measurement,
    overrides: &ThresholdOverrides,
) -> Option<RiskLevel> {
    let reached = |value: f64, limit: Option<f64>| limit.is_some_and(|l| value >= l);

    match (kind, measurement) {
        (MonitorType::Rainfall, Measurement::Rainfall(r)) => {
            let forced = reached(r.rainfall_1h, overrides.rainfall_1h)
                || r.rainfall_24h.is_some_and(|total| reached(total, overrides.rainfall_24h));
            Some(if forced {
                RiskLevel::Danger
            } else {
                classify_rainfall(r.rainfall_1h, r.rainfall_24h)
            })
        }
        (MonitorType::WaterLevel, Measurement::WaterLevel(r)) => {
            if reached(r.current, overrides.water_level) {
                return Some(RiskLevel::Danger);
            }
            match r.thresholds() {
                Ok(thresholds) => Some(classify(r.current, &thresholds)),
                Err(e) => {
                    log::warn!("ignoring water level reading for '{}': {}", r.station_name, e);
                    None
                }
            }
        }
        (MonitorType::Wind, Measurement::Wind(w)) => Some(if reached(w.speed, overrides.wind_speed) {
            RiskLevel::Danger
        } else {
            classify(w.speed, &WIND_SPEED)
        }),
        _ => None,
    }
}

/// Human-readable alert text.
pub fn alert_message(level: RiskLevel, measurement: &Measurement) -> String {
    match measurement {
        Measurement::Rainfall(r) => match r.rainfall_24h {
            Some(total) => format!(
                "Rainfall {}: {:.1} mm in the last hour, {:.1} mm in 24 hours",
                level, r.rainfall_1h, total
            ),
            None => format!("Rainfall {}: {:.1} mm in the last hour", level, r.rainfall_1h),
        },
        Measurement::WaterLevel(r) => format!(
            "{} water level {}: {:.2} ({:.0}% of danger stage)",
            r.station_name,
            level,
            r.current,
            r.percent()
        ),
        Measurement::Wind(w) => format!("Wind {}: {:.1} m/s", level, w.speed),
        Measurement::WarningList { warnings } => format!("{} active warning(s) at {}", warnings.len(), level),
        Measurement::AdvisoryText { advisories } => format!("{} advisory bulletin(s) at {}", advisories.len(), level),
    }
}

/// Payload handed to the notification channel.
pub fn alert_payload(record: &NotificationRecord) -> Value {
    json!({
        "id": record.id,
        "type": record.kind.as_str(),
        "level": record.level.as_str(),
        "title": format!("Hazard alert: {} {}", record.kind, record.level),
        "body": record.message,
        "timestamp": record.timestamp.to_rfc3339(),
        "measurement": record.payload,
    })
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Result of a full evaluation: the decision plus side-effect outcomes.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    /// The appended record, when the alert fired.
    pub record: Option<NotificationRecord>,
    /// Persistence and dispatch faults; they do not affect `decision`.
    pub faults: Vec<HazardError>,
}

impl Evaluation {
    fn quiet(decision: Decision) -> Self {
        Self {
            decision,
            record: None,
            faults: Vec::new(),
        }
    }
}

pub struct NotificationMonitor {
    history: Arc<dyn HistoryStore>,
    channel: Arc<dyn NotificationChannel>,
    clock: Arc<dyn Clock>,
    pool: ThreadPool,
    dispatch_slots: [InFlight; 3],
    dispatch_timeout: Duration,
    dedup_window: chrono::Duration,
    next_id: AtomicU64,
    fire_gate: Mutex<()>,
}

impl NotificationMonitor {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            history,
            channel,
            clock,
            // One worker per monitor type; a hung channel holds at most one each.
            pool: ThreadPool::with_name("hazmon-dispatch".into(), MonitorType::ALL.len()),
            dispatch_slots: Default::default(),
            dispatch_timeout,
            dedup_window: chrono::Duration::minutes(DEDUP_WINDOW_MINUTES),
            next_id: AtomicU64::new(1),
            fire_gate: Mutex::new(()),
        }
    }

    /// Decides without firing. Reads the history but never changes it.
    pub fn decide(
        &self,
        kind: MonitorType,
        measurement: Option<&Measurement>,
        settings: &NotificationSettings,
    ) -> Decision {
        self.decide_at(kind, measurement, settings, self.clock.now())
    }

    fn decide_at(
        &self,
        kind: MonitorType,
        measurement: Option<&Measurement>,
        settings: &NotificationSettings,
        now: DateTime<Utc>,
    ) -> Decision {
        if !settings.enabled {
            return Decision::suppressed(DecisionReason::NotificationsDisabled);
        }
        let Some(measurement) = measurement else {
            return Decision::suppressed(DecisionReason::NoData);
        };
        if !settings.types.is_enabled(kind) {
            return Decision::suppressed(DecisionReason::TypeDisabled);
        }
        let Some(level) = measurement_level(kind, measurement, &settings.thresholds) else {
            return Decision::suppressed(DecisionReason::NoData);
        };
        if !level.is_alertable() {
            return Decision::at_level(false, level, DecisionReason::SafeLevel);
        }
        if let Some(previous) = self.history.query_recent(kind, level, self.dedup_window, now) {
            log::debug!("suppressing {} {} alert; {} fired at {}", kind, level, previous.id, previous.timestamp);
            return Decision::at_level(false, level, DecisionReason::DuplicateWithin5Min);
        }
        Decision::at_level(true, level, DecisionReason::ThresholdExceeded)
    }

    /// Decides and, when the decision is to notify, records and dispatches
    /// the alert.
    pub fn evaluate_measurement(
        &self,
        kind: MonitorType,
        measurement: Option<&Measurement>,
        settings: &NotificationSettings,
    ) -> Evaluation {
        let gate = self.fire_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let decision = self.decide_at(kind, measurement, settings, now);

        let (Some(measurement), Some(level)) = (measurement, decision.risk_level) else {
            return Evaluation::quiet(decision);
        };
        if !decision.should_notify {
            return Evaluation::quiet(decision);
        }

        let record = NotificationRecord {
            id: format!(
                "notif-{}-{}",
                now.timestamp_millis(),
                self.next_id.fetch_add(1, Ordering::SeqCst)
            ),
            kind,
            level,
            message: alert_message(level, measurement),
            timestamp: now,
            payload: serde_json::to_value(measurement).unwrap_or(Value::Null),
        };

        let mut faults = Vec::new();
        if let Err(e) = self.history.append(record.clone()) {
            log::warn!("alert {} not persisted: {}", record.id, e);
            faults.push(e);
        }
        drop(gate);

        log::info!("🔔 {} ({})", record.message, record.id);
        if let Err(e) = self.dispatch(kind, &record) {
            log::error!("alert {} not delivered: {}", record.id, e);
            faults.push(e);
        }

        Evaluation {
            decision,
            record: Some(record),
            faults,
        }
    }

    fn dispatch(&self, kind: MonitorType, record: &NotificationRecord) -> Result<(), HazardError> {
        let channel = Arc::clone(&self.channel);
        let payload = alert_payload(record);
        let slot = &self.dispatch_slots[dispatch_slot_index(kind)];
        call_with_timeout(&self.pool, slot, self.dispatch_timeout, "dispatch", move || {
            channel.dispatch(kind, &payload)
        })
        .map_err(|e| match e {
            HazardError::Dispatch(_) => e,
            other => HazardError::Dispatch(other.to_string()),
        })
    }

    /// Notification history, newest first.
    pub fn query_history(&self) -> Vec<NotificationRecord> {
        self.history.records()
    }

    pub fn clear_history(&self) -> Result<(), HazardError> {
        self.history.clear()
    }
}

fn dispatch_slot_index(kind: MonitorType) -> usize {
    match kind {
        MonitorType::Rainfall => 0,
        MonitorType::WaterLevel => 1,
        MonitorType::Wind => 2,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
