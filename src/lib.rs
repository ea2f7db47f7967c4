/// hazmon_service: disaster-risk scoring and hazard notification service.
///
/// # Module structure
///
/// ```text
/// hazmon_service
/// ├── model       — shared data types (RiskLevel, ThresholdSet, Measurement, HazardError, …)
/// ├── clock       — injectable time source (SystemClock, ManualClock)
/// ├── config      — service configuration loader (hazmon.toml)
/// ├── stations    — river-stage station registry with watch/caution/danger stages
/// ├── settings    — notification settings port (memory or settings.toml)
/// ├── history     — bounded notification history (memory or JSON file)
/// ├── channel     — alert delivery adapters (log, Pub/Sub)
/// ├── daemon      — scheduler: one scoring pass + one monitoring pass per tick
/// ├── endpoint    — HTTP API over the scorer and monitor
/// ├── ingest
/// │   ├── normalize — raw feed JSON → typed records
/// │   ├── feeds     — blocking HTTP feed adapters
/// │   └── fixtures (test only) — representative feed payloads
/// ├── scoring
/// │   └── factors — the five sub-score calculators
/// ├── monitor     — per-measurement notification decisions and firing
/// └── alert
///     └── thresholds — four-level threshold classification
/// ```

pub mod alert;
pub mod channel;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod endpoint;
pub mod history;
pub mod ingest;
pub mod model;
pub mod monitor;
pub mod scoring;
pub mod settings;
pub mod stations;
