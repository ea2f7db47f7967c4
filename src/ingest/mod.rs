/// Collaborator boundary: the data-source interfaces the core consumes.
///
/// The core never fetches or parses raw upstream payloads. It calls these
/// traits, and each implementation hands back already-normalized records.
/// Calls are run on a worker pool with a deadline so a stalled feed turns
/// into `HazardError::Timeout` instead of a hang.
///
/// Submodules:
/// - `normalize` — raw JSON payloads → typed feed records
/// - `feeds`     — blocking HTTP adapters for configured feed URLs
/// - `fixtures` (test only) — representative raw payloads

pub mod feeds;
pub mod normalize;

#[cfg(test)]
pub(crate) mod fixtures;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use threadpool::ThreadPool;

use crate::model::{AdvisoryEntry, HazardError, WarningEntry};

// ---------------------------------------------------------------------------
// Feed records
// ---------------------------------------------------------------------------

/// Latest nowcast values: rainfall in mm/h, wind in m/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nowcast {
    #[serde(rename = "rainfall1h")]
    pub rainfall_1h: f64,
    #[serde(rename = "rainfall24h", default, skip_serializing_if = "Option::is_none")]
    pub rainfall_24h: Option<f64>,
    pub wind_speed: f64,
}

/// One station entry from the river-stage feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationLevel {
    pub station_name: String,
    pub water_level: f64,
}

// ---------------------------------------------------------------------------
// Source traits
// ---------------------------------------------------------------------------

pub trait WeatherWarningSource: Send + Sync {
    fn get(&self, station_id: &str) -> Result<Vec<WarningEntry>, HazardError>;
}

pub trait NowcastSource: Send + Sync {
    fn get(&self) -> Result<Nowcast, HazardError>;
}

pub trait WaterLevelSource: Send + Sync {
    fn get(&self) -> Result<Vec<StationLevel>, HazardError>;
}

pub trait AdvisorySource: Send + Sync {
    fn get(&self, station_id: &str) -> Result<Vec<AdvisoryEntry>, HazardError>;
}

/// The four feeds consulted by one scoring pass.
#[derive(Clone)]
pub struct FeedSources {
    pub station_id: String,
    pub warnings: Arc<dyn WeatherWarningSource>,
    pub nowcast: Arc<dyn NowcastSource>,
    pub water_level: Arc<dyn WaterLevelSource>,
    pub advisories: Arc<dyn AdvisorySource>,
}

// ---------------------------------------------------------------------------
// Deadline-bounded calls
// ---------------------------------------------------------------------------

/// Marks one collaborator as busy while its call occupies a pool worker.
///
/// A call that outlives its deadline keeps the slot until it returns, and
/// further calls to the same collaborator fail fast instead of queueing
/// behind it. A hung collaborator therefore pins at most one worker.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a previous call is still running.
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Result sender that frees its slot before the caller can observe the
/// outcome, whether the worker finishes or panics.
struct Reply<T> {
    slot: Arc<AtomicBool>,
    tx: Option<Sender<Result<T, HazardError>>>,
}

impl<T> Reply<T> {
    fn send(mut self, result: Result<T, HazardError>) {
        self.slot.store(false, Ordering::SeqCst);
        if let Some(tx) = self.tx.take() {
            // The receiver is gone once the caller's deadline has passed.
            let _ = tx.send(result);
        }
    }
}

impl<T> Drop for Reply<T> {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::SeqCst);
    }
}

/// A collaborator call running on a pool worker.
pub struct Pending<T> {
    operation: &'static str,
    rx: Receiver<Result<T, HazardError>>,
}

/// Submits `call` to the pool and returns a handle to wait on.
///
/// When `slot` is still held by an earlier call the pool is not touched and
/// the handle resolves immediately to `DataSourceUnavailable`.
pub fn spawn_call<T, F>(pool: &ThreadPool, slot: &InFlight, operation: &'static str, call: F) -> Pending<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, HazardError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    if slot.try_acquire() {
        let reply = Reply {
            slot: Arc::clone(&slot.0),
            tx: Some(tx),
        };
        pool.execute(move || reply.send(call()));
    } else {
        log::warn!("{} skipped: previous call has not returned", operation);
        let _ = tx.send(Err(HazardError::unavailable(
            operation,
            "previous call still in progress",
        )));
    }
    Pending { operation, rx }
}

impl<T> Pending<T> {
    /// Waits until `deadline` for the call's result.
    ///
    /// A worker that panics drops its sender; that surfaces as
    /// `DataSourceUnavailable` rather than blocking.
    pub fn wait_until(self, deadline: Instant) -> Result<T, HazardError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.rx.recv_timeout(remaining) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(HazardError::Timeout {
                operation: self.operation.to_string(),
                millis: remaining.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(HazardError::unavailable(
                self.operation,
                "worker exited without a result",
            )),
        }
    }
}

/// Runs one collaborator call with a timeout.
pub fn call_with_timeout<T, F>(
    pool: &ThreadPool,
    slot: &InFlight,
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, HazardError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, HazardError> + Send + 'static,
{
    spawn_call(pool, slot, operation, call).wait_until(Instant::now() + timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_with_timeout_returns_value() {
        let pool = ThreadPool::new(2);
        let result = call_with_timeout(&pool, &InFlight::new(), Duration::from_secs(2), "quick", || Ok(42));
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn test_call_with_timeout_propagates_source_error() {
        let pool = ThreadPool::new(1);
        let result: Result<u32, _> = call_with_timeout(&pool, &InFlight::new(), Duration::from_secs(2), "failing", || {
            Err(HazardError::unavailable("failing", "HTTP 503"))
        });
        assert!(matches!(result, Err(HazardError::DataSourceUnavailable { .. })));
    }

    #[test]
    fn test_stalled_call_times_out() {
        let pool = ThreadPool::new(1);
        let started = Instant::now();
        let result: Result<u32, _> = call_with_timeout(&pool, &InFlight::new(), Duration::from_millis(50), "stalled", || {
            std::thread::sleep(Duration::from_millis(500));
            Ok(1)
        });
        assert!(
            matches!(result, Err(HazardError::Timeout { .. })),
            "expected timeout, got {:?}",
            result
        );
        assert!(started.elapsed() < Duration::from_millis(400), "caller must not wait for the worker");
    }

    #[test]
    fn test_panicking_worker_is_reported_unavailable() {
        let pool = ThreadPool::new(1);
        let result: Result<u32, _> = call_with_timeout(&pool, &InFlight::new(), Duration::from_secs(2), "panicky", || {
            panic!("collaborator bug")
        });
        assert!(matches!(result, Err(HazardError::DataSourceUnavailable { .. })));
    }

    #[test]
    fn test_busy_slot_fails_fast_without_queueing() {
        let pool = ThreadPool::new(1);
        let slot = InFlight::new();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let hung: Result<u32, _> = call_with_timeout(&pool, &slot, Duration::from_millis(50), "hung", move || {
            let _ = release_rx.recv();
            Ok(1)
        });
        assert!(matches!(hung, Err(HazardError::Timeout { .. })));
        assert!(slot.is_busy(), "the stalled call still holds its slot");

        let started = Instant::now();
        let again: Result<u32, _> = call_with_timeout(&pool, &slot, Duration::from_secs(2), "hung", || Ok(2));
        assert!(matches!(again, Err(HazardError::DataSourceUnavailable { .. })));
        assert!(started.elapsed() < Duration::from_millis(500), "a busy slot must not wait on the pool");

        // Other collaborators still get served once the stalled one returns.
        release_tx.send(()).unwrap();
        let other = call_with_timeout(&pool, &InFlight::new(), Duration::from_secs(2), "other", || Ok(3));
        assert_eq!(other, Ok(3));
    }

    #[test]
    fn test_slot_released_after_panic() {
        let pool = ThreadPool::new(1);
        let slot = InFlight::new();
        let _: Result<u32, _> = call_with_timeout(&pool, &slot, Duration::from_secs(2), "panicky", || {
            panic!("collaborator bug")
        });
        let recovered = call_with_timeout(&pool, &slot, Duration::from_secs(2), "panicky", || Ok(7));
        assert_eq!(recovered, Ok(7));
    }
}
