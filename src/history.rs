/// Notification history store.
///
/// ## Architecture: In-Memory + Optional File Mirror
///
/// **In-memory (source of truth for the session):**
/// - Newest-first, capped at [`HISTORY_CAPACITY`] records
/// - Every append is a locked read-modify-truncate sequence, so concurrent
///   evaluations for different types cannot break the cap or the order
///
/// **File mirror (`FileHistory`):**
/// - JSON array rewritten after every change, reloaded on startup
/// - On the first read or write failure the store logs a persistence fault
///   and carries on memory-only for the rest of the session; alerts are
///   never blocked by the disk

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::model::{HazardError, MonitorType, NotificationRecord, RiskLevel};

/// Maximum number of records retained.
pub const HISTORY_CAPACITY: usize = 10;

pub trait HistoryStore: Send + Sync {
    /// Inserts `record` as the newest entry and drops anything past capacity.
    ///
    /// The record is retained in memory even when persisting it fails.
    fn append(&self, record: NotificationRecord) -> Result<(), HazardError>;

    /// Newest record for `(kind, level)` with `now - timestamp < window`.
    fn query_recent(
        &self,
        kind: MonitorType,
        level: RiskLevel,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<NotificationRecord>;

    /// All records, newest first.
    fn records(&self) -> Vec<NotificationRecord>;

    fn clear(&self) -> Result<(), HazardError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MemoryHistory {
    records: Mutex<VecDeque<NotificationRecord>>,
    capacity: usize,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<NotificationRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the contents, e.g. from a persisted file. Input order is
    /// irrelevant; records are re-sorted newest first and truncated.
    fn replace(&self, mut records: Vec<NotificationRecord>) {
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(self.capacity);
        *self.lock() = records.into();
    }

    fn push(&self, record: NotificationRecord) {
        let mut records = self.lock();
        records.push_front(record);
        records.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, record: NotificationRecord) -> Result<(), HazardError> {
        self.push(record);
        Ok(())
    }

    fn query_recent(
        &self,
        kind: MonitorType,
        level: RiskLevel,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<NotificationRecord> {
        self.lock()
            .iter()
            .find(|r| r.kind == kind && r.level == level && now - r.timestamp < window)
            .cloned()
    }

    fn records(&self) -> Vec<NotificationRecord> {
        self.lock().iter().cloned().collect()
    }

    fn clear(&self) -> Result<(), HazardError> {
        self.lock().clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

pub struct FileHistory {
    memory: MemoryHistory,
    /// `None` once the store has degraded to memory-only.
    path: Mutex<Option<PathBuf>>,
}

impl FileHistory {
    /// Opens (or starts) a history file.
    ///
    /// A missing file is an empty history. An unreadable or corrupt file
    /// degrades the store to memory-only instead of failing.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = Self {
            memory: MemoryHistory::new(),
            path: Mutex::new(Some(path.clone())),
        };
        match load_records(&path) {
            Ok(records) => {
                log::info!("loaded {} notification record(s) from {}", records.len(), path.display());
                store.memory.replace(records);
            }
            Err(e) => store.degrade(&e),
        }
        store
    }

    /// Whether the store is still mirroring to disk.
    pub fn is_persistent(&self) -> bool {
        self.path.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn degrade(&self, cause: &HazardError) {
        let mut path = self.path.lock().unwrap_or_else(PoisonError::into_inner);
        if path.take().is_some() {
            log::warn!("{}; notification history is memory-only for this session", cause);
        }
    }

    /// Rewrites the file from the current memory contents.
    fn persist(&self) -> Result<(), HazardError> {
        let guard = self.path.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(path) = guard.as_ref() else {
            return Ok(());
        };
        // Snapshot under the path lock so the last writer always writes the
        // latest contents.
        let result = write_records(path, &self.memory.records());
        drop(guard);
        if let Err(e) = &result {
            self.degrade(e);
        }
        result
    }
}

impl HistoryStore for FileHistory {
    fn append(&self, record: NotificationRecord) -> Result<(), HazardError> {
        self.memory.push(record);
        self.persist()
    }

    fn query_recent(
        &self,
        kind: MonitorType,
        level: RiskLevel,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<NotificationRecord> {
        self.memory.query_recent(kind, level, window, now)
    }

    fn records(&self) -> Vec<NotificationRecord> {
        self.memory.records()
    }

    fn clear(&self) -> Result<(), HazardError> {
        self.memory.clear()?;
        self.persist()
    }
}

fn load_records(path: &Path) -> Result<Vec<NotificationRecord>, HazardError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| HazardError::Persistence(format!("failed to read {}: {}", path.display(), e)))?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&contents)
        .map_err(|e| HazardError::Persistence(format!("failed to parse {}: {}", path.display(), e)))
}

fn write_records(path: &Path, records: &[NotificationRecord]) -> Result<(), HazardError> {
    let body = serde_json::to_string_pretty(records)
        .map_err(|e| HazardError::Persistence(format!("failed to encode history: {}", e)))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| HazardError::Persistence(format!("failed to create {}: {}", parent.display(), e)))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body)
        .and_then(|_| fs::rename(&tmp, path))
        .map_err(|e| HazardError::Persistence(format!("failed to write {}: {}", path.display(), e)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(n: i64, kind: MonitorType, level: RiskLevel) -> NotificationRecord {
        NotificationRecord {
            id: format!("notif-{}", n),
            kind,
            level,
            message: format!("record {}", n),
            timestamp: t0() + Duration::seconds(n),
            payload: serde_json::json!({ "n": n }),
        }
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let history = MemoryHistory::new();
        for n in 0..25 {
            history.append(record(n, MonitorType::Rainfall, RiskLevel::Caution)).unwrap();
            assert!(history.len() <= HISTORY_CAPACITY);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_history_is_newest_first_and_drops_oldest() {
        let history = MemoryHistory::new();
        for n in 0..12 {
            history.append(record(n, MonitorType::Rainfall, RiskLevel::Danger)).unwrap();
        }
        let ids: Vec<_> = history.records().into_iter().map(|r| r.id).collect();
        assert_eq!(ids.first().map(String::as_str), Some("notif-11"));
        assert_eq!(ids.last().map(String::as_str), Some("notif-2"));
        let records = history.records();
        for pair in records.windows(2) {
            assert!(pair[0].timestamp > pair[1].timestamp, "history must be strictly newest-first");
        }
    }

    #[test]
    fn test_query_recent_matches_type_and_level_within_window() {
        let history = MemoryHistory::new();
        history.append(record(0, MonitorType::Rainfall, RiskLevel::Caution)).unwrap();
        history.append(record(10, MonitorType::WaterLevel, RiskLevel::Danger)).unwrap();

        let now = t0() + Duration::minutes(3);
        let window = Duration::minutes(5);
        assert!(history.query_recent(MonitorType::Rainfall, RiskLevel::Caution, window, now).is_some());
        assert!(history.query_recent(MonitorType::Rainfall, RiskLevel::Danger, window, now).is_none());
        assert!(history.query_recent(MonitorType::Wind, RiskLevel::Caution, window, now).is_none());
    }

    #[test]
    fn test_query_recent_window_is_exclusive_at_the_edge() {
        let history = MemoryHistory::new();
        history.append(record(0, MonitorType::Rainfall, RiskLevel::Caution)).unwrap();
        let window = Duration::minutes(5);

        let just_inside = t0() + window - Duration::milliseconds(1);
        assert!(history.query_recent(MonitorType::Rainfall, RiskLevel::Caution, window, just_inside).is_some());

        let at_edge = t0() + window;
        assert!(
            history.query_recent(MonitorType::Rainfall, RiskLevel::Caution, window, at_edge).is_none(),
            "a record exactly one window old is no longer recent"
        );
    }

    #[test]
    fn test_query_recent_returns_newest_match() {
        let history = MemoryHistory::new();
        history.append(record(1, MonitorType::Wind, RiskLevel::Caution)).unwrap();
        history.append(record(2, MonitorType::Wind, RiskLevel::Caution)).unwrap();
        let found = history
            .query_recent(MonitorType::Wind, RiskLevel::Caution, Duration::minutes(5), t0())
            .unwrap();
        assert_eq!(found.id, "notif-2");
    }

    #[test]
    fn test_clear_empties_history() {
        let history = MemoryHistory::new();
        history.append(record(0, MonitorType::Rainfall, RiskLevel::Caution)).unwrap();
        history.clear().unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_concurrent_appends_preserve_cap() {
        let history = Arc::new(MemoryHistory::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let history = Arc::clone(&history);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        let kind = MonitorType::ALL[t % 3];
                        history.append(record(t as i64 * 100 + n, kind, RiskLevel::Caution)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_file_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        {
            let history = FileHistory::open(&path);
            history.append(record(1, MonitorType::Rainfall, RiskLevel::Caution)).unwrap();
            history.append(record(2, MonitorType::WaterLevel, RiskLevel::Danger)).unwrap();
            assert!(history.is_persistent());
        }
        let reopened = FileHistory::open(&path);
        let ids: Vec<_> = reopened.records().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["notif-2", "notif-1"]);
    }

    #[test]
    fn test_corrupt_file_degrades_to_memory_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();

        let history = FileHistory::open(&path);
        assert!(!history.is_persistent(), "corrupt file should disable persistence");
        history.append(record(1, MonitorType::Rainfall, RiskLevel::Caution)).unwrap();
        assert_eq!(history.records().len(), 1, "memory-only store still works");
    }

    #[test]
    fn test_write_failure_reports_once_then_stays_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every write fail.
        let path = dir.path().join("history.json");
        fs::create_dir_all(path.with_extension("json.tmp")).unwrap();

        let history = FileHistory::open(&path);
        assert!(history.is_persistent());

        let first = history.append(record(1, MonitorType::Rainfall, RiskLevel::Caution));
        assert!(matches!(first, Err(HazardError::Persistence(_))));
        assert!(!history.is_persistent());

        let second = history.append(record(2, MonitorType::Rainfall, RiskLevel::Danger));
        assert!(second.is_ok(), "degraded store no longer reports faults");
        assert_eq!(history.records().len(), 2, "both records are kept in memory");
    }
}
