use super::*;
use crate::queue::clock::{BusinessDayCalendar, ManualClock};
use crate::queue::notification::{NotificationError, NotificationPayload};
use crate::queue::storage::{RedbQueueStore, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime};
use parking_lot::Mutex;
use shared::queue::{
    EntryStatus, QueueHistorySummary, QueueMetadata, QueueStatus, remove_reason,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const MINUTE: i64 = 60_000;
const LOCATION: &str = "loc-centro";
const ADMIN: &str = "admin-1";

fn millis(rfc3339: &str) -> i64 {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().timestamp_millis()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Reporting day of the test clock
fn today() -> NaiveDate {
    date("2026-10-18")
}

// ========================================================================
// Test doubles
// ========================================================================

/// Gateway that records every message and can be switched to failing
#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<(String, NotificationKind, NotificationPayload)>>,
    failing: AtomicBool,
}

impl RecordingGateway {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn count(&self, kind: NotificationKind) -> usize {
        self.sent.lock().iter().filter(|(_, k, _)| *k == kind).count()
    }

    fn total(&self) -> usize {
        self.sent.lock().len()
    }

    fn recipients(&self, kind: NotificationKind) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, payload)| payload.entry_id.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(
        &self,
        phone_number: &str,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Delivery("gateway down".to_string()));
        }
        self.sent
            .lock()
            .push((phone_number.to_string(), kind, payload.clone()));
        Ok(())
    }
}

/// Store wrapper with injectable faults
struct FaultyStore {
    inner: RedbQueueStore,
    /// put_history fails for this location
    fail_history_for: Mutex<Option<String>>,
    /// every get() blocks this long (ms)
    get_delay_ms: AtomicU64,
    /// put_entries first lets an "outside writer" bump the version
    race_next_write: AtomicBool,
}

impl FaultyStore {
    fn new() -> Self {
        Self {
            inner: RedbQueueStore::open_in_memory().unwrap(),
            fail_history_for: Mutex::new(None),
            get_delay_ms: AtomicU64::new(0),
            race_next_write: AtomicBool::new(false),
        }
    }
}

impl QueueStore for FaultyStore {
    fn get(&self, key: &PartitionKey) -> StorageResult<Option<QueuePartition>> {
        let delay = self.get_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        self.inner.get(key)
    }

    fn put_partition(&self, partition: &QueuePartition) -> StorageResult<u64> {
        self.inner.put_partition(partition)
    }

    fn put_entries(
        &self,
        key: &PartitionKey,
        expected_version: u64,
        entries: &[QueueEntry],
        metadata: &QueueMetadata,
    ) -> StorageResult<u64> {
        if self.race_next_write.swap(false, Ordering::SeqCst) {
            if let Some(current) = self.inner.get(key)? {
                self.inner.put_partition(&current)?;
            }
        }
        self.inner.put_entries(key, expected_version, entries, metadata)
    }

    fn delete_partition(&self, key: &PartitionKey) -> StorageResult<bool> {
        self.inner.delete_partition(key)
    }

    fn list_partitions(&self, location_id: Option<&str>) -> StorageResult<Vec<PartitionKey>> {
        self.inner.list_partitions(location_id)
    }

    fn put_history(&self, summary: &QueueHistorySummary) -> StorageResult<()> {
        if self.fail_history_for.lock().as_deref() == Some(summary.location_id.as_str()) {
            return Err(StorageError::Backend("history table unavailable".to_string()));
        }
        self.inner.put_history(summary)
    }

    fn get_history_range(
        &self,
        location_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StorageResult<Vec<QueueHistorySummary>> {
        self.inner.get_history_range(location_id, start, end)
    }
}

// ========================================================================
// Harness
// ========================================================================

struct TestContext {
    manager: QueueManager,
    store: Arc<FaultyStore>,
    gateway: Arc<RecordingGateway>,
    clock: Arc<ManualClock>,
}

fn test_options() -> ManagerOptions {
    ManagerOptions {
        lock_timeout: Duration::from_millis(200),
        storage_timeout: Duration::from_secs(2),
        notify_timeout: Duration::from_secs(1),
    }
}

/// UTC calendar, midnight cutoff, clock at 2026-10-18 12:00 UTC
fn create_test_manager() -> TestContext {
    create_test_manager_with(test_options(), NaiveTime::MIN)
}

fn create_test_manager_with(options: ManagerOptions, cutoff: NaiveTime) -> TestContext {
    let store = Arc::new(FaultyStore::new());
    let gateway = Arc::new(RecordingGateway::default());
    let clock = Arc::new(ManualClock::new(millis("2026-10-18T12:00:00+00:00")));
    let calendar = Arc::new(BusinessDayCalendar::new(
        clock.clone(),
        chrono_tz::UTC,
        cutoff,
    ));
    let manager = QueueManager::new(
        store.clone(),
        gateway.clone(),
        clock.clone(),
        calendar,
        options,
    );
    TestContext {
        manager,
        store,
        gateway,
        clock,
    }
}

/// Seed a partition with `count` waiting guests `g1..gN`, one minute apart
///
/// Returns entry ids in arrival order. Positions are not ranked yet.
fn seed_partition(ctx: &TestContext, location_id: &str, day: NaiveDate, count: usize) -> Vec<String> {
    let key = PartitionKey::new(location_id, day);
    let base = day
        .and_hms_opt(11, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis();
    let mut partition = QueuePartition::new(QueueMetadata::new(&key, "Centro", 40, base));

    let ids: Vec<String> = (1..=count).map(|i| format!("g{}", i)).collect();
    for (i, id) in ids.iter().enumerate() {
        partition.insert(QueueEntry::new(
            id.clone(),
            format!("+3460000{:04}", i + 1),
            format!("Guest {}", i + 1),
            2,
            base + i as i64 * MINUTE,
            location_id,
            "Centro",
        ));
    }
    ctx.store.put_partition(&partition).unwrap();
    ids
}

/// Seed today's partition and rank it
async fn seed_ranked(ctx: &TestContext, count: usize) -> Vec<String> {
    let ids = seed_partition(ctx, LOCATION, today(), count);
    ctx.manager.recalculate(LOCATION, None).await.unwrap();
    ids
}

fn stored_entry(ctx: &TestContext, entry_id: &str) -> QueueEntry {
    let key = PartitionKey::new(LOCATION, today());
    ctx.store.get(&key).unwrap().unwrap().entries[entry_id].clone()
}

fn error_code(response: &ActionResponse) -> Option<ErrorCode> {
    response.error.as_ref().map(|e| e.code)
}

mod test_positions;
