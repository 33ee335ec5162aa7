//! QueueManager - 排队引擎入口
//!
//! Every mutating operation follows the same flow:
//!
//! ```text
//! call / seat / remove
//!     ├─ 1. Validate input
//!     ├─ 2. Acquire partition lock (bounded by lock_timeout)
//!     ├─ 3. Load partition (blocking pool, bounded by storage_timeout)
//!     ├─ 4. Apply transition + re-rank waiting pool
//!     ├─ 5. Commit changed entries + metadata in one versioned write
//!     ├─ 6. Release lock
//!     ├─ 7. Broadcast QueueEvent
//!     └─ 8. Notify guest (failure → warning, never rollback)
//! ```

mod archive;
mod positions;
mod reports;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use shared::error::ErrorCode;
use shared::queue::{
    ActionResponse, PartitionKey, QueueEntry, QueueEvent, QueueEventKind, QueuePartition,
};
use tokio::sync::broadcast;

use super::clock::{Clock, ReportingCalendar};
use super::error::{QueueError, QueueResult};
use super::lifecycle::Transition;
use super::locks::PartitionLocks;
use super::notification::{self, NotificationGateway, NotificationKind};
use super::position;
use super::storage::{QueueStore, StorageResult};
use crate::core::Config;

/// Event broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Timeouts applied around locks, storage and the notification gateway
#[derive(Debug, Clone, Copy)]
pub struct ManagerOptions {
    pub lock_timeout: Duration,
    pub storage_timeout: Duration,
    pub notify_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(5_000),
            storage_timeout: Duration::from_millis(5_000),
            notify_timeout: Duration::from_millis(10_000),
        }
    }
}

impl ManagerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
            storage_timeout: Duration::from_millis(config.storage_timeout_ms),
            notify_timeout: Duration::from_millis(config.notify_timeout_ms),
        }
    }
}

/// Walk-in queue engine
///
/// The `epoch` field is a unique identifier generated on each startup.
/// Subscribers use it to detect engine restarts.
pub struct QueueManager {
    store: Arc<dyn QueueStore>,
    gateway: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    calendar: Arc<dyn ReportingCalendar>,
    locks: PartitionLocks,
    /// Serializes `notify_top_of_queue` runs; held across the unlocked sends
    notify_locks: PartitionLocks,
    event_tx: broadcast::Sender<QueueEvent>,
    options: ManagerOptions,
    epoch: String,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("store", &"<QueueStore>")
            .field("event_tx", &"<broadcast::Sender>")
            .field("options", &self.options)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl QueueManager {
    pub fn new(
        store: Arc<dyn QueueStore>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        calendar: Arc<dyn ReportingCalendar>,
        options: ManagerOptions,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let epoch = uuid::Uuid::new_v4().to_string();
        tracing::info!(epoch = %epoch, "QueueManager started with new epoch");
        Self {
            store,
            gateway,
            clock,
            calendar,
            locks: PartitionLocks::new(options.lock_timeout),
            notify_locks: PartitionLocks::new(
                options.lock_timeout + options.notify_timeout * position::TOP_OF_QUEUE,
            ),
            event_tx,
            options,
            epoch,
        }
    }

    /// Get the engine epoch (unique instance ID)
    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Subscribe to committed changes
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    // ========== Lifecycle ==========

    /// waiting → called, then send `table_ready`
    pub async fn call(
        &self,
        location_id: &str,
        entry_id: &str,
        admin_id: &str,
        date: Option<NaiveDate>,
    ) -> ActionResponse {
        self.execute(location_id, entry_id, admin_id, Transition::Call, date)
            .await
    }

    /// waiting | called → seated, then send `seated_confirmation`
    pub async fn seat(
        &self,
        location_id: &str,
        entry_id: &str,
        admin_id: &str,
        date: Option<NaiveDate>,
    ) -> ActionResponse {
        self.execute(location_id, entry_id, admin_id, Transition::Seat, date)
            .await
    }

    /// waiting | called → removed; a `no_show` removal sends `expired_no_show`
    pub async fn remove(
        &self,
        location_id: &str,
        entry_id: &str,
        admin_id: &str,
        reason: &str,
        date: Option<NaiveDate>,
    ) -> ActionResponse {
        self.execute(
            location_id,
            entry_id,
            admin_id,
            Transition::remove(reason),
            date,
        )
        .await
    }

    async fn execute(
        &self,
        location_id: &str,
        entry_id: &str,
        admin_id: &str,
        transition: Transition,
        date: Option<NaiveDate>,
    ) -> ActionResponse {
        let key = self.resolve_key(location_id, date);

        let applied = self
            .apply_transition(&key, entry_id, admin_id, &transition)
            .await;
        let (entry, version) = match self.release_missing(&key, applied) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(
                    partition = %key,
                    entry_id = %entry_id,
                    target = %transition.target(),
                    error = %err,
                    "Queue transition rejected"
                );
                return ActionResponse::error(err.into());
            }
        };

        tracing::info!(
            partition = %key,
            entry_id = %entry_id,
            admin_id = %admin_id,
            status = %entry.status,
            version,
            "Queue entry transitioned"
        );
        self.publish(transition.event_kind(), &key, Some(entry_id), version);

        let mut response = ActionResponse::success(transition.describe(&entry), entry.clone());
        if let Some(kind) = transition.notification() {
            // 锁已释放，通知失败只记为警告
            if let Some(warning) = self.notify_entry(&entry, kind).await {
                response = response.with_warning(warning);
            }
        }
        response
    }

    /// Steps 2-5 of the flow; the lock is released on return
    async fn apply_transition(
        &self,
        key: &PartitionKey,
        entry_id: &str,
        admin_id: &str,
        transition: &Transition,
    ) -> QueueResult<(QueueEntry, u64)> {
        transition.validate(admin_id)?;

        let _guard = self.locks.acquire(key).await?;
        let mut partition = self.load_partition(key).await?;
        let now = self.clock.now_millis();

        let entry = partition
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| QueueError::EntryNotFound(entry_id.to_string()))?;
        transition.apply(entry, admin_id, now)?;

        let mut changed = position::rank(&mut partition, now);
        if !changed.iter().any(|id| id == entry_id) {
            changed.push(entry_id.to_string());
        }

        let version = self.commit(&partition, &changed).await?;
        let entry = partition
            .entries
            .remove(entry_id)
            .ok_or_else(|| QueueError::Internal(format!("entry {} vanished", entry_id)))?;
        Ok((entry, version))
    }

    /// Send one guest message, returning a warning on failure
    async fn notify_entry(&self, entry: &QueueEntry, kind: NotificationKind) -> Option<String> {
        match notification::deliver(
            self.gateway.as_ref(),
            self.options.notify_timeout,
            entry,
            kind,
        )
        .await
        {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    entry_id = %entry.id,
                    kind = %kind,
                    error = %e,
                    "Guest notification failed"
                );
                Some(format!("{}: {}", ErrorCode::NotificationFailed.message(), e))
            }
        }
    }

    // ========== Internals ==========

    /// Omitted date → the location's current reporting day
    fn resolve_key(&self, location_id: &str, date: Option<NaiveDate>) -> PartitionKey {
        let date = date.unwrap_or_else(|| self.calendar.current_date(location_id));
        PartitionKey::new(location_id, date)
    }

    /// Drop the lock slots of a partition that does not exist
    ///
    /// Call after the guards are released; unknown keys would otherwise stay
    /// in the lock maps forever.
    fn release_missing<T>(&self, key: &PartitionKey, result: QueueResult<T>) -> QueueResult<T> {
        if let Err(QueueError::PartitionNotFound(_)) = &result {
            self.locks.forget(key);
            self.notify_locks.forget(key);
        }
        result
    }

    /// Run a store call on the blocking pool, bounded by `storage_timeout`
    ///
    /// A timed-out call may still commit later; the version check on the next
    /// write catches that.
    async fn with_store<T, F>(&self, f: F) -> QueueResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn QueueStore) -> StorageResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        let task = tokio::task::spawn_blocking(move || f(store.as_ref()));
        match tokio::time::timeout(self.options.storage_timeout, task).await {
            Ok(Ok(result)) => result.map_err(QueueError::from),
            Ok(Err(e)) => Err(QueueError::Internal(format!("storage task failed: {}", e))),
            Err(_) => Err(QueueError::StorageUnavailable(format!(
                "storage did not respond within {:?}",
                self.options.storage_timeout
            ))),
        }
    }

    async fn load_partition(&self, key: &PartitionKey) -> QueueResult<QueuePartition> {
        let lookup = key.clone();
        self.with_store(move |store| store.get(&lookup))
            .await?
            .ok_or_else(|| QueueError::PartitionNotFound(key.to_string()))
    }

    /// Versioned write of `changed` entries plus metadata
    async fn commit(&self, partition: &QueuePartition, changed: &[String]) -> QueueResult<u64> {
        let key = partition.key();
        let expected = partition.metadata.version;
        let metadata = partition.metadata.clone();
        let entries: Vec<QueueEntry> = changed
            .iter()
            .filter_map(|id| partition.entries.get(id).cloned())
            .collect();
        self.with_store(move |store| store.put_entries(&key, expected, &entries, &metadata))
            .await
    }

    fn publish(&self, kind: QueueEventKind, key: &PartitionKey, entry_id: Option<&str>, version: u64) {
        let event = QueueEvent {
            kind,
            location_id: key.location_id.clone(),
            date: key.date,
            entry_id: entry_id.map(str::to_string),
            version,
            timestamp: self.clock.now_millis(),
        };
        // 无订阅者时 send 返回 Err，忽略
        let _ = self.event_tx.send(event);
    }
}
