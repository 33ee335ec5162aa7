//! redb-based storage layer for queue partitions
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `partitions` | `(location_id, date)` | `QueueMetadata` | Partition header + version |
//! | `entries` | `(location_id, date, entry_id)` | `QueueEntry` | Live queue entries |
//! | `history` | `(location_id, date)` | `QueueHistorySummary` | Archived day summaries |
//!
//! Dates are stored as `YYYY-MM-DD`, so lexicographic key order is calendar
//! order and history range scans are plain key ranges.
//!
//! # Durability
//!
//! redb commits are persistent as soon as `commit()` returns (copy-on-write
//! with atomic pointer swap). A partition write touches the header and every
//! changed entry inside one transaction, so a crash never leaves an entry
//! mutation without its position recalculation.

use chrono::NaiveDate;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::queue::{
    PartitionKey, QueueEntry, QueueHistorySummary, QueueMetadata, QueuePartition,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Partition headers: key = (location_id, date), value = JSON-serialized QueueMetadata
const PARTITIONS_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("partitions");

/// Entries: key = (location_id, date, entry_id), value = JSON-serialized QueueEntry
const ENTRIES_TABLE: TableDefinition<(&str, &str, &str), &[u8]> = TableDefinition::new("entries");

/// History: key = (location_id, date), value = JSON-serialized QueueHistorySummary
const HISTORY_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("history");

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("Invalid stored key: {0}")]
    InvalidKey(String),

    /// Failure reported by a non-redb backend
    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable keyed storage for queue partitions and history
///
/// Owns no queue logic. Implementations must make `put_entries` atomic
/// across the header and all given entries.
pub trait QueueStore: Send + Sync {
    /// Load a whole partition
    fn get(&self, key: &PartitionKey) -> StorageResult<Option<QueuePartition>>;

    /// Write a whole partition (seeding / external join layer)
    ///
    /// Returns the new version. Existing entries not in `partition` are kept.
    fn put_partition(&self, partition: &QueuePartition) -> StorageResult<u64>;

    /// Compare-and-set write of the header plus the given entries
    ///
    /// Fails with [`StorageError::VersionConflict`] when the stored version is
    /// not `expected_version`. Returns the new version.
    fn put_entries(
        &self,
        key: &PartitionKey,
        expected_version: u64,
        entries: &[QueueEntry],
        metadata: &QueueMetadata,
    ) -> StorageResult<u64>;

    /// Remove a partition and all its entries; returns whether it existed
    fn delete_partition(&self, key: &PartitionKey) -> StorageResult<bool>;

    /// All partition keys, optionally for one location
    fn list_partitions(&self, location_id: Option<&str>) -> StorageResult<Vec<PartitionKey>>;

    /// Upsert a history summary keyed by `(location_id, date)`
    fn put_history(&self, summary: &QueueHistorySummary) -> StorageResult<()>;

    /// History summaries with `start <= date <= end`, ordered by date
    fn get_history_range(
        &self,
        location_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StorageResult<Vec<QueueHistorySummary>>;
}

/// Queue storage backed by redb
#[derive(Clone)]
pub struct RedbQueueStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbQueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbQueueStore").finish_non_exhaustive()
    }
}

impl RedbQueueStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        // Create all tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PARTITIONS_TABLE)?;
            let _ = write_txn.open_table(ENTRIES_TABLE)?;
            let _ = write_txn.open_table(HISTORY_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn parse_date(raw: &str) -> StorageResult<NaiveDate> {
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_| StorageError::InvalidKey(raw.to_string()))
    }
}

impl QueueStore for RedbQueueStore {
    fn get(&self, key: &PartitionKey) -> StorageResult<Option<QueuePartition>> {
        let read_txn = self.db.begin_read()?;
        let partitions = read_txn.open_table(PARTITIONS_TABLE)?;
        let date = key.date_str();

        let metadata: QueueMetadata = match partitions.get((key.location_id.as_str(), date.as_str()))? {
            Some(value) => serde_json::from_slice(value.value())?,
            None => return Ok(None),
        };

        let entries_table = read_txn.open_table(ENTRIES_TABLE)?;
        let mut partition = QueuePartition::new(metadata);
        let range_start = (key.location_id.as_str(), date.as_str(), "");

        for result in entries_table.range(range_start..)? {
            let (k, value) = result?;
            let (location_id, entry_date, _) = k.value();
            if location_id != key.location_id || entry_date != date {
                break;
            }
            let entry: QueueEntry = serde_json::from_slice(value.value())?;
            partition.insert(entry);
        }

        Ok(Some(partition))
    }

    fn put_partition(&self, partition: &QueuePartition) -> StorageResult<u64> {
        let key = partition.key();
        let date = key.date_str();

        let txn = self.db.begin_write()?;
        let version = {
            let mut partitions = txn.open_table(PARTITIONS_TABLE)?;
            let previous = partitions
                .get((key.location_id.as_str(), date.as_str()))?
                .map(|v| serde_json::from_slice::<QueueMetadata>(v.value()))
                .transpose()?;

            let mut metadata = partition.metadata.clone();
            metadata.version = previous.map(|m| m.version + 1).unwrap_or(1);
            let value = serde_json::to_vec(&metadata)?;
            partitions.insert((key.location_id.as_str(), date.as_str()), value.as_slice())?;

            let mut entries = txn.open_table(ENTRIES_TABLE)?;
            for entry in partition.entries.values() {
                let value = serde_json::to_vec(entry)?;
                entries.insert(
                    (key.location_id.as_str(), date.as_str(), entry.id.as_str()),
                    value.as_slice(),
                )?;
            }
            metadata.version
        };
        txn.commit()?;

        Ok(version)
    }

    fn put_entries(
        &self,
        key: &PartitionKey,
        expected_version: u64,
        entries: &[QueueEntry],
        metadata: &QueueMetadata,
    ) -> StorageResult<u64> {
        let date = key.date_str();

        let txn = self.db.begin_write()?;
        let version = {
            let mut partitions = txn.open_table(PARTITIONS_TABLE)?;
            let stored = partitions
                .get((key.location_id.as_str(), date.as_str()))?
                .map(|v| serde_json::from_slice::<QueueMetadata>(v.value()))
                .transpose()?
                .ok_or_else(|| StorageError::PartitionNotFound(key.to_string()))?;

            // Uncommitted transaction is aborted on drop
            if stored.version != expected_version {
                return Err(StorageError::VersionConflict {
                    expected: expected_version,
                    actual: stored.version,
                });
            }

            let mut next = metadata.clone();
            next.version = expected_version + 1;
            let value = serde_json::to_vec(&next)?;
            partitions.insert((key.location_id.as_str(), date.as_str()), value.as_slice())?;

            let mut table = txn.open_table(ENTRIES_TABLE)?;
            for entry in entries {
                let value = serde_json::to_vec(entry)?;
                table.insert(
                    (key.location_id.as_str(), date.as_str(), entry.id.as_str()),
                    value.as_slice(),
                )?;
            }
            next.version
        };
        txn.commit()?;

        Ok(version)
    }

    fn delete_partition(&self, key: &PartitionKey) -> StorageResult<bool> {
        let date = key.date_str();

        let txn = self.db.begin_write()?;
        let existed = {
            let mut partitions = txn.open_table(PARTITIONS_TABLE)?;
            let existed = partitions
                .remove((key.location_id.as_str(), date.as_str()))?
                .is_some();

            let mut entries = txn.open_table(ENTRIES_TABLE)?;
            // Collect first, then remove (no removal while iterating)
            let mut entry_ids: Vec<String> = Vec::new();
            for result in entries.range((key.location_id.as_str(), date.as_str(), "")..)? {
                let (k, _) = result?;
                let (location_id, entry_date, entry_id) = k.value();
                if location_id != key.location_id || entry_date != date {
                    break;
                }
                entry_ids.push(entry_id.to_string());
            }
            for entry_id in &entry_ids {
                entries.remove((key.location_id.as_str(), date.as_str(), entry_id.as_str()))?;
            }
            existed
        };
        txn.commit()?;

        Ok(existed)
    }

    fn list_partitions(&self, location_id: Option<&str>) -> StorageResult<Vec<PartitionKey>> {
        let read_txn = self.db.begin_read()?;
        let partitions = read_txn.open_table(PARTITIONS_TABLE)?;

        let mut keys = Vec::new();
        for result in partitions.iter()? {
            let (k, _) = result?;
            let (loc, date) = k.value();
            if location_id.is_some_and(|wanted| wanted != loc) {
                continue;
            }
            keys.push(PartitionKey::new(loc, Self::parse_date(date)?));
        }

        Ok(keys)
    }

    fn put_history(&self, summary: &QueueHistorySummary) -> StorageResult<()> {
        let date = summary.date.format(DATE_FORMAT).to_string();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(HISTORY_TABLE)?;
            let value = serde_json::to_vec(summary)?;
            table.insert((summary.location_id.as_str(), date.as_str()), value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn get_history_range(
        &self,
        location_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StorageResult<Vec<QueueHistorySummary>> {
        if start > end {
            return Ok(Vec::new());
        }

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HISTORY_TABLE)?;
        let start_str = start.format(DATE_FORMAT).to_string();
        let end_str = end.format(DATE_FORMAT).to_string();

        let mut summaries = Vec::new();
        for result in table.range((location_id, start_str.as_str())..=(location_id, end_str.as_str()))? {
            let (_key, value) = result?;
            let summary: QueueHistorySummary = serde_json::from_slice(value.value())?;
            summaries.push(summary);
        }

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::queue::{EntryStatus, HourlyStats};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn create_test_partition(location_id: &str, day: &str, entries: usize) -> QueuePartition {
        let key = PartitionKey::new(location_id, date(day));
        let mut partition = QueuePartition::new(QueueMetadata::new(&key, "Centro", 20, 0));
        for i in 0..entries {
            partition.insert(QueueEntry::new(
                format!("e{}", i),
                format!("+3460000000{}", i),
                format!("Guest {}", i),
                2,
                i as i64 * 1000,
                location_id,
                "Centro",
            ));
        }
        partition
    }

    fn create_test_summary(location_id: &str, day: &str, queued: u32) -> QueueHistorySummary {
        QueueHistorySummary {
            date: date(day),
            location_id: location_id.to_string(),
            location_name: "Centro".to_string(),
            total_queued: queued,
            total_seated: 0,
            total_removed: 0,
            total_called: 0,
            average_wait_time: 0.0,
            peak_queue_size: queued,
            completion_rate: 0.0,
            cancelation_rate: 0.0,
            hourly_stats: HourlyStats::new(),
            archived_at: 0,
        }
    }

    #[test]
    fn test_put_and_get_partition() {
        let storage = RedbQueueStore::open_in_memory().unwrap();
        let partition = create_test_partition("loc-1", "2026-10-18", 3);

        let version = storage.put_partition(&partition).unwrap();
        assert_eq!(version, 1);

        let loaded = storage.get(&partition.key()).unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 3);
        assert_eq!(loaded.metadata.version, 1);
        assert_eq!(loaded.entries["e1"].guest_name, "Guest 1");

        // Neighbouring partitions are not mixed in
        let other = create_test_partition("loc-1", "2026-10-19", 1);
        storage.put_partition(&other).unwrap();
        let loaded = storage.get(&partition.key()).unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 3);
    }

    #[test]
    fn test_get_missing_partition() {
        let storage = RedbQueueStore::open_in_memory().unwrap();
        let key = PartitionKey::new("nowhere", date("2026-01-01"));
        assert!(storage.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_put_entries_compare_and_set() {
        let storage = RedbQueueStore::open_in_memory().unwrap();
        let partition = create_test_partition("loc-1", "2026-10-18", 2);
        let key = partition.key();
        let v1 = storage.put_partition(&partition).unwrap();

        let mut entry = partition.entries["e0"].clone();
        entry.status = EntryStatus::Called;
        let v2 = storage
            .put_entries(&key, v1, std::slice::from_ref(&entry), &partition.metadata)
            .unwrap();
        assert_eq!(v2, v1 + 1);

        // Stale writer loses
        let err = storage
            .put_entries(&key, v1, std::slice::from_ref(&entry), &partition.metadata)
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::VersionConflict { expected, actual } if expected == v1 && actual == v2
        ));

        let loaded = storage.get(&key).unwrap().unwrap();
        assert_eq!(loaded.entries["e0"].status, EntryStatus::Called);
        assert_eq!(loaded.metadata.version, v2);
    }

    #[test]
    fn test_put_entries_missing_partition() {
        let storage = RedbQueueStore::open_in_memory().unwrap();
        let partition = create_test_partition("loc-1", "2026-10-18", 1);
        let err = storage
            .put_entries(&partition.key(), 0, &[], &partition.metadata)
            .unwrap_err();
        assert!(matches!(err, StorageError::PartitionNotFound(_)));
    }

    #[test]
    fn test_delete_partition() {
        let storage = RedbQueueStore::open_in_memory().unwrap();
        let a = create_test_partition("loc-1", "2026-10-10", 4);
        let b = create_test_partition("loc-1", "2026-10-11", 2);
        storage.put_partition(&a).unwrap();
        storage.put_partition(&b).unwrap();

        assert!(storage.delete_partition(&a.key()).unwrap());
        assert!(!storage.delete_partition(&a.key()).unwrap());
        assert!(storage.get(&a.key()).unwrap().is_none());
        assert_eq!(storage.get(&b.key()).unwrap().unwrap().entries.len(), 2);
    }

    #[test]
    fn test_list_partitions_by_location() {
        let storage = RedbQueueStore::open_in_memory().unwrap();
        storage.put_partition(&create_test_partition("loc-1", "2026-10-10", 0)).unwrap();
        storage.put_partition(&create_test_partition("loc-1", "2026-10-11", 0)).unwrap();
        storage.put_partition(&create_test_partition("loc-2", "2026-10-11", 0)).unwrap();

        assert_eq!(storage.list_partitions(None).unwrap().len(), 3);
        let loc1 = storage.list_partitions(Some("loc-1")).unwrap();
        assert_eq!(loc1.len(), 2);
        assert!(loc1.iter().all(|k| k.location_id == "loc-1"));
        assert!(storage.list_partitions(Some("loc-9")).unwrap().is_empty());
    }

    #[test]
    fn test_history_range() {
        let storage = RedbQueueStore::open_in_memory().unwrap();
        for (day, queued) in [("2026-10-01", 5), ("2026-10-05", 7), ("2026-10-09", 9)] {
            storage.put_history(&create_test_summary("loc-1", day, queued)).unwrap();
        }
        storage.put_history(&create_test_summary("loc-2", "2026-10-05", 100)).unwrap();

        let range = storage
            .get_history_range("loc-1", date("2026-10-01"), date("2026-10-05"))
            .unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].total_queued, 5);
        assert_eq!(range[1].total_queued, 7);

        // Upsert replaces the same day
        storage.put_history(&create_test_summary("loc-1", "2026-10-05", 8)).unwrap();
        let range = storage
            .get_history_range("loc-1", date("2026-10-05"), date("2026-10-05"))
            .unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range[0].total_queued, 8);

        // Inverted range is empty
        assert!(storage
            .get_history_range("loc-1", date("2026-10-09"), date("2026-10-01"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.redb");
        let partition = create_test_partition("loc-1", "2026-10-18", 2);

        {
            let storage = RedbQueueStore::open(&path).unwrap();
            storage.put_partition(&partition).unwrap();
        }

        let storage = RedbQueueStore::open(&path).unwrap();
        let loaded = storage.get(&partition.key()).unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 2);
    }
}
