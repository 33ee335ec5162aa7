//! Queue partition model (one location, one reporting day)

use super::entry::{EntryStatus, QueueEntry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Partition identity: `(location_id, date)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionKey {
    pub location_id: String,
    /// Reporting day of the location
    pub date: NaiveDate,
}

impl PartitionKey {
    pub fn new(location_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            location_id: location_id.into(),
            date,
        }
    }

    /// `YYYY-MM-DD`
    pub fn date_str(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location_id, self.date)
    }
}

/// 排队开放状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    #[default]
    Open,
    Paused,
    Closed,
}

/// Partition metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueMetadata {
    pub date: NaiveDate,
    pub location_id: String,
    pub location_name: String,
    pub queue_status: QueueStatus,
    /// Number of `waiting` entries (always recomputed)
    pub current_count: u32,
    pub max_capacity: u32,
    /// Estimate for a guest joining now (minutes)
    pub estimated_wait_time: u32,
    pub updated_at: i64,
    /// Bumped by the store on every committed write
    #[serde(default)]
    pub version: u64,
}

impl QueueMetadata {
    pub fn new(
        key: &PartitionKey,
        location_name: impl Into<String>,
        max_capacity: u32,
        now: i64,
    ) -> Self {
        Self {
            date: key.date,
            location_id: key.location_id.clone(),
            location_name: location_name.into(),
            queue_status: QueueStatus::Open,
            current_count: 0,
            max_capacity,
            estimated_wait_time: 0,
            updated_at: now,
            version: 0,
        }
    }

    pub fn key(&self) -> PartitionKey {
        PartitionKey::new(self.location_id.clone(), self.date)
    }
}

/// Unit of storage, locking and archival
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuePartition {
    pub metadata: QueueMetadata,
    /// `entry_id → entry`; ordering is derived, never stored
    #[serde(default)]
    pub entries: BTreeMap<String, QueueEntry>,
}

impl QueuePartition {
    pub fn new(metadata: QueueMetadata) -> Self {
        Self {
            metadata,
            entries: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> PartitionKey {
        self.metadata.key()
    }

    pub fn insert(&mut self, entry: QueueEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    pub fn count_by_status(&self, status: EntryStatus) -> usize {
        self.entries.values().filter(|e| e.status == status).count()
    }
}
