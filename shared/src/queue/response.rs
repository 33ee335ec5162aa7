//! Caller-facing results of queue operations

use super::entry::QueueEntry;
use super::partition::QueueMetadata;
use crate::error::ErrorCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Error details carried by a failed [`ActionResponse`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueActionError {
    pub code: ErrorCode,
    pub message: String,
}

impl QueueActionError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.code.is_retriable()
    }
}

/// Result of `call` / `seat` / `remove`
///
/// A failed notification keeps `success = true` and adds a warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<QueueEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<QueueActionError>,
}

impl ActionResponse {
    pub fn success(message: impl Into<String>, entry: QueueEntry) -> Self {
        Self {
            success: true,
            message: message.into(),
            entry: Some(entry),
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn error(error: QueueActionError) -> Self {
        Self {
            success: false,
            message: error.message.clone(),
            entry: None,
            warnings: Vec::new(),
            error: Some(error),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// `get_queue_status` result: waiting entries by position first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueView {
    pub metadata: QueueMetadata,
    pub entries: Vec<QueueEntry>,
}

/// Committed change broadcast to subscribers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventKind {
    EntryCalled,
    EntrySeated,
    EntryRemoved,
    PositionsRecalculated,
    StatusChanged,
    PartitionArchived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueEvent {
    pub kind: QueueEventKind,
    pub location_id: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    /// Partition version after the write (0 once archived)
    pub version: u64,
    pub timestamp: i64,
}

/// Result of `notify_top_of_queue`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotifyReport {
    pub sent: usize,
    pub failed: usize,
    /// Top-of-queue entries already notified
    pub skipped: usize,
}

/// One partition that failed during an archival sweep
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SweepError {
    pub location_id: String,
    pub date: NaiveDate,
    pub message: String,
}

/// Result of `run_archival_sweep`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Expired partitions the sweep attempted
    pub processed_count: usize,
    pub archived_count: usize,
    pub errors: Vec<SweepError>,
}
