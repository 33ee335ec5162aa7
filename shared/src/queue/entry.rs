//! Queue entry model (one guest in the waiting room)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known remove reason codes (free-form strings are also accepted)
pub mod remove_reason {
    /// Guest did not show up when called
    pub const NO_SHOW: &str = "no_show";
    /// Guest cancelled
    pub const CANCELLED: &str = "cancelled";
    /// Guest left without notice
    pub const LEFT: &str = "left";
}

/// 排队状态
///
/// `waiting → called → seated`, `waiting → seated`, `waiting → removed`,
/// `called → removed`. `seated` 和 `removed` 为终态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    Waiting,
    Called,
    Seated,
    Removed,
}

impl EntryStatus {
    /// Terminal statuses allow no further transition
    pub const fn is_terminal(self) -> bool {
        matches!(self, EntryStatus::Seated | EntryStatus::Removed)
    }

    /// Whether `self → next` is a legal lifecycle step
    pub const fn can_transition_to(self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (EntryStatus::Waiting, EntryStatus::Called)
                | (EntryStatus::Waiting, EntryStatus::Seated)
                | (EntryStatus::Waiting, EntryStatus::Removed)
                | (EntryStatus::Called, EntryStatus::Seated)
                | (EntryStatus::Called, EntryStatus::Removed)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Waiting => "waiting",
            EntryStatus::Called => "called",
            EntryStatus::Seated => "seated",
            EntryStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idempotency markers for guest notifications
///
/// Persisted with the entry so a retried operation never re-sends.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFlags {
    #[serde(default)]
    pub called: bool,
    #[serde(default)]
    pub seated: bool,
    #[serde(default)]
    pub position_update: bool,
}

/// One guest's waiting-room record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Unique within the partition
    pub id: String,
    pub phone_number: String,
    pub guest_name: String,
    /// Always >= 1
    pub party_size: u32,

    // === Lifecycle ===
    pub status: EntryStatus,
    /// Creation time (Unix millis), immutable
    pub added_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub called_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<i64>,

    // === Derived, only while waiting ===
    /// 1-based rank in the waiting pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_wait_time: Option<u32>,

    // === Audit ===
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub called_by_admin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seated_by_admin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_by_admin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_reason: Option<String>,

    #[serde(default)]
    pub notifications_sent: NotificationFlags,

    // === Denormalized for notification text and summaries ===
    pub location_id: String,
    pub location_name: String,
}

impl QueueEntry {
    /// Create a fresh `waiting` entry
    pub fn new(
        id: impl Into<String>,
        phone_number: impl Into<String>,
        guest_name: impl Into<String>,
        party_size: u32,
        added_at: i64,
        location_id: impl Into<String>,
        location_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            phone_number: phone_number.into(),
            guest_name: guest_name.into(),
            party_size,
            status: EntryStatus::Waiting,
            added_at,
            called_at: None,
            seated_at: None,
            removed_at: None,
            position: None,
            estimated_wait_time: None,
            called_by_admin: None,
            seated_by_admin: None,
            removed_by_admin: None,
            remove_reason: None,
            notifications_sent: NotificationFlags::default(),
            location_id: location_id.into(),
            location_name: location_name.into(),
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == EntryStatus::Waiting
    }

    /// Minutes between joining and being seated (seated entries only)
    pub fn seated_wait_minutes(&self) -> Option<f64> {
        match (self.status, self.seated_at) {
            (EntryStatus::Seated, Some(seated_at)) => {
                Some((seated_at - self.added_at).max(0) as f64 / 60_000.0)
            }
            _ => None,
        }
    }
}
