//! Entry lifecycle transitions (pure)
//!
//! ```text
//! waiting ──call──▶ called ──seat──▶ seated
//!    │                 │
//!    ├──seat───────────┼──────────────▶ seated
//!    └──remove─────────┴──remove──────▶ removed
//! ```
//!
//! A transition validates the current status, stamps the audit fields and
//! marks the matching notification flag in the same mutation, so a retried
//! operation can never send the same message twice.

use shared::queue::{EntryStatus, QueueEntry, QueueEventKind, remove_reason};

use super::error::{QueueError, QueueResult};
use super::notification::NotificationKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Call,
    Seat,
    Remove { reason: String },
}

impl Transition {
    pub fn remove(reason: impl Into<String>) -> Self {
        Transition::Remove {
            reason: reason.into(),
        }
    }

    pub fn target(&self) -> EntryStatus {
        match self {
            Transition::Call => EntryStatus::Called,
            Transition::Seat => EntryStatus::Seated,
            Transition::Remove { .. } => EntryStatus::Removed,
        }
    }

    pub fn event_kind(&self) -> QueueEventKind {
        match self {
            Transition::Call => QueueEventKind::EntryCalled,
            Transition::Seat => QueueEventKind::EntrySeated,
            Transition::Remove { .. } => QueueEventKind::EntryRemoved,
        }
    }

    /// Input checks that don't need the stored entry
    pub fn validate(&self, admin_id: &str) -> QueueResult<()> {
        if admin_id.trim().is_empty() {
            return Err(QueueError::validation("admin_id is required"));
        }
        match self {
            Transition::Remove { reason } if reason.trim().is_empty() => {
                Err(QueueError::validation("remove reason is required"))
            }
            _ => Ok(()),
        }
    }

    /// Apply to `entry`, or fail without touching it
    pub fn apply(&self, entry: &mut QueueEntry, admin_id: &str, now: i64) -> QueueResult<()> {
        let target = self.target();
        if !entry.status.can_transition_to(target) {
            return Err(QueueError::InvalidTransition {
                entry_id: entry.id.clone(),
                current: entry.status,
                attempted: target,
            });
        }

        entry.status = target;
        match self {
            Transition::Call => {
                entry.called_at = Some(now);
                entry.called_by_admin = Some(admin_id.to_string());
                entry.notifications_sent.called = true;
            }
            Transition::Seat => {
                entry.seated_at = Some(now);
                entry.seated_by_admin = Some(admin_id.to_string());
                entry.notifications_sent.seated = true;
            }
            Transition::Remove { reason } => {
                entry.removed_at = Some(now);
                entry.removed_by_admin = Some(admin_id.to_string());
                entry.remove_reason = Some(reason.clone());
            }
        }

        // 离开等待池，派生字段失效
        entry.position = None;
        entry.estimated_wait_time = None;
        Ok(())
    }

    /// Message owed to the guest after this transition commits
    pub fn notification(&self) -> Option<NotificationKind> {
        match self {
            Transition::Call => Some(NotificationKind::TableReady),
            Transition::Seat => Some(NotificationKind::SeatedConfirmation),
            Transition::Remove { reason } if reason == remove_reason::NO_SHOW => {
                Some(NotificationKind::ExpiredNoShow)
            }
            Transition::Remove { .. } => None,
        }
    }

    /// Human-readable outcome for the caller
    pub fn describe(&self, entry: &QueueEntry) -> String {
        match self {
            Transition::Call => format!("{} has been called", entry.guest_name),
            Transition::Seat => format!("{} has been seated", entry.guest_name),
            Transition::Remove { reason } => {
                format!("{} has been removed ({})", entry.guest_name, reason)
            }
        }
    }
}
