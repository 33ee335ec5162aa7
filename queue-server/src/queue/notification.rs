//! Guest notification gateway
//!
//! Delivery is best-effort: the engine never sends while holding a partition
//! lock, and a failed send never rolls back a committed transition.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::queue::QueueEntry;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TableReady,
    SeatedConfirmation,
    ExpiredNoShow,
    PositionUpdate,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationKind::TableReady => "table_ready",
            NotificationKind::SeatedConfirmation => "seated_confirmation",
            NotificationKind::ExpiredNoShow => "expired_no_show",
            NotificationKind::PositionUpdate => "position_update",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Template variables for a guest message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub entry_id: String,
    pub guest_name: String,
    pub location_name: String,
    pub party_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_time: Option<u32>,
}

impl NotificationPayload {
    pub fn from_entry(entry: &QueueEntry) -> Self {
        Self {
            entry_id: entry.id.clone(),
            guest_name: entry.guest_name.clone(),
            location_name: entry.location_name.clone(),
            party_size: entry.party_size,
            position: entry.position,
            estimated_wait_time: entry.estimated_wait_time,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Notification timed out after {0:?}")]
    Timeout(Duration),
}

/// Outbound message channel (SMS, push, ...)
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(
        &self,
        phone_number: &str,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError>;
}

/// Default guest-facing text
pub fn render_message(kind: NotificationKind, payload: &NotificationPayload) -> String {
    match kind {
        NotificationKind::TableReady => format!(
            "Hi {}, your table for {} at {} is ready. Please come to the host stand.",
            payload.guest_name, payload.party_size, payload.location_name
        ),
        NotificationKind::SeatedConfirmation => format!(
            "Welcome to {}, {}. Enjoy your meal!",
            payload.location_name, payload.guest_name
        ),
        NotificationKind::ExpiredNoShow => format!(
            "Hi {}, we called your party at {} but couldn't find you, so your spot has been released.",
            payload.guest_name, payload.location_name
        ),
        NotificationKind::PositionUpdate => match (payload.position, payload.estimated_wait_time) {
            (Some(position), Some(minutes)) => format!(
                "Hi {}, you're number {} in line at {}. Estimated wait: {} min.",
                payload.guest_name, position, payload.location_name, minutes
            ),
            _ => format!(
                "Hi {}, you're almost up at {}.",
                payload.guest_name, payload.location_name
            ),
        },
    }
}

/// Gateway that only writes messages to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationGateway;

#[async_trait]
impl NotificationGateway for LogNotificationGateway {
    async fn send(
        &self,
        phone_number: &str,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            target: "notification",
            phone = %phone_number,
            kind = %kind,
            entry_id = %payload.entry_id,
            "{}",
            render_message(kind, payload)
        );
        Ok(())
    }
}

/// Send with a deadline; a slow gateway counts as a failure
pub async fn deliver(
    gateway: &dyn NotificationGateway,
    timeout: Duration,
    entry: &QueueEntry,
    kind: NotificationKind,
) -> Result<(), NotificationError> {
    let payload = NotificationPayload::from_entry(entry);
    match tokio::time::timeout(timeout, gateway.send(&entry.phone_number, kind, &payload)).await {
        Ok(result) => result,
        Err(_) => Err(NotificationError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowGateway;

    #[async_trait]
    impl NotificationGateway for SlowGateway {
        async fn send(
            &self,
            _phone_number: &str,
            _kind: NotificationKind,
            _payload: &NotificationPayload,
        ) -> Result<(), NotificationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    fn entry() -> QueueEntry {
        let mut entry = QueueEntry::new("e1", "+34600000000", "Ana", 4, 0, "loc-1", "Centro");
        entry.position = Some(2);
        entry.estimated_wait_time = Some(30);
        entry
    }

    #[test]
    fn test_render_messages() {
        let payload = NotificationPayload::from_entry(&entry());
        let ready = render_message(NotificationKind::TableReady, &payload);
        assert!(ready.contains("Ana"));
        assert!(ready.contains("Centro"));
        assert!(ready.contains("for 4"));

        let update = render_message(NotificationKind::PositionUpdate, &payload);
        assert!(update.contains("number 2"));
        assert!(update.contains("30 min"));
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&NotificationKind::ExpiredNoShow).unwrap();
        assert_eq!(json, "\"expired_no_show\"");
    }

    #[tokio::test]
    async fn test_log_gateway_succeeds() {
        let result = deliver(
            &LogNotificationGateway,
            Duration::from_secs(1),
            &entry(),
            NotificationKind::TableReady,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_times_out() {
        let result = deliver(
            &SlowGateway,
            Duration::from_millis(100),
            &entry(),
            NotificationKind::TableReady,
        )
        .await;
        assert!(matches!(result, Err(NotificationError::Timeout(_))));
    }
}
