//! Read side: queue view, realtime metrics, history analytics
//!
//! Plus the admin open/pause/close switch.

use chrono::NaiveDate;
use shared::queue::{
    EntryStatus, PartitionKey, QueueEntry, QueueEventKind, QueueMetadata, QueueStatus, QueueView,
    RangeAnalytics, RealtimeMetrics,
};

use super::QueueManager;
use crate::queue::analytics;
use crate::queue::error::{QueueError, QueueResult};

/// Display order of statuses in the queue view
fn status_rank(status: EntryStatus) -> u8 {
    match status {
        EntryStatus::Waiting => 0,
        EntryStatus::Called => 1,
        EntryStatus::Seated => 2,
        EntryStatus::Removed => 3,
    }
}

fn display_order(entries: &mut [QueueEntry]) {
    entries.sort_by(|a, b| {
        status_rank(a.status)
            .cmp(&status_rank(b.status))
            .then_with(|| a.position.unwrap_or(u32::MAX).cmp(&b.position.unwrap_or(u32::MAX)))
            .then_with(|| a.added_at.cmp(&b.added_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl QueueManager {
    /// Snapshot of a partition: waiting by position, then called, seated, removed
    pub async fn get_queue_status(
        &self,
        location_id: &str,
        date: Option<NaiveDate>,
    ) -> QueueResult<QueueView> {
        let key = self.resolve_key(location_id, date);
        let partition = self.load_partition(&key).await?;

        let mut entries: Vec<QueueEntry> = partition.entries.into_values().collect();
        display_order(&mut entries);

        Ok(QueueView {
            metadata: partition.metadata,
            entries,
        })
    }

    /// Open, pause or close a partition
    pub async fn set_queue_status(
        &self,
        location_id: &str,
        status: QueueStatus,
        date: Option<NaiveDate>,
    ) -> QueueResult<QueueMetadata> {
        let key = self.resolve_key(location_id, date);

        let written = self.write_queue_status(&key, status).await;
        let metadata = self.release_missing(&key, written)?;

        self.publish(QueueEventKind::StatusChanged, &key, None, metadata.version);
        Ok(metadata)
    }

    async fn write_queue_status(
        &self,
        key: &PartitionKey,
        status: QueueStatus,
    ) -> QueueResult<QueueMetadata> {
        let _guard = self.locks.acquire(key).await?;
        let mut partition = self.load_partition(key).await?;
        let previous = partition.metadata.queue_status;
        partition.metadata.queue_status = status;
        partition.metadata.updated_at = self.clock.now_millis();
        let version = self.commit(&partition, &[]).await?;

        tracing::info!(
            partition = %key,
            from = ?previous,
            to = ?status,
            version,
            "Queue status changed"
        );
        Ok(QueueMetadata {
            version,
            ..partition.metadata
        })
    }

    /// Live counters of a partition
    pub async fn get_realtime_metrics(
        &self,
        location_id: &str,
        date: Option<NaiveDate>,
    ) -> QueueResult<RealtimeMetrics> {
        let key = self.resolve_key(location_id, date);
        let partition = self.load_partition(&key).await?;
        Ok(analytics::realtime_metrics(
            &partition,
            self.clock.now_millis(),
        ))
    }

    /// Archived history of one location over `[start_date, end_date]`
    pub async fn get_analytics(
        &self,
        location_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> QueueResult<RangeAnalytics> {
        if start_date > end_date {
            return Err(QueueError::validation(format!(
                "start date {} is after end date {}",
                start_date, end_date
            )));
        }

        let loc = location_id.to_string();
        let summaries = self
            .with_store(move |store| store.get_history_range(&loc, start_date, end_date))
            .await?;

        Ok(analytics::aggregate(
            location_id,
            start_date,
            end_date,
            &summaries,
        ))
    }
}
