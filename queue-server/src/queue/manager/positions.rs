//! Position recalculation and top-of-queue notifications

use chrono::NaiveDate;
use shared::queue::{NotifyReport, PartitionKey, QueueEntry, QueueEventKind, QueueMetadata, QueueStatus};

use super::QueueManager;
use crate::queue::error::QueueResult;
use crate::queue::notification::{self, NotificationKind};
use crate::queue::position::{self, TOP_OF_QUEUE};

impl QueueManager {
    /// Re-rank the waiting pool of a partition
    ///
    /// Idempotent: a second call without intervening changes rewrites only
    /// the metadata.
    pub async fn recalculate(
        &self,
        location_id: &str,
        date: Option<NaiveDate>,
    ) -> QueueResult<QueueMetadata> {
        let key = self.resolve_key(location_id, date);

        let ranked = self.rank_partition(&key).await;
        let metadata = self.release_missing(&key, ranked)?;

        self.publish(
            QueueEventKind::PositionsRecalculated,
            &key,
            None,
            metadata.version,
        );
        Ok(metadata)
    }

    /// Tell the first waiting guests they are almost up
    ///
    /// Each guest gets at most one `position_update`. Sends happen outside
    /// the partition lock; successful ones are flagged in a second locked
    /// write. Runs on the same partition are serialized by `notify_locks`, so
    /// an overlapping run only sees the flagged result.
    pub async fn notify_top_of_queue(
        &self,
        location_id: &str,
        date: Option<NaiveDate>,
    ) -> QueueResult<NotifyReport> {
        let key = self.resolve_key(location_id, date);
        let mut report = NotifyReport::default();

        let notify_guard = self.notify_locks.acquire(&key).await?;

        // 1. 收集候选（持锁读取）
        let candidates = match self.top_candidates(&key).await {
            Ok((skipped, candidates)) => {
                report.skipped = skipped;
                candidates
            }
            Err(e) => {
                drop(notify_guard);
                return self.release_missing(&key, Err(e));
            }
        };

        if candidates.is_empty() {
            return Ok(report);
        }

        // 2. 发送（不持锁）
        let mut delivered = Vec::with_capacity(candidates.len());
        for entry in &candidates {
            match notification::deliver(
                self.gateway.as_ref(),
                self.options.notify_timeout,
                entry,
                NotificationKind::PositionUpdate,
            )
            .await
            {
                Ok(()) => {
                    report.sent += 1;
                    delivered.push(entry.id.clone());
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        partition = %key,
                        entry_id = %entry.id,
                        error = %e,
                        "Position update failed, will retry on next run"
                    );
                }
            }
        }

        // 3. 标记已发送（再次持锁写入）
        if !delivered.is_empty() {
            let flagged = async {
                let _guard = self.locks.acquire(&key).await?;
                let mut partition = self.load_partition(&key).await?;
                let mut changed = Vec::with_capacity(delivered.len());
                for id in &delivered {
                    if let Some(entry) = partition.entries.get_mut(id) {
                        entry.notifications_sent.position_update = true;
                        changed.push(id.clone());
                    }
                }
                self.commit(&partition, &changed).await
            }
            .await;

            if let Err(e) = flagged {
                // 已发送但未标记：下次可能重复发送
                tracing::error!(
                    partition = %key,
                    delivered = delivered.len(),
                    error = %e,
                    "Failed to flag position updates, guests may be notified again"
                );
            }
        }

        tracing::info!(
            partition = %key,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "Top of queue notified"
        );
        Ok(report)
    }

    async fn rank_partition(&self, key: &PartitionKey) -> QueueResult<QueueMetadata> {
        let _guard = self.locks.acquire(key).await?;
        let mut partition = self.load_partition(key).await?;
        let changed = position::rank(&mut partition, self.clock.now_millis());
        let version = self.commit(&partition, &changed).await?;

        tracing::debug!(
            partition = %key,
            changed = changed.len(),
            waiting = partition.metadata.current_count,
            version,
            "Positions recalculated"
        );
        Ok(QueueMetadata {
            version,
            ..partition.metadata
        })
    }

    /// Top-of-queue guests: (already flagged count, not yet notified)
    async fn top_candidates(&self, key: &PartitionKey) -> QueueResult<(usize, Vec<QueueEntry>)> {
        let _guard = self.locks.acquire(key).await?;
        let partition = self.load_partition(key).await?;
        let (flagged, pending): (Vec<QueueEntry>, Vec<QueueEntry>) = partition
            .entries
            .into_values()
            .filter(|e| e.is_waiting() && e.position.is_some_and(|p| p <= TOP_OF_QUEUE))
            .partition(|e| e.notifications_sent.position_update);
        Ok((flagged.len(), pending))
    }

    /// Run [`Self::notify_top_of_queue`] for every open partition of the
    /// current reporting day
    pub async fn notify_open_partitions(&self) -> QueueResult<NotifyReport> {
        let keys = self.with_store(|store| store.list_partitions(None)).await?;
        let mut total = NotifyReport::default();

        for key in keys {
            if key.date != self.calendar.current_date(&key.location_id) {
                continue;
            }
            let status = match self.get_queue_status(&key.location_id, Some(key.date)).await {
                Ok(view) => view.metadata.queue_status,
                Err(e) => {
                    tracing::warn!(partition = %key, error = %e, "Skipping partition");
                    continue;
                }
            };
            if status != QueueStatus::Open {
                continue;
            }

            match self.notify_top_of_queue(&key.location_id, Some(key.date)).await {
                Ok(report) => {
                    total.sent += report.sent;
                    total.failed += report.failed;
                    total.skipped += report.skipped;
                }
                Err(e) => {
                    tracing::warn!(partition = %key, error = %e, "Top of queue notification skipped");
                }
            }
        }

        Ok(total)
    }
}
