//! 过期分区归档
//!
//! 分区日期早于 `当前营业日 - retention_days` 时：
//! 持锁 → 日结汇总 → 写入历史 → 删除分区。
//! 单个分区失败不影响其他分区。

use chrono::Days;
use shared::queue::{
    PartitionKey, QueueEventKind, QueueHistorySummary, SweepError, SweepReport,
};

use super::QueueManager;
use crate::queue::analytics;
use crate::queue::error::QueueResult;

impl QueueManager {
    /// Archive every expired partition across all locations
    ///
    /// Fails only when the partition list itself cannot be read.
    pub async fn run_archival_sweep(&self, retention_days: u32) -> QueueResult<SweepReport> {
        let keys = self.with_store(|store| store.list_partitions(None)).await?;
        let mut report = SweepReport::default();

        for key in keys {
            if !self.is_expired(&key, retention_days) {
                continue;
            }

            report.processed_count += 1;
            match self.archive_partition(&key).await {
                Ok(summary) => {
                    report.archived_count += 1;
                    tracing::info!(
                        partition = %key,
                        total_queued = summary.total_queued,
                        total_seated = summary.total_seated,
                        "Partition archived"
                    );
                }
                Err(e) => {
                    tracing::error!(partition = %key, error = %e, "Failed to archive partition");
                    report.errors.push(SweepError {
                        location_id: key.location_id.clone(),
                        date: key.date,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Strictly older than the location's reporting day minus retention
    ///
    /// A window reaching past the calendar's range expires nothing.
    fn is_expired(&self, key: &PartitionKey, retention_days: u32) -> bool {
        let today = self.calendar.current_date(&key.location_id);
        match today.checked_sub_days(Days::new(u64::from(retention_days))) {
            Some(threshold) => key.date < threshold && key.date < today,
            None => false,
        }
    }

    async fn archive_partition(&self, key: &PartitionKey) -> QueueResult<QueueHistorySummary> {
        let summary = {
            let _guard = self.locks.acquire(key).await?;
            let partition = self.load_partition(key).await?;
            let tz = self.calendar.timezone(&key.location_id);
            let summary = analytics::summarize(&partition, tz, self.clock.now_millis());

            // 先写历史再删分区：中途失败时下次重跑会覆盖同一条历史
            let history = summary.clone();
            self.with_store(move |store| store.put_history(&history)).await?;
            let target = key.clone();
            self.with_store(move |store| store.delete_partition(&target))
                .await?;
            summary
        };

        self.locks.forget(key);
        self.notify_locks.forget(key);
        self.publish(QueueEventKind::PartitionArchived, key, None, 0);
        Ok(summary)
    }
}
