//! 归档调度器
//!
//! 启动时补扫一次过期分区，运行期间按 `business_day_cutoff` 每日触发。

use std::sync::Arc;

use chrono::NaiveTime;
use chrono_tz::Tz;
use shared::queue::SweepReport;
use tokio_util::sync::CancellationToken;

use super::manager::QueueManager;
use crate::utils::time;

/// 归档调度器
///
/// 注册为 `TaskKind::Periodic`，在 `Server::run()` 中启动。
pub struct ArchivalScheduler {
    manager: Arc<QueueManager>,
    retention_days: u32,
    cutoff: NaiveTime,
    tz: Tz,
    shutdown: CancellationToken,
}

impl ArchivalScheduler {
    pub fn new(
        manager: Arc<QueueManager>,
        retention_days: u32,
        cutoff: NaiveTime,
        tz: Tz,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            manager,
            retention_days,
            cutoff,
            tz,
            shutdown,
        }
    }

    /// 主循环：启动补扫 → 周期触发
    pub async fn run(self) {
        tracing::info!(
            retention_days = self.retention_days,
            cutoff = %self.cutoff,
            "Archival scheduler started"
        );

        // 1. 启动补扫（停机期间错过的归档）
        self.sweep().await;

        // 2. 周期循环
        self.periodic_loop().await;

        tracing::info!("Archival scheduler stopped");
    }

    /// 周期循环：每天在 business_day_cutoff 时间触发
    async fn periodic_loop(&self) {
        loop {
            let sleep_duration =
                time::duration_until_next_cutoff(self.manager.now_millis(), self.cutoff, self.tz);
            tracing::info!(
                "Next archival sweep in {} minutes",
                sleep_duration.as_secs() / 60
            );

            // 等待触发或 shutdown
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Archival scheduler received shutdown signal");
                    return;
                }
                _ = tokio::time::sleep(sleep_duration) => {}
            }

            self.sweep().await;
        }
    }

    /// 执行一次归档，返回报告（失败时为 None）
    pub async fn sweep(&self) -> Option<SweepReport> {
        match self.manager.run_archival_sweep(self.retention_days).await {
            Ok(report) => {
                Self::log_report(&report);
                Some(report)
            }
            Err(e) => {
                tracing::error!("Archival sweep failed: {}", e);
                None
            }
        }
    }

    fn log_report(report: &SweepReport) {
        if report.processed_count == 0 {
            tracing::debug!("Archival sweep: nothing to archive");
            return;
        }
        if report.errors.is_empty() {
            tracing::info!(
                "Archival sweep: {} partition(s) archived",
                report.archived_count
            );
        } else {
            tracing::warn!(
                processed = report.processed_count,
                archived = report.archived_count,
                failed = report.errors.len(),
                "Archival sweep finished with errors"
            );
        }
    }
}
