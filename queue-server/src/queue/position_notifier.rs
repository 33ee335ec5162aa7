//! 排队前列通知 worker
//!
//! 定期对当天所有开放中的分区执行 `notify_top_of_queue`，失败的发送在下一轮重试。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::manager::QueueManager;

/// 注册为 `TaskKind::Worker`
pub struct PositionNotifier {
    manager: Arc<QueueManager>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl PositionNotifier {
    pub fn new(manager: Arc<QueueManager>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            manager,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(interval = ?self.interval, "Position notifier started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.manager.notify_open_partitions().await {
                Ok(report) if report.sent > 0 || report.failed > 0 => {
                    tracing::info!(
                        sent = report.sent,
                        failed = report.failed,
                        "Position updates delivered"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Position notifier run failed: {}", e),
            }
        }

        tracing::info!("Position notifier stopped");
    }
}
