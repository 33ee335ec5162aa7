//! Server lifecycle
//!
//! 启动后台任务，等待退出信号，然后优雅关闭。

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, ServerState};
use crate::queue::{ArchivalScheduler, PositionNotifier};

/// 健康检查周期
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    /// 注册后台任务
    ///
    /// - `archival_scheduler` (Periodic): 启动补扫 + 每日 cutoff 归档
    /// - `position_notifier` (Worker): 排队前列通知
    /// - `queue_event_log` (Listener): 记录已提交的排队事件
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        let manager = self.state.manager.clone();

        let scheduler = ArchivalScheduler::new(
            manager.clone(),
            self.config.retention_days,
            self.config.business_day_cutoff,
            self.state.calendar.default_timezone(),
            tasks.shutdown_token(),
        );
        tasks.spawn("archival_scheduler", TaskKind::Periodic, scheduler.run());

        let notifier = PositionNotifier::new(
            manager.clone(),
            self.config.notify_interval(),
            tasks.shutdown_token(),
        );
        tasks.spawn("position_notifier", TaskKind::Worker, notifier.run());

        let mut events = manager.subscribe();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("queue_event_log", TaskKind::Listener, async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => tracing::debug!(
                            kind = ?event.kind,
                            location_id = %event.location_id,
                            date = %event.date,
                            entry_id = ?event.entry_id,
                            version = event.version,
                            "Queue event"
                        ),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Queue event log lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        tasks.log_summary();
        tasks
    }

    /// 运行直到收到 Ctrl+C
    pub async fn run(self) -> anyhow::Result<()> {
        let tasks = self.start_background_tasks();

        tracing::info!(
            epoch = %self.state.manager.epoch(),
            timezone = %self.state.calendar.default_timezone(),
            environment = %self.config.environment,
            "Queue server running"
        );

        let mut health = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    tracing::info!("Shutdown signal received");
                    break;
                }
                _ = health.tick() => {
                    tasks.check_health();
                }
            }
        }

        tasks.shutdown().await;
        Ok(())
    }
}
