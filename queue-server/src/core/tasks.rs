//! 后台任务注册表
//!
//! 归档调度、排队前列通知和事件日志都挂在同一个取消令牌上，
//! panic 被捕获并记录，关闭时统一等待退出。

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// 常驻循环（position_notifier）
    Worker,
    /// 订阅 QueueEvent
    Listener,
    /// 按营业日触发（archival_scheduler）
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Worker => "worker",
            TaskKind::Listener => "listener",
            TaskKind::Periodic => "periodic",
        };
        f.write_str(name)
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    match payload.downcast_ref::<&str>() {
        Some(s) => (*s).to_string(),
        None => payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_else(|| "non-string panic payload".to_string()),
    }
}

/// Background tasks sharing one shutdown token
#[derive(Default)]
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn `future`; a panic or an exit before shutdown is logged
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if shutdown.is_cancelled() => {
                    tracing::debug!(task = name, %kind, "Background task stopped");
                }
                Ok(()) => {
                    tracing::warn!(task = name, %kind, "Background task exited before shutdown");
                }
                Err(payload) => {
                    tracing::error!(
                        task = name,
                        %kind,
                        panic = %panic_message(payload.as_ref()),
                        "Background task panicked"
                    );
                }
            }
        });

        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn count(&self, kind: TaskKind) -> usize {
        self.tasks.iter().filter(|t| t.kind == kind).count()
    }

    pub fn log_summary(&self) {
        let names: Vec<&str> = self.tasks.iter().map(|t| t.name).collect();
        tracing::info!(
            total = self.tasks.len(),
            workers = self.count(TaskKind::Worker),
            listeners = self.count(TaskKind::Listener),
            periodic = self.count(TaskKind::Periodic),
            tasks = ?names,
            "Background tasks registered"
        );
    }

    /// Names of tasks that already stopped
    ///
    /// None of the queue tasks return on their own, so any name here before
    /// shutdown means a panic or an early exit.
    pub fn check_health(&self) -> Vec<&'static str> {
        let stopped: Vec<&'static str> = self
            .tasks
            .iter()
            .filter(|t| t.handle.is_finished())
            .map(|t| t.name)
            .collect();
        if !stopped.is_empty() {
            tracing::error!(tasks = ?stopped, "Background tasks no longer running");
        }
        stopped
    }

    /// Cancel the shared token and wait for every task
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let total = self.tasks.len();

        for task in self.tasks {
            if let Err(e) = task.handle.await {
                tracing::error!(task = task.name, error = %e, "Background task join failed");
            }
        }

        tracing::info!(total, "Background tasks stopped");
    }
}
