use std::sync::Arc;

use anyhow::Context;

use crate::core::Config;
use crate::queue::{
    BusinessDayCalendar, Clock, LogNotificationGateway, ManagerOptions, QueueManager,
    RedbQueueStore, SystemClock,
};

/// 服务状态 - 持有所有服务的共享引用
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | manager | Arc<QueueManager> | 排队引擎 |
/// | calendar | Arc<BusinessDayCalendar> | 营业日历 |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub manager: Arc<QueueManager>,
    pub calendar: Arc<BusinessDayCalendar>,
}

impl ServerState {
    /// 初始化服务状态
    ///
    /// 1. 创建工作目录
    /// 2. 打开 redb 数据库
    /// 3. 构建营业日历和排队引擎
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.work_dir)
            .with_context(|| format!("Failed to create work dir {}", config.work_dir))?;

        let db_path = config.database_path();
        let store = RedbQueueStore::open(&db_path)
            .with_context(|| format!("Failed to open queue database {}", db_path.display()))?;
        tracing::info!(path = %db_path.display(), "Queue database opened");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let calendar = Arc::new(
            BusinessDayCalendar::new(clock.clone(), config.timezone, config.business_day_cutoff)
                .with_overrides(config.location_timezones.clone()),
        );
        tracing::info!(
            timezone = %config.timezone,
            cutoff = %config.business_day_cutoff,
            overrides = config.location_timezones.len(),
            "Reporting calendar ready"
        );

        let manager = Arc::new(QueueManager::new(
            Arc::new(store),
            Arc::new(LogNotificationGateway),
            clock,
            calendar.clone(),
            ManagerOptions::from_config(config),
        ));

        Ok(Self {
            config: config.clone(),
            manager,
            calendar,
        })
    }
}
