//! Crab Queue Server - 门店排队引擎
//!
//! # 架构概述
//!
//! - **排队引擎** (`queue`): 分区存储、状态流转、排位、通知、统计、归档
//! - **核心** (`core`): 配置、服务状态、后台任务
//! - **工具** (`utils`): 日志、业务时区
//!
//! # 模块结构
//!
//! ```text
//! queue-server/src/
//! ├── core/          # 配置、状态、后台任务
//! ├── queue/         # 排队引擎
//! │   └── manager/   # QueueManager 及场景测试
//! └── utils/         # 日志、时间工具
//! ```

pub mod core;
pub mod queue;
pub mod utils;

// Re-export 公共类型
pub use core::{BackgroundTasks, Config, Server, ServerState, TaskKind};
pub use queue::{QueueError, QueueManager, QueueResult, QueueStore, RedbQueueStore};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境
///
/// 1. 加载 `.env`（不存在则忽略）
/// 2. 初始化日志（`LOG_TO_FILE=true` 时写入 `WORK_DIR/logs`）
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    let log_dir = config.log_to_file.then(|| config.log_dir());
    init_logger_with_file(Some(config.log_level.as_str()), log_dir.as_deref());

    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
   ______           __
  / ____/________ _/ /_
 / /   / ___/ __ `/ __ \
/ /___/ /  / /_/ / /_/ /
\____/_/   \__,_/_.___/
   ____
  / __ \__  _____  __  _____
 / / / / / / / _ \/ / / / _ \
/ /_/ / /_/ /  __/ /_/ /  __/
\___\_\__,_/\___/\__,_/\___/
    "#
    );
}
