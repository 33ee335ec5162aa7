use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::utils::time;

/// 排队服务配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/crab/queue | 工作目录 (数据库、日志) |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_TO_FILE | false | 是否写入滚动日志文件 |
/// | TIMEZONE | Europe/Madrid | 默认业务时区 |
/// | LOCATION_TIMEZONES | (空) | 门店时区覆盖 `loc=Tz,loc2=Tz` |
/// | BUSINESS_DAY_CUTOFF | 02:00 | 营业日切换时间 / 归档触发时间 |
/// | RETENTION_DAYS | 7 | 分区保留天数 |
/// | LOCK_TIMEOUT_MS | 5000 | 分区锁等待上限(毫秒) |
/// | STORAGE_TIMEOUT_MS | 5000 | 存储调用上限(毫秒) |
/// | NOTIFY_TIMEOUT_MS | 10000 | 单条通知上限(毫秒) |
/// | NOTIFY_INTERVAL_SECS | 60 | 排队前列通知周期(秒) |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/queue RETENTION_DAYS=14 cargo run -p queue-server
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_to_file: bool,
    /// 默认业务时区
    pub timezone: Tz,
    /// 门店时区覆盖
    pub location_timezones: HashMap<String, Tz>,
    /// 营业日切换时间
    pub business_day_cutoff: NaiveTime,
    pub retention_days: u32,
    pub lock_timeout_ms: u64,
    pub storage_timeout_ms: u64,
    pub notify_timeout_ms: u64,
    pub notify_interval_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        let timezone = std::env::var("TIMEZONE")
            .ok()
            .and_then(|tz| time::parse_timezone(&tz))
            .unwrap_or(chrono_tz::Europe::Madrid);

        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/crab/queue".into()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_to_file: env_or("LOG_TO_FILE", false),
            timezone,
            location_timezones: std::env::var("LOCATION_TIMEZONES")
                .map(|raw| parse_location_timezones(&raw))
                .unwrap_or_default(),
            business_day_cutoff: std::env::var("BUSINESS_DAY_CUTOFF")
                .map(|c| time::parse_cutoff(&c))
                .unwrap_or_else(|_| NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN)),
            retention_days: env_or("RETENTION_DAYS", 7),
            lock_timeout_ms: env_or("LOCK_TIMEOUT_MS", 5000),
            storage_timeout_ms: env_or("STORAGE_TIMEOUT_MS", 5000),
            notify_timeout_ms: env_or("NOTIFY_TIMEOUT_MS", 10000),
            notify_interval_secs: env_or("NOTIFY_INTERVAL_SECS", 60),
        }
    }

    /// 使用自定义工作目录，其余取环境变量
    ///
    /// 常用于测试场景
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    /// redb 数据库文件
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("queue.redb")
    }

    /// 日志目录
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 排队前列通知周期，最小 1 秒
    pub fn notify_interval(&self) -> Duration {
        Duration::from_secs(self.notify_interval_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// 解析 `loc=Europe/Madrid,loc2=America/New_York`，跳过无效项
pub fn parse_location_timezones(raw: &str) -> HashMap<String, Tz> {
    raw.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .filter_map(|pair| {
            let Some((location, tz_name)) = pair.split_once('=') else {
                tracing::warn!("Ignoring malformed LOCATION_TIMEZONES item '{}'", pair);
                return None;
            };
            match time::parse_timezone(tz_name) {
                Some(tz) => Some((location.trim().to_string(), tz)),
                None => {
                    tracing::warn!("Ignoring unknown timezone '{}' for {}", tz_name, location);
                    None
                }
            }
        })
        .collect()
}
