//! 时间工具函数 — 业务时区转换
//!
//! 所有时间戳均为 Unix millis，日期均为所在门店的营业日。

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike};
use chrono_tz::Tz;

use crate::queue::{QueueError, QueueResult};

/// 解析日期字符串 (YYYY-MM-DD)
pub fn parse_date(date: &str) -> QueueResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| QueueError::validation(format!("Invalid date format: {}", date)))
}

/// 解析 cutoff 时间字符串 (HH:MM)，失败返回 00:00
pub fn parse_cutoff(cutoff: &str) -> NaiveTime {
    NaiveTime::parse_from_str(cutoff, "%H:%M").unwrap_or_else(|e| {
        tracing::warn!(
            "Failed to parse business_day_cutoff '{}': {}, falling back to 00:00",
            cutoff,
            e
        );
        NaiveTime::MIN
    })
}

/// 解析 IANA 时区名
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

/// Unix millis → 业务时区时间
pub fn to_local(millis: i64, tz: Tz) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.with_timezone(&tz))
}

/// Unix millis → 业务时区小时 (0-23)
pub fn local_hour(millis: i64, tz: Tz) -> u8 {
    to_local(millis, tz).map(|dt| dt.hour() as u8).unwrap_or(0)
}

/// 计算给定时刻所在的营业日
///
/// 当前时间 < cutoff → 还在"昨天"的营业日
/// 当前时间 >= cutoff → 当前营业日 = 今天
pub fn business_date_at(now_millis: i64, cutoff: NaiveTime, tz: Tz) -> NaiveDate {
    let Some(now) = to_local(now_millis, tz) else {
        return NaiveDate::MIN;
    };
    if now.time() < cutoff {
        (now - chrono::Duration::days(1)).date_naive()
    } else {
        now.date_naive()
    }
}

/// 计算距离下一次 cutoff 的 Duration
pub fn duration_until_next_cutoff(now_millis: i64, cutoff: NaiveTime, tz: Tz) -> std::time::Duration {
    const FALLBACK: std::time::Duration = std::time::Duration::from_secs(60);

    let Some(now) = to_local(now_millis, tz) else {
        return FALLBACK;
    };
    let today = now.date_naive();

    let target_date = if now.time() >= cutoff {
        // 今天的 cutoff 已过，等明天
        today + chrono::Duration::days(1)
    } else {
        today
    };

    let target = target_date
        .and_time(cutoff)
        .and_local_timezone(tz)
        .latest()
        .or_else(|| {
            // DST gap: cutoff 本地时间不存在，顺延 1 小时
            (target_date.and_time(cutoff) + chrono::Duration::hours(1))
                .and_local_timezone(tz)
                .latest()
        });

    match target.map(|t| t.signed_duration_since(now)) {
        Some(d) if d.num_seconds() > 0 => d.to_std().unwrap_or(FALLBACK),
        _ => FALLBACK,
    }
}
