//! 排队统计
//!
//! - [`summarize`]: 日结，把一个分区压缩为 `QueueHistorySummary`
//! - [`aggregate`]: 按日期范围合并历史
//! - [`realtime_metrics`]: 当天分区的实时视图

use chrono::NaiveDate;
use chrono_tz::Tz;
use shared::queue::{
    DailyBreakdown, EntryStatus, HourlyStat, HourlyStats, QueueHistorySummary, QueuePartition,
    RangeAnalytics, RealtimeMetrics,
};
use shared::util::elapsed_minutes;

use crate::utils::time::local_hour;

/// 保留两位小数
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2((part * 100) as f64 / total as f64)
}

/// All 24 hours, zeroed
fn empty_hourly_stats() -> HourlyStats {
    (0..24u8).map(|hour| (hour, HourlyStat::default())).collect()
}

/// Compress one finalized partition into a history record
pub fn summarize(partition: &QueuePartition, tz: Tz, archived_at: i64) -> QueueHistorySummary {
    let mut hourly = empty_hourly_stats();
    let mut total_seated = 0u32;
    let mut total_removed = 0u32;
    let mut total_called = 0u32;
    let mut wait_sum = 0.0;

    for entry in partition.entries.values() {
        let stat = hourly.entry(local_hour(entry.added_at, tz)).or_default();
        stat.queued += 1;

        match entry.status {
            EntryStatus::Seated => {
                total_seated += 1;
                stat.seated += 1;
                if let Some(wait) = entry.seated_wait_minutes() {
                    wait_sum += wait;
                    // running average
                    stat.avg_wait_time += (wait - stat.avg_wait_time) / stat.seated as f64;
                }
            }
            EntryStatus::Removed => {
                total_removed += 1;
                stat.removed += 1;
            }
            EntryStatus::Called => total_called += 1,
            EntryStatus::Waiting => {}
        }
    }

    for stat in hourly.values_mut() {
        stat.avg_wait_time = round2(stat.avg_wait_time);
    }

    let total_queued = partition.entries.len() as u32;
    let average_wait_time = if total_seated > 0 {
        round2(wait_sum / total_seated as f64)
    } else {
        0.0
    };

    QueueHistorySummary {
        date: partition.metadata.date,
        location_id: partition.metadata.location_id.clone(),
        location_name: partition.metadata.location_name.clone(),
        total_queued,
        total_seated,
        total_removed,
        total_called,
        average_wait_time,
        peak_queue_size: partition.metadata.max_capacity.max(total_queued),
        completion_rate: percent(total_seated as u64, total_queued as u64),
        cancelation_rate: percent(total_removed as u64, total_queued as u64),
        hourly_stats: hourly,
        archived_at,
    }
}

/// Merge history records of one location over `[start_date, end_date]`
///
/// `avg_wait_time` is the mean of the daily averages (every day weighs the
/// same regardless of traffic); rates come from the summed totals.
pub fn aggregate(
    location_id: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    summaries: &[QueueHistorySummary],
) -> RangeAnalytics {
    let mut result = RangeAnalytics::empty(location_id, start_date, end_date);
    if summaries.is_empty() {
        return result;
    }

    let total_days = summaries.len() as u32;
    let mut wait_sum = 0.0;
    let mut hourly = HourlyStats::new();

    for summary in summaries {
        result.total_queued += summary.total_queued as u64;
        result.total_seated += summary.total_seated as u64;
        result.total_removed += summary.total_removed as u64;
        result.total_called += summary.total_called as u64;
        wait_sum += summary.average_wait_time;

        for (hour, stat) in &summary.hourly_stats {
            let merged = hourly.entry(*hour).or_insert_with(HourlyStat::default);
            merged.queued += stat.queued;
            merged.seated += stat.seated;
            merged.removed += stat.removed;
            // 先累加，最后除以天数
            merged.avg_wait_time += stat.avg_wait_time;
        }

        result.daily.push(DailyBreakdown {
            date: summary.date,
            total_queued: summary.total_queued,
            total_seated: summary.total_seated,
            total_removed: summary.total_removed,
            average_wait_time: summary.average_wait_time,
        });
    }

    for stat in hourly.values_mut() {
        stat.avg_wait_time = round2(stat.avg_wait_time / total_days as f64);
    }

    result.daily.sort_by_key(|day| day.date);
    result.total_days = total_days;
    result.avg_wait_time = round2(wait_sum / total_days as f64);
    result.avg_completion_rate = percent(result.total_seated, result.total_queued);
    result.avg_cancelation_rate = percent(result.total_removed, result.total_queued);
    result.hourly_stats = hourly;
    result
}

/// Live counters for a partition at `now`
pub fn realtime_metrics(partition: &QueuePartition, now: i64) -> RealtimeMetrics {
    let metadata = &partition.metadata;
    let longest_wait_time = partition
        .entries
        .values()
        .filter(|e| e.is_waiting())
        .map(|e| elapsed_minutes(e.added_at, now))
        .max()
        .unwrap_or(0);

    RealtimeMetrics {
        location_id: metadata.location_id.clone(),
        date: metadata.date,
        current_waiting: partition.count_by_status(EntryStatus::Waiting) as u32,
        current_called: partition.count_by_status(EntryStatus::Called) as u32,
        total_today: partition.entries.len() as u32,
        seated_today: partition.count_by_status(EntryStatus::Seated) as u32,
        removed_today: partition.count_by_status(EntryStatus::Removed) as u32,
        average_wait_time: metadata.estimated_wait_time,
        longest_wait_time,
        queue_status: metadata.queue_status,
        last_updated: metadata.updated_at,
    }
}
