//! Queue analytics models (日结排队统计)

use super::partition::QueueStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-hour counters, keyed by local hour of `added_at`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HourlyStat {
    pub queued: u32,
    pub seated: u32,
    pub removed: u32,
    /// Minutes
    pub avg_wait_time: f64,
}

/// Hour of day (0-23) → stats
pub type HourlyStats = BTreeMap<u8, HourlyStat>;

/// One finalized day for one location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueHistorySummary {
    pub date: NaiveDate,
    pub location_id: String,
    pub location_name: String,
    pub total_queued: u32,
    pub total_seated: u32,
    pub total_removed: u32,
    pub total_called: u32,
    /// Mean minutes from joining to seated
    pub average_wait_time: f64,
    pub peak_queue_size: u32,
    /// Percent (0-100)
    pub completion_rate: f64,
    /// Percent (0-100)
    pub cancelation_rate: f64,
    pub hourly_stats: HourlyStats,
    /// Unix millis
    pub archived_at: i64,
}

/// Per-day line inside [`RangeAnalytics`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyBreakdown {
    pub date: NaiveDate,
    pub total_queued: u32,
    pub total_seated: u32,
    pub total_removed: u32,
    pub average_wait_time: f64,
}

/// History aggregated over `[start_date, end_date]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RangeAnalytics {
    pub location_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Days with a summary in range
    pub total_days: u32,
    pub total_queued: u64,
    pub total_seated: u64,
    pub total_removed: u64,
    pub total_called: u64,
    /// Mean of each day's average (day-weighted)
    pub avg_wait_time: f64,
    pub avg_completion_rate: f64,
    pub avg_cancelation_rate: f64,
    pub hourly_stats: HourlyStats,
    #[serde(default)]
    pub daily: Vec<DailyBreakdown>,
}

impl RangeAnalytics {
    /// All-zero result for a range without history
    pub fn empty(location_id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            location_id: location_id.into(),
            start_date,
            end_date,
            total_days: 0,
            total_queued: 0,
            total_seated: 0,
            total_removed: 0,
            total_called: 0,
            avg_wait_time: 0.0,
            avg_completion_rate: 0.0,
            avg_cancelation_rate: 0.0,
            hourly_stats: HourlyStats::new(),
            daily: Vec::new(),
        }
    }
}

/// Live view of today's partition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeMetrics {
    pub location_id: String,
    pub date: NaiveDate,
    pub current_waiting: u32,
    pub current_called: u32,
    pub total_today: u32,
    pub seated_today: u32,
    pub removed_today: u32,
    /// Cached estimate from metadata (minutes)
    pub average_wait_time: u32,
    /// Longest current wait among waiting guests (minutes)
    pub longest_wait_time: i64,
    pub queue_status: QueueStatus,
    pub last_updated: i64,
}
