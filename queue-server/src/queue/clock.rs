//! 时钟与营业日历
//!
//! `Clock` 提供当前时间，`ReportingCalendar` 把时间映射为门店的营业日。
//! 两者都可注入，测试中使用 [`ManualClock`]。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use parking_lot::RwLock;

use crate::utils::time;

/// Wall clock (Unix millis)
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        shared::util::now_millis()
    }
}

/// Settable clock for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.now.fetch_add(minutes * 60_000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Maps a location to its timezone and current reporting day
pub trait ReportingCalendar: Send + Sync {
    fn timezone(&self, location_id: &str) -> Tz;

    /// Reporting day the location is in right now
    fn current_date(&self, location_id: &str) -> NaiveDate;
}

/// 按门店时区 + 营业日 cutoff 计算营业日
///
/// cutoff 之前的时间仍归属前一个营业日（例如 02:00 之前的深夜排队）。
pub struct BusinessDayCalendar {
    clock: Arc<dyn Clock>,
    default_tz: Tz,
    cutoff: NaiveTime,
    overrides: RwLock<HashMap<String, Tz>>,
}

impl std::fmt::Debug for BusinessDayCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessDayCalendar")
            .field("default_tz", &self.default_tz)
            .field("cutoff", &self.cutoff)
            .field("overrides", &self.overrides.read().len())
            .finish()
    }
}

impl BusinessDayCalendar {
    pub fn new(clock: Arc<dyn Clock>, default_tz: Tz, cutoff: NaiveTime) -> Self {
        Self {
            clock,
            default_tz,
            cutoff,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_overrides(self, overrides: HashMap<String, Tz>) -> Self {
        *self.overrides.write() = overrides;
        self
    }

    /// 设置单个门店的时区
    pub fn set_location_timezone(&self, location_id: impl Into<String>, tz: Tz) {
        self.overrides.write().insert(location_id.into(), tz);
    }

    pub fn default_timezone(&self) -> Tz {
        self.default_tz
    }
}

impl ReportingCalendar for BusinessDayCalendar {
    fn timezone(&self, location_id: &str) -> Tz {
        self.overrides
            .read()
            .get(location_id)
            .copied()
            .unwrap_or(self.default_tz)
    }

    fn current_date(&self, location_id: &str) -> NaiveDate {
        time::business_date_at(self.clock.now_millis(), self.cutoff, self.timezone(location_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn millis(rfc3339: &str) -> i64 {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().timestamp_millis()
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        clock.advance_minutes(2);
        assert_eq!(clock.now_millis(), 121_000);
        clock.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn test_per_location_reporting_day() {
        // 2026-10-18 23:30 UTC: Madrid already on the 19th, New York still on the 18th
        let clock = Arc::new(ManualClock::new(millis("2026-10-18T23:30:00+00:00")));
        let calendar = BusinessDayCalendar::new(clock, chrono_tz::Europe::Madrid, NaiveTime::MIN);
        calendar.set_location_timezone("nyc", chrono_tz::America::New_York);

        assert_eq!(
            calendar.current_date("madrid-centro"),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );
        assert_eq!(
            calendar.current_date("nyc"),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
        );
        assert_eq!(calendar.timezone("nyc"), chrono_tz::America::New_York);
    }

    #[test]
    fn test_cutoff_keeps_late_night_on_previous_day() {
        let clock = Arc::new(ManualClock::new(millis("2026-10-19T01:15:00+02:00")));
        let cutoff = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
        let calendar = BusinessDayCalendar::new(clock.clone(), chrono_tz::Europe::Madrid, cutoff);

        assert_eq!(
            calendar.current_date("loc"),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
        );

        clock.set(millis("2026-10-19T02:00:00+02:00"));
        assert_eq!(
            calendar.current_date("loc"),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );
    }
}
