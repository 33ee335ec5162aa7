//! Walk-in queue domain types
//!
//! - **entry**: one guest and the status state machine
//! - **partition**: per-location, per-day container and its metadata
//! - **analytics**: history summaries, range analytics, realtime metrics
//! - **response**: results returned to the admin-facing layer

pub mod analytics;
pub mod entry;
pub mod partition;
pub mod response;

pub use analytics::{
    DailyBreakdown, HourlyStat, HourlyStats, QueueHistorySummary, RangeAnalytics, RealtimeMetrics,
};
pub use entry::{EntryStatus, NotificationFlags, QueueEntry, remove_reason};
pub use partition::{PartitionKey, QueueMetadata, QueuePartition, QueueStatus};
pub use response::{
    ActionResponse, NotifyReport, QueueActionError, QueueEvent, QueueEventKind, QueueView,
    SweepError, SweepReport,
};
