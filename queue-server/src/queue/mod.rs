//! Walk-in queue engine
//!
//! - [`storage`]: redb persistence, one partition per location and day
//! - [`lifecycle`] / [`position`]: pure transition and ranking rules
//! - [`manager`]: locking, versioned commits, notifications, events
//! - [`analytics`]: daily summaries, range aggregation, realtime metrics
//! - [`archive_scheduler`] / [`position_notifier`]: background tasks

pub mod analytics;
pub mod archive_scheduler;
pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod manager;
pub mod notification;
pub mod position;
pub mod position_notifier;
pub mod storage;

pub use archive_scheduler::ArchivalScheduler;
pub use clock::{BusinessDayCalendar, Clock, ManualClock, ReportingCalendar, SystemClock};
pub use error::{QueueError, QueueResult};
pub use manager::{ManagerOptions, QueueManager};
pub use notification::{
    LogNotificationGateway, NotificationError, NotificationGateway, NotificationKind,
    NotificationPayload,
};
pub use position_notifier::PositionNotifier;
pub use storage::{QueueStore, RedbQueueStore, StorageError, StorageResult};
