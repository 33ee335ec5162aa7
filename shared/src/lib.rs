//! Shared types for the Crab walk-in queue
//!
//! Domain types, caller-facing responses and error codes used by the queue
//! server and by whatever transport layer sits in front of it.

pub mod error;
pub mod queue;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{ErrorCategory, ErrorCode};
pub use queue::{
    ActionResponse, EntryStatus, PartitionKey, QueueEntry, QueueEvent, QueueEventKind,
    QueueHistorySummary, QueueMetadata, QueuePartition, QueueStatus, RangeAnalytics,
    RealtimeMetrics, SweepReport,
};
