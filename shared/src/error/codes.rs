//! Unified error codes for the queue engine
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Queue errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,

    // ==================== 4xxx: Queue ====================
    /// Queue entry not found in the partition
    EntryNotFound = 4001,
    /// Partition (location + date) not found
    PartitionNotFound = 4002,
    /// Status transition not allowed from the current status
    InvalidTransition = 4003,
    /// Partition was modified concurrently, retry
    ConcurrentModification = 4004,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Storage did not answer in time
    StorageUnavailable = 9002,
    /// Disk full
    StorageFull = 9003,
    /// Database file corrupted
    StorageCorrupted = 9004,
    /// System busy (transient storage failure)
    SystemBusy = 9005,
    /// Guest notification could not be delivered
    NotificationFailed = 9006,
}

impl ErrorCode {
    /// Numeric value of the code
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether this code represents success
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Whether the caller may retry the same request unchanged
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ConcurrentModification
                | ErrorCode::StorageUnavailable
                | ErrorCode::SystemBusy
        )
    }

    /// Default English message (clients localize by code)
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::Unknown => "Unknown error",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::EntryNotFound => "Queue entry not found",
            ErrorCode::PartitionNotFound => "Queue not found for this date",
            ErrorCode::InvalidTransition => "Invalid status transition",
            ErrorCode::ConcurrentModification => "Queue was modified concurrently, please retry",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::StorageUnavailable => "Storage unavailable",
            ErrorCode::StorageFull => "Storage full",
            ErrorCode::StorageCorrupted => "Storage corrupted",
            ErrorCode::SystemBusy => "System busy",
            ErrorCode::NotificationFailed => "Notification could not be delivered",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Returned when a u16 does not map to any [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),

            // Queue
            4001 => Ok(ErrorCode::EntryNotFound),
            4002 => Ok(ErrorCode::PartitionNotFound),
            4003 => Ok(ErrorCode::InvalidTransition),
            4004 => Ok(ErrorCode::ConcurrentModification),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::StorageUnavailable),
            9003 => Ok(ErrorCode::StorageFull),
            9004 => Ok(ErrorCode::StorageCorrupted),
            9005 => Ok(ErrorCode::SystemBusy),
            9006 => Ok(ErrorCode::NotificationFailed),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}
