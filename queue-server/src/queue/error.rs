use super::storage::StorageError;
use shared::error::ErrorCode;
use shared::queue::{EntryStatus, QueueActionError};
use thiserror::Error;

/// Queue engine errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Queue not found: {0}")]
    PartitionNotFound(String),

    #[error("Queue entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid transition for entry {entry_id}: cannot move from {current} to {attempted}")]
    InvalidTransition {
        entry_id: String,
        current: EntryStatus,
        attempted: EntryStatus,
    },

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Caller may retry the same request unchanged
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            QueueError::ConcurrentModification(_) | QueueError::StorageUnavailable(_)
        )
    }
}

impl From<StorageError> for QueueError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::VersionConflict { .. } => {
                QueueError::ConcurrentModification(err.to_string())
            }
            StorageError::PartitionNotFound(key) => QueueError::PartitionNotFound(key),
            other => QueueError::Storage(other),
        }
    }
}

/// 将存储错误转换为错误码（前端负责本地化）
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    match e {
        StorageError::Serialization(_) | StorageError::InvalidKey(_) => {
            return ErrorCode::InternalError;
        }
        StorageError::PartitionNotFound(_) => return ErrorCode::PartitionNotFound,
        StorageError::VersionConflict { .. } => return ErrorCode::ConcurrentModification,
        _ => {}
    }

    // redb 错误通过字符串匹配分类
    let err_str = e.to_string().to_lowercase();

    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    ErrorCode::SystemBusy
}

impl From<QueueError> for QueueActionError {
    fn from(err: QueueError) -> Self {
        let code = match &err {
            QueueError::Storage(e) => {
                let code = classify_storage_error(e);
                tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
                code
            }
            QueueError::PartitionNotFound(_) => ErrorCode::PartitionNotFound,
            QueueError::EntryNotFound(_) => ErrorCode::EntryNotFound,
            QueueError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            QueueError::ConcurrentModification(_) => ErrorCode::ConcurrentModification,
            QueueError::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
            QueueError::Validation(_) => ErrorCode::ValidationFailed,
            QueueError::Internal(_) => ErrorCode::InternalError,
        };
        QueueActionError::new(code, err.to_string())
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
