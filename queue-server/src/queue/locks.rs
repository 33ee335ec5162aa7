//! Per-partition mutual exclusion
//!
//! Every read-modify-write on a partition runs under its lock. Operations on
//! different partitions never wait on each other.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use shared::queue::PartitionKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::error::{QueueError, QueueResult};

#[derive(Debug)]
pub struct PartitionLocks {
    locks: DashMap<PartitionKey, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl PartitionLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Wait for the partition lock, up to the configured timeout
    ///
    /// Timing out yields `ConcurrentModification`; the caller may retry.
    pub async fn acquire(&self, key: &PartitionKey) -> QueueResult<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(partition = %key, timeout = ?self.timeout, "Partition lock timed out");
                Err(QueueError::ConcurrentModification(format!(
                    "partition {} is busy, retry later",
                    key
                )))
            }
        }
    }

    /// Drop the lock slot of an archived partition
    ///
    /// Kept when anyone still holds or waits on it.
    pub fn forget(&self, key: &PartitionKey) {
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
