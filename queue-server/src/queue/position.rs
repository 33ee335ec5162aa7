//! Position ranking (pure)
//!
//! Positions and wait estimates are derived state: they are recomputed from
//! `added_at` whenever the waiting pool changes and are only present on
//! `waiting` entries.

use shared::queue::QueuePartition;

/// Lower bound of any estimate (minutes)
pub const MIN_WAIT_MINUTES: u32 = 5;
/// Average table turnaround per position ahead (minutes)
pub const MINUTES_PER_POSITION: u32 = 15;
/// Waiting guests at or above this position get a "you're almost up" message
pub const TOP_OF_QUEUE: u32 = 5;

/// Estimated wait for a guest at `position` (1-based)
pub fn estimate_wait(position: u32) -> u32 {
    position
        .saturating_mul(MINUTES_PER_POSITION)
        .max(MIN_WAIT_MINUTES)
}

/// Re-rank the waiting pool and refresh metadata in place
///
/// Waiting entries are ordered by `(added_at, id)` and numbered 1..=N;
/// derived fields are cleared on every other entry. Returns the ids of the
/// entries whose derived fields changed.
pub fn rank(partition: &mut QueuePartition, now: i64) -> Vec<String> {
    let mut waiting: Vec<(i64, String)> = partition
        .entries
        .values()
        .filter(|e| e.is_waiting())
        .map(|e| (e.added_at, e.id.clone()))
        .collect();
    waiting.sort();

    let mut changed = Vec::new();

    for (index, (_, id)) in waiting.iter().enumerate() {
        let position = index as u32 + 1;
        let estimate = estimate_wait(position);
        let Some(entry) = partition.entries.get_mut(id) else {
            continue;
        };
        if entry.position != Some(position) || entry.estimated_wait_time != Some(estimate) {
            entry.position = Some(position);
            entry.estimated_wait_time = Some(estimate);
            changed.push(id.clone());
        }
    }

    for entry in partition.entries.values_mut().filter(|e| !e.is_waiting()) {
        if entry.position.is_some() || entry.estimated_wait_time.is_some() {
            entry.position = None;
            entry.estimated_wait_time = None;
            changed.push(entry.id.clone());
        }
    }

    let count = waiting.len() as u32;
    partition.metadata.current_count = count;
    partition.metadata.estimated_wait_time = estimate_wait(count + 1);
    partition.metadata.updated_at = now;

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::queue::{EntryStatus, PartitionKey, QueueEntry, QueueMetadata};

    fn partition_with(entries: &[(&str, i64, EntryStatus)]) -> QueuePartition {
        let key = PartitionKey::new("loc-1", NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        let mut partition = QueuePartition::new(QueueMetadata::new(&key, "Centro", 50, 0));
        for (id, added_at, status) in entries {
            let mut entry = QueueEntry::new(*id, "+34600000000", "Guest", 2, *added_at, "loc-1", "Centro");
            entry.status = *status;
            partition.insert(entry);
        }
        partition
    }

    fn position_of(partition: &QueuePartition, id: &str) -> Option<u32> {
        partition.entries[id].position
    }

    #[test]
    fn test_estimate_wait() {
        assert_eq!(estimate_wait(0), 5);
        assert_eq!(estimate_wait(1), 15);
        assert_eq!(estimate_wait(4), 60);
    }

    #[test]
    fn test_rank_orders_by_added_at() {
        let mut partition = partition_with(&[
            ("c", 300, EntryStatus::Waiting),
            ("a", 100, EntryStatus::Waiting),
            ("b", 200, EntryStatus::Waiting),
        ]);

        let changed = rank(&mut partition, 1_000);
        assert_eq!(changed.len(), 3);
        assert_eq!(position_of(&partition, "a"), Some(1));
        assert_eq!(position_of(&partition, "b"), Some(2));
        assert_eq!(position_of(&partition, "c"), Some(3));
        assert_eq!(partition.entries["c"].estimated_wait_time, Some(45));

        assert_eq!(partition.metadata.current_count, 3);
        assert_eq!(partition.metadata.estimated_wait_time, 60);
        assert_eq!(partition.metadata.updated_at, 1_000);
    }

    #[test]
    fn test_rank_ties_broken_by_id() {
        let mut partition = partition_with(&[
            ("z", 100, EntryStatus::Waiting),
            ("m", 100, EntryStatus::Waiting),
        ]);
        rank(&mut partition, 0);
        assert_eq!(position_of(&partition, "m"), Some(1));
        assert_eq!(position_of(&partition, "z"), Some(2));
    }

    #[test]
    fn test_rank_clears_non_waiting_entries() {
        let mut partition = partition_with(&[
            ("a", 100, EntryStatus::Waiting),
            ("b", 200, EntryStatus::Waiting),
        ]);
        rank(&mut partition, 0);

        partition.entries.get_mut("a").unwrap().status = EntryStatus::Called;
        let changed = rank(&mut partition, 0);

        assert_eq!(position_of(&partition, "a"), None);
        assert_eq!(partition.entries["a"].estimated_wait_time, None);
        assert_eq!(position_of(&partition, "b"), Some(1));
        assert!(changed.contains(&"a".to_string()));
        assert!(changed.contains(&"b".to_string()));
    }

    #[test]
    fn test_rank_is_idempotent() {
        let mut partition = partition_with(&[
            ("a", 100, EntryStatus::Waiting),
            ("b", 200, EntryStatus::Seated),
            ("c", 300, EntryStatus::Waiting),
        ]);
        rank(&mut partition, 0);
        let snapshot = partition.entries.clone();

        let changed = rank(&mut partition, 0);
        assert!(changed.is_empty());
        assert_eq!(partition.entries, snapshot);
    }

    #[test]
    fn test_empty_pool() {
        let mut partition = partition_with(&[("a", 100, EntryStatus::Removed)]);
        let changed = rank(&mut partition, 0);
        assert!(changed.is_empty());
        assert_eq!(partition.metadata.current_count, 0);
        assert_eq!(partition.metadata.estimated_wait_time, 15);
    }
}
