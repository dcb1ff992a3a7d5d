use crate::error::{StoreError, StoreResult};
use crate::recovery::RecoveredInfo;

/// In-memory accounting of stored bytes and chunks against a byte budget.
///
/// A capacity of `0` means unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CapacityTracker {
    capacity: u64,
    total_size: u64,
    chunk_count: u64,
}

impl CapacityTracker {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Lowering the capacity below current usage only blocks future stores.
    pub fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn can_accommodate(&self, additional: u64) -> bool {
        self.capacity == 0
            || self
                .total_size
                .checked_add(additional)
                .is_some_and(|total| total <= self.capacity)
    }

    /// Like [`can_accommodate`](Self::can_accommodate), as an error.
    pub fn ensure_room(&self, additional: u64) -> StoreResult<()> {
        if self.can_accommodate(additional) {
            Ok(())
        } else {
            Err(StoreError::CapacityExceeded {
                needed: additional,
                available: self.capacity.saturating_sub(self.total_size),
            })
        }
    }

    /// Account for a new physical chunk.
    pub fn add(&mut self, size: u64) {
        self.total_size = self.total_size.saturating_add(size);
        self.chunk_count += 1;
    }

    /// Account for a physical chunk that is gone.
    pub fn remove(&mut self, size: u64) {
        self.total_size = self.total_size.saturating_sub(size);
        self.chunk_count = self.chunk_count.saturating_sub(1);
    }

    /// Replace the accounting with recovered state, keeping the capacity.
    pub fn reset(&mut self, info: RecoveredInfo) {
        self.total_size = info.total_size;
        self.chunk_count = info.chunk_count;
    }

    pub fn clear(&mut self) {
        self.reset(RecoveredInfo::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_accepts_anything() {
        let mut tracker = CapacityTracker::new(0);
        tracker.add(u64::MAX - 1);
        assert!(tracker.can_accommodate(u64::MAX));
    }

    #[test]
    fn limit_is_inclusive() {
        let mut tracker = CapacityTracker::new(100);
        assert!(tracker.can_accommodate(100));
        assert!(!tracker.can_accommodate(101));

        tracker.add(60);
        assert!(tracker.can_accommodate(40));
        assert!(!tracker.can_accommodate(41));
        assert!(matches!(
            tracker.ensure_room(41),
            Err(StoreError::CapacityExceeded { needed: 41, available: 40 })
        ));
    }

    #[test]
    fn overflow_never_fits() {
        let mut tracker = CapacityTracker::new(u64::MAX);
        tracker.add(10);
        assert!(!tracker.can_accommodate(u64::MAX));
    }

    #[test]
    fn add_remove_track_count_and_size() {
        let mut tracker = CapacityTracker::default();
        tracker.add(5);
        tracker.add(9);
        assert_eq!(tracker.chunk_count(), 2);
        assert_eq!(tracker.total_size(), 14);

        tracker.remove(5);
        assert_eq!(tracker.chunk_count(), 1);
        assert_eq!(tracker.total_size(), 9);

        tracker.remove(100);
        tracker.remove(100);
        assert_eq!(tracker.chunk_count(), 0);
        assert_eq!(tracker.total_size(), 0);
    }

    #[test]
    fn shrinking_capacity_keeps_usage() {
        let mut tracker = CapacityTracker::new(100);
        tracker.add(80);
        tracker.set_capacity(50);
        assert_eq!(tracker.total_size(), 80);
        assert!(!tracker.can_accommodate(1));
        assert!(matches!(
            tracker.ensure_room(1),
            Err(StoreError::CapacityExceeded { available: 0, .. })
        ));
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut tracker = CapacityTracker::new(1000);
        tracker.add(10);
        tracker.reset(RecoveredInfo {
            chunk_count: 3,
            total_size: 300,
        });
        assert_eq!(tracker.capacity(), 1000);
        assert_eq!(tracker.chunk_count(), 3);
        assert_eq!(tracker.total_size(), 300);

        tracker.clear();
        assert_eq!(tracker.chunk_count(), 0);
        assert_eq!(tracker.total_size(), 0);
        assert_eq!(tracker.capacity(), 1000);
    }
}
