//! Bounded fusion history backed by a heap ring buffer.

use contracts::FusedRecord;
use ringbuf::{traits::*, HeapRb};

/// Overwrites the oldest record when full
pub struct FusionHistory {
    ring: HeapRb<FusedRecord>,
}

impl FusionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity.max(1)),
        }
    }

    pub fn push(&mut self, record: FusedRecord) {
        let _ = self.ring.push_overwrite(record);
    }

    /// Most recent `count` records, oldest first
    pub fn recent(&self, count: usize) -> Vec<FusedRecord> {
        let skip = self.ring.occupied_len().saturating_sub(count);
        self.ring.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }
}
