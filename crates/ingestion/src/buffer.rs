//! Single-slot latest-sample buffer
//!
//! One writer (the owning source loop) publishes; any number of readers
//! take a copy of the latest value. The lock is held only for the swap on
//! publish and the clone on read.

use std::sync::Mutex;

use contracts::now_secs;

use crate::sync::lock_unpoisoned;

/// A published value with its publish timestamp and sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    pub value: T,

    /// Seconds since the UNIX epoch
    pub timestamp: f64,

    /// Strictly increasing, starting at 1
    pub sequence: u64,
}

#[derive(Debug)]
struct Slot<T> {
    latest: Option<Sample<T>>,
    sequence: u64,
}

/// Latest-value buffer
///
/// `T: Clone` must produce an independent value; for frames the pixel
/// payload is an immutable `Bytes`, so a clone shares storage the source
/// can never mutate.
#[derive(Debug)]
pub struct SampleBuffer<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Default for SampleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SampleBuffer<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                latest: None,
                sequence: 0,
            }),
        }
    }

    /// Publish `value` stamped with the current time.
    ///
    /// Returns the sequence number assigned to it.
    pub fn publish(&self, value: T) -> u64 {
        self.publish_at(value, now_secs())
    }

    /// Publish `value` with an explicit timestamp
    pub fn publish_at(&self, value: T, timestamp: f64) -> u64 {
        let mut slot = lock_unpoisoned(&self.slot);
        slot.sequence += 1;
        let sequence = slot.sequence;
        // 旧值在锁外释放
        let previous = slot.latest.replace(Sample {
            value,
            timestamp,
            sequence,
        });
        drop(slot);
        drop(previous);
        sequence
    }

    /// Sequence number of the latest publish (0 if never published)
    pub fn sequence(&self) -> u64 {
        lock_unpoisoned(&self.slot).sequence
    }

    /// Whether anything has ever been published
    pub fn has_data(&self) -> bool {
        lock_unpoisoned(&self.slot).latest.is_some()
    }

    /// Timestamp of the latest publish
    pub fn latest_timestamp(&self) -> Option<f64> {
        lock_unpoisoned(&self.slot)
            .latest
            .as_ref()
            .map(|sample| sample.timestamp)
    }
}

impl<T: Clone> SampleBuffer<T> {
    /// Copy of the most recent sample, or `None` if nothing was published
    pub fn read_latest(&self) -> Option<Sample<T>> {
        lock_unpoisoned(&self.slot).latest.clone()
    }

    /// Copy of the most recent value only
    pub fn latest_value(&self) -> Option<T> {
        lock_unpoisoned(&self.slot)
            .latest
            .as_ref()
            .map(|sample| sample.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_buffer_reads_none() {
        let buffer: SampleBuffer<Vec<u8>> = SampleBuffer::new();
        assert!(buffer.read_latest().is_none());
        assert!(buffer.latest_value().is_none());
        assert!(!buffer.has_data());
        assert_eq!(buffer.sequence(), 0);
        assert_eq!(buffer.latest_timestamp(), None);
    }

    #[test]
    fn test_publish_then_read() {
        let buffer = SampleBuffer::new();
        assert_eq!(buffer.publish_at(1.5_f64, 10.0), 1);
        assert_eq!(buffer.publish_at(2.5_f64, 11.0), 2);

        let sample = buffer.read_latest().unwrap();
        assert_eq!(sample.value, 2.5);
        assert_eq!(sample.timestamp, 11.0);
        assert_eq!(sample.sequence, 2);
    }

    #[test]
    fn test_publish_stamps_wall_clock() {
        let buffer = SampleBuffer::new();
        let before = now_secs();
        buffer.publish("x");
        let after = now_secs();
        let ts = buffer.latest_timestamp().unwrap();
        assert!(ts >= before && ts <= after);
    }

    /// Each payload is a vector whose every byte equals its length mod 256,
    /// so a torn write would show up as a mismatched byte.
    fn payload(len: usize) -> Vec<u8> {
        vec![(len % 256) as u8; len]
    }

    #[test]
    fn test_readers_never_observe_torn_values() {
        let buffer = Arc::new(SampleBuffer::<Vec<u8>>::new());
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let buffer = buffer.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut last_sequence = 0;
                    let mut observed = 0u64;
                    while !done.load(Ordering::Relaxed) {
                        if let Some(sample) = buffer.read_latest() {
                            let expected = (sample.value.len() % 256) as u8;
                            assert!(sample.value.iter().all(|b| *b == expected));
                            assert!(sample.sequence >= last_sequence);
                            last_sequence = sample.sequence;
                            observed += 1;
                        }
                    }
                    observed
                })
            })
            .collect();

        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..2000 {
                    let len = rng.random_range(1..4096);
                    buffer.publish(payload(len));
                }
            })
        };

        writer.join().unwrap();
        done.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(buffer.sequence(), 2000);
    }
}
