//! Fusion counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug)]
pub struct FusionStats {
    pub ticks: AtomicU64,
    pub records: AtomicU64,
    /// Ticks where at least one buffer was empty
    pub skipped_missing: AtomicU64,
    /// Ticks outside the sync tolerance
    pub unsynchronized: AtomicU64,
    pub callback_panics: AtomicU64,
    last_time_diff_bits: AtomicU64,
}

impl Default for FusionStats {
    fn default() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            records: AtomicU64::new(0),
            skipped_missing: AtomicU64::new(0),
            unsynchronized: AtomicU64::new(0),
            callback_panics: AtomicU64::new(0),
            last_time_diff_bits: AtomicU64::new(f64::NAN.to_bits()),
        }
    }
}

impl FusionStats {
    pub fn set_last_time_diff_ms(&self, diff: f64) {
        self.last_time_diff_bits.store(diff.to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self, subscriber_drops: u64) -> FusionStatsSnapshot {
        let ticks = self.ticks.load(Ordering::Relaxed);
        FusionStatsSnapshot {
            ticks,
            records: self.records.load(Ordering::Relaxed),
            skipped_missing: self.skipped_missing.load(Ordering::Relaxed),
            unsynchronized: self.unsynchronized.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
            subscriber_drops,
            last_time_diff_ms: Some(f64::from_bits(
                self.last_time_diff_bits.load(Ordering::Relaxed),
            ))
            .filter(|d| d.is_finite()),
        }
    }
}

/// Fusion status snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusionStatsSnapshot {
    pub ticks: u64,
    pub records: u64,
    pub skipped_missing: u64,
    pub unsynchronized: u64,
    pub callback_panics: u64,
    pub subscriber_drops: u64,
    /// Time difference of the most recent paired tick
    pub last_time_diff_ms: Option<f64>,
}

impl FusionStatsSnapshot {
    /// Fraction of ticks that produced a record
    pub fn fusion_rate(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.records as f64 / self.ticks as f64
        }
    }
}
