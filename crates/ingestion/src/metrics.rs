//! Per-source counters

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Source metrics
///
/// Lock-free; written by the owning loop, read by status queries and the
/// fusion quality score.
#[derive(Debug, Default)]
pub struct SourceMetrics {
    /// Samples published
    pub samples: AtomicU64,

    /// Transient read failures
    pub read_errors: AtomicU64,

    /// Responses that yielded no distance
    pub parse_errors: AtomicU64,

    /// Readings dropped for falling outside the physical range
    pub rejected: AtomicU64,

    /// Readings replaced by the moving average
    pub outliers_substituted: AtomicU64,

    /// Device opened successfully
    pub active: AtomicBool,

    /// Realized rate in Hz, stored as `f64` bits
    rate_bits: AtomicU64,
}

impl SourceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sample(&self) {
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outlier(&self) {
        self.outliers_substituted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_rate_hz(&self, rate: f64) {
        self.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn rate_hz(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    /// Read errors plus parse errors
    pub fn error_count(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed) + self.parse_errors.load(Ordering::Relaxed)
    }

    pub fn sample_count(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Get snapshot
    pub fn snapshot(&self) -> SourceSnapshot {
        SourceSnapshot {
            samples: self.samples.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            outliers_substituted: self.outliers_substituted.load(Ordering::Relaxed),
            active: self.is_active(),
            rate_hz: self.rate_hz(),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSnapshot {
    pub samples: u64,
    pub read_errors: u64,
    pub parse_errors: u64,
    pub rejected: u64,
    pub outliers_substituted: u64,
    pub active: bool,
    pub rate_hz: f64,
}

impl SourceSnapshot {
    pub fn error_count(&self) -> u64 {
        self.read_errors + self.parse_errors
    }
}
