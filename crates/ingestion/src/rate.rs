//! Realized-rate tracker over a sliding window of sample instants

use std::collections::VecDeque;
use std::time::Instant;

/// Number of recent instants considered
pub const RATE_WINDOW: usize = 30;

#[derive(Debug, Default)]
pub struct RateTracker {
    instants: VecDeque<Instant>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self {
            instants: VecDeque::with_capacity(RATE_WINDOW),
        }
    }

    pub fn record(&mut self, at: Instant) {
        if self.instants.len() == RATE_WINDOW {
            self.instants.pop_front();
        }
        self.instants.push_back(at);
    }

    /// `(n - 1) / (last - first)`, or 0 with fewer than two instants
    pub fn rate_hz(&self) -> f64 {
        let (Some(first), Some(last)) = (self.instants.front(), self.instants.back()) else {
            return 0.0;
        };
        let span = last.duration_since(*first).as_secs_f64();
        if self.instants.len() < 2 || span <= 0.0 {
            return 0.0;
        }
        (self.instants.len() - 1) as f64 / span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rate_needs_two_samples() {
        let mut tracker = RateTracker::new();
        assert_eq!(tracker.rate_hz(), 0.0);
        tracker.record(Instant::now());
        assert_eq!(tracker.rate_hz(), 0.0);
    }

    #[test]
    fn test_rate_from_uniform_spacing() {
        let mut tracker = RateTracker::new();
        let start = Instant::now();
        for i in 0..11 {
            tracker.record(start + Duration::from_millis(100 * i));
        }
        assert!((tracker.rate_hz() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut tracker = RateTracker::new();
        let start = Instant::now();
        // 前 10 个间隔 1s，其后 30 个间隔 10ms
        for i in 0..10 {
            tracker.record(start + Duration::from_secs(i));
        }
        let base = start + Duration::from_secs(10);
        for i in 0..30 {
            tracker.record(base + Duration::from_millis(10 * i));
        }
        assert!((tracker.rate_hz() - 100.0).abs() < 1e-6);
    }
}
