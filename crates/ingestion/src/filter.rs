//! Statistical outlier filter for range readings
//!
//! Range check first (drop), then a 2-sigma test against the recent window
//! (substitute the mean).

use std::collections::VecDeque;

/// Accepted distances kept for history queries
pub const HISTORY_CAPACITY: usize = 100;

/// Entries required before the statistical test applies
pub const MIN_HISTORY: usize = 3;

/// What the filter did with one raw reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOutcome {
    /// Published as-is
    Accepted(f64),
    /// Replaced by the moving average
    Substituted { raw: f64, mean: f64 },
    /// Outside the physical range; not published
    Rejected(f64),
}

impl FilterOutcome {
    /// Value to publish, if any
    pub fn value(&self) -> Option<f64> {
        match *self {
            Self::Accepted(v) => Some(v),
            Self::Substituted { mean, .. } => Some(mean),
            Self::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutlierFilter {
    window: usize,
    min_distance: f64,
    max_distance: f64,
    statistical: bool,
    history: VecDeque<f64>,
}

impl OutlierFilter {
    pub fn new(window: usize, min_distance: f64, max_distance: f64) -> Self {
        Self {
            window,
            min_distance,
            max_distance,
            statistical: true,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Disable the 2-sigma test; the range check still applies
    pub fn without_statistics(mut self) -> Self {
        self.statistical = false;
        self
    }

    pub fn apply(&mut self, raw: f64) -> FilterOutcome {
        if !raw.is_finite() || raw < self.min_distance || raw > self.max_distance {
            return FilterOutcome::Rejected(raw);
        }

        if !self.statistical || self.history.len() < MIN_HISTORY {
            self.push(raw);
            return FilterOutcome::Accepted(raw);
        }

        let take = self.window.min(self.history.len());
        if take < MIN_HISTORY {
            self.push(raw);
            return FilterOutcome::Accepted(raw);
        }

        let recent = self.history.iter().skip(self.history.len() - take);
        let mean = recent.clone().sum::<f64>() / take as f64;
        let variance = recent.map(|v| (v - mean).powi(2)).sum::<f64>() / (take - 1) as f64;
        let stddev = variance.sqrt();

        if (raw - mean).abs() > 2.0 * stddev {
            self.push(mean);
            FilterOutcome::Substituted { raw, mean }
        } else {
            self.push(raw);
            FilterOutcome::Accepted(raw)
        }
    }

    /// Most recent `count` accepted values, oldest first
    pub fn history(&self, count: usize) -> Vec<f64> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn push(&mut self, value: f64) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide_filter() -> OutlierFilter {
        OutlierFilter::new(5, 0.0, 1000.0)
    }

    #[test]
    fn test_outlier_substituted_with_mean() {
        let mut filter = wide_filter();
        for _ in 0..5 {
            assert_eq!(filter.apply(1.0), FilterOutcome::Accepted(1.0));
        }
        let outcome = filter.apply(100.0);
        assert_eq!(outcome, FilterOutcome::Substituted { raw: 100.0, mean: 1.0 });
        assert!((outcome.value().unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(filter.history(1), vec![1.0]);
    }

    #[test]
    fn test_short_history_accepts_anything() {
        let mut filter = wide_filter();
        assert_eq!(filter.apply(1.0), FilterOutcome::Accepted(1.0));
        assert_eq!(filter.apply(1.0), FilterOutcome::Accepted(1.0));
        assert_eq!(filter.apply(900.0), FilterOutcome::Accepted(900.0));
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn test_out_of_range_rejected_before_statistics() {
        let mut filter = OutlierFilter::new(5, 0.1, 10.0);
        assert_eq!(filter.apply(0.05), FilterOutcome::Rejected(0.05));
        assert_eq!(filter.apply(12.0), FilterOutcome::Rejected(12.0));
        assert_eq!(filter.apply(f64::NAN).value(), None);
        assert!(filter.is_empty());
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let mut filter = OutlierFilter::new(5, 0.1, 10.0);
        assert_eq!(filter.apply(0.1), FilterOutcome::Accepted(0.1));
        assert_eq!(filter.apply(10.0), FilterOutcome::Accepted(10.0));
    }

    #[test]
    fn test_within_two_sigma_accepted() {
        let mut filter = wide_filter();
        for v in [1.0, 1.2, 0.8, 1.1, 0.9] {
            filter.apply(v);
        }
        assert_eq!(filter.apply(1.3), FilterOutcome::Accepted(1.3));
    }

    #[test]
    fn test_only_recent_window_counts() {
        let seed = [100.0, 5.0, 5.0, 5.0];
        let mut narrow = OutlierFilter::new(3, 0.0, 1000.0);
        let mut wide = OutlierFilter::new(5, 0.0, 1000.0);
        for v in seed {
            narrow.apply(v);
            wide.apply(v);
        }
        // 窄窗口只看到 [5, 5, 5]，宽窗口仍包含 100
        assert_eq!(narrow.apply(6.0), FilterOutcome::Substituted { raw: 6.0, mean: 5.0 });
        assert_eq!(wide.apply(6.0), FilterOutcome::Accepted(6.0));
    }

    #[test]
    fn test_statistics_disabled() {
        let mut filter = wide_filter().without_statistics();
        for _ in 0..5 {
            filter.apply(1.0);
        }
        assert_eq!(filter.apply(100.0), FilterOutcome::Accepted(100.0));
    }

    #[test]
    fn test_history_capacity() {
        let mut filter = wide_filter().without_statistics();
        for i in 0..150 {
            filter.apply(i as f64);
        }
        assert_eq!(filter.len(), HISTORY_CAPACITY);
        assert_eq!(filter.history(3), vec![147.0, 148.0, 149.0]);
        assert_eq!(filter.history(1000).len(), HISTORY_CAPACITY);
    }
}
