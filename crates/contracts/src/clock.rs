//! Wall-clock timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in seconds since the UNIX epoch.
///
/// A clock set before 1970 yields `0.0` rather than an error.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_monotone_enough() {
        let a = now_secs();
        let b = now_secs();
        assert!(a > 1.0e9);
        assert!(b >= a);
    }
}
