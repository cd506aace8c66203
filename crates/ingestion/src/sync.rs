//! Locking helpers and the cooperative stop signal shared by every loop.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Acquire a mutex, recovering the guard if a previous holder panicked.
///
/// Every critical section in this crate leaves the protected value
/// consistent, so a poisoned lock carries no torn state.
pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cooperative stop signal
///
/// Loops poll [`StopSignal::is_triggered`] once per iteration and pace
/// themselves with [`StopSignal::wait_timeout`], so a stop request wakes a
/// sleeping loop immediately instead of after its full interval.
#[derive(Debug, Default)]
pub struct StopSignal {
    triggered: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to stop and wake any waiter
    pub fn trigger(&self) {
        *lock_unpoisoned(&self.triggered) = true;
        self.cond.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *lock_unpoisoned(&self.triggered)
    }

    /// Sleep up to `timeout`, returning early when triggered.
    ///
    /// Returns `true` if the signal is triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = lock_unpoisoned(&self.triggered);
        if *guard || timeout.is_zero() {
            return *guard;
        }
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |triggered| !*triggered)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
