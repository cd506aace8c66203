//! Exclusive device handle ownership
//!
//! The loop thread is the only user of the handle while running. `release`
//! from another thread closes the handle at once when the loop is idle, or
//! marks it so the loop closes it on its way out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, TryLockError};

use contracts::{CameraDevice, RangeDevice};
use tracing::{debug, warn};

use crate::sync::lock_unpoisoned;

/// A device handle that can be released exactly once
pub trait OwnedDevice: Send {
    fn device_name(&self) -> &str;
    fn close(&mut self);
}

impl OwnedDevice for Box<dyn CameraDevice> {
    fn device_name(&self) -> &str {
        self.name()
    }

    fn close(&mut self) {
        self.release();
    }
}

impl OwnedDevice for Box<dyn RangeDevice> {
    fn device_name(&self) -> &str {
        self.name()
    }

    fn close(&mut self) {
        self.release();
    }
}

pub struct DeviceSlot<D: OwnedDevice> {
    device: Mutex<Option<D>>,
    release_requested: AtomicBool,
}

impl<D: OwnedDevice> DeviceSlot<D> {
    pub fn new(device: D) -> Self {
        Self {
            device: Mutex::new(Some(device)),
            release_requested: AtomicBool::new(false),
        }
    }

    /// Run `f` against the handle. `None` once released.
    pub fn with<R>(&self, f: impl FnOnce(&mut D) -> R) -> Option<R> {
        if self.is_released() {
            return None;
        }
        lock_unpoisoned(&self.device).as_mut().map(f)
    }

    pub fn is_released(&self) -> bool {
        self.release_requested.load(Ordering::Acquire)
    }

    /// Close the handle. Idempotent.
    ///
    /// If the handle is busy (a detached loop stuck in a device call), the
    /// close is deferred to [`DeviceSlot::finish`] on that loop's exit.
    pub fn release(&self) {
        self.release_requested.store(true, Ordering::Release);
        match self.device.try_lock() {
            Ok(mut guard) => Self::close_taken(guard.take()),
            Err(TryLockError::Poisoned(poisoned)) => Self::close_taken(poisoned.into_inner().take()),
            Err(TryLockError::WouldBlock) => {
                warn!("device busy, release deferred to loop exit");
            }
        }
    }

    /// Called by the loop thread as it exits
    pub fn finish(&self) {
        if self.is_released() {
            Self::close_taken(lock_unpoisoned(&self.device).take());
        }
    }

    fn close_taken(device: Option<D>) {
        if let Some(mut device) = device {
            device.close();
            debug!(device = %device.device_name(), "device released");
        }
    }
}
