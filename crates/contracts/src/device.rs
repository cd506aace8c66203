//! Device traits - hardware handle abstraction
//!
//! Decouples the capture loops from concrete hardware so that real devices
//! and mock devices share one code path.

use std::sync::Arc;

use crate::{CameraConfig, ContractError, FusedRecord, RangeFinderConfig, RawFrame};

/// Fused record callback type
///
/// Invoked synchronously on the fusion thread; must not block.
pub type FusedCallback = Arc<dyn Fn(&FusedRecord) + Send + Sync>;

/// Camera handle
///
/// Owned exclusively by one `CameraSource`. Only the capture thread calls
/// `read_frame`; `release` runs after that thread has exited.
///
/// # Example
///
/// ```ignore
/// let mut device: Box<dyn CameraDevice> = open_camera();
/// device.open(&config)?;
/// if let Some(frame) = device.read_frame()? {
///     println!("{}x{}", frame.width, frame.height);
/// }
/// device.release();
/// ```
pub trait CameraDevice: Send {
    /// Device name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Open the handle
    ///
    /// # Errors
    /// `ContractError::DeviceOpen` when the device cannot be opened
    fn open(&mut self, config: &CameraConfig) -> Result<(), ContractError>;

    /// Read one frame, blocking at most `CameraConfig::read_timeout_ms`
    ///
    /// `Ok(None)` means the device answered without data or the read
    /// timed out.
    fn read_frame(&mut self) -> Result<Option<RawFrame>, ContractError>;

    /// Close the handle. Must be idempotent and safe on a never-opened handle.
    fn release(&mut self);

    /// Check if the handle is open
    fn is_open(&self) -> bool;
}

/// Range finder handle
///
/// Same ownership rules as [`CameraDevice`].
pub trait RangeDevice: Send {
    /// Device name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Open the handle
    ///
    /// # Errors
    /// `ContractError::DeviceOpen` when the port cannot be opened
    fn open(&mut self, config: &RangeFinderConfig) -> Result<(), ContractError>;

    /// Issue one distance query and return the raw response line
    ///
    /// `Ok(None)` means no response arrived within the device timeout.
    fn query(&mut self) -> Result<Option<String>, ContractError>;

    /// Close the handle. Must be idempotent and safe on a never-opened handle.
    fn release(&mut self);

    /// Check if the handle is open
    fn is_open(&self) -> bool;
}
