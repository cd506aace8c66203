//! # Ingestion
//!
//! Sensor acquisition: one loop thread per source, each publishing into its
//! own single-slot [`SampleBuffer`].
//!
//! Responsibilities:
//! - Own the device handle exclusively (camera, range finder)
//! - Capture / query on a dedicated named thread, paced to the configured rate
//! - Absorb transient failures (count + log), never kill the loop
//! - Range parsing, physical-range check and outlier substitution
//! - Bounded stop: signal, wait, then detach an unresponsive thread
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{CameraSource, MockCamera};
//!
//! let source = CameraSource::new(config.camera.clone(), Box::new(MockCamera::new("cam")));
//! source.initialize()?;
//! source.start()?;
//! if let Some(frame) = source.latest_frame() {
//!     println!("frame #{}", frame.sequence_number);
//! }
//! source.release();
//! ```

mod buffer;
mod camera;
mod error;
mod filter;
mod metrics;
mod mock;
mod parse;
mod range;
mod rate;
mod runtime;
#[cfg(feature = "serial")]
mod serial;
mod slot;
mod sync;
mod worker;

use std::time::Duration;

/// Stop timeout used by `release` and `Drop`
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(3);

// Re-exports
pub use buffer::{Sample, SampleBuffer};
pub use camera::{CameraSource, CAMERA_THREAD};
pub use error::{IngestionError, Result};
pub use filter::{FilterOutcome, OutlierFilter, HISTORY_CAPACITY, MIN_HISTORY};
pub use crate::metrics::{SourceMetrics, SourceSnapshot};
pub use mock::{MockCamera, MockFaults, MockProbe, MockRangeFinder};
pub use parse::parse_distance;
pub use range::{RangeSource, QUALITY_MEASURED, QUALITY_SUBSTITUTED, RANGE_THREAD};
pub use rate::{RateTracker, RATE_WINDOW};
pub use runtime::LoopRuntime;
#[cfg(feature = "serial")]
pub use serial::SerialRangeFinder;
pub use sync::{lock_unpoisoned, StopSignal};
pub use worker::{LoopWorker, StopOutcome};
