//! # Contracts
//!
//! Frozen interface contracts shared by every edge-fusion crate: sample and
//! record types, configuration schema, device traits and lifecycle status.
//! Business crates depend on this crate; it depends on none of them.
//!
//! ## Time Model
//! - Wall clock, seconds since the UNIX epoch (`f64`), see [`now_secs`]
//! - Sequence numbers are per-source and strictly increasing

mod clock;
mod config;
mod device;
mod error;
mod fused;
mod sample;
mod status;

pub use clock::now_secs;
pub use config::*;
pub use device::{CameraDevice, FusedCallback, RangeDevice};
pub use error::*;
pub use fused::*;
pub use sample::*;
pub use status::*;
