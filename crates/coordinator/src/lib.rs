//! # Coordinator
//!
//! Owns the lifecycle of the camera source, the range source and the fusion
//! engine. Explicit ownership: every component the coordinator must shut
//! down is a field, released in reverse start order.
//!
//! # Example
//!
//! ```no_run
//! use coordinator::{Coordinator, DeviceSet};
//! use contracts::EdgeConfig;
//! use std::time::Duration;
//!
//! let coordinator = Coordinator::new(EdgeConfig::default(), DeviceSet::mock());
//! coordinator.initialize()?;
//! coordinator.start()?;
//! coordinator.wait_for_data(Duration::from_secs(2));
//! if let Some(record) = coordinator.latest_fused() {
//!     println!("{} ({})", record.range.distance, record.safety_level);
//! }
//! coordinator.shutdown();
//! # Ok::<(), contracts::ContractError>(())
//! ```

mod coordinator;
mod devices;

pub use coordinator::{Coordinator, StopReport};
pub use devices::DeviceSet;
