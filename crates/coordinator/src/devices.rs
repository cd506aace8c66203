//! Device handles handed to the coordinator

use contracts::{CameraDevice, RangeDevice};
use ingestion::{MockCamera, MockRangeFinder};

/// Device handles for the enabled sources
///
/// A missing handle for an enabled source leaves that source unavailable.
#[derive(Default)]
pub struct DeviceSet {
    pub camera: Option<Box<dyn CameraDevice>>,
    pub range: Option<Box<dyn RangeDevice>>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera(mut self, camera: impl CameraDevice + 'static) -> Self {
        self.camera = Some(Box::new(camera));
        self
    }

    pub fn with_range(mut self, range: impl RangeDevice + 'static) -> Self {
        self.range = Some(Box::new(range));
        self
    }

    /// Mock camera and mock range finder
    pub fn mock() -> Self {
        Self::new()
            .with_camera(MockCamera::new("mock-camera"))
            .with_range(MockRangeFinder::new("mock-range"))
    }
}

impl std::fmt::Debug for DeviceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSet")
            .field("camera", &self.camera.as_ref().map(|d| d.name().to_string()))
            .field("range", &self.range.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}
