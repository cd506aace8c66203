//! Sensor samples - Ingestion output
//!
//! Timestamped observations produced by the camera and range sources.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Single range measurement
///
/// Immutable once created by the range source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeReading {
    /// Beam angle (degrees); single-point finders report 0.0
    pub angle: f64,

    /// Distance (meters), after outlier filtering
    pub distance: f64,

    /// Signal quality (0-255)
    pub quality: u8,

    /// Capture time (seconds since UNIX epoch)
    pub timestamp: f64,
}

/// Camera frame
///
/// `pixel_data` is an immutable, reference-counted buffer: the capture loop
/// never writes into a buffer after handing it out, so readers own a stable
/// view without copying pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSample {
    /// Raw pixel bytes
    pub pixel_data: Bytes,

    /// Image width
    pub width: u32,

    /// Image height
    pub height: u32,

    /// Pixel format
    pub format: PixelFormat,

    /// Capture time (seconds since UNIX epoch)
    pub timestamp: f64,

    /// Monotonically increasing capture counter
    pub sequence_number: u64,
}

impl FrameSample {
    /// Frame metadata without pixels
    pub fn meta(&self) -> FrameMeta {
        FrameMeta {
            width: self.width,
            height: self.height,
            format: self.format,
            timestamp: self.timestamp,
            sequence_number: self.sequence_number,
            byte_len: self.pixel_data.len(),
        }
    }
}

/// `FrameSample` without its pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub timestamp: f64,
    pub sequence_number: u64,
    /// Size of the pixel buffer that was left behind
    pub byte_len: usize,
}

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    #[default]
    Bgr8,
    Rgb8,
    Gray8,
    Mjpeg,
}

impl PixelFormat {
    /// Bytes per pixel for uncompressed formats
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Bgr8 | Self::Rgb8 => Some(3),
            Self::Gray8 => Some(1),
            Self::Mjpeg => None,
        }
    }
}

/// Frame as returned by a camera device, before timestamping
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_meta_drops_pixels() {
        let frame = FrameSample {
            pixel_data: Bytes::from(vec![7u8; 4 * 3 * 3]),
            width: 4,
            height: 3,
            format: PixelFormat::Bgr8,
            timestamp: 12.5,
            sequence_number: 9,
        };

        let meta = frame.meta();
        assert_eq!(meta.width, 4);
        assert_eq!(meta.height, 3);
        assert_eq!(meta.sequence_number, 9);
        assert_eq!(meta.byte_len, 36);
    }

    #[test]
    fn test_range_reading_serde() {
        let reading = RangeReading {
            angle: 0.0,
            distance: 1.25,
            quality: 200,
            timestamp: 3.0,
        };
        let json = serde_json::to_string(&reading).unwrap();
        let back: RangeReading = serde_json::from_str(&json).unwrap();
        assert_eq!(reading, back);
    }
}
