//! FusedRecord - Fusion Engine output
//!
//! Immutable snapshot combining one camera frame and one range reading.

use serde::{Deserialize, Serialize};

use crate::{FrameMeta, RangeReading};

/// Fused camera + range record
///
/// Produced once per synchronized fusion tick and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedRecord {
    /// Fusion time (seconds since UNIX epoch)
    pub timestamp: f64,

    /// Record counter (monotonically increasing per engine)
    pub fusion_id: u64,

    /// |camera.timestamp - range.timestamp| in milliseconds
    pub time_diff_ms: f64,

    /// Always `true` for emitted records; unsynchronized ticks emit nothing
    pub synchronized: bool,

    /// Camera frame metadata (pixels stay with the camera source)
    pub frame_meta: FrameMeta,

    /// Range reading paired with the frame
    pub range: RangeReading,

    /// Sequence number of the range sample in its buffer
    pub range_sequence: u64,

    /// Heuristic quality (0-1)
    pub quality_score: f64,

    /// Distance bucket
    pub distance_category: DistanceCategory,

    /// Safety bucket
    pub safety_level: SafetyLevel,

    /// Coarse surroundings assessment
    pub environment: EnvironmentAssessment,

    /// Realized camera frame rate at fusion time (Hz)
    pub camera_fps: f64,
}

/// Distance bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceCategory {
    VeryClose,
    Close,
    Medium,
    Far,
    VeryFar,
}

/// Safety bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    Critical,
    Warning,
    Caution,
    Safe,
}

/// Surroundings assessment derived from distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentAssessment {
    ObstacleDetected,
    NarrowSpace,
    OpenSpace,
}

impl DistanceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryClose => "very_close",
            Self::Close => "close",
            Self::Medium => "medium",
            Self::Far => "far",
            Self::VeryFar => "very_far",
        }
    }
}

impl SafetyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Caution => "caution",
            Self::Safe => "safe",
        }
    }
}

impl EnvironmentAssessment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObstacleDetected => "obstacle_detected",
            Self::NarrowSpace => "narrow_space",
            Self::OpenSpace => "open_space",
        }
    }
}

impl std::fmt::Display for DistanceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for EnvironmentAssessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
