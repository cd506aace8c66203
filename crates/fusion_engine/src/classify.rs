//! Distance classification and fusion quality.
//!
//! All thresholds are strict upper bounds: a value equal to a threshold
//! falls into the next bucket.

use contracts::{DistanceCategory, EnvironmentAssessment, SafetyLevel};

/// Distance bucket: `<0.5`, `<1.0`, `<3.0`, `<5.0`, else very far
pub fn categorize_distance(distance: f64) -> DistanceCategory {
    if distance < 0.5 {
        DistanceCategory::VeryClose
    } else if distance < 1.0 {
        DistanceCategory::Close
    } else if distance < 3.0 {
        DistanceCategory::Medium
    } else if distance < 5.0 {
        DistanceCategory::Far
    } else {
        DistanceCategory::VeryFar
    }
}

/// Safety bucket: `<0.3`, `<0.8`, `<2.0`, else safe
pub fn safety_level(distance: f64) -> SafetyLevel {
    if distance < 0.3 {
        SafetyLevel::Critical
    } else if distance < 0.8 {
        SafetyLevel::Warning
    } else if distance < 2.0 {
        SafetyLevel::Caution
    } else {
        SafetyLevel::Safe
    }
}

/// Surroundings: `<0.5` obstacle, `<1.5` narrow, else open
pub fn assess_environment(distance: f64) -> EnvironmentAssessment {
    if distance < 0.5 {
        EnvironmentAssessment::ObstacleDetected
    } else if distance < 1.5 {
        EnvironmentAssessment::NarrowSpace
    } else {
        EnvironmentAssessment::OpenSpace
    }
}

/// Heuristic fusion quality in [0, 1]
///
/// Product of a camera presence factor (0.5 without an active camera),
/// the range error-rate factor `1 - errors / max(readings, 1)` and the
/// sync factor `max(0, 1 - time_diff_ms / 1000 * 10)`.
pub fn fusion_quality(
    camera_active: bool,
    error_count: u64,
    reading_count: u64,
    time_diff_ms: f64,
) -> f64 {
    let camera = if camera_active { 1.0 } else { 0.5 };
    let error_rate = error_count as f64 / reading_count.max(1) as f64;
    let range = (1.0 - error_rate).clamp(0.0, 1.0);
    let sync = (1.0 - time_diff_ms / 1000.0 * 10.0).max(0.0);
    (camera * range * sync).clamp(0.0, 1.0)
}
