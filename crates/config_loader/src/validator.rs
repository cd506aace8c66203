//! 配置校验模块
//!
//! 校验规则：
//! - 至少启用一个数据源
//! - camera: width/height > 0, fps > 0, read_timeout_ms > 0
//! - range_finder: port 非空, 波特率为标准值, timeout > 0, 0 <= min_distance < max_distance
//! - fusion: sync_tolerance_ms > 0, moving_average_window >= 3, tick_rate_hz > 0, history_size > 0
//! - lifecycle: stop_timeout_ms > 0

use contracts::{
    CameraConfig, ContractError, EdgeConfig, FusionConfig, RangeFinderConfig, STANDARD_BAUDRATES,
};

/// 离群值过滤需要的最小窗口
pub const MIN_MOVING_AVERAGE_WINDOW: usize = 3;

/// 校验 EdgeConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &EdgeConfig) -> Result<(), ContractError> {
    validate_sources_enabled(config)?;
    if config.camera.enabled {
        validate_camera(&config.camera)?;
    }
    if config.range_finder.enabled {
        validate_range_finder(&config.range_finder)?;
    }
    validate_fusion(&config.fusion)?;
    validate_lifecycle(config)?;
    Ok(())
}

/// 校验数据源开关
fn validate_sources_enabled(config: &EdgeConfig) -> Result<(), ContractError> {
    if !config.camera.enabled && !config.range_finder.enabled {
        return Err(ContractError::config_validation(
            "camera.enabled / range_finder.enabled",
            "at least one source must be enabled",
        ));
    }
    Ok(())
}

/// 校验相机配置
fn validate_camera(camera: &CameraConfig) -> Result<(), ContractError> {
    if camera.width == 0 || camera.height == 0 {
        return Err(ContractError::config_validation(
            "camera.width / camera.height",
            format!(
                "resolution must be > 0, got {}x{}",
                camera.width, camera.height
            ),
        ));
    }
    if !(camera.fps > 0.0) {
        return Err(ContractError::config_validation(
            "camera.fps",
            format!("fps must be > 0, got {}", camera.fps),
        ));
    }
    if camera.read_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "camera.read_timeout_ms",
            "read_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验激光测距仪配置
fn validate_range_finder(range: &RangeFinderConfig) -> Result<(), ContractError> {
    if range.port.trim().is_empty() {
        return Err(ContractError::config_validation(
            "range_finder.port",
            "port cannot be empty",
        ));
    }
    if !STANDARD_BAUDRATES.contains(&range.baudrate) {
        return Err(ContractError::config_validation(
            "range_finder.baudrate",
            format!(
                "baudrate {} is not one of {:?}",
                range.baudrate, STANDARD_BAUDRATES
            ),
        ));
    }
    if !(range.timeout > 0.0) {
        return Err(ContractError::config_validation(
            "range_finder.timeout",
            format!("timeout must be > 0, got {}", range.timeout),
        ));
    }
    if range.min_distance < 0.0 || range.min_distance >= range.max_distance {
        return Err(ContractError::config_validation(
            "range_finder.min_distance / range_finder.max_distance",
            format!(
                "require 0 <= min_distance ({}) < max_distance ({})",
                range.min_distance, range.max_distance
            ),
        ));
    }
    Ok(())
}

/// 校验融合配置
fn validate_fusion(fusion: &FusionConfig) -> Result<(), ContractError> {
    if !(fusion.sync_tolerance_ms > 0.0) {
        return Err(ContractError::config_validation(
            "fusion.sync_tolerance_ms",
            format!(
                "sync_tolerance_ms must be > 0, got {}",
                fusion.sync_tolerance_ms
            ),
        ));
    }
    if fusion.moving_average_window < MIN_MOVING_AVERAGE_WINDOW {
        return Err(ContractError::config_validation(
            "fusion.moving_average_window",
            format!(
                "moving_average_window must be >= {MIN_MOVING_AVERAGE_WINDOW}, got {}",
                fusion.moving_average_window
            ),
        ));
    }
    if !(fusion.tick_rate_hz > 0.0) {
        return Err(ContractError::config_validation(
            "fusion.tick_rate_hz",
            format!("tick_rate_hz must be > 0, got {}", fusion.tick_rate_hz),
        ));
    }
    if fusion.history_size == 0 {
        return Err(ContractError::config_validation(
            "fusion.history_size",
            "history_size must be > 0",
        ));
    }
    Ok(())
}

/// 校验生命周期配置
fn validate_lifecycle(config: &EdgeConfig) -> Result<(), ContractError> {
    if config.lifecycle.stop_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "lifecycle.stop_timeout_ms",
            "stop_timeout_ms must be > 0",
        ));
    }
    Ok(())
}
