//! EdgeConfig - Config Loader 输出
//!
//! 描述完整的边缘设备配置：相机、激光测距仪、融合策略、生命周期与指标导出。

use serde::{Deserialize, Serialize};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的边缘设备配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 相机配置
    #[serde(default)]
    pub camera: CameraConfig,

    /// 激光测距仪配置
    #[serde(default)]
    pub range_finder: RangeFinderConfig,

    /// 融合配置
    #[serde(default)]
    pub fusion: FusionConfig,

    /// 生命周期配置
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// 指标导出配置
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

/// 相机配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 设备编号 (e.g., /dev/video0 -> 0)
    #[serde(default)]
    pub device_id: u32,

    /// 图像宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 图像高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 目标帧率 (Hz)，必须 > 0
    #[serde(default = "default_fps")]
    pub fps: f64,

    /// 单帧读取超时 (毫秒)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// 初始化时是否预读一帧以确认设备可用
    #[serde(default = "default_true")]
    pub warmup: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_id: 0,
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            read_timeout_ms: default_read_timeout_ms(),
            warmup: true,
        }
    }
}

impl CameraConfig {
    /// 目标帧间隔 (秒)
    pub fn frame_interval_secs(&self) -> f64 {
        if self.fps > 0.0 {
            1.0 / self.fps
        } else {
            1.0 / default_fps()
        }
    }
}

/// 激光测距仪配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeFinderConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 串口路径
    #[serde(default = "default_port")]
    pub port: String,

    /// 波特率
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,

    /// 读取超时 (秒)
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// 物理量程下限 (米)
    #[serde(default = "default_min_distance")]
    pub min_distance: f64,

    /// 物理量程上限 (米)
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,

    /// 查询间隔 (毫秒)
    #[serde(default = "default_read_interval_ms")]
    pub read_interval_ms: u64,

    /// 是否启用统计离群值过滤
    #[serde(default = "default_true")]
    pub filter_outliers: bool,
}

impl Default for RangeFinderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_port(),
            baudrate: default_baudrate(),
            timeout: default_timeout(),
            min_distance: default_min_distance(),
            max_distance: default_max_distance(),
            read_interval_ms: default_read_interval_ms(),
            filter_outliers: true,
        }
    }
}

/// 融合配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// 最大允许时间差 (毫秒)
    #[serde(default = "default_sync_tolerance_ms")]
    pub sync_tolerance_ms: f64,

    /// 离群值过滤的滑动窗口大小
    #[serde(default = "default_moving_average_window")]
    pub moving_average_window: usize,

    /// 融合频率 (Hz)
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,

    /// 历史记录容量
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            sync_tolerance_ms: default_sync_tolerance_ms(),
            moving_average_window: default_moving_average_window(),
            tick_rate_hz: default_tick_rate_hz(),
            history_size: default_history_size(),
        }
    }
}

impl FusionConfig {
    /// 融合周期 (秒)
    pub fn tick_interval_secs(&self) -> f64 {
        if self.tick_rate_hz > 0.0 {
            1.0 / self.tick_rate_hz
        } else {
            1.0 / default_tick_rate_hz()
        }
    }
}

/// 生命周期配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// 每个循环线程的停止等待上限 (毫秒)
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

/// 指标导出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Prometheus 端口 (0 = 禁用)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
        }
    }
}

/// 丢包策略 (订阅通道满时)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// 丢弃最旧的记录
    #[default]
    DropOldest,
    /// 丢弃最新的记录
    DropNewest,
}

/// 常见串口波特率
pub const STANDARD_BAUDRATES: [u32; 8] = [
    9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

fn default_true() -> bool {
    true
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> f64 {
    30.0
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baudrate() -> u32 {
    115200
}

fn default_timeout() -> f64 {
    1.0
}

fn default_min_distance() -> f64 {
    0.1
}

fn default_max_distance() -> f64 {
    10.0
}

fn default_read_interval_ms() -> u64 {
    100 // 10Hz
}

fn default_sync_tolerance_ms() -> f64 {
    100.0
}

fn default_moving_average_window() -> usize {
    5
}

fn default_tick_rate_hz() -> f64 {
    10.0
}

fn default_history_size() -> usize {
    100
}

fn default_stop_timeout_ms() -> u64 {
    3000
}

fn default_metrics_port() -> u16 {
    9000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: EdgeConfig = serde_json::from_str("{}").unwrap();
        assert!(config.camera.enabled);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.range_finder.baudrate, 115200);
        assert_eq!(config.fusion.sync_tolerance_ms, 100.0);
        assert_eq!(config.fusion.moving_average_window, 5);
        assert_eq!(config.lifecycle.stop_timeout_ms, 3000);
    }

    #[test]
    fn test_intervals() {
        let camera = CameraConfig {
            fps: 20.0,
            ..Default::default()
        };
        assert!((camera.frame_interval_secs() - 0.05).abs() < 1e-12);

        let fusion = FusionConfig::default();
        assert!((fusion.tick_interval_secs() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_drop_policy_wire_name() {
        let policy: DropPolicy = serde_json::from_str("\"drop_newest\"").unwrap();
        assert_eq!(policy, DropPolicy::DropNewest);
    }
}
