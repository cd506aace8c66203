//! # Fusion Engine
//!
//! 相机 + 激光测距融合引擎。
//!
//! 负责：
//! - 固定节拍读取两个 `SampleBuffer` 的最新样本
//! - 时间对齐检查（`sync_tolerance_ms`），超出容差则跳过
//! - 质量评分、距离/安全/环境分类
//! - 输出 `FusedRecord`（latest 槽 + 有界历史 + 回调 + 通道订阅）
//!
//! ## 使用示例
//!
//! ```ignore
//! use fusion_engine::{FusionEngine, FusionInputs};
//!
//! let inputs = FusionInputs {
//!     camera: camera.buffer(),
//!     range: range.buffer(),
//!     camera_metrics: camera.metrics(),
//!     range_metrics: range.metrics(),
//! };
//! let engine = FusionEngine::new(config.fusion.clone(), inputs);
//! engine.register_callback(|record| println!("{:.2} m", record.range.distance));
//! engine.start()?;
//! ```

mod classify;
mod engine;
mod fanout;
mod history;
mod stats;

pub use classify::{assess_environment, categorize_distance, fusion_quality, safety_level};
pub use engine::{FusionEngine, FusionInputs, SkipReason, TickOutcome, FUSION_THREAD};
pub use fanout::Fanout;
pub use history::FusionHistory;
pub use stats::{FusionStats, FusionStatsSnapshot};
