//! 融合指标收集模块
//!
//! 基于 FusedRecord / CoordinatorStatus 导出 Prometheus 指标，并在内存中做运行统计。

use std::collections::BTreeMap;

use contracts::{ComponentStatus, CoordinatorStatus, FusedRecord};
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};

/// 登记 `edge_fusion_*` 指标的单位与说明
///
/// 安装 Prometheus 出口后调用一次，使 `/metrics` 带上 HELP 行。
pub fn describe_metrics() {
    describe_counter!(
        "edge_fusion_samples_total",
        Unit::Count,
        "Samples published per source"
    );
    describe_counter!(
        "edge_fusion_read_errors_total",
        Unit::Count,
        "Transient device read failures per source"
    );
    describe_counter!(
        "edge_fusion_parse_errors_total",
        Unit::Count,
        "Range responses without a distance"
    );
    describe_counter!(
        "edge_fusion_outliers_substituted_total",
        Unit::Count,
        "Range readings replaced by the moving average"
    );
    describe_counter!(
        "edge_fusion_readings_rejected_total",
        Unit::Count,
        "Range readings outside the physical range"
    );
    describe_counter!(
        "edge_fusion_records_total",
        Unit::Count,
        "Fused records emitted"
    );
    describe_counter!(
        "edge_fusion_ticks_skipped_total",
        Unit::Count,
        "Fusion ticks without a record, by reason"
    );
    describe_counter!(
        "edge_fusion_safety_level_total",
        Unit::Count,
        "Fused records per safety level"
    );
    describe_counter!(
        "edge_fusion_distance_category_total",
        Unit::Count,
        "Fused records per distance category"
    );
    describe_gauge!("edge_fusion_camera_fps", "Realized camera frame rate");
    describe_gauge!("edge_fusion_distance_m", "Last fused distance in metres");
    describe_gauge!("edge_fusion_record_quality", "Last fusion quality score");
    describe_gauge!("edge_fusion_last_fusion_id", "Last emitted fusion id");
    describe_gauge!("edge_fusion_running", "1 while the coordinator runs");
    describe_gauge!("edge_fusion_component_available", "1 if the component initialized");
    describe_gauge!("edge_fusion_component_running", "1 while the component loop runs");
    describe_gauge!("edge_fusion_component_errors", "Errors counted by the component");
    describe_gauge!("edge_fusion_component_rate_hz", "Realized component rate");
    describe_histogram!(
        "edge_fusion_time_diff_ms",
        Unit::Milliseconds,
        "Camera/range timestamp difference per tick"
    );
    describe_histogram!("edge_fusion_distance_m_hist", "Fused distances in metres");
    describe_histogram!("edge_fusion_quality_score", "Fusion quality scores");
}

/// 从 FusedRecord 记录指标
///
/// 每次融合引擎产出记录时调用（通常放在回调里）。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_fused_record;
///
/// coordinator.register_callback(|record| record_fused_record(record));
/// ```
pub fn record_fused_record(record: &FusedRecord) {
    gauge!("edge_fusion_last_fusion_id").set(record.fusion_id as f64);
    gauge!("edge_fusion_distance_m").set(record.range.distance);
    histogram!("edge_fusion_distance_m_hist").record(record.range.distance);
    gauge!("edge_fusion_record_quality").set(record.quality_score);

    counter!(
        "edge_fusion_safety_level_total",
        "level" => record.safety_level.as_str()
    )
    .increment(1);
    counter!(
        "edge_fusion_distance_category_total",
        "category" => record.distance_category.as_str()
    )
    .increment(1);
}

/// 记录单个组件状态
pub fn record_component_status(status: &ComponentStatus) {
    let component = status.name.clone();
    gauge!("edge_fusion_component_available", "component" => component.clone())
        .set(if status.available { 1.0 } else { 0.0 });
    gauge!("edge_fusion_component_running", "component" => component.clone())
        .set(if status.state.is_running() { 1.0 } else { 0.0 });
    gauge!("edge_fusion_component_errors", "component" => component.clone())
        .set(status.errors as f64);
    if let Some(rate) = status.rate_hz {
        gauge!("edge_fusion_component_rate_hz", "component" => component).set(rate);
    }
}

/// 记录协调器状态（逐组件）
pub fn record_coordinator_status(status: &CoordinatorStatus) {
    gauge!("edge_fusion_running").set(if status.running { 1.0 } else { 0.0 });
    for component in status.components.values() {
        record_component_status(component);
    }
}

/// 融合指标聚合器
///
/// 在内存中聚合指标，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct FusionMetricsAggregator {
    /// 融合记录总数
    pub total_records: u64,

    /// 最后一条记录的 fusion_id
    pub last_fusion_id: Option<u64>,

    /// fusion_id 不连续的次数
    pub id_gaps: u64,

    /// 时间差统计 (ms)
    pub time_diff_stats: RunningStats,

    /// 距离统计 (m)
    pub distance_stats: RunningStats,

    /// 质量分统计
    pub quality_stats: RunningStats,

    /// 各安全等级计数
    pub safety_counts: BTreeMap<String, u64>,

    /// 各距离分类计数
    pub category_counts: BTreeMap<String, u64>,
}

impl FusionMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, record: &FusedRecord) {
        self.total_records += 1;

        if let Some(last) = self.last_fusion_id {
            if record.fusion_id != last + 1 {
                self.id_gaps += 1;
            }
        }
        self.last_fusion_id = Some(record.fusion_id);

        self.time_diff_stats.push(record.time_diff_ms);
        self.distance_stats.push(record.range.distance);
        self.quality_stats.push(record.quality_score);

        *self
            .safety_counts
            .entry(record.safety_level.as_str().to_string())
            .or_insert(0) += 1;
        *self
            .category_counts
            .entry(record.distance_category.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_records: self.total_records,
            id_gaps: self.id_gaps,
            time_diff_ms: StatsSummary::from(&self.time_diff_stats),
            distance_m: StatsSummary::from(&self.distance_stats),
            quality: StatsSummary::from(&self.quality_stats),
            safety_counts: self.safety_counts.clone(),
            category_counts: self.category_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_records: u64,
    pub id_gaps: u64,
    pub time_diff_ms: StatsSummary,
    pub distance_m: StatsSummary,
    pub quality: StatsSummary,
    pub safety_counts: BTreeMap<String, u64>,
    pub category_counts: BTreeMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Fusion Metrics Summary ===")?;
        writeln!(f, "Total records: {}", self.total_records)?;
        writeln!(f, "Fusion id gaps: {}", self.id_gaps)?;
        writeln!(f, "Time diff (ms): {}", self.time_diff_ms)?;
        writeln!(f, "Distance (m): {}", self.distance_m)?;
        writeln!(f, "Quality: {}", self.quality)?;

        if !self.safety_counts.is_empty() {
            writeln!(f, "Safety levels:")?;
            for (level, count) in &self.safety_counts {
                writeln!(f, "  {}: {}", level, count)?;
            }
        }
        if !self.category_counts.is_empty() {
            writeln!(f, "Distance categories:")?;
            for (category, count) in &self.category_counts {
                writeln!(f, "  {}: {}", category, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值，非有限值直接忽略
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差 (n-1)
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        DistanceCategory, EnvironmentAssessment, FrameMeta, PixelFormat, RangeReading,
        SafetyLevel,
    };

    fn record(fusion_id: u64, distance: f64, safety: SafetyLevel) -> FusedRecord {
        FusedRecord {
            timestamp: 100.0,
            fusion_id,
            time_diff_ms: 12.5,
            synchronized: true,
            frame_meta: FrameMeta {
                width: 4,
                height: 2,
                format: PixelFormat::Bgr8,
                timestamp: 100.0,
                sequence_number: fusion_id,
                byte_len: 24,
            },
            range: RangeReading {
                angle: 0.0,
                distance,
                quality: 255,
                timestamp: 100.0125,
            },
            range_sequence: fusion_id,
            quality_score: 0.9,
            distance_category: DistanceCategory::Medium,
            safety_level: safety,
            environment: EnvironmentAssessment::OpenSpace,
            camera_fps: 30.0,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_running_stats_ignores_nan() {
        let mut stats = RunningStats::default();
        stats.push(f64::NAN);
        stats.push(2.0);
        assert_eq!(stats.count(), 1);
        assert_eq!(stats.mean(), 2.0);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = FusionMetricsAggregator::new();

        aggregator.update(&record(1, 2.0, SafetyLevel::Safe));
        aggregator.update(&record(2, 0.4, SafetyLevel::Warning));
        aggregator.update(&record(5, 3.0, SafetyLevel::Safe));

        assert_eq!(aggregator.total_records, 3);
        assert_eq!(aggregator.last_fusion_id, Some(5));
        assert_eq!(aggregator.id_gaps, 1);
        assert_eq!(aggregator.safety_counts.get("safe"), Some(&2));
        assert_eq!(aggregator.safety_counts.get("warning"), Some(&1));
        assert_eq!(aggregator.category_counts.get("medium"), Some(&3));
        assert!((aggregator.distance_stats.max() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = FusionMetricsAggregator::new();
        aggregator.update(&record(1, 2.0, SafetyLevel::Safe));

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Total records: 1"));
        assert!(output.contains("safe: 1"));
        assert!(output.contains("mean=12.500"));

        aggregator.reset();
        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Time diff (ms): N/A"));
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_fused_record(&record(1, 2.0, SafetyLevel::Safe));
    }
}
