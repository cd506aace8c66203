//! # Observability
//!
//! 边缘融合运行时的日志与指标出口。
//!
//! - [`init_logging`]: tracing 订阅器。采集与融合循环跑在具名线程上
//!   (`camera-capture` / `range-reader` / `fusion-tick`)，各格式都输出线程名
//! - [`install_exporter`]: Prometheus 出口，并登记 `edge_fusion_*` 指标说明
//! - [`metrics`]: FusedRecord / 组件状态的指标记录与汇总
//!
//! ```ignore
//! let config = ObservabilityConfig::from_settings(&edge_config.observability);
//! observability::init(&config)?;
//! coordinator.register_callback(observability::record_fused_record);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use contracts::ObservabilitySettings;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use crate::metrics::{
    describe_metrics, record_component_status, record_coordinator_status, record_fused_record,
    FusionMetricsAggregator, MetricsSummary, RunningStats, StatsSummary,
};

/// 运行时自身的日志 target，其余依赖只输出 warn 及以上
pub const FUSION_TARGETS: &[&str] = &[
    "config_loader",
    "ingestion",
    "fusion_engine",
    "coordinator",
    "observability",
    "edge_fusion",
    "mock_fusion",
    "serial_fusion",
];

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// 运行时 crate 的日志级别（设置了 RUST_LOG 时以其为准）
    pub level: Level,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            level: Level::INFO,
            metrics_port: None,
        }
    }
}

impl ObservabilityConfig {
    /// 使用配置文件中的导出设置（端口 0 表示禁用）
    pub fn from_settings(settings: &ObservabilitySettings) -> Self {
        Self {
            metrics_port: (settings.metrics_port != 0).then_some(settings.metrics_port),
            ..Self::default()
        }
    }

    /// 未设置 RUST_LOG 时的过滤指令，如 `warn,ingestion=info,...`
    pub fn default_directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        let mut directives = vec!["warn".to_string()];
        directives.extend(
            FUSION_TARGETS
                .iter()
                .map(|target| format!("{target}={level}")),
        );
        directives.join(",")
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志（带当前 span，便于按组件检索）
    #[default]
    Json,
    /// 多行人类可读格式
    Pretty,
    /// 单行格式，适合终端跟踪采集循环
    Compact,
}

/// 初始化日志，并在配置了端口时安装指标出口
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;
    if let Some(port) = config.metrics_port {
        install_exporter(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        level = %config.level,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// 安装全局 tracing 订阅器
///
/// # Errors
/// 过滤指令无效，或全局订阅器已被安装。
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.default_directives())
            .context("Invalid default log directives")?,
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_thread_names(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_thread_names(true).boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_names(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .context("Failed to initialize tracing subscriber")
}

/// 在 `0.0.0.0:port` 上安装 Prometheus 出口
///
/// 只安装指标，不动 tracing；CLI 在日志初始化之后按 `--metrics-port` 调用。
pub fn install_exporter(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;
    describe_metrics();

    tracing::info!(port, "Prometheus metrics endpoint listening");
    Ok(())
}
