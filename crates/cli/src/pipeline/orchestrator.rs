//! Pipeline orchestrator - drives a Coordinator from the async runtime.
//!
//! The coordinator's lifecycle calls block (they join loop threads), so
//! they run on the blocking pool; fused records arrive over a bounded
//! subscription channel.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DropPolicy, EdgeConfig, FusedRecord};
use coordinator::{Coordinator, DeviceSet};
use ingestion::{MockCamera, MockRangeFinder, StopOutcome};
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// How long `run` waits for the first samples before continuing degraded
const FIRST_DATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Component status is exported every this many records
const STATUS_EXPORT_INTERVAL: u64 = 10;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated edge configuration
    pub edge: EdgeConfig,

    /// Use the serial range finder instead of the mock one
    pub serial: bool,

    /// Mock range finder base distance (meters)
    pub mock_distance: f64,

    /// Maximum number of fused records (None = unlimited)
    pub max_records: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Subscription channel capacity
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the record limit, the timeout or `shutdown` resolves
    pub async fn run<S>(self, shutdown: S) -> Result<PipelineStats>
    where
        S: Future<Output = ()>,
    {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::install_exporter(port)?;
        }

        let devices = build_devices(self.config.serial, self.config.mock_distance)?;
        info!(devices = ?devices, "Devices configured");

        let coordinator = Arc::new(Coordinator::new(self.config.edge.clone(), devices));

        blocking(&coordinator, |c| c.initialize())
            .await?
            .map_err(|e| CliError::pipeline_execution(format!("initialize: {e}")))?;

        info!(
            camera = coordinator.camera_available(),
            range_finder = coordinator.range_available(),
            "Coordinator initialized"
        );
        if !(coordinator.camera_available() && coordinator.range_available()) {
            warn!("Running degraded - no fused records will be produced");
        }

        coordinator.register_callback(observability::record_fused_record);
        let records = coordinator.subscribe(self.config.buffer_size, DropPolicy::DropOldest);

        blocking(&coordinator, |c| c.start())
            .await?
            .map_err(|e| CliError::pipeline_execution(format!("start: {e}")))?;

        if !blocking(&coordinator, |c| c.wait_for_data(FIRST_DATA_TIMEOUT)).await? {
            warn!(
                timeout_secs = FIRST_DATA_TIMEOUT.as_secs(),
                "Not every available source produced data in time"
            );
        }

        info!(max_records = ?self.config.max_records, "Pipeline running");

        let mut stats = PipelineStats::default();
        let deadline = self
            .config
            .timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);
        tokio::pin!(shutdown);

        loop {
            let expired = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                record = records.recv() => match record {
                    Ok(record) => {
                        self.handle_record(&record, &mut stats);
                        if stats.records_received % STATUS_EXPORT_INTERVAL == 0 {
                            observability::record_coordinator_status(&coordinator.status());
                        }
                        if self
                            .config
                            .max_records
                            .is_some_and(|max| stats.records_received >= max)
                        {
                            info!(records = stats.records_received, "Reached max records limit");
                            break;
                        }
                    }
                    Err(_) => {
                        warn!("Record channel closed");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping pipeline...");
                    stats.interrupted = true;
                    break;
                }
                _ = expired => {
                    warn!(timeout_secs = ?self.config.timeout.map(|t| t.as_secs()), "Pipeline timed out");
                    stats.timed_out = true;
                    break;
                }
            }
        }

        info!("Shutting down pipeline...");
        let report = blocking(&coordinator, |c| c.stop()).await?;
        stats.stop_timeouts = report
            .iter()
            .filter(|(_, outcome)| *outcome == StopOutcome::TimedOut)
            .map(|(component, _)| component.to_string())
            .collect();

        stats.fusion = coordinator.fusion_stats();
        let status = coordinator.status();
        observability::record_coordinator_status(&status);
        stats.status = Some(status);

        blocking(&coordinator, |c| c.shutdown()).await?;

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            records = stats.records_received,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    fn handle_record(&self, record: &FusedRecord, stats: &mut PipelineStats) {
        stats.records_received += 1;
        stats.record_metrics.update(record);

        info!(
            fusion_id = record.fusion_id,
            distance_m = format!("{:.3}", record.range.distance),
            time_diff_ms = format!("{:.1}", record.time_diff_ms),
            quality = format!("{:.2}", record.quality_score),
            safety = %record.safety_level,
            environment = %record.environment,
            "Fused record"
        );
    }
}

/// Run a blocking coordinator call on the blocking pool
async fn blocking<T, F>(coordinator: &Arc<Coordinator>, f: F) -> Result<T>
where
    F: FnOnce(&Coordinator) -> T + Send + 'static,
    T: Send + 'static,
{
    let coordinator = Arc::clone(coordinator);
    tokio::task::spawn_blocking(move || f(&coordinator))
        .await
        .context("Coordinator task panicked")
}

/// Mock camera plus a mock or serial range finder
fn build_devices(serial: bool, mock_distance: f64) -> Result<DeviceSet, CliError> {
    let devices = DeviceSet::new().with_camera(MockCamera::new("mock-camera"));
    if serial {
        return with_serial_range(devices);
    }
    Ok(devices.with_range(MockRangeFinder::new("mock-range").with_base_distance(mock_distance)))
}

#[cfg(feature = "serial")]
fn with_serial_range(devices: DeviceSet) -> Result<DeviceSet, CliError> {
    Ok(devices.with_range(ingestion::SerialRangeFinder::new("serial-range")))
}

#[cfg(not(feature = "serial"))]
fn with_serial_range(_devices: DeviceSet) -> Result<DeviceSet, CliError> {
    Err(CliError::SerialUnavailable)
}
