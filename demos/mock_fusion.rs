//! Mock Fusion Demo
//!
//! Drives the coordinator with mock devices: a healthy camera and a range
//! finder that fails every 7th query, so the quality score reflects the
//! error rate. No hardware required.
//!
//! Run with: cargo run -p demos --bin mock_fusion [config.toml]

use std::time::Duration;

use config_loader::ConfigLoader;
use contracts::{DropPolicy, EdgeConfig};
use coordinator::{Coordinator, DeviceSet};
use ingestion::{MockCamera, MockFaults, MockRangeFinder};
use observability::{FusionMetricsAggregator, LogFormat, ObservabilityConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init(&ObservabilityConfig {
        log_format: LogFormat::Compact,
        ..Default::default()
    })?;

    tracing::info!("Starting Mock Fusion Demo");

    // ==== Stage 1: Use default config or load from file ====
    let config = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        demo_config()
    };

    // ==== Stage 2: Devices ====
    let devices = DeviceSet::new()
        .with_camera(MockCamera::new("mock-camera"))
        .with_range(
            MockRangeFinder::new("mock-range")
                .with_base_distance(1.2)
                .with_faults(MockFaults {
                    fail_every: Some(7),
                    ..Default::default()
                }),
        );
    let coordinator = Coordinator::new(config, devices);

    // ==== Stage 3: Consumers ====
    coordinator.register_callback(|record| {
        tracing::info!(
            fusion_id = record.fusion_id,
            distance_m = format!("{:.3}", record.range.distance),
            time_diff_ms = format!("{:.1}", record.time_diff_ms),
            quality = format!("{:.2}", record.quality_score),
            category = %record.distance_category,
            safety = %record.safety_level,
            environment = %record.environment,
            "Fused record"
        );
    });
    let rx = coordinator.subscribe(32, DropPolicy::DropOldest);

    // ==== Stage 4: Run ====
    coordinator.initialize()?;
    coordinator.start()?;
    if !coordinator.wait_for_data(Duration::from_secs(5)) {
        tracing::warn!("Sources slow to produce data");
    }

    let target_records = 20u64;
    let mut aggregator = FusionMetricsAggregator::new();

    let result = tokio::time::timeout(Duration::from_secs(30), async {
        while aggregator.total_records < target_records {
            match rx.recv().await {
                Ok(record) => aggregator.update(&record),
                Err(_) => break,
            }
        }
    })
    .await;

    // ==== Stage 5: Report and cleanup ====
    let report = coordinator.stop();
    tracing::info!(report = ?report, "Coordinator stopped");

    if result.is_err() {
        tracing::warn!("Demo timed out");
    }

    println!("{}", serde_json::to_string_pretty(&coordinator.status())?);
    println!("{}", serde_json::to_string_pretty(&coordinator.fusion_stats())?);
    println!("{}", aggregator.summary());

    coordinator.shutdown();
    Ok(())
}

fn demo_config() -> EdgeConfig {
    let mut config = EdgeConfig::default();
    config.camera.width = 320;
    config.camera.height = 240;
    config.range_finder.read_interval_ms = 50;
    config.fusion.tick_rate_hz = 5.0;
    config.observability.metrics_port = 0;
    config
}
