//! Serial Fusion Demo
//!
//! Mock camera plus a real laser range finder on a serial port.
//! Runs until Ctrl+C.
//!
//! Run with: cargo run -p demos --bin serial_fusion --features serial -- /dev/ttyUSB0 [baudrate]

use std::time::Duration;

use contracts::EdgeConfig;
use coordinator::{Coordinator, DeviceSet};
use ingestion::{MockCamera, SerialRangeFinder};
use observability::ObservabilityConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EdgeConfig::default();
    observability::init(&ObservabilityConfig::from_settings(&config.observability))?;

    if let Some(port) = std::env::args().nth(1) {
        config.range_finder.port = port;
    }
    if let Some(baudrate) = std::env::args().nth(2) {
        config.range_finder.baudrate = baudrate.parse()?;
    }
    config_loader::ConfigLoader::validate(&config)?;

    tracing::info!(
        port = %config.range_finder.port,
        baudrate = config.range_finder.baudrate,
        "Starting Serial Fusion Demo"
    );

    let devices = DeviceSet::new()
        .with_camera(MockCamera::new("mock-camera"))
        .with_range(SerialRangeFinder::new("laser"));
    let coordinator = Coordinator::new(config, devices);

    coordinator.register_callback(observability::record_fused_record);
    coordinator.initialize()?;
    if !coordinator.range_available() {
        tracing::warn!("Range finder unavailable - no fused records will be produced");
    }
    coordinator.start()?;

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if let Some(reading) = coordinator.latest_reading() {
                    tracing::info!(
                        distance_m = format!("{:.3}", reading.distance),
                        quality = reading.quality,
                        "Latest reading"
                    );
                }
                observability::record_coordinator_status(&coordinator.status());
            }
        }
    }

    tracing::info!("Shutting down");
    coordinator.shutdown();
    Ok(())
}
