//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::EdgeConfig;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    camera: CameraInfo,
    range_finder: RangeInfo,
    fusion: FusionInfo,
    stop_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
}

#[derive(Serialize)]
struct CameraInfo {
    enabled: bool,
    device_id: u32,
    resolution: String,
    fps: f64,
    frame_interval_ms: f64,
}

#[derive(Serialize)]
struct RangeInfo {
    enabled: bool,
    port: String,
    baudrate: u32,
    range_m: [f64; 2],
    read_interval_ms: u64,
    filter_outliers: bool,
    moving_average_window: usize,
}

#[derive(Serialize)]
struct FusionInfo {
    tick_rate_hz: f64,
    tick_interval_ms: f64,
    sync_tolerance_ms: f64,
    history_size: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn build_config_info(config: &EdgeConfig) -> ConfigInfo {
    let camera = &config.camera;
    let range = &config.range_finder;
    let fusion = &config.fusion;

    ConfigInfo {
        version: format!("{:?}", config.version),
        camera: CameraInfo {
            enabled: camera.enabled,
            device_id: camera.device_id,
            resolution: format!("{}x{}", camera.width, camera.height),
            fps: camera.fps,
            frame_interval_ms: camera.frame_interval_secs() * 1000.0,
        },
        range_finder: RangeInfo {
            enabled: range.enabled,
            port: range.port.clone(),
            baudrate: range.baudrate,
            range_m: [range.min_distance, range.max_distance],
            read_interval_ms: range.read_interval_ms,
            filter_outliers: range.filter_outliers,
            moving_average_window: fusion.moving_average_window,
        },
        fusion: FusionInfo {
            tick_rate_hz: fusion.tick_rate_hz,
            tick_interval_ms: fusion.tick_interval_secs() * 1000.0,
            sync_tolerance_ms: fusion.sync_tolerance_ms,
            history_size: fusion.history_size,
        },
        stop_timeout_ms: config.lifecycle.stop_timeout_ms,
        metrics_port: (config.observability.metrics_port != 0)
            .then_some(config.observability.metrics_port),
    }
}

fn print_config_info(config: &EdgeConfig) {
    let info = build_config_info(config);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Edge Fusion Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📷 Camera");
    if info.camera.enabled {
        println!("   ├─ Device: {}", info.camera.device_id);
        println!("   ├─ Resolution: {}", info.camera.resolution);
        println!(
            "   └─ Frame rate: {} fps ({:.1} ms)",
            info.camera.fps, info.camera.frame_interval_ms
        );
    } else {
        println!("   └─ disabled");
    }

    println!("\n📏 Range Finder");
    if info.range_finder.enabled {
        println!(
            "   ├─ Port: {} @ {} baud",
            info.range_finder.port, info.range_finder.baudrate
        );
        println!(
            "   ├─ Range: {:.2} - {:.2} m",
            info.range_finder.range_m[0], info.range_finder.range_m[1]
        );
        println!("   ├─ Read interval: {} ms", info.range_finder.read_interval_ms);
        if info.range_finder.filter_outliers {
            println!(
                "   └─ Outlier filter: 2σ over last {} readings",
                info.range_finder.moving_average_window
            );
        } else {
            println!("   └─ Outlier filter: off");
        }
    } else {
        println!("   └─ disabled");
    }

    println!("\n⚙️  Fusion");
    println!(
        "   ├─ Tick rate: {} Hz ({:.1} ms)",
        info.fusion.tick_rate_hz, info.fusion.tick_interval_ms
    );
    println!("   ├─ Sync tolerance: {} ms", info.fusion.sync_tolerance_ms);
    println!("   └─ History size: {}", info.fusion.history_size);

    println!("\n🔧 Runtime");
    println!("   ├─ Stop timeout: {} ms", info.stop_timeout_ms);
    match info.metrics_port {
        Some(port) => println!("   └─ Metrics: 0.0.0.0:{}", port),
        None => println!("   └─ Metrics: disabled"),
    }

    println!();
}
