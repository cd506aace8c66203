//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::EdgeConfig;
use std::time::Duration;
use tracing::{info, warn};

use super::load_config;
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            load_config(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            info!("No configuration file given, using built-in defaults");
            EdgeConfig::default()
        }
    };

    apply_overrides(&mut config, args);
    config_loader::ConfigLoader::validate(&config)
        .context("Configuration invalid after applying CLI overrides")?;

    info!(
        camera = config.camera.enabled,
        range_finder = config.range_finder.enabled,
        fps = config.camera.fps,
        tick_rate_hz = config.fusion.tick_rate_hz,
        sync_tolerance_ms = config.fusion.sync_tolerance_ms,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config, args);
        return Ok(());
    }

    let metrics_port = args
        .metrics_port
        .unwrap_or(config.observability.metrics_port);

    let pipeline_config = PipelineConfig {
        edge: config,
        serial: args.serial,
        mock_distance: args.mock_distance,
        max_records: (args.max_records != 0).then_some(args.max_records),
        timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (metrics_port != 0).then_some(metrics_port),
    };

    let pipeline = Pipeline::new(pipeline_config);

    info!("Starting pipeline...");

    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        records = stats.records_received,
        duration_secs = stats.duration.as_secs_f64(),
        records_per_sec = format!("{:.2}", stats.records_per_sec()),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("Edge Fusion finished");
    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_overrides(config: &mut EdgeConfig, args: &RunArgs) {
    if let Some(ref port) = args.port {
        info!(port = %port, "Overriding range finder port from CLI");
        config.range_finder.port = port.clone();
    }
    if let Some(fps) = args.fps {
        info!(fps, "Overriding camera fps from CLI");
        config.camera.fps = fps;
    }
    if let Some(tick_rate) = args.tick_rate {
        info!(tick_rate, "Overriding fusion tick rate from CLI");
        config.fusion.tick_rate_hz = tick_rate;
    }
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &EdgeConfig, args: &RunArgs) {
    println!("\n=== Configuration Summary ===\n");
    println!("Camera:");
    if config.camera.enabled {
        println!(
            "  Device {} @ {}x{}, {} fps (mock)",
            config.camera.device_id, config.camera.width, config.camera.height, config.camera.fps
        );
    } else {
        println!("  disabled");
    }

    println!("\nRange finder:");
    if config.range_finder.enabled {
        let device = if args.serial { "serial" } else { "mock" };
        println!(
            "  {} @ {} baud ({})",
            config.range_finder.port, config.range_finder.baudrate, device
        );
        println!(
            "  Range: {:.2} - {:.2} m, outlier filter: {}",
            config.range_finder.min_distance,
            config.range_finder.max_distance,
            config.range_finder.filter_outliers
        );
    } else {
        println!("  disabled");
    }

    println!("\nFusion:");
    println!("  Tick rate: {} Hz", config.fusion.tick_rate_hz);
    println!("  Sync tolerance: {} ms", config.fusion.sync_tolerance_ms);
    println!("  History size: {}", config.fusion.history_size);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["edge-fusion", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Run(args) => args,
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = EdgeConfig::default();
        let args = run_args(&["--port", "/dev/ttyS3", "--fps", "15", "--tick-rate", "5"]);

        apply_overrides(&mut config, &args);

        assert_eq!(config.range_finder.port, "/dev/ttyS3");
        assert_eq!(config.camera.fps, 15.0);
        assert_eq!(config.fusion.tick_rate_hz, 5.0);
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let mut config = EdgeConfig::default();
        let args = run_args(&["--fps", "0"]);

        apply_overrides(&mut config, &args);

        assert!(config_loader::ConfigLoader::validate(&config).is_err());
    }

    #[tokio::test]
    async fn test_dry_run_with_defaults() {
        let args = run_args(&["--dry-run"]);
        run_pipeline(&args).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let args = run_args(&["--config", "/nonexistent/edge.toml"]);
        let err = run_pipeline(&args).await.unwrap_err();
        assert!(format!("{:#}", err).contains("not found"));
    }
}
