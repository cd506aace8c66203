//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::EdgeConfig;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    camera_enabled: bool,
    range_finder_enabled: bool,
    fps: f64,
    port: String,
    tick_rate_hz: f64,
    sync_tolerance_ms: f64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_config(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    camera_enabled: config.camera.enabled,
                    range_finder_enabled: config.range_finder.enabled,
                    fps: config.camera.fps,
                    port: config.range_finder.port.clone(),
                    tick_rate_hz: config.fusion.tick_rate_hz,
                    sync_tolerance_ms: config.fusion.sync_tolerance_ms,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &EdgeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.camera.enabled {
        warnings.push("camera disabled - fusion will skip every tick".to_string());
    }
    if !config.range_finder.enabled {
        warnings.push("range_finder disabled - fusion will skip every tick".to_string());
    }
    if config.range_finder.enabled && !config.range_finder.filter_outliers {
        warnings.push("range_finder.filter_outliers is off - only range limits apply".to_string());
    }

    if config.camera.enabled && config.fusion.tick_rate_hz > config.camera.fps {
        warnings.push(format!(
            "fusion.tick_rate_hz ({}) exceeds camera.fps ({}) - consecutive records will repeat frames",
            config.fusion.tick_rate_hz, config.camera.fps
        ));
    }

    let range_interval_ms = config.range_finder.read_interval_ms as f64;
    if config.range_finder.enabled && range_interval_ms > config.fusion.sync_tolerance_ms {
        warnings.push(format!(
            "range_finder.read_interval_ms ({}) exceeds fusion.sync_tolerance_ms ({}) - some ticks will be unsynchronized",
            config.range_finder.read_interval_ms, config.fusion.sync_tolerance_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Camera: {}",
                if summary.camera_enabled {
                    format!("enabled, {} fps", summary.fps)
                } else {
                    "disabled".to_string()
                }
            );
            println!(
                "  Range finder: {}",
                if summary.range_finder_enabled {
                    format!("enabled, {}", summary.port)
                } else {
                    "disabled".to_string()
                }
            );
            println!(
                "  Fusion: {} Hz, tolerance {} ms",
                summary.tick_rate_hz, summary.sync_tolerance_ms
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
