//! Pipeline statistics and metrics.

use std::time::Duration;

use contracts::CoordinatorStatus;
use fusion_engine::FusionStatsSnapshot;
use observability::FusionMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Fused records received over the subscription channel
    pub records_received: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Whether the run ended on Ctrl+C / SIGTERM
    pub interrupted: bool,

    /// Whether the run ended on the timeout
    pub timed_out: bool,

    /// Components that did not stop within the stop timeout
    pub stop_timeouts: Vec<String>,

    /// Engine counters at the end of the run
    pub fusion: FusionStatsSnapshot,

    /// Component status at the end of the run
    pub status: Option<CoordinatorStatus>,

    /// Aggregated record metrics
    pub record_metrics: FusionMetricsAggregator,
}

impl PipelineStats {
    /// Fused records per second
    pub fn records_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.records_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let ending = if self.interrupted {
            "interrupted"
        } else if self.timed_out {
            "timed out"
        } else {
            "completed"
        };

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s ({})", self.duration.as_secs_f64(), ending);
        println!("   ├─ Records received: {}", self.records_received);
        println!("   ├─ Records/s: {:.2}", self.records_per_sec());
        if self.stop_timeouts.is_empty() {
            println!("   └─ Stop: all components joined");
        } else {
            println!("   └─ Stop: timed out for {}", self.stop_timeouts.join(", "));
        }

        println!("\n📈 Fusion Engine");
        println!("   ├─ Ticks: {}", self.fusion.ticks);
        println!(
            "   ├─ Records emitted: {} ({:.1}% of ticks)",
            self.fusion.records,
            self.fusion.fusion_rate() * 100.0
        );
        println!("   ├─ Skipped (missing data): {}", self.fusion.skipped_missing);
        println!("   ├─ Unsynchronized: {}", self.fusion.unsynchronized);
        println!("   ├─ Callback panics: {}", self.fusion.callback_panics);
        println!("   └─ Subscriber drops: {}", self.fusion.subscriber_drops);

        if let Some(status) = &self.status {
            println!("\n🔌 Components");
            let count = status.components.len();
            for (i, component) in status.components.values().enumerate() {
                let prefix = if i + 1 == count { "└─" } else { "├─" };
                let rate = component
                    .rate_hz
                    .map(|r| format!(", {:.1} Hz", r))
                    .unwrap_or_default();
                println!(
                    "   {} {}: {:?}, samples={}, errors={}{}",
                    prefix, component.name, component.state, component.samples, component.errors, rate
                );
            }
        }

        println!("\n{}", self.record_metrics.summary());
    }
}
