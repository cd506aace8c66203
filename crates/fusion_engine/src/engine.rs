//! Fixed-cadence fusion loop

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use async_channel::Receiver;
use contracts::{
    now_secs, ComponentState, ComponentStatus, ContractError, DropPolicy, FrameSample,
    FusedCallback, FusedRecord, FusionConfig, RangeReading,
};
use ingestion::{
    lock_unpoisoned, LoopRuntime, Sample, SampleBuffer, SourceMetrics, StopOutcome, StopSignal,
    DEFAULT_STOP_TIMEOUT,
};
use metrics::{counter, histogram};
use tracing::{debug, error, instrument, trace};

use crate::classify::{assess_environment, categorize_distance, fusion_quality, safety_level};
use crate::fanout::Fanout;
use crate::history::FusionHistory;
use crate::stats::{FusionStats, FusionStatsSnapshot};

/// Tick thread name
pub const FUSION_THREAD: &str = "fusion-tick";

/// Buffers and counters the engine reads from
#[derive(Clone)]
pub struct FusionInputs {
    pub camera: Arc<SampleBuffer<FrameSample>>,
    pub range: Arc<SampleBuffer<RangeReading>>,
    pub camera_metrics: Arc<SourceMetrics>,
    pub range_metrics: Arc<SourceMetrics>,
}

impl FusionInputs {
    /// Fresh buffers and counters, for wiring sources after the engine
    pub fn detached() -> Self {
        Self {
            camera: Arc::new(SampleBuffer::new()),
            range: Arc::new(SampleBuffer::new()),
            camera_metrics: Arc::new(SourceMetrics::new()),
            range_metrics: Arc::new(SourceMetrics::new()),
        }
    }
}

/// Why a tick produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    CameraEmpty,
    RangeEmpty,
    BothEmpty,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CameraEmpty => "camera_empty",
            Self::RangeEmpty => "range_empty",
            Self::BothEmpty => "both_empty",
        }
    }
}

/// Result of one fusion tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// At least one buffer has never been published
    Skipped(SkipReason),
    /// Samples too far apart to fuse
    Unsynchronized { time_diff_ms: f64 },
    Emitted(FusedRecord),
}

impl TickOutcome {
    pub fn record(&self) -> Option<&FusedRecord> {
        match self {
            Self::Emitted(record) => Some(record),
            _ => None,
        }
    }
}

/// Fusion engine
///
/// 每个 tick：读取两个缓冲区的最新样本 → 时间对齐检查 → 构建 `FusedRecord`
/// → 写入 latest / history → 同步调用回调 → 分发给订阅者。
///
/// Callbacks run on the fusion thread; a slow callback delays the next
/// tick. A panicking callback is caught and counted.
pub struct FusionEngine {
    runtime: LoopRuntime,
    core: Arc<FusionCore>,
}

impl FusionEngine {
    pub const COMPONENT: &'static str = "fusion";

    pub fn new(config: FusionConfig, inputs: FusionInputs) -> Self {
        let runtime = LoopRuntime::new(Self::COMPONENT);
        runtime.set_state(ComponentState::Ready);

        Self {
            runtime,
            core: Arc::new(FusionCore {
                history: Mutex::new(FusionHistory::new(config.history_size)),
                config,
                inputs,
                latest: SampleBuffer::new(),
                callbacks: RwLock::new(Vec::new()),
                fanout: Fanout::new(),
                stats: FusionStats::default(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Launch the tick loop. No-op if already running.
    #[instrument(name = "fusion_start", skip(self), fields(tick_rate_hz = self.core.config.tick_rate_hz))]
    pub fn start(&self) -> Result<(), ContractError> {
        let core = self.core.clone();
        let interval = Duration::from_secs_f64(self.core.config.tick_interval_secs());
        self.runtime
            .launch(FUSION_THREAD, move |signal| core.run(&signal, interval))?;
        Ok(())
    }

    #[instrument(name = "fusion_stop", skip(self))]
    pub fn stop(&self, timeout: Duration) -> StopOutcome {
        self.runtime.halt(timeout)
    }

    /// Run one tick on the caller's thread
    pub fn tick(&self) -> TickOutcome {
        self.core.tick()
    }

    pub fn state(&self) -> ComponentState {
        self.runtime.state()
    }

    pub fn latest_fused(&self) -> Option<FusedRecord> {
        self.core.latest.latest_value()
    }

    /// Most recent `count` records, oldest first
    pub fn history(&self, count: usize) -> Vec<FusedRecord> {
        lock_unpoisoned(&self.core.history).recent(count)
    }

    /// Invoke `callback` synchronously for every emitted record
    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(&FusedRecord) + Send + Sync + 'static,
    {
        self.add_callback(Arc::new(callback));
    }

    pub fn add_callback(&self, callback: FusedCallback) {
        let mut callbacks = self
            .core
            .callbacks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        callbacks.push(callback);
        debug!(count = callbacks.len(), "fused callback registered");
    }

    /// Receive records over a bounded channel
    pub fn subscribe(&self, capacity: usize, policy: DropPolicy) -> Receiver<FusedRecord> {
        self.core.fanout.subscribe(capacity, policy)
    }

    pub fn stats(&self) -> FusionStatsSnapshot {
        self.core.stats.snapshot(self.core.fanout.dropped())
    }

    pub fn config(&self) -> &FusionConfig {
        &self.core.config
    }

    pub fn status(&self) -> ComponentStatus {
        let stats = self.stats();
        ComponentStatus {
            name: Self::COMPONENT.to_string(),
            state: self.state(),
            available: true,
            samples: stats.records,
            errors: stats.callback_panics,
            rate_hz: Some(self.core.config.tick_rate_hz),
            detail: Some(format!(
                "ticks={} skipped={} unsynchronized={}",
                stats.ticks, stats.skipped_missing, stats.unsynchronized
            )),
        }
    }
}

impl Drop for FusionEngine {
    fn drop(&mut self) {
        self.runtime.halt(DEFAULT_STOP_TIMEOUT);
    }
}

struct FusionCore {
    config: FusionConfig,
    inputs: FusionInputs,
    latest: SampleBuffer<FusedRecord>,
    history: Mutex<FusionHistory>,
    callbacks: RwLock<Vec<FusedCallback>>,
    fanout: Fanout,
    stats: FusionStats,
    next_id: AtomicU64,
}

impl FusionCore {
    fn run(&self, signal: &StopSignal, interval: Duration) {
        debug!(interval_ms = interval.as_millis() as u64, "fusion loop running");
        while !signal.is_triggered() {
            let started = Instant::now();
            self.tick();
            if signal.wait_timeout(interval.saturating_sub(started.elapsed())) {
                break;
            }
        }
        debug!("fusion loop exited");
    }

    fn tick(&self) -> TickOutcome {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        let (camera, range) = match (
            self.inputs.camera.read_latest(),
            self.inputs.range.read_latest(),
        ) {
            (Some(camera), Some(range)) => (camera, range),
            (None, None) => return self.skip(SkipReason::BothEmpty),
            (None, Some(_)) => return self.skip(SkipReason::CameraEmpty),
            (Some(_), None) => return self.skip(SkipReason::RangeEmpty),
        };

        let time_diff_ms = (camera.timestamp - range.timestamp).abs() * 1000.0;
        self.stats.set_last_time_diff_ms(time_diff_ms);
        histogram!("edge_fusion_time_diff_ms").record(time_diff_ms);

        if time_diff_ms > self.config.sync_tolerance_ms {
            self.stats.unsynchronized.fetch_add(1, Ordering::Relaxed);
            counter!("edge_fusion_ticks_skipped_total", "reason" => "unsynchronized").increment(1);
            debug!(
                time_diff_ms,
                tolerance_ms = self.config.sync_tolerance_ms,
                "samples not synchronized"
            );
            return TickOutcome::Unsynchronized { time_diff_ms };
        }

        let record = self.build_record(&camera, &range, time_diff_ms);
        self.emit(&record);
        TickOutcome::Emitted(record)
    }

    fn skip(&self, reason: SkipReason) -> TickOutcome {
        self.stats.skipped_missing.fetch_add(1, Ordering::Relaxed);
        counter!("edge_fusion_ticks_skipped_total", "reason" => reason.as_str()).increment(1);
        trace!(reason = reason.as_str(), "fusion tick skipped");
        TickOutcome::Skipped(reason)
    }

    fn build_record(
        &self,
        camera: &Sample<FrameSample>,
        range: &Sample<RangeReading>,
        time_diff_ms: f64,
    ) -> FusedRecord {
        let camera_metrics = &self.inputs.camera_metrics;
        let range_metrics = &self.inputs.range_metrics;
        let distance = range.value.distance;

        FusedRecord {
            timestamp: now_secs(),
            fusion_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            time_diff_ms,
            synchronized: true,
            frame_meta: camera.value.meta(),
            range: range.value,
            range_sequence: range.sequence,
            quality_score: fusion_quality(
                camera_metrics.is_active(),
                range_metrics.error_count(),
                range_metrics.sample_count(),
                time_diff_ms,
            ),
            distance_category: categorize_distance(distance),
            safety_level: safety_level(distance),
            environment: assess_environment(distance),
            camera_fps: camera_metrics.rate_hz(),
        }
    }

    fn emit(&self, record: &FusedRecord) {
        self.latest.publish_at(record.clone(), record.timestamp);
        lock_unpoisoned(&self.history).push(record.clone());
        self.stats.records.fetch_add(1, Ordering::Relaxed);

        counter!("edge_fusion_records_total").increment(1);
        histogram!("edge_fusion_quality_score").record(record.quality_score);
        trace!(
            fusion_id = record.fusion_id,
            distance = record.range.distance,
            safety = %record.safety_level,
            "fused record emitted"
        );

        self.invoke_callbacks(record);
        self.fanout.broadcast(record);
    }

    fn invoke_callbacks(&self, record: &FusedRecord) {
        let callbacks: Vec<FusedCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(record))).is_err() {
                self.stats.callback_panics.fetch_add(1, Ordering::Relaxed);
                error!(fusion_id = record.fusion_id, "fused callback panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{DistanceCategory, PixelFormat, SafetyLevel};
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    const T0: f64 = 1_700_000_000.0;

    fn frame() -> FrameSample {
        FrameSample {
            pixel_data: Bytes::from_static(&[0u8; 12]),
            width: 2,
            height: 2,
            format: PixelFormat::Bgr8,
            timestamp: T0,
            sequence_number: 1,
        }
    }

    fn reading(distance: f64) -> RangeReading {
        RangeReading {
            angle: 0.0,
            distance,
            quality: 255,
            timestamp: T0,
        }
    }

    fn engine_with(tolerance_ms: f64) -> (FusionEngine, FusionInputs) {
        let inputs = FusionInputs::detached();
        inputs.camera_metrics.set_active(true);
        let config = FusionConfig {
            sync_tolerance_ms: tolerance_ms,
            ..Default::default()
        };
        (FusionEngine::new(config, inputs.clone()), inputs)
    }

    #[test]
    fn test_skips_when_either_side_empty() {
        let (engine, inputs) = engine_with(100.0);
        assert_eq!(engine.tick(), TickOutcome::Skipped(SkipReason::BothEmpty));

        inputs.range.publish_at(reading(1.0), T0);
        assert_eq!(engine.tick(), TickOutcome::Skipped(SkipReason::CameraEmpty));
        assert!(engine.latest_fused().is_none());
        assert_eq!(engine.stats().skipped_missing, 2);
    }

    #[test]
    fn test_synchronized_pair_emits() {
        let (engine, inputs) = engine_with(100.0);
        inputs.camera.publish_at(frame(), T0);
        inputs.range.publish_at(reading(2.5), T0 + 0.050);

        let outcome = engine.tick();
        let record = outcome.record().expect("record emitted");
        assert!((record.time_diff_ms - 50.0).abs() < 1e-3);
        assert!(record.synchronized);
        assert_eq!(record.distance_category, DistanceCategory::Medium);
        assert_eq!(record.safety_level, SafetyLevel::Safe);
        assert_eq!(record.frame_meta.byte_len, 12);
        assert_eq!(record.range_sequence, 1);
        // 相机在线、无误差、50ms → 0.5
        assert!((record.quality_score - 0.5).abs() < 1e-3);

        assert_eq!(engine.latest_fused().as_ref(), Some(record));
    }

    #[test]
    fn test_tight_tolerance_skips() {
        let (engine, inputs) = engine_with(10.0);
        inputs.camera.publish_at(frame(), T0);
        inputs.range.publish_at(reading(2.5), T0 + 0.050);

        match engine.tick() {
            TickOutcome::Unsynchronized { time_diff_ms } => {
                assert!((time_diff_ms - 50.0).abs() < 1e-3)
            }
            other => panic!("expected unsynchronized, got {other:?}"),
        }
        assert!(engine.latest_fused().is_none());
        assert_eq!(engine.stats().unsynchronized, 1);
        assert!(engine.history(10).is_empty());
    }

    #[test]
    fn test_inactive_camera_halves_quality() {
        let (engine, inputs) = engine_with(100.0);
        inputs.camera_metrics.set_active(false);
        inputs.camera.publish_at(frame(), T0);
        inputs.range.publish_at(reading(2.5), T0);
        let record = engine.tick().record().cloned().unwrap();
        assert!((record.quality_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_history_and_ids() {
        let (engine, inputs) = engine_with(100.0);
        inputs.camera.publish_at(frame(), T0);
        inputs.range.publish_at(reading(0.2), T0);
        for _ in 0..3 {
            engine.tick();
        }
        let ids: Vec<u64> = engine.history(10).iter().map(|r| r.fusion_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(engine.history(1)[0].safety_level, SafetyLevel::Critical);
    }

    #[test]
    fn test_callback_invoked_and_panics_contained() {
        let (engine, inputs) = engine_with(100.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        engine.register_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        engine.register_callback(|_| panic!("consumer bug"));

        inputs.camera.publish_at(frame(), T0);
        inputs.range.publish_at(reading(1.0), T0);
        engine.tick();
        engine.tick();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.stats().callback_panics, 2);
        assert_eq!(engine.stats().records, 2);
    }

    #[test]
    fn test_loop_runs_and_stops() {
        let inputs = FusionInputs::detached();
        let config = FusionConfig {
            tick_rate_hz: 200.0,
            ..Default::default()
        };
        let engine = FusionEngine::new(config, inputs.clone());
        inputs.camera.publish(frame());
        inputs.range.publish(reading(1.0));

        engine.start().unwrap();
        engine.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.stats().records < 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(engine.stats().records >= 5);

        assert_eq!(engine.stop(Duration::from_secs(2)), StopOutcome::Joined);
        assert_eq!(engine.stop(Duration::from_secs(2)), StopOutcome::NotRunning);
        assert_eq!(engine.state(), ComponentState::Stopped);
    }

    #[tokio::test]
    async fn test_subscriber_receives_records() {
        let (engine, inputs) = engine_with(100.0);
        let rx = engine.subscribe(4, DropPolicy::DropOldest);
        inputs.camera.publish_at(frame(), T0);
        inputs.range.publish_at(reading(4.0), T0);
        engine.tick();
        let record = rx.recv().await.unwrap();
        assert_eq!(record.distance_category, DistanceCategory::Far);
    }
}
