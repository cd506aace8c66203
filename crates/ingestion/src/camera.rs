//! Camera source: owns one camera handle and its capture loop.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use contracts::{
    now_secs, CameraConfig, CameraDevice, ComponentState, ComponentStatus, ContractError,
    FrameSample,
};
use metrics::{counter, gauge};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::buffer::SampleBuffer;
use crate::error::IngestionError;
use crate::metrics::SourceMetrics;
use crate::rate::RateTracker;
use crate::runtime::LoopRuntime;
use crate::slot::DeviceSlot;
use crate::sync::{lock_unpoisoned, StopSignal};
use crate::worker::StopOutcome;
use crate::DEFAULT_STOP_TIMEOUT;

/// Capture thread name
pub const CAMERA_THREAD: &str = "camera-capture";

/// Camera source
///
/// `initialize` opens the handle and performs a warm-up capture, `start`
/// launches the capture loop which publishes every frame into the shared
/// [`SampleBuffer`]. Transient read failures are counted and logged; the
/// loop keeps going at the configured frame interval.
pub struct CameraSource {
    config: CameraConfig,
    runtime: LoopRuntime,
    slot: Arc<DeviceSlot<Box<dyn CameraDevice>>>,
    buffer: Arc<SampleBuffer<FrameSample>>,
    metrics: Arc<SourceMetrics>,
    init_error: Mutex<Option<String>>,
}

impl CameraSource {
    pub const COMPONENT: &'static str = "camera";

    pub fn new(config: CameraConfig, device: Box<dyn CameraDevice>) -> Self {
        Self::with_buffer(config, device, Arc::new(SampleBuffer::new()))
    }

    /// Create with an externally owned buffer
    pub fn with_buffer(
        config: CameraConfig,
        device: Box<dyn CameraDevice>,
        buffer: Arc<SampleBuffer<FrameSample>>,
    ) -> Self {
        Self {
            config,
            runtime: LoopRuntime::new(Self::COMPONENT),
            slot: Arc::new(DeviceSlot::new(device)),
            buffer,
            metrics: Arc::new(SourceMetrics::new()),
            init_error: Mutex::new(None),
        }
    }

    /// Open the camera and confirm it delivers a frame.
    ///
    /// # Errors
    /// `ContractError::DeviceOpen` if the handle cannot be opened or the
    /// warm-up capture yields nothing. The source is then `Failed`.
    #[instrument(name = "camera_initialize", skip(self), fields(device_id = self.config.device_id))]
    pub fn initialize(&self) -> Result<(), ContractError> {
        self.runtime.begin_initialize()?;

        match self.open_and_warm_up() {
            Ok(()) => {
                *lock_unpoisoned(&self.init_error) = None;
                self.metrics.set_active(true);
                self.runtime.set_state(ComponentState::Ready);
                info!(
                    width = self.config.width,
                    height = self.config.height,
                    fps = self.config.fps,
                    "camera initialized"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "camera initialization failed");
                self.slot.release();
                *lock_unpoisoned(&self.init_error) = Some(e.to_string());
                self.metrics.set_active(false);
                self.runtime.set_state(ComponentState::Failed);
                Err(e)
            }
        }
    }

    fn open_and_warm_up(&self) -> Result<(), ContractError> {
        let warmup = self.config.warmup;
        let result = self.slot.with(|device| {
            device.open(&self.config)?;
            if !warmup {
                return Ok(());
            }
            match device.read_frame() {
                Ok(Some(_)) => Ok(()),
                Ok(None) => Err(ContractError::device_open(
                    device.name(),
                    "warm-up capture returned no data",
                )),
                Err(e) => Err(ContractError::device_open(
                    device.name(),
                    format!("warm-up capture failed: {e}"),
                )),
            }
        });

        result.unwrap_or_else(|| {
            Err(IngestionError::Released {
                component: Self::COMPONENT.to_string(),
            }
            .into())
        })
    }

    /// Launch the capture loop. No-op if already running.
    ///
    /// # Errors
    /// `ContractError::Lifecycle` before a successful `initialize` or after
    /// `release`.
    #[instrument(name = "camera_start", skip(self))]
    pub fn start(&self) -> Result<(), ContractError> {
        if self.slot.is_released() {
            return Err(IngestionError::Released {
                component: Self::COMPONENT.to_string(),
            }
            .into());
        }

        let capture = CaptureLoop {
            slot: self.slot.clone(),
            buffer: self.buffer.clone(),
            metrics: self.metrics.clone(),
            interval: Duration::from_secs_f64(self.config.frame_interval_secs()),
        };
        self.runtime
            .launch(CAMERA_THREAD, move |signal| capture.run(&signal))?;
        Ok(())
    }

    /// Signal the loop and wait up to `timeout` for it to exit
    #[instrument(name = "camera_stop", skip(self))]
    pub fn stop(&self, timeout: Duration) -> StopOutcome {
        self.runtime.halt(timeout)
    }

    /// Stop (if running) and close the device handle. Idempotent.
    pub fn release(&self) {
        self.stop(DEFAULT_STOP_TIMEOUT);
        if !self.slot.is_released() {
            self.slot.release();
            self.metrics.set_active(false);
            info!("camera released");
        }
    }

    pub fn state(&self) -> ComponentState {
        self.runtime.state()
    }

    /// Whether `initialize` succeeded
    pub fn is_available(&self) -> bool {
        self.metrics.is_active()
    }

    /// Copy of the most recent frame
    pub fn latest_frame(&self) -> Option<FrameSample> {
        self.buffer.latest_value()
    }

    pub fn buffer(&self) -> Arc<SampleBuffer<FrameSample>> {
        self.buffer.clone()
    }

    pub fn metrics(&self) -> Arc<SourceMetrics> {
        self.metrics.clone()
    }

    /// Realized capture rate over the last 30 frames
    pub fn realized_fps(&self) -> f64 {
        self.metrics.rate_hz()
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn status(&self) -> ComponentStatus {
        let snapshot = self.metrics.snapshot();
        ComponentStatus {
            name: Self::COMPONENT.to_string(),
            state: self.state(),
            available: snapshot.active,
            samples: snapshot.samples,
            errors: snapshot.error_count(),
            rate_hz: Some(snapshot.rate_hz),
            detail: lock_unpoisoned(&self.init_error).clone(),
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

struct CaptureLoop {
    slot: Arc<DeviceSlot<Box<dyn CameraDevice>>>,
    buffer: Arc<SampleBuffer<FrameSample>>,
    metrics: Arc<SourceMetrics>,
    interval: Duration,
}

impl CaptureLoop {
    fn run(self, signal: &StopSignal) {
        let mut sequence = self.buffer.sequence();
        let mut rate = RateTracker::new();
        debug!(interval_ms = self.interval.as_millis() as u64, "capture loop running");

        while !signal.is_triggered() {
            let started = Instant::now();

            let read = self.slot.with(|device| device.read_frame());
            // A halt may have detached this loop while it was blocked in the read
            if signal.is_triggered() {
                break;
            }
            match read {
                None => break,
                Some(Ok(Some(raw))) => {
                    sequence += 1;
                    let timestamp = now_secs();
                    let frame = FrameSample {
                        pixel_data: raw.data,
                        width: raw.width,
                        height: raw.height,
                        format: raw.format,
                        timestamp,
                        sequence_number: sequence,
                    };
                    self.buffer.publish_at(frame, timestamp);
                    self.metrics.record_sample();

                    rate.record(Instant::now());
                    let fps = rate.rate_hz();
                    self.metrics.set_rate_hz(fps);

                    counter!("edge_fusion_samples_total", "source" => "camera").increment(1);
                    gauge!("edge_fusion_camera_fps").set(fps);
                    trace!(sequence, "frame published");
                }
                Some(Ok(None)) => {
                    self.metrics.record_read_error();
                    counter!("edge_fusion_read_errors_total", "source" => "camera").increment(1);
                    debug!("camera returned no frame");
                }
                Some(Err(e)) => {
                    self.metrics.record_read_error();
                    counter!("edge_fusion_read_errors_total", "source" => "camera").increment(1);
                    warn!(error = %e, "camera read failed");
                }
            }

            if signal.wait_timeout(self.interval.saturating_sub(started.elapsed())) {
                break;
            }
        }

        self.slot.finish();
        debug!(frames = sequence, "capture loop exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCamera, MockFaults};
    use std::thread;

    fn fast_config() -> CameraConfig {
        CameraConfig {
            width: 8,
            height: 4,
            fps: 200.0,
            ..Default::default()
        }
    }

    fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_initialize_start_publish_stop() {
        let camera = MockCamera::new("cam");
        let probe = camera.probe();
        let source = CameraSource::new(fast_config(), Box::new(camera));

        assert_eq!(source.state(), ComponentState::Uninitialized);
        source.initialize().unwrap();
        assert_eq!(source.state(), ComponentState::Ready);
        assert!(source.latest_frame().is_none());

        source.start().unwrap();
        assert!(wait_for(|| source.buffer().sequence() >= 5));

        let frame = source.latest_frame().unwrap();
        assert_eq!(frame.width, 8);
        assert_eq!(frame.pixel_data.len(), 8 * 4 * 3);
        assert!(frame.sequence_number >= 5);

        assert_eq!(source.stop(Duration::from_secs(2)), StopOutcome::Joined);
        assert_eq!(source.state(), ComponentState::Stopped);
        assert!(probe.is_open());

        source.release();
        source.release();
        assert_eq!(probe.releases(), 1);
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let source = CameraSource::new(fast_config(), Box::new(MockCamera::new("cam")));
        source.initialize().unwrap();
        source.start().unwrap();

        let mut last = 0;
        for _ in 0..5 {
            assert!(wait_for(|| source.buffer().sequence() > last));
            let frame = source.latest_frame().unwrap();
            assert!(frame.sequence_number > last);
            last = frame.sequence_number;
        }
        source.release();
    }

    #[test]
    fn test_open_failure_marks_failed() {
        let source = CameraSource::new(fast_config(), Box::new(MockCamera::failing("cam")));
        let err = source.initialize().unwrap_err();
        assert!(matches!(err, ContractError::DeviceOpen { .. }));
        assert_eq!(source.state(), ComponentState::Failed);
        assert!(!source.is_available());
        assert!(source.status().detail.is_some());

        // start on a failed source is a lifecycle error, release a no-op
        assert!(matches!(source.start(), Err(ContractError::Lifecycle { .. })));
        source.release();
    }

    #[test]
    fn test_warmup_without_data_fails() {
        let camera = MockCamera::new("cam").with_faults(MockFaults {
            no_data: true,
            ..Default::default()
        });
        let probe = camera.probe();
        let source = CameraSource::new(fast_config(), Box::new(camera));
        assert!(matches!(
            source.initialize(),
            Err(ContractError::DeviceOpen { .. })
        ));
        assert!(!probe.is_open());
        assert_eq!(probe.releases(), 1);

        // The handle is gone for good; later release calls never reach it
        assert!(source.slot.is_released());
        assert!(source.slot.with(|_| ()).is_none());
        source.release();
        assert_eq!(probe.releases(), 1);
    }

    #[test]
    fn test_transient_failures_do_not_kill_loop() {
        let camera = MockCamera::new("cam").with_faults(MockFaults {
            fail_every: Some(2),
            ..Default::default()
        });
        let source = CameraSource::new(fast_config(), Box::new(camera));
        source.initialize().unwrap();
        source.start().unwrap();

        assert!(wait_for(|| source.metrics().snapshot().read_errors >= 3));
        let published = source.buffer().sequence();
        assert!(wait_for(|| source.buffer().sequence() > published));
        assert!(source.state().is_running());
        source.release();
    }

    #[test]
    fn test_restart_after_timed_out_stop_keeps_single_writer() {
        let camera = MockCamera::new("cam").with_faults(MockFaults {
            read_delay: Duration::from_millis(100),
            ..Default::default()
        });
        let source = CameraSource::new(fast_config(), Box::new(camera));
        source.initialize().unwrap();
        source.start().unwrap();
        assert!(wait_for(|| source.buffer().sequence() >= 1));

        // The loop is blocked in its slow read, so the short stop detaches it
        assert_eq!(source.stop(Duration::from_millis(10)), StopOutcome::TimedOut);
        source.start().unwrap();

        let restarted_at = source.buffer().sequence();
        assert!(wait_for(|| source.buffer().sequence() >= restarted_at + 5));
        for _ in 0..5 {
            let sample = source.buffer().read_latest().unwrap();
            assert_eq!(sample.value.sequence_number, sample.sequence);
            thread::sleep(Duration::from_millis(50));
        }
        source.release();
    }

    #[test]
    fn test_start_twice_is_noop() {
        let source = CameraSource::new(fast_config(), Box::new(MockCamera::new("cam")));
        source.initialize().unwrap();
        source.start().unwrap();
        source.start().unwrap();
        assert!(source.state().is_running());
        source.release();
        assert!(matches!(source.start(), Err(ContractError::Lifecycle { .. })));
    }

    #[test]
    fn test_realized_fps_tracks_rate() {
        let config = CameraConfig {
            fps: 50.0,
            ..fast_config()
        };
        let source = CameraSource::new(config, Box::new(MockCamera::new("cam")));
        source.initialize().unwrap();
        source.start().unwrap();
        assert!(wait_for(|| source.buffer().sequence() >= 10));
        let fps = source.realized_fps();
        assert!(fps > 10.0 && fps < 80.0, "fps = {fps}");
        source.release();
    }
}
