//! Coordinator: lifecycle owner of both sources and the fusion engine

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use async_channel::Receiver;
use contracts::{
    ComponentStatus, ContractError, CoordinatorState, CoordinatorStatus, DropPolicy, EdgeConfig,
    FrameSample, FusedRecord, RangeReading,
};
use fusion_engine::{FusionEngine, FusionInputs, FusionStatsSnapshot};
use ingestion::{
    lock_unpoisoned, CameraSource, RangeSource, SampleBuffer, SourceMetrics, StopOutcome,
};
use tracing::{error, info, instrument, warn};

use crate::devices::DeviceSet;

const COMPONENT: &str = "coordinator";

/// Poll interval of [`Coordinator::wait_for_data`]
const DATA_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Per-component outcome of a `stop`, in stop order
pub type StopReport = Vec<(&'static str, StopOutcome)>;

/// 生命周期管理器
///
/// 状态：`Created → Initialized → Running → Stopped`。
/// 启动顺序：缓冲区（构造时）→ 相机 → 测距仪 → 融合引擎；
/// 停止顺序相反，每个组件各自有界等待。
///
/// A source that fails to initialize is left out; fusion then runs in
/// degraded mode and skips every tick.
pub struct Coordinator {
    config: EdgeConfig,
    state: Mutex<CoordinatorState>,
    /// Serializes lifecycle operations
    lifecycle: Mutex<bool>,
    camera: Option<CameraSource>,
    range: Option<RangeSource>,
    fusion: FusionEngine,
    camera_buffer: Arc<SampleBuffer<FrameSample>>,
    range_buffer: Arc<SampleBuffer<RangeReading>>,
    stop_timeout: Duration,
}

impl Coordinator {
    /// Build buffers, sources and the engine. Nothing is opened yet.
    pub fn new(config: EdgeConfig, devices: DeviceSet) -> Self {
        let camera_buffer = Arc::new(SampleBuffer::new());
        let range_buffer = Arc::new(SampleBuffer::new());

        let camera = match (config.camera.enabled, devices.camera) {
            (true, Some(device)) => Some(CameraSource::with_buffer(
                config.camera.clone(),
                device,
                camera_buffer.clone(),
            )),
            (true, None) => {
                warn!("camera enabled but no device supplied");
                None
            }
            (false, _) => None,
        };

        let range = match (config.range_finder.enabled, devices.range) {
            (true, Some(device)) => Some(RangeSource::with_buffer(
                config.range_finder.clone(),
                config.fusion.moving_average_window,
                device,
                range_buffer.clone(),
            )),
            (true, None) => {
                warn!("range finder enabled but no device supplied");
                None
            }
            (false, _) => None,
        };

        let inputs = FusionInputs {
            camera: camera_buffer.clone(),
            range: range_buffer.clone(),
            camera_metrics: camera
                .as_ref()
                .map(CameraSource::metrics)
                .unwrap_or_else(|| Arc::new(SourceMetrics::new())),
            range_metrics: range
                .as_ref()
                .map(RangeSource::metrics)
                .unwrap_or_else(|| Arc::new(SourceMetrics::new())),
        };
        let fusion = FusionEngine::new(config.fusion.clone(), inputs);
        let stop_timeout = Duration::from_millis(config.lifecycle.stop_timeout_ms);

        Self {
            config,
            state: Mutex::new(CoordinatorState::Created),
            lifecycle: Mutex::new(false),
            camera,
            range,
            fusion,
            camera_buffer,
            range_buffer,
            stop_timeout,
        }
    }

    /// Coordinator wired to mock devices
    pub fn with_mock_devices(config: EdgeConfig) -> Self {
        Self::new(config, DeviceSet::mock())
    }

    /// Initialize every configured source, camera first.
    ///
    /// # Errors
    /// `ContractError::Lifecycle` while running, after `shutdown`, or when
    /// no source could be initialized. A single failing source is tolerated.
    #[instrument(name = "coordinator_initialize", skip(self))]
    pub fn initialize(&self) -> Result<(), ContractError> {
        let released = lock_unpoisoned(&self.lifecycle);
        if *released {
            return Err(ContractError::lifecycle(COMPONENT, "already shut down"));
        }

        match self.state() {
            CoordinatorState::Initialized => return Ok(()),
            CoordinatorState::Running => {
                return Err(ContractError::lifecycle(
                    COMPONENT,
                    "cannot initialize while running",
                ))
            }
            CoordinatorState::Created | CoordinatorState::Stopped => {}
        }

        let mut available = 0;
        if let Some(camera) = &self.camera {
            match camera.initialize() {
                Ok(()) => available += 1,
                Err(e) => warn!(error = %e, "camera unavailable, fusion degraded"),
            }
        }
        if let Some(range) = &self.range {
            match range.initialize() {
                Ok(()) => available += 1,
                Err(e) => warn!(error = %e, "range finder unavailable, fusion degraded"),
            }
        }

        if available == 0 {
            error!("no source could be initialized");
            return Err(ContractError::lifecycle(
                COMPONENT,
                "no source could be initialized",
            ));
        }

        self.set_state(CoordinatorState::Initialized);
        info!(
            camera = self.camera_available(),
            range_finder = self.range_available(),
            "coordinator initialized"
        );
        Ok(())
    }

    /// Start available sources, then the fusion engine. No-op if running.
    ///
    /// # Errors
    /// `ContractError::Lifecycle` before `initialize` or after `shutdown`.
    #[instrument(name = "coordinator_start", skip(self))]
    pub fn start(&self) -> Result<(), ContractError> {
        let released = lock_unpoisoned(&self.lifecycle);
        if *released {
            return Err(ContractError::lifecycle(COMPONENT, "already shut down"));
        }

        match self.state() {
            CoordinatorState::Running => return Ok(()),
            CoordinatorState::Created => {
                return Err(ContractError::lifecycle(
                    COMPONENT,
                    "start() called before initialize()",
                ))
            }
            CoordinatorState::Initialized | CoordinatorState::Stopped => {}
        }

        if let Err(e) = self.start_components() {
            error!(error = %e, "start failed, rolling back");
            self.stop_components();
            self.set_state(CoordinatorState::Stopped);
            return Err(e);
        }

        self.set_state(CoordinatorState::Running);
        info!("coordinator running");
        Ok(())
    }

    fn start_components(&self) -> Result<(), ContractError> {
        if let Some(camera) = self.camera.as_ref().filter(|c| c.is_available()) {
            camera.start()?;
        }
        if let Some(range) = self.range.as_ref().filter(|r| r.is_available()) {
            range.start()?;
        }
        self.fusion.start()
    }

    /// Stop fusion, then range, then camera, each with its own timeout.
    ///
    /// Idempotent; never fails. Unresponsive threads are reported in the
    /// returned outcomes and detached.
    #[instrument(name = "coordinator_stop", skip(self))]
    pub fn stop(&self) -> StopReport {
        let _released = lock_unpoisoned(&self.lifecycle);
        if self.state() != CoordinatorState::Running {
            return StopReport::new();
        }

        let report = self.stop_components();
        self.set_state(CoordinatorState::Stopped);
        info!(report = ?report, "coordinator stopped");
        report
    }

    fn stop_components(&self) -> StopReport {
        let mut report = vec![(FusionEngine::COMPONENT, self.fusion.stop(self.stop_timeout))];
        if let Some(range) = &self.range {
            report.push((RangeSource::COMPONENT, range.stop(self.stop_timeout)));
        }
        if let Some(camera) = &self.camera {
            report.push((CameraSource::COMPONENT, camera.stop(self.stop_timeout)));
        }

        for (component, outcome) in &report {
            if *outcome == StopOutcome::TimedOut {
                warn!(component, "component did not stop in time");
            }
        }
        report
    }

    /// Stop, then release every device handle. Safe without `start`, and
    /// safe to call repeatedly.
    #[instrument(name = "coordinator_shutdown", skip(self))]
    pub fn shutdown(&self) {
        self.stop();

        let mut released = lock_unpoisoned(&self.lifecycle);
        if *released {
            return;
        }
        if let Some(range) = &self.range {
            range.release();
        }
        if let Some(camera) = &self.camera {
            camera.release();
        }
        *released = true;
        if self.state() != CoordinatorState::Created {
            self.set_state(CoordinatorState::Stopped);
        }
        info!("coordinator shut down");
    }

    /// Block until every available source has published once.
    ///
    /// Returns `false` on timeout or when no source is available.
    pub fn wait_for_data(&self, timeout: Duration) -> bool {
        let camera = self.camera_available();
        let range = self.range_available();
        if !camera && !range {
            return false;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let ready = (!camera || self.camera_buffer.has_data())
                && (!range || self.range_buffer.has_data());
            if ready {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(DATA_POLL_INTERVAL);
        }
    }

    pub fn state(&self) -> CoordinatorState {
        *lock_unpoisoned(&self.state)
    }

    fn set_state(&self, state: CoordinatorState) {
        *lock_unpoisoned(&self.state) = state;
    }

    pub fn is_running(&self) -> bool {
        self.state() == CoordinatorState::Running
    }

    pub fn camera_available(&self) -> bool {
        self.camera.as_ref().is_some_and(CameraSource::is_available)
    }

    pub fn range_available(&self) -> bool {
        self.range.as_ref().is_some_and(RangeSource::is_available)
    }

    pub fn status(&self) -> CoordinatorStatus {
        let mut components = BTreeMap::new();

        let camera = match &self.camera {
            Some(camera) => camera.status(),
            None => ComponentStatus::absent(CameraSource::COMPONENT, self.absent_reason(true)),
        };
        let range = match &self.range {
            Some(range) => range.status(),
            None => ComponentStatus::absent(RangeSource::COMPONENT, self.absent_reason(false)),
        };
        components.insert(camera.name.clone(), camera);
        components.insert(range.name.clone(), range);
        let fusion = self.fusion.status();
        components.insert(fusion.name.clone(), fusion);

        CoordinatorStatus {
            running: self.is_running(),
            state: self.state(),
            components,
        }
    }

    fn absent_reason(&self, camera: bool) -> &'static str {
        let enabled = if camera {
            self.config.camera.enabled
        } else {
            self.config.range_finder.enabled
        };
        if enabled {
            "no device supplied"
        } else {
            "disabled"
        }
    }

    pub fn latest_frame(&self) -> Option<FrameSample> {
        self.camera_buffer.latest_value()
    }

    pub fn latest_reading(&self) -> Option<RangeReading> {
        self.range_buffer.latest_value()
    }

    pub fn latest_fused(&self) -> Option<FusedRecord> {
        self.fusion.latest_fused()
    }

    pub fn fusion_history(&self, count: usize) -> Vec<FusedRecord> {
        self.fusion.history(count)
    }

    /// Most recent accepted distances, oldest first
    pub fn distance_history(&self, count: usize) -> Vec<f64> {
        self.range
            .as_ref()
            .map(|range| range.distance_history(count))
            .unwrap_or_default()
    }

    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(&FusedRecord) + Send + Sync + 'static,
    {
        self.fusion.register_callback(callback);
    }

    pub fn subscribe(&self, capacity: usize, policy: DropPolicy) -> Receiver<FusedRecord> {
        self.fusion.subscribe(capacity, policy)
    }

    pub fn fusion_stats(&self) -> FusionStatsSnapshot {
        self.fusion.stats()
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    pub fn camera(&self) -> Option<&CameraSource> {
        self.camera.as_ref()
    }

    pub fn range_finder(&self) -> Option<&RangeSource> {
        self.range.as_ref()
    }

    pub fn fusion(&self) -> &FusionEngine {
        &self.fusion
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
