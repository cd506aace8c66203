//! Range source: owns one range-finder handle and its query loop.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use contracts::{
    now_secs, ComponentState, ComponentStatus, ContractError, RangeDevice, RangeFinderConfig,
    RangeReading,
};
use metrics::counter;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::buffer::SampleBuffer;
use crate::error::IngestionError;
use crate::filter::{FilterOutcome, OutlierFilter};
use crate::metrics::SourceMetrics;
use crate::parse::parse_distance;
use crate::runtime::LoopRuntime;
use crate::slot::DeviceSlot;
use crate::sync::{lock_unpoisoned, StopSignal};
use crate::worker::StopOutcome;
use crate::DEFAULT_STOP_TIMEOUT;

/// Reader thread name
pub const RANGE_THREAD: &str = "range-reader";

/// Quality of a reading published as measured
pub const QUALITY_MEASURED: u8 = 255;

/// Quality of a reading replaced by the moving average
pub const QUALITY_SUBSTITUTED: u8 = 128;

/// Range source
///
/// One query per `read_interval_ms`; responses are parsed, range-checked,
/// outlier-filtered and published. Unparseable or missing responses count
/// as errors and produce no reading for that iteration.
pub struct RangeSource {
    config: RangeFinderConfig,
    runtime: LoopRuntime,
    slot: Arc<DeviceSlot<Box<dyn RangeDevice>>>,
    buffer: Arc<SampleBuffer<RangeReading>>,
    metrics: Arc<SourceMetrics>,
    filter: Arc<Mutex<OutlierFilter>>,
    init_error: Mutex<Option<String>>,
}

impl RangeSource {
    pub const COMPONENT: &'static str = "range_finder";

    /// `window` is the moving-average window of the outlier filter
    pub fn new(config: RangeFinderConfig, window: usize, device: Box<dyn RangeDevice>) -> Self {
        Self::with_buffer(config, window, device, Arc::new(SampleBuffer::new()))
    }

    /// Create with an externally owned buffer
    pub fn with_buffer(
        config: RangeFinderConfig,
        window: usize,
        device: Box<dyn RangeDevice>,
        buffer: Arc<SampleBuffer<RangeReading>>,
    ) -> Self {
        let mut filter = OutlierFilter::new(window, config.min_distance, config.max_distance);
        if !config.filter_outliers {
            filter = filter.without_statistics();
        }

        Self {
            config,
            runtime: LoopRuntime::new(Self::COMPONENT),
            slot: Arc::new(DeviceSlot::new(device)),
            buffer,
            metrics: Arc::new(SourceMetrics::new()),
            filter: Arc::new(Mutex::new(filter)),
            init_error: Mutex::new(None),
        }
    }

    /// Open the port and probe it once.
    ///
    /// A failed probe is only logged; some devices need a few queries
    /// before they answer.
    ///
    /// # Errors
    /// `ContractError::DeviceOpen` if the port cannot be opened.
    #[instrument(name = "range_initialize", skip(self), fields(port = %self.config.port))]
    pub fn initialize(&self) -> Result<(), ContractError> {
        self.runtime.begin_initialize()?;

        let opened = self
            .slot
            .with(|device| device.open(&self.config))
            .unwrap_or_else(|| {
                Err(IngestionError::Released {
                    component: Self::COMPONENT.to_string(),
                }
                .into())
            });

        if let Err(e) = opened {
            error!(error = %e, "range finder initialization failed");
            *lock_unpoisoned(&self.init_error) = Some(e.to_string());
            self.metrics.set_active(false);
            self.runtime.set_state(ComponentState::Failed);
            return Err(e);
        }

        match self.slot.with(|device| device.query()) {
            Some(Ok(Some(line))) if parse_distance(&line).is_some() => {
                debug!(response = %line, "range finder probe ok");
            }
            Some(Ok(Some(line))) => warn!(response = %line, "range finder probe unparseable"),
            Some(Ok(None)) => warn!("range finder probe got no response"),
            Some(Err(e)) => warn!(error = %e, "range finder probe failed"),
            None => {}
        }

        *lock_unpoisoned(&self.init_error) = None;
        self.metrics.set_active(true);
        self.runtime.set_state(ComponentState::Ready);
        info!(
            baudrate = self.config.baudrate,
            min_distance = self.config.min_distance,
            max_distance = self.config.max_distance,
            "range finder initialized"
        );
        Ok(())
    }

    /// Launch the reading loop. No-op if already running.
    ///
    /// # Errors
    /// `ContractError::Lifecycle` before a successful `initialize` or after
    /// `release`.
    #[instrument(name = "range_start", skip(self))]
    pub fn start(&self) -> Result<(), ContractError> {
        if self.slot.is_released() {
            return Err(IngestionError::Released {
                component: Self::COMPONENT.to_string(),
            }
            .into());
        }

        let reader = ReadLoop {
            slot: self.slot.clone(),
            buffer: self.buffer.clone(),
            metrics: self.metrics.clone(),
            filter: self.filter.clone(),
            interval: Duration::from_millis(self.config.read_interval_ms),
        };
        self.runtime
            .launch(RANGE_THREAD, move |signal| reader.run(&signal))?;
        Ok(())
    }

    /// Signal the loop and wait up to `timeout` for it to exit
    #[instrument(name = "range_stop", skip(self))]
    pub fn stop(&self, timeout: Duration) -> StopOutcome {
        self.runtime.halt(timeout)
    }

    /// Stop (if running) and close the port. Idempotent.
    pub fn release(&self) {
        self.stop(DEFAULT_STOP_TIMEOUT);
        if !self.slot.is_released() {
            self.slot.release();
            self.metrics.set_active(false);
            info!("range finder released");
        }
    }

    pub fn state(&self) -> ComponentState {
        self.runtime.state()
    }

    /// Whether `initialize` succeeded
    pub fn is_available(&self) -> bool {
        self.metrics.is_active()
    }

    /// Copy of the most recent reading
    pub fn latest_reading(&self) -> Option<RangeReading> {
        self.buffer.latest_value()
    }

    /// Most recent `count` published distances, oldest first (max 100)
    pub fn distance_history(&self, count: usize) -> Vec<f64> {
        lock_unpoisoned(&self.filter).history(count)
    }

    pub fn buffer(&self) -> Arc<SampleBuffer<RangeReading>> {
        self.buffer.clone()
    }

    pub fn metrics(&self) -> Arc<SourceMetrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &RangeFinderConfig {
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
            rate_hz: None,
            detail: lock_unpoisoned(&self.init_error).clone(),
        }
    }
}

impl Drop for RangeSource {
    fn drop(&mut self) {
        self.release();
    }
}

struct ReadLoop {
    slot: Arc<DeviceSlot<Box<dyn RangeDevice>>>,
    buffer: Arc<SampleBuffer<RangeReading>>,
    metrics: Arc<SourceMetrics>,
    filter: Arc<Mutex<OutlierFilter>>,
    interval: Duration,
}

impl ReadLoop {
    fn run(self, signal: &StopSignal) {
        debug!(interval_ms = self.interval.as_millis() as u64, "read loop running");

        while !signal.is_triggered() {
            let started = Instant::now();

            let response = self.slot.with(|device| device.query());
            if signal.is_triggered() {
                break;
            }
            match response {
                None => break,
                Some(Ok(Some(line))) => self.handle_response(&line),
                Some(Ok(None)) => {
                    self.metrics.record_read_error();
                    counter!("edge_fusion_read_errors_total", "source" => "range").increment(1);
                    debug!("range finder timed out without response");
                }
                Some(Err(e)) => {
                    self.metrics.record_read_error();
                    counter!("edge_fusion_read_errors_total", "source" => "range").increment(1);
                    warn!(error = %e, "range query failed");
                }
            }

            if signal.wait_timeout(self.interval.saturating_sub(started.elapsed())) {
                break;
            }
        }

        self.slot.finish();
        debug!("read loop exited");
    }

    fn handle_response(&self, line: &str) {
        let Some(raw) = parse_distance(line) else {
            self.metrics.record_parse_error();
            counter!("edge_fusion_parse_errors_total").increment(1);
            debug!(response = %line, "unparseable range response");
            return;
        };

        let outcome = lock_unpoisoned(&self.filter).apply(raw);
        match outcome {
            FilterOutcome::Accepted(distance) => self.publish(distance, QUALITY_MEASURED),
            FilterOutcome::Substituted { raw, mean } => {
                self.metrics.record_outlier();
                counter!("edge_fusion_outliers_substituted_total").increment(1);
                debug!(raw, mean, "outlier replaced by moving average");
                self.publish(mean, QUALITY_SUBSTITUTED);
            }
            FilterOutcome::Rejected(raw) => {
                self.metrics.record_rejected();
                counter!("edge_fusion_readings_rejected_total").increment(1);
                debug!(raw, "reading outside physical range");
            }
        }
    }

    fn publish(&self, distance: f64, quality: u8) {
        let timestamp = now_secs();
        let reading = RangeReading {
            angle: 0.0,
            distance,
            quality,
            timestamp,
        };
        let sequence = self.buffer.publish_at(reading, timestamp);
        self.metrics.record_sample();
        counter!("edge_fusion_samples_total", "source" => "range").increment(1);
        trace!(sequence, distance, "range reading published");
    }
}
