//! Mock 设备
//!
//! 用于无硬件环境的测试与演示。行为与真实设备一致：`read_frame` / `query`
//! 可阻塞（`read_delay`），可周期性失败，可在打开时失败。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    CameraConfig, CameraDevice, ContractError, PixelFormat, RangeDevice, RangeFinderConfig,
    RawFrame,
};
use tracing::{debug, trace};

/// Observes a mock device from outside the owning source
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    reads: Arc<AtomicU64>,
    releases: Arc<AtomicU64>,
    open: Arc<AtomicBool>,
}

impl MockProbe {
    /// Read attempts so far (including failed ones)
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `release` calls that actually closed an open handle
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn mark_released(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Mock 故障注入配置
#[derive(Debug, Clone, Default)]
pub struct MockFaults {
    /// `open` 失败
    pub fail_open: bool,

    /// 每第 N 次读取失败（TransientRead）
    pub fail_every: Option<u64>,

    /// 每次读取的阻塞时间
    pub read_delay: Duration,

    /// 读取成功但无数据
    pub no_data: bool,
}

impl MockFaults {
    fn read_fails(&self, attempt: u64) -> bool {
        matches!(self.fail_every, Some(n) if n > 0 && attempt % n == 0)
    }
}

/// Mock camera
///
/// Produces BGR frames at whatever rate it is read; each frame is filled
/// with the low byte of its frame counter.
pub struct MockCamera {
    name: String,
    faults: MockFaults,
    width: u32,
    height: u32,
    read_timeout: Option<Duration>,
    frame_id: u64,
    probe: MockProbe,
}

impl MockCamera {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faults: MockFaults::default(),
            width: 0,
            height: 0,
            read_timeout: None,
            frame_id: 0,
            probe: MockProbe::default(),
        }
    }

    pub fn with_faults(mut self, faults: MockFaults) -> Self {
        self.faults = faults;
        self
    }

    /// Camera whose `open` always fails
    pub fn failing(name: impl Into<String>) -> Self {
        Self::new(name).with_faults(MockFaults {
            fail_open: true,
            ..Default::default()
        })
    }

    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }
}

impl CameraDevice for MockCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self, config: &CameraConfig) -> Result<(), ContractError> {
        if self.faults.fail_open {
            return Err(ContractError::device_open(
                &self.name,
                format!("camera {} not present", config.device_id),
            ));
        }
        self.width = config.width;
        self.height = config.height;
        self.read_timeout = Some(Duration::from_millis(config.read_timeout_ms));
        self.probe.open.store(true, Ordering::SeqCst);
        debug!(device = %self.name, width = self.width, height = self.height, "mock camera opened");
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RawFrame>, ContractError> {
        let attempt = self.probe.reads.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.faults.read_delay;
        let timeout = self.read_timeout.unwrap_or(delay);
        if !delay.is_zero() {
            thread::sleep(delay.min(timeout));
        }
        if !self.is_open() {
            return Err(ContractError::transient_read(&self.name, "camera not open"));
        }
        if delay > timeout {
            debug!(device = %self.name, timeout_ms = timeout.as_millis() as u64, "mock camera read timed out");
            return Ok(None);
        }
        if self.faults.read_fails(attempt) {
            return Err(ContractError::transient_read(&self.name, "simulated grab failure"));
        }
        if self.faults.no_data {
            return Ok(None);
        }

        self.frame_id += 1;
        let format = PixelFormat::Bgr8;
        let size = self.width as usize * self.height as usize * format.bytes_per_pixel().unwrap_or(3);
        trace!(device = %self.name, frame_id = self.frame_id, "mock frame");
        Ok(Some(RawFrame {
            width: self.width,
            height: self.height,
            format,
            data: Bytes::from(vec![self.frame_id as u8; size]),
        }))
    }

    fn release(&mut self) {
        self.probe.mark_released();
    }

    fn is_open(&self) -> bool {
        self.probe.is_open()
    }
}

/// Mock laser range finder
///
/// Either replays a script of response lines (cycling) or synthesizes
/// `D:<metres>` lines around a base distance.
pub struct MockRangeFinder {
    name: String,
    faults: MockFaults,
    base_distance: f64,
    script: Vec<String>,
    probe: MockProbe,
}

impl MockRangeFinder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faults: MockFaults::default(),
            base_distance: 2.0,
            script: Vec::new(),
            probe: MockProbe::default(),
        }
    }

    pub fn with_faults(mut self, faults: MockFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_base_distance(mut self, distance: f64) -> Self {
        self.base_distance = distance;
        self
    }

    /// Replay these response lines in order, then start over
    pub fn with_script<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Range finder whose `open` always fails
    pub fn failing(name: impl Into<String>) -> Self {
        Self::new(name).with_faults(MockFaults {
            fail_open: true,
            ..Default::default()
        })
    }

    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }

    fn response(&self, attempt: u64) -> String {
        if self.script.is_empty() {
            // 小幅正弦抖动
            let wobble = 0.02 * (attempt as f64 * 0.3).sin();
            format!("D:{:.3}", self.base_distance + wobble)
        } else {
            let idx = (attempt.saturating_sub(1) as usize) % self.script.len();
            self.script[idx].clone()
        }
    }
}

impl RangeDevice for MockRangeFinder {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self, config: &RangeFinderConfig) -> Result<(), ContractError> {
        if self.faults.fail_open {
            return Err(ContractError::device_open(
                &self.name,
                format!("cannot open {}", config.port),
            ));
        }
        self.probe.open.store(true, Ordering::SeqCst);
        debug!(device = %self.name, port = %config.port, "mock range finder opened");
        Ok(())
    }

    fn query(&mut self) -> Result<Option<String>, ContractError> {
        let attempt = self.probe.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.faults.read_delay.is_zero() {
            thread::sleep(self.faults.read_delay);
        }
        if !self.is_open() {
            return Err(ContractError::transient_read(&self.name, "port not open"));
        }
        if self.faults.read_fails(attempt) {
            return Err(ContractError::transient_read(&self.name, "simulated serial error"));
        }
        if self.faults.no_data {
            return Ok(None);
        }
        Ok(Some(self.response(attempt)))
    }

    fn release(&mut self) {
        self.probe.mark_released();
    }

    fn is_open(&self) -> bool {
        self.probe.is_open()
    }
}
