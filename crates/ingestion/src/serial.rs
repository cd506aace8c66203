//! Serial laser range finder (feature `serial`)
//!
//! 8N1, no flow control. Each query clears the input buffer, writes the
//! distance command and reads one ASCII line.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use contracts::{ContractError, RangeDevice, RangeFinderConfig};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info, warn};

/// Distance request command
const DISTANCE_COMMAND: &[u8] = b"D";

/// Sent once after opening: null, version, distance
const INIT_COMMANDS: [&[u8]; 3] = [b"\x00", b"V", b"D"];

/// Longest accepted response line
const MAX_LINE: usize = 128;

pub struct SerialRangeFinder {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialRangeFinder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: None,
        }
    }

    fn send_init_commands(port: &mut dyn SerialPort) {
        for cmd in INIT_COMMANDS {
            if let Err(e) = port.write_all(cmd) {
                warn!(error = %e, "failed to send init command");
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        let _ = port.clear(ClearBuffer::Input);
        debug!("initialization commands sent");
    }

    /// Read bytes up to `\n` or the port timeout
    fn read_line(port: &mut dyn SerialPort) -> std::io::Result<Option<String>> {
        let mut line = Vec::with_capacity(32);
        let mut byte = [0u8; 1];
        loop {
            match port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if line.len() >= MAX_LINE {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(e),
            }
        }

        let text = String::from_utf8_lossy(&line).trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }
}

impl RangeDevice for SerialRangeFinder {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self, config: &RangeFinderConfig) -> Result<(), ContractError> {
        let mut port = serialport::new(&config.port, config.baudrate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_secs_f64(config.timeout))
            .open()
            .map_err(|e| ContractError::device_open(&self.name, format!("{}: {e}", config.port)))?;

        info!(port = %config.port, baudrate = config.baudrate, "serial port opened");
        Self::send_init_commands(port.as_mut());
        self.port = Some(port);
        Ok(())
    }

    fn query(&mut self) -> Result<Option<String>, ContractError> {
        let Some(port) = self.port.as_mut() else {
            return Err(ContractError::transient_read(&self.name, "port not open"));
        };

        port.clear(ClearBuffer::Input)
            .map_err(|e| ContractError::transient_read(&self.name, e.to_string()))?;
        port.write_all(DISTANCE_COMMAND)
            .map_err(|e| ContractError::transient_read(&self.name, e.to_string()))?;
        Self::read_line(port.as_mut())
            .map_err(|e| ContractError::transient_read(&self.name, e.to_string()))
    }

    fn release(&mut self) {
        if self.port.take().is_some() {
            info!(device = %self.name, "serial port closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}
