//! Serial line transport.
//!
//! The line is always configured to 115200 baud, 8 data bits, no parity,
//! one stop bit and no flow control. There is no negotiation; callers only
//! choose the device path.

use std::io::{Read, Write};

use log::{debug, info};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use super::Transport;
use crate::config::CommConfig;
use crate::error::{Error, Result};

/// An open serial device.
///
/// Dropping the link closes the device.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialLink {
    /// Opens `path` and applies the fixed line settings.
    ///
    /// Fails with [`Error::Configuration`] if `path` is not a serial device
    /// or its attributes cannot be read or applied. Nothing stays open on
    /// failure.
    pub fn open(path: &str, config: &CommConfig) -> Result<Self> {
        debug!("opening serial device {} at {} baud", path, config.baud_rate);

        let port = serialport::new(path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| Error::Configuration {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        info!("serial device {} open", path);
        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    /// Device path this link was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Line rate currently applied by the driver.
    pub fn baud_rate(&self) -> Result<u32> {
        self.port.baud_rate().map_err(|e| Error::Configuration {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink").field("path", &self.path).finish()
    }
}

impl Transport for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.port.read(buf).map_err(Error::from_io)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.port.write(buf).map_err(Error::from_io)
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush().map_err(Error::from_io)
    }
}
