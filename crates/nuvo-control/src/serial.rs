//! Serial port transport
//!
//! Nuvo amplifiers talk 9600 baud, 8 data bits, no parity, 1 stop bit, no
//! flow control. Reads are one byte at a time with a short port timeout so
//! the controller can tell "nothing waiting" from "still arriving".

use std::io::{self, Read, Write};
use std::time::Duration;

use nuvo_protocol::Transport;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::error::ControlError;

/// Line speed used by every Nuvo amplifier
pub const NUVO_BAUD_RATE: u32 = 9600;

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Port path, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Per-byte read timeout (also bounds writes)
    pub read_timeout: Duration,
}

impl SerialSettings {
    /// Settings for `port` at the amplifier's fixed line speed
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: NUVO_BAUD_RATE,
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// [`Transport`] over a real serial port
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open and configure the port, discarding anything already buffered
    pub fn open(settings: &SerialSettings) -> Result<Self, ControlError> {
        info!("Attempting connection - {:?}", settings.port);

        let open_failed = |source| ControlError::Open {
            port: settings.port.clone(),
            source,
        };

        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(open_failed)?;

        port.clear(ClearBuffer::All).map_err(open_failed)?;

        debug!(
            "Opened {} at {} baud, 8N1",
            settings.port, settings.baud_rate
        );
        Ok(Self { port })
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.port.name())
            .finish()
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_settings_default() {
        let settings = SerialSettings::new("/dev/ttyUSB0");
        assert_eq!(settings.port, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.read_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let settings = SerialSettings::new("/dev/nuvo-does-not-exist");
        let err = SerialTransport::open(&settings).unwrap_err();
        assert!(matches!(err, ControlError::Open { ref port, .. } if port == "/dev/nuvo-does-not-exist"));
    }
}
