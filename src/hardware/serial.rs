//! Serial port transport backed by the `serialport` crate

use crate::hardware::{CommError, CommResult, Transport};
use crate::utils::config::SerialSettings;
use log::{debug, trace, warn};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Serial link to the payment terminal
///
/// The port is closed when this value is dropped.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    port_name: String,
}

impl SerialTransport {
    /// Open and configure the port described by `settings`
    pub fn open(settings: &SerialSettings) -> CommResult<Self> {
        debug!(
            "Opening {} at {} baud ({} data bits, {:?} parity, {:?} stop bits)",
            settings.port_name,
            settings.baud_rate,
            settings.data_bits,
            settings.parity,
            settings.stop_bits
        );

        let port = serialport::new(&settings.port_name, settings.baud_rate)
            .data_bits(settings.data_bits())
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(settings.write_timeout_ms))
            .open()
            .map_err(|e| CommError::Open {
                port: settings.port_name.clone(),
                message: e.to_string(),
            })?;

        Ok(Self::from_port(port, settings.port_name.clone()))
    }

    /// Wrap a port that was opened elsewhere
    pub fn from_port(port: Box<dyn SerialPort>, port_name: String) -> Self {
        Self { port, port_name }
    }

    /// Names of the serial ports present on this machine
    pub fn available_ports() -> CommResult<Vec<String>> {
        let ports = serialport::available_ports().map_err(|e| CommError::Io {
            kind: io::ErrorKind::Other,
            message: e.to_string(),
        })?;
        Ok(ports.into_iter().map(|info| info.port_name).collect())
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn map_serial_error(&self, err: serialport::Error) -> CommError {
        match err.kind {
            serialport::ErrorKind::NoDevice => CommError::Disconnected {
                details: format!("{}: {}", self.port_name, err.description),
            },
            serialport::ErrorKind::Io(kind) => {
                CommError::from_io(io::Error::new(kind, err.description))
            }
            _ => CommError::Io {
                kind: io::ErrorKind::Other,
                message: err.description,
            },
        }
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> CommResult<()> {
        self.port
            .clear(ClearBuffer::All)
            .map_err(|e| self.map_serial_error(e))?;

        trace!("{} <- {}", self.port_name, hex::encode_upper(bytes));
        self.port.write_all(bytes).map_err(CommError::from_io)?;
        self.port.flush().map_err(CommError::from_io)?;
        Ok(())
    }

    fn read(&mut self, count: usize, timeout: Duration) -> CommResult<Vec<u8>> {
        let mut buffer = vec![0u8; count];
        let mut received = 0;
        let deadline = Instant::now() + timeout;
        let timed_out = |received: usize| CommError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
            expected: count,
            received,
        };

        while received < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out(received));
            }
            self.port
                .set_timeout(remaining)
                .map_err(|e| self.map_serial_error(e))?;

            match self.port.read(&mut buffer[received..]) {
                // Some drivers report an expired timeout as an empty read
                Ok(0) => continue,
                Ok(n) => {
                    received += n;
                    trace!("{}: {}/{} bytes", self.port_name, received, count);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => match CommError::from_io(e) {
                    CommError::Timeout { .. } => return Err(timed_out(received)),
                    other => {
                        warn!("{}: read failed: {}", self.port_name, other);
                        return Err(other);
                    }
                },
            }
        }

        trace!("{} -> {}", self.port_name, hex::encode_upper(&buffer));
        Ok(buffer)
    }
}
