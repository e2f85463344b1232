//! Serial port abstraction
//!
//! The worker talks to the device through [`SerialLink`], and opens it
//! through a [`PortOpener`]. The real implementation wraps the
//! `serialport` crate; tests and the demo mode plug in
//! [`super::mock_port::MockPortOpener`] instead.

use crate::backend::discovery;
use crate::config::SerialConfig;
use crate::error::{PanelError, Result};
use crate::types::PortInfo;
use serialport::SerialPort;
use std::io::{self, Read, Write};

/// An open, exclusively owned serial connection
pub trait SerialLink: Send {
    /// Number of bytes waiting in the receive buffer
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Read up to `buf.len()` bytes
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the whole buffer and flush it
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Port identifier this link was opened on
    fn name(&self) -> &str;
}

/// Opens serial links and enumerates ports
pub trait PortOpener: Send + Sync {
    /// Open `port_id` with the given settings
    fn open(&self, port_id: &str, config: &SerialConfig) -> Result<Box<dyn SerialLink>>;

    /// List ports currently present on the system
    fn list_ports(&self) -> Result<Vec<PortInfo>>;
}

/// Opens real OS serial ports
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&self, port_id: &str, config: &SerialConfig) -> Result<Box<dyn SerialLink>> {
        // Holding DTR low through open keeps boards that reset on DTR running
        let mut port = serialport::new(port_id, config.baud_rate)
            .timeout(config.read_timeout())
            .dtr_on_open(false)
            .open()
            .map_err(|e| PanelError::PortUnavailable {
                port: port_id.to_string(),
                reason: e.to_string(),
            })?;

        if let Err(e) = port.write_request_to_send(false) {
            tracing::warn!("Could not clear RTS on {}: {}", port_id, e);
        }

        tracing::info!(
            "Opened {} at {} baud (timeout {} ms)",
            port_id,
            config.baud_rate,
            config.read_timeout_ms
        );

        Ok(Box::new(SystemLink {
            name: port_id.to_string(),
            port,
        }))
    }

    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(discovery::describe_port).collect())
    }
}

/// [`SerialLink`] backed by a `serialport` handle
struct SystemLink {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialLink for SystemLink {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port.bytes_to_read().map_err(io::Error::from)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SystemLink {
    fn drop(&mut self) {
        tracing::debug!("Closing serial port {}", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_is_unavailable() {
        let opener = SystemPortOpener;
        let result = opener.open("/dev/this-port-does-not-exist", &SerialConfig::default());
        match result {
            Err(PanelError::PortUnavailable { port, .. }) => {
                assert_eq!(port, "/dev/this-port-does-not-exist")
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("opening a missing port succeeded"),
        }
    }

    #[test]
    #[ignore = "port enumeration depends on the host"]
    fn test_list_ports_does_not_panic() {
        let _ = SystemPortOpener.list_ports();
    }
}
