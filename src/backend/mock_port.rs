//! Mock serial device for testing
//!
//! This module provides an in-process serial device so the connection
//! lifecycle and ingestion pipeline can run without hardware.
//!
//! # Features
//!
//! - **Scripted input**: push raw bytes or whole lines for the worker to read
//! - **Write capture**: inspect exactly what was written to the port
//! - **Fault injection**: make the port unavailable, or fail reads/writes
//! - **Simulated firmware**: optionally answer commands like the real board,
//!   including synthetic telemetry for `sweep`
//!
//! # Example
//!
//! ```ignore
//! use ad5933_panel::backend::mock_port::{MockDevice, MockPortOpener};
//!
//! let device = MockDevice::new("MOCK0", "Mock AD5933").with_firmware();
//! let opener = MockPortOpener::new().with_device(device.clone());
//!
//! // ... connect a ConnectionManager through `opener`, send commands ...
//!
//! assert_eq!(device.written_lines(), vec!["sweep"]);
//! ```
//!
//! # Enabling in the GUI
//!
//! The module is always compiled. Listing the mock device next to real
//! ports in the application requires the `mock-port` feature:
//!
//! ```bash
//! cargo run --features mock-port
//! ```

use crate::backend::port::{PortOpener, SerialLink, SystemPortOpener};
use crate::config::SerialConfig;
use crate::error::{PanelError, Result};
use crate::types::{PortInfo, Sample};
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// Port identifier of the demo device
pub const MOCK_PORT_ID: &str = "MOCK-AD5933";

/// Hardware id reported by mock devices
pub const MOCK_HARDWARE_ID: &str = "MOCK VID:PID=0000:0000";

/// Sweep parameters remembered by the simulated firmware
#[derive(Debug, Clone, Copy, PartialEq)]
struct SweepParams {
    start_hz: f64,
    increment_hz: f64,
    num_increments: u32,
    ref_resistor_ohm: f64,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            start_hz: 1000.0,
            increment_hz: 1000.0,
            num_increments: 99,
            ref_resistor_ohm: 1000.0,
        }
    }
}

/// Command interpreter that imitates the board's firmware
///
/// The load is a resistor in parallel with a capacitor.
#[derive(Debug, Clone)]
struct SimulatedFirmware {
    params: SweepParams,
    load_resistance_ohm: f64,
    load_capacitance_f: f64,
    pending: Vec<u8>,
}

impl SimulatedFirmware {
    fn new() -> Self {
        Self {
            params: SweepParams::default(),
            load_resistance_ohm: 10_000.0,
            load_capacitance_f: 10e-9,
            pending: Vec::new(),
        }
    }

    fn sample_at(&self, frequency_hz: f64) -> Sample {
        let wrc = 2.0 * PI * frequency_hz * self.load_resistance_ohm * self.load_capacitance_f;
        let magnitude = self.load_resistance_ohm / (1.0 + wrc * wrc).sqrt();
        let phase = -wrc.atan().to_degrees();
        Sample::new(frequency_hz, magnitude, phase)
    }

    /// Feed written bytes, returning the reply text for completed lines
    fn feed(&mut self, data: &[u8]) -> String {
        let mut reply = String::new();
        for &b in data {
            if b == b'\n' {
                let line = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                if !line.is_empty() {
                    self.respond(&line, &mut reply);
                }
            } else {
                self.pending.push(b);
            }
        }
        reply
    }

    fn respond(&mut self, line: &str, out: &mut String) {
        let mut parts = line.split(',');
        let keyword = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match keyword {
            "setconfig" => match parse_sweep_params(&args) {
                Some(params) => {
                    self.params = params;
                    out.push_str(&format!(
                        "Config OK: start={} inc={} n={} ref={}\n",
                        params.start_hz, params.increment_hz, params.num_increments, params.ref_resistor_ohm
                    ));
                }
                None => out.push_str(&format!("ERR bad setconfig: {}\n", line)),
            },
            "calibrate" => out.push_str(&format!(
                "Calibration done (Rref = {} Ohm)\n",
                self.params.ref_resistor_ohm
            )),
            "sweep" => {
                out.push_str("Sweep start\n");
                for i in 0..=self.params.num_increments {
                    let f = self.params.start_hz + self.params.increment_hz * f64::from(i);
                    out.push_str(&self.sample_at(f).to_telemetry_line());
                    out.push('\n');
                }
                out.push_str("Sweep complete\n");
            }
            "status" => out.push_str(&format!(
                "Status: idle | start={} inc={} n={}\n",
                self.params.start_hz, self.params.increment_hz, self.params.num_increments
            )),
            "reset" => {
                self.params = SweepParams::default();
                out.push_str("Reset\n");
            }
            "dac" | "pot" | "mux1" | "mux2" | "setmclk" => out.push_str(&format!("OK {}\n", line)),
            _ => out.push_str(&format!("Unknown command: {}\n", line)),
        }
    }
}

fn parse_sweep_params(args: &[&str]) -> Option<SweepParams> {
    match args {
        [start, inc, n, r] => Some(SweepParams {
            start_hz: start.trim().parse().ok()?,
            increment_hz: inc.trim().parse().ok()?,
            num_increments: n.trim().parse().ok()?,
            ref_resistor_ohm: r.trim().parse().ok()?,
        }),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    open: bool,
    open_count: u32,
    close_count: u32,
    unavailable: Option<String>,
    read_error: Option<io::ErrorKind>,
    write_error: Option<io::ErrorKind>,
    firmware: Option<SimulatedFirmware>,
}

/// A scripted serial device shared between the test and the worker
#[derive(Debug, Clone)]
pub struct MockDevice {
    info: PortInfo,
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// Create a device that only echoes what tests push into it
    pub fn new(port_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            info: PortInfo::new(port_id, description).with_hardware_id(MOCK_HARDWARE_ID),
            state: Arc::new(Mutex::new(DeviceState::default())),
        }
    }

    /// The demo device listed by the `mock-port` feature
    pub fn demo() -> Self {
        Self::new(MOCK_PORT_ID, "Mock AD5933").with_firmware()
    }

    /// Builder method to override the reported hardware id
    pub fn with_hardware_id(mut self, hardware_id: impl Into<String>) -> Self {
        self.info.hardware_id = Some(hardware_id.into());
        self
    }

    /// Builder method to answer commands like the board's firmware
    pub fn with_firmware(self) -> Self {
        self.lock().firmware = Some(SimulatedFirmware::new());
        self
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn port_info(&self) -> &PortInfo {
        &self.info
    }

    pub fn port_id(&self) -> &str {
        &self.info.port_id
    }

    /// Queue raw bytes for the reader
    pub fn push_bytes(&self, data: &[u8]) {
        self.lock().inbound.extend(data);
    }

    /// Queue a newline-terminated line for the reader
    pub fn push_line(&self, line: &str) {
        let mut state = self.lock();
        state.inbound.extend(line.as_bytes());
        state.inbound.push_back(b'\n');
    }

    /// Bytes not yet consumed by the reader
    pub fn pending_inbound(&self) -> usize {
        self.lock().inbound.len()
    }

    /// Everything written to the port so far
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Written data as text
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.lock().written).into_owned()
    }

    /// Written data split into lines, terminators removed
    pub fn written_lines(&self) -> Vec<String> {
        self.written_text().lines().map(str::to_string).collect()
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// How many times the port was opened
    pub fn open_count(&self) -> u32 {
        self.lock().open_count
    }

    /// How many times the OS handle was released
    pub fn close_count(&self) -> u32 {
        self.lock().close_count
    }

    /// Make subsequent opens fail with `reason`
    pub fn set_unavailable(&self, reason: impl Into<String>) {
        self.lock().unavailable = Some(reason.into());
    }

    /// Make reads fail, as if the cable was pulled
    pub fn fail_reads(&self, kind: io::ErrorKind) {
        self.lock().read_error = Some(kind);
    }

    /// Make writes fail
    pub fn fail_writes(&self, kind: io::ErrorKind) {
        self.lock().write_error = Some(kind);
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        let mut state = self.lock();
        state.unavailable = None;
        state.read_error = None;
        state.write_error = None;
    }

    fn open_link(&self) -> Result<Box<dyn SerialLink>> {
        let mut state = self.lock();
        if let Some(reason) = &state.unavailable {
            return Err(PanelError::PortUnavailable {
                port: self.info.port_id.clone(),
                reason: reason.clone(),
            });
        }
        if state.open {
            return Err(PanelError::PortUnavailable {
                port: self.info.port_id.clone(),
                reason: "port is busy".to_string(),
            });
        }

        state.open = true;
        state.open_count += 1;
        if state.firmware.is_some() {
            state.inbound.extend(b"AD5933 ready\n");
        }

        Ok(Box::new(MockLink {
            device: self.clone(),
        }))
    }
}

/// Open handle to a [`MockDevice`]
struct MockLink {
    device: MockDevice,
}

impl SerialLink for MockLink {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        let state = self.device.lock();
        if let Some(kind) = state.read_error {
            return Err(io::Error::new(kind, "mock read failure"));
        }
        Ok(state.inbound.len() as u32)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.device.lock();
        if let Some(kind) = state.read_error {
            return Err(io::Error::new(kind, "mock read failure"));
        }
        if state.inbound.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }

        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.device.lock();
        if let Some(kind) = state.write_error {
            return Err(io::Error::new(kind, "mock write failure"));
        }
        state.written.extend_from_slice(data);

        let reply = state.firmware.as_mut().map(|fw| fw.feed(data));
        if let Some(reply) = reply {
            state.inbound.extend(reply.as_bytes());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.device.port_id()
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        let mut state = self.device.lock();
        state.open = false;
        state.close_count += 1;
    }
}

/// [`PortOpener`] that only knows about mock devices
#[derive(Debug, Clone, Default)]
pub struct MockPortOpener {
    devices: Vec<MockDevice>,
}

impl MockPortOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to register a device
    pub fn with_device(mut self, device: MockDevice) -> Self {
        self.devices.push(device);
        self
    }

    /// Look up a registered device
    pub fn device(&self, port_id: &str) -> Option<&MockDevice> {
        self.devices.iter().find(|d| d.port_id() == port_id)
    }
}

impl PortOpener for MockPortOpener {
    fn open(&self, port_id: &str, _config: &SerialConfig) -> Result<Box<dyn SerialLink>> {
        match self.device(port_id) {
            Some(device) => device.open_link(),
            None => Err(PanelError::PortUnavailable {
                port: port_id.to_string(),
                reason: "no such port".to_string(),
            }),
        }
    }

    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        Ok(self.devices.iter().map(|d| d.port_info().clone()).collect())
    }
}

/// Real ports plus the demo device
#[derive(Debug, Clone)]
pub struct DemoPortOpener {
    system: SystemPortOpener,
    mock: MockPortOpener,
}

impl Default for DemoPortOpener {
    fn default() -> Self {
        Self {
            system: SystemPortOpener,
            mock: MockPortOpener::new().with_device(MockDevice::demo()),
        }
    }
}

impl PortOpener for DemoPortOpener {
    fn open(&self, port_id: &str, config: &SerialConfig) -> Result<Box<dyn SerialLink>> {
        if self.mock.device(port_id).is_some() {
            self.mock.open(port_id, config)
        } else {
            self.system.open(port_id, config)
        }
    }

    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        let mut ports = self.system.list_ports().unwrap_or_else(|e| {
            tracing::warn!("Serial port enumeration failed: {}", e);
            Vec::new()
        });
        ports.extend(self.mock.list_ports()?);
        Ok(ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::parser::{parse_line, ParseOutcome};

    fn open(device: &MockDevice) -> Box<dyn SerialLink> {
        MockPortOpener::new()
            .with_device(device.clone())
            .open(device.port_id(), &SerialConfig::default())
            .unwrap()
    }

    fn read_all(link: &mut Box<dyn SerialLink>) -> String {
        let mut out = Vec::new();
        let mut buf = [0u8; 256];
        while link.bytes_to_read().unwrap() > 0 {
            let n = link.read(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_open_close_accounting() {
        let device = MockDevice::new("MOCK0", "Mock");
        let link = open(&device);
        assert!(device.is_open());
        assert_eq!(device.open_count(), 1);

        drop(link);
        assert!(!device.is_open());
        assert_eq!(device.close_count(), 1);
    }

    #[test]
    fn test_busy_and_unavailable() {
        let device = MockDevice::new("MOCK0", "Mock");
        let opener = MockPortOpener::new().with_device(device.clone());
        let cfg = SerialConfig::default();

        let _link = opener.open("MOCK0", &cfg).unwrap();
        assert!(matches!(opener.open("MOCK0", &cfg), Err(PanelError::PortUnavailable { .. })));
        assert!(matches!(opener.open("MOCK9", &cfg), Err(PanelError::PortUnavailable { .. })));

        let other = MockDevice::new("MOCK1", "Mock");
        other.set_unavailable("access denied");
        let opener = MockPortOpener::new().with_device(other);
        match opener.open("MOCK1", &cfg) {
            Err(PanelError::PortUnavailable { reason, .. }) => assert_eq!(reason, "access denied"),
            _ => panic!("expected PortUnavailable"),
        }
    }

    #[test]
    fn test_scripted_input_and_write_capture() {
        let device = MockDevice::new("MOCK0", "Mock");
        let mut link = open(&device);

        device.push_line("hello");
        assert_eq!(read_all(&mut link), "hello\n");

        link.write_all(b"status\n").unwrap();
        assert_eq!(device.written_lines(), vec!["status"]);
    }

    #[test]
    fn test_fault_injection() {
        let device = MockDevice::new("MOCK0", "Mock");
        let mut link = open(&device);

        device.fail_writes(io::ErrorKind::BrokenPipe);
        assert_eq!(
            link.write_all(b"sweep\n").unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );

        device.fail_reads(io::ErrorKind::NotConnected);
        assert!(link.bytes_to_read().is_err());

        device.clear_faults();
        assert_eq!(link.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn test_firmware_sweep_produces_telemetry() {
        let device = MockDevice::new("MOCK0", "Mock").with_firmware();
        let mut link = open(&device);
        assert_eq!(read_all(&mut link), "AD5933 ready\n");

        link.write_all(b"setconfig,1000,500,4,1000\n").unwrap();
        link.write_all(b"sweep\n").unwrap();
        let output = read_all(&mut link);

        let samples: Vec<Sample> = output
            .lines()
            .filter_map(|l| match parse_line(l) {
                ParseOutcome::Sample(s) => Some(s),
                _ => None,
            })
            .collect();

        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0].frequency_hz, 1000.0);
        assert_eq!(samples[4].frequency_hz, 3000.0);
        assert!(samples.windows(2).all(|w| w[1].impedance_ohm < w[0].impedance_ohm));
        assert!(samples.iter().all(|s| s.phase_deg < 0.0 && s.phase_deg > -90.0));
        assert!(output.ends_with("Sweep complete\n"));
    }

    #[test]
    fn test_demo_opener_routes_mock_port() {
        let opener = DemoPortOpener::default();
        let ports = opener.list_ports().unwrap();
        assert!(ports.iter().any(|p| p.port_id == MOCK_PORT_ID));

        let link = opener.open(MOCK_PORT_ID, &SerialConfig::default()).unwrap();
        assert_eq!(link.name(), MOCK_PORT_ID);
    }
}
