//! Core data types for the impedance analyzer panel
//!
//! This module contains the data structures shared between the serial
//! backend and the presentation layer.
//!
//! # Main Types
//!
//! - [`Sample`] - One (frequency, impedance, phase) measurement
//! - [`SweepRun`] - Index-aligned samples collected during one sweep
//! - [`ConnectionStatus`] - State of the connection state machine
//! - [`PortInfo`] - An enumerated serial port
//! - [`IngestStats`] - Per-session ingestion counters
//!
//! # Alignment
//!
//! [`SweepRun`] keeps frequencies, impedances and phases in three separate
//! vectors (the shape plotting wants). The only way to grow them is
//! [`SweepRun::push`], which appends to all three at once, so they always
//! have the same length.

use serde::{Deserialize, Serialize};

/// A single impedance measurement reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Excitation frequency in Hz
    pub frequency_hz: f64,
    /// Impedance magnitude in Ohm
    pub impedance_ohm: f64,
    /// Phase in degrees
    pub phase_deg: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(frequency_hz: f64, impedance_ohm: f64, phase_deg: f64) -> Self {
        Self {
            frequency_hz,
            impedance_ohm,
            phase_deg,
        }
    }

    /// Format the sample the way the firmware prints it
    pub fn to_telemetry_line(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Freq: {:?} Hz | Z: {:?} Ohm | Fase: {:?} deg",
            self.frequency_hz, self.impedance_ohm, self.phase_deg
        )
    }
}

/// Samples collected during one sweep, kept as three aligned series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepRun {
    frequencies: Vec<f64>,
    impedances: Vec<f64>,
    phases: Vec<f64>,
}

impl SweepRun {
    /// Create an empty run
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample to all three series
    pub fn push(&mut self, sample: Sample) {
        self.frequencies.push(sample.frequency_hz);
        self.impedances.push(sample.impedance_ohm);
        self.phases.push(sample.phase_deg);
    }

    /// Number of samples in the run
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Whether the run has no samples yet
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Remove all samples
    pub fn clear(&mut self) {
        self.frequencies.clear();
        self.impedances.clear();
        self.phases.clear();
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn impedances(&self) -> &[f64] {
        &self.impedances
    }

    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    /// Get the sample at `index`
    pub fn get(&self, index: usize) -> Option<Sample> {
        Some(Sample::new(
            *self.frequencies.get(index)?,
            *self.impedances.get(index)?,
            *self.phases.get(index)?,
        ))
    }

    /// Iterate over the samples in arrival order
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.frequencies
            .iter()
            .zip(&self.impedances)
            .zip(&self.phases)
            .map(|((&f, &z), &p)| Sample::new(f, z, p))
    }

    /// (frequency, impedance) pairs for plotting
    pub fn impedance_points(&self) -> Vec<[f64; 2]> {
        self.frequencies
            .iter()
            .zip(&self.impedances)
            .map(|(&f, &z)| [f, z])
            .collect()
    }

    /// (frequency, phase) pairs for plotting
    pub fn phase_points(&self) -> Vec<[f64; 2]> {
        self.frequencies
            .iter()
            .zip(&self.phases)
            .map(|(&f, &p)| [f, p])
            .collect()
    }
}

impl Extend<Sample> for SweepRun {
    fn extend<I: IntoIterator<Item = Sample>>(&mut self, iter: I) {
        for sample in iter {
            self.push(sample);
        }
    }
}

/// Connection status of the serial session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionStatus {
    /// No port is open
    #[default]
    Disconnected,
    /// The worker is opening the port
    Connecting,
    /// Port open, read loop running
    Connected,
}

impl ConnectionStatus {
    /// Whether commands may be sent in this state
    pub fn is_commandable(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Connected => write!(f, "Connected"),
        }
    }
}

/// A serial port reported by the operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// OS device name (e.g. `COM5`, `/dev/ttyACM0`)
    pub port_id: String,
    /// Human readable description
    pub description: String,
    /// Hardware identifier, `VID:PID=XXXX:XXXX` for USB devices
    pub hardware_id: Option<String>,
}

impl PortInfo {
    /// Create a port entry without a hardware identifier
    pub fn new(port_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_id: port_id.into(),
            description: description.into(),
            hardware_id: None,
        }
    }

    /// Builder method to attach a hardware identifier
    pub fn with_hardware_id(mut self, hardware_id: impl Into<String>) -> Self {
        self.hardware_id = Some(hardware_id.into());
        self
    }

    /// Case-insensitive substring match against the hardware identifier
    pub fn matches_hardware_id(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        let needle = needle.to_ascii_uppercase();
        self.hardware_id
            .as_ref()
            .map(|id| id.to_ascii_uppercase().contains(&needle))
            .unwrap_or(false)
    }

    /// Label shown in port selectors
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.port_id, self.description)
    }
}

/// Counters for one serial session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Non-empty lines delivered
    pub lines: u64,
    /// Lines that produced a sample
    pub samples: u64,
    /// Telemetry-shaped lines with a malformed number
    pub parse_errors: u64,
    /// Lines discarded before delivery (decode failure, overflow)
    pub dropped_lines: u64,
    /// Commands queued for the device
    pub commands_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_run_alignment() {
        let mut run = SweepRun::new();
        assert!(run.is_empty());

        run.push(Sample::new(1000.0, 523.4, -12.7));
        run.push(Sample::new(2000.0, 498.1, -15.2));

        assert_eq!(run.len(), 2);
        assert_eq!(run.frequencies(), &[1000.0, 2000.0]);
        assert_eq!(run.impedances(), &[523.4, 498.1]);
        assert_eq!(run.phases(), &[-12.7, -15.2]);
        assert_eq!(run.get(1), Some(Sample::new(2000.0, 498.1, -15.2)));
        assert_eq!(run.get(2), None);

        run.clear();
        assert_eq!(run.len(), 0);
        assert!(run.phases().is_empty());
    }

    #[test]
    fn test_sweep_run_plot_points() {
        let mut run = SweepRun::new();
        run.extend([Sample::new(1.0, 10.0, -1.0), Sample::new(2.0, 20.0, -2.0)]);

        assert_eq!(run.impedance_points(), vec![[1.0, 10.0], [2.0, 20.0]]);
        assert_eq!(run.phase_points(), vec![[1.0, -1.0], [2.0, -2.0]]);
        assert_eq!(run.iter().count(), 2);
    }

    #[test]
    fn test_sample_display_is_telemetry_shape() {
        let sample = Sample::new(1000.0, 523.4, -12.7);
        assert_eq!(
            sample.to_telemetry_line(),
            "Freq: 1000.0 Hz | Z: 523.4 Ohm | Fase: -12.7 deg"
        );
    }

    #[test]
    fn test_port_hardware_id_match() {
        let port = PortInfo::new("COM5", "STMicroelectronics STLink Virtual COM Port")
            .with_hardware_id("USB VID:PID=0483:374B SER=0670FF");

        assert!(port.matches_hardware_id("VID:PID=0483:374B"));
        assert!(port.matches_hardware_id("vid:pid=0483:374b"));
        assert!(!port.matches_hardware_id("VID:PID=2341:0043"));
        assert!(!port.matches_hardware_id(""));
        assert!(!PortInfo::new("COM1", "Communications Port").matches_hardware_id("0483"));
        assert_eq!(
            port.display_name(),
            "COM5 - STMicroelectronics STLink Virtual COM Port"
        );
    }

    #[test]
    fn test_connection_status() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
        assert!(ConnectionStatus::Connected.is_commandable());
        assert!(!ConnectionStatus::Connecting.is_commandable());
        assert_eq!(ConnectionStatus::Connecting.to_string(), "Connecting...");
    }
}
