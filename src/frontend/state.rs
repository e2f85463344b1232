//! Shared state types for the frontend
//!
//! Everything here is owned by the presentation thread and mutated only by
//! backend notifications ([`PanelState::apply`]) and operator actions. None
//! of it depends on egui, so it can be tested directly.
//!
//! Panels return [`AppAction`]s instead of talking to the backend, the
//! same way pages do in the rest of the frontend.

use crate::backend::discovery;
use crate::backend::{BackendMessage, Command, MasterClock, MuxChannel};
use crate::backend::encoder::{DAC_MAX, MUX_MAX};
use crate::config::{curve_color, AppState, HardwareDefaults, PlotSettings, SweepDefaults};
use crate::error::{PanelError, Result};
use crate::types::{ConnectionStatus, PortInfo, Sample, SweepRun};
use chrono::{DateTime, Local};
use std::collections::VecDeque;

/// Actions that panels can emit
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Connect to the selected port
    Connect(String),
    /// Disconnect from the current port
    Disconnect,
    /// Re-enumerate serial ports
    RefreshPorts,
    /// Send a command to the device
    Send(Command),
    /// Start a new sweep run and trigger it on the device
    StartSweep,
    /// Drop all curves and reset the palette
    ClearPlots,
    /// Clear the log console
    ClearLog,
}

// ==================== Sweep History ====================

/// A finished sweep, kept only in plottable form
#[derive(Debug, Clone, PartialEq)]
pub struct SweepCurve {
    pub label: String,
    pub color: [u8; 3],
    pub impedance: Vec<[f64; 2]>,
    pub phase: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveSweep {
    label: String,
    color: [u8; 3],
    run: SweepRun,
}

impl ActiveSweep {
    fn to_curve(&self) -> SweepCurve {
        SweepCurve {
            label: self.label.clone(),
            color: self.color,
            impedance: self.run.impedance_points(),
            phase: self.run.phase_points(),
        }
    }
}

/// The current sweep run plus curves of earlier runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepHistory {
    active: Option<ActiveSweep>,
    previous: Vec<SweepCurve>,
    sweeps_started: usize,
}

impl SweepHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the current run and open a new one
    pub fn begin_sweep(&mut self) {
        self.finish();
        let index = self.sweeps_started;
        self.sweeps_started += 1;
        self.active = Some(ActiveSweep {
            label: format!("Sweep {}", self.sweeps_started),
            color: curve_color(index),
            run: SweepRun::new(),
        });
    }

    /// Add a sample to the current run
    ///
    /// A sample that arrives with no open run (for example a sweep started
    /// from the device side) opens one.
    pub fn push(&mut self, sample: Sample) {
        if self.active.is_none() {
            self.begin_sweep();
        }
        if let Some(active) = self.active.as_mut() {
            active.run.push(sample);
        }
    }

    /// Close the current run, keeping its curve if it has samples
    pub fn finish(&mut self) {
        if let Some(active) = self.active.take() {
            if !active.run.is_empty() {
                self.previous.push(active.to_curve());
            }
        }
    }

    /// Drop everything and restart labels and colors
    pub fn clear(&mut self) {
        self.active = None;
        self.previous.clear();
        self.sweeps_started = 0;
    }

    pub fn current(&self) -> Option<&SweepRun> {
        self.active.as_ref().map(|a| &a.run)
    }

    pub fn previous(&self) -> &[SweepCurve] {
        &self.previous
    }

    /// Number of sweeps started since the last clear
    pub fn sweeps_started(&self) -> usize {
        self.sweeps_started
    }

    /// All curves to draw, oldest first, current run last
    pub fn curves(&self) -> Vec<SweepCurve> {
        let mut curves = self.previous.clone();
        if let Some(active) = &self.active {
            curves.push(active.to_curve());
        }
        curves
    }
}

// ==================== Log Buffer ====================

/// Origin of a log console entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// Text received from the device
    Device,
    /// Command sent by the operator
    Command,
    /// Local status message
    Info,
    /// Error or dropped data
    Error,
}

/// One line in the log console
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub source: LogSource,
    pub text: String,
}

impl LogEntry {
    pub fn new(source: LogSource, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            source,
            text: text.into(),
        }
    }

    /// Text as shown in the console
    pub fn display_text(&self) -> String {
        let prefix = match self.source {
            LogSource::Device => "",
            LogSource::Command => ">> ",
            LogSource::Info => "-- ",
            LogSource::Error => "!! ",
        };
        format!("[{}] {}{}", self.timestamp.format("%H:%M:%S"), prefix, self.text)
    }
}

/// Bounded log console contents
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, source: LogSource, text: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry::new(source, text));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}

// ==================== Forms ====================

fn parse_field<T: std::str::FromStr>(label: &str, text: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| PanelError::InvalidInput(format!("{} must be an integer, got '{}'", label, text.trim())))
}

/// Text fields of the sweep configuration form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepForm {
    pub start_hz: String,
    pub increment_hz: String,
    pub num_increments: String,
    pub ref_resistor_ohm: String,
}

impl SweepForm {
    pub fn from_defaults(defaults: &SweepDefaults) -> Self {
        Self {
            start_hz: defaults.start_hz.to_string(),
            increment_hz: defaults.increment_hz.to_string(),
            num_increments: defaults.num_increments.to_string(),
            ref_resistor_ohm: defaults.ref_resistor_ohm.to_string(),
        }
    }

    /// Parse into a configure-sweep command
    pub fn to_command(&self) -> Result<Command> {
        Ok(Command::ConfigureSweep {
            start_hz: parse_field("Start frequency", &self.start_hz)?,
            increment_hz: parse_field("Frequency increment", &self.increment_hz)?,
            num_increments: parse_field("Number of increments", &self.num_increments)?,
            ref_resistor_ohm: parse_field("Reference resistor", &self.ref_resistor_ohm)?,
        })
    }

    /// Parsed values, for persisting as the next defaults
    pub fn to_defaults(&self) -> Result<SweepDefaults> {
        match self.to_command()? {
            Command::ConfigureSweep {
                start_hz,
                increment_hz,
                num_increments,
                ref_resistor_ohm,
            } => Ok(SweepDefaults {
                start_hz,
                increment_hz,
                num_increments,
                ref_resistor_ohm,
            }),
            _ => Err(PanelError::InvalidInput("not a sweep configuration".to_string())),
        }
    }
}

/// Text fields of the manual hardware controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareForm {
    pub dac: String,
    pub pot: String,
    pub mux1: String,
    pub mux2: String,
    pub master_clock: String,
}

impl HardwareForm {
    pub fn from_defaults(defaults: &HardwareDefaults) -> Self {
        Self {
            dac: defaults.dac.to_string(),
            pot: defaults.pot.to_string(),
            mux1: defaults.mux1.to_string(),
            mux2: defaults.mux2.to_string(),
            master_clock: defaults.master_clock.clone(),
        }
    }

    pub fn dac_command(&self) -> Result<Command> {
        let value: u16 = parse_field("DAC", &self.dac)?;
        let cmd = Command::SetDac(value);
        cmd.validate()?;
        Ok(cmd)
    }

    pub fn pot_command(&self) -> Result<Command> {
        Ok(Command::SetPot(parse_field("Potentiometer (0-255)", &self.pot)?))
    }

    pub fn mux_command(&self, channel: MuxChannel) -> Result<Command> {
        let (label, text) = match channel {
            MuxChannel::Mux1 => ("MUX1", &self.mux1),
            MuxChannel::Mux2 => ("MUX2", &self.mux2),
        };
        let port: u8 = parse_field(label, text)?;
        let cmd = Command::SetMux { channel, port };
        cmd.validate()?;
        Ok(cmd)
    }

    pub fn master_clock_command(&self) -> Result<Command> {
        Ok(Command::SetMasterClock(MasterClock::parse(&self.master_clock)?))
    }

    /// Commands for "apply hardware config": pot, dac, mux1, mux2
    ///
    /// Every field is validated before any command is returned.
    pub fn apply_commands(&self) -> Result<Vec<Command>> {
        Ok(vec![
            self.pot_command()?,
            self.dac_command()?,
            self.mux_command(MuxChannel::Mux1)?,
            self.mux_command(MuxChannel::Mux2)?,
        ])
    }

    /// Parsed values, for persisting as the next defaults
    pub fn to_defaults(&self) -> Result<HardwareDefaults> {
        self.master_clock_command()?;
        Ok(HardwareDefaults {
            dac: parse_field("DAC", &self.dac)?,
            pot: parse_field("Potentiometer (0-255)", &self.pot)?,
            mux1: parse_field("MUX1", &self.mux1)?,
            mux2: parse_field("MUX2", &self.mux2)?,
            master_clock: self.master_clock.trim().to_string(),
        })
    }
}

/// Range hints shown next to the hardware fields
pub fn hardware_hints() -> [(&'static str, String); 3] {
    [
        ("DAC", format!("0-{}", DAC_MAX)),
        ("POT", "0-255".to_string()),
        ("MUX", format!("0-{}", MUX_MAX)),
    ]
}

// ==================== Panel State ====================

/// Everything the panel displays
#[derive(Debug, Clone)]
pub struct PanelState {
    pub status: ConnectionStatus,
    pub ports: Vec<PortInfo>,
    pub selected_port: Option<String>,
    pub history: SweepHistory,
    pub log: LogBuffer,
    pub sweep_form: SweepForm,
    pub hardware_form: HardwareForm,
    pub plot: PlotSettings,
    /// Most recent error, shown until dismissed
    pub last_error: Option<String>,
    hardware_id: Option<String>,
    last_port: Option<String>,
}

impl PanelState {
    pub fn new(app_state: &AppState) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            ports: Vec::new(),
            selected_port: None,
            history: SweepHistory::new(),
            log: LogBuffer::new(app_state.ui_preferences.log_capacity),
            sweep_form: SweepForm::from_defaults(&app_state.sweep),
            hardware_form: HardwareForm::from_defaults(&app_state.hardware),
            plot: PlotSettings::from_preferences(&app_state.ui_preferences),
            last_error: None,
            hardware_id: app_state.serial.hardware_id().map(str::to_string),
            last_port: app_state.serial.last_port.clone(),
        }
    }

    /// Device commands are only offered while connected
    pub fn controls_enabled(&self) -> bool {
        self.status.is_commandable()
    }

    /// Apply one backend notification
    pub fn apply(&mut self, msg: BackendMessage) {
        match msg {
            BackendMessage::ConnectionStatus(status) => {
                self.status = status;
                match status {
                    ConnectionStatus::Connecting => {
                        let port = self.selected_port.clone().unwrap_or_default();
                        self.log.push(LogSource::Info, format!("Connecting to {}...", port));
                    }
                    ConnectionStatus::Connected => {
                        self.last_error = None;
                        self.last_port = self.selected_port.clone();
                        self.log.push(LogSource::Info, "Connected");
                    }
                    ConnectionStatus::Disconnected => {
                        self.history.finish();
                        self.log.push(LogSource::Info, "Disconnected");
                    }
                }
            }
            BackendMessage::ConnectionError(error) => {
                self.log.push(LogSource::Error, error.clone());
                self.last_error = Some(error);
            }
            BackendMessage::Line(line) => self.log.push(LogSource::Device, line),
            BackendMessage::Sample(sample) => self.history.push(sample),
            BackendMessage::ParseError { line, error } => {
                self.log
                    .push(LogSource::Error, format!("Unparsed telemetry '{}': {}", line, error));
            }
            BackendMessage::LineDropped(reason) => {
                self.log.push(LogSource::Error, format!("Dropped line: {}", reason));
            }
            BackendMessage::CommandSent(command) => self.log.push(LogSource::Command, command),
            BackendMessage::PortList(ports) => self.set_ports(ports),
        }
    }

    /// Replace the port list, keeping the selection if it is still present
    pub fn set_ports(&mut self, ports: Vec<PortInfo>) {
        let keep = self
            .selected_port
            .as_ref()
            .is_some_and(|sel| ports.iter().any(|p| &p.port_id == sel));

        if !keep {
            self.selected_port = discovery::preferred_port(
                &ports,
                self.hardware_id.as_deref(),
                self.last_port.as_deref(),
            )
            .map(|p| p.port_id.clone());
        }
        self.ports = ports;
    }

    /// Open a new sweep run
    pub fn begin_sweep(&mut self) {
        self.history.begin_sweep();
    }

    pub fn clear_plots(&mut self) {
        self.history.clear();
    }

    /// Record a local error
    pub fn report_error(&mut self, error: &PanelError) {
        if error.is_fatal() {
            tracing::error!("{}", error);
        } else {
            tracing::warn!("{}", error);
        }
        let text = error.to_string();
        self.log.push(LogSource::Error, text.clone());
        self.last_error = Some(text);
    }

    /// Copy persisted fields back into `app_state`
    ///
    /// Form fields that do not parse keep their previous saved value.
    pub fn store_into(&self, app_state: &mut AppState) {
        if let Ok(sweep) = self.sweep_form.to_defaults() {
            app_state.sweep = sweep;
        }
        if let Ok(hardware) = self.hardware_form.to_defaults() {
            app_state.hardware = hardware;
        }
        if let Some(port) = &self.last_port {
            app_state.update_last_port(port);
        }
        app_state.ui_preferences.impedance_log_scale = self.plot.impedance_log_scale;
    }
}
