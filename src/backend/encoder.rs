//! Command encoder for the device's text protocol
//!
//! Every command is a single comma-separated line terminated by `\n`.
//!
//! | Command | Wire text |
//! |---|---|
//! | [`Command::ConfigureSweep`] | `setconfig,<start>,<increment>,<count>,<ref>` |
//! | [`Command::Calibrate`] | `calibrate` |
//! | [`Command::Sweep`] | `sweep` |
//! | [`Command::SetDac`] | `dac,<0..4095>` |
//! | [`Command::SetPot`] | `pot,<0..255>` |
//! | [`Command::SetMux`] | `mux1,<0..8>` / `mux2,<0..8>` |
//! | [`Command::SetMasterClock`] | `setmclk,<pin>,<freq>` / `setmclk,0` |
//! | [`Command::GetStatus`] | `status` |
//! | [`Command::Reset`] | `reset` |

use crate::error::{PanelError, Result};

/// Highest value accepted by the 12-bit excitation DAC
pub const DAC_MAX: u16 = 4095;
/// Highest multiplexer port index
pub const MUX_MAX: u8 = 8;

/// One of the two analog multiplexers on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuxChannel {
    Mux1,
    Mux2,
}

impl MuxChannel {
    fn keyword(&self) -> &'static str {
        match self {
            MuxChannel::Mux1 => "mux1",
            MuxChannel::Mux2 => "mux2",
        }
    }
}

/// External master clock setting for the AD5933
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterClock {
    /// Drive the clock from `pin` at `freq_hz`
    Enabled { pin: u32, freq_hz: u32 },
    /// Fall back to the internal oscillator
    Disabled,
}

impl MasterClock {
    /// Parse the operator form value: `<pin>,<freq_hz>` or `0`
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text == "0" {
            return Ok(MasterClock::Disabled);
        }

        let invalid =
            || PanelError::InvalidInput(format!("master clock must be '<pin>,<freq_hz>' or '0', got '{}'", text));

        let (pin, freq) = text.split_once(',').ok_or_else(invalid)?;
        let pin = pin.trim().parse().map_err(|_| invalid())?;
        let freq_hz = freq.trim().parse().map_err(|_| invalid())?;
        Ok(MasterClock::Enabled { pin, freq_hz })
    }
}

/// Operator commands understood by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Configure the next sweep
    ConfigureSweep {
        start_hz: u32,
        increment_hz: u32,
        num_increments: u32,
        ref_resistor_ohm: u32,
    },
    /// Run a calibration against the reference resistor
    Calibrate,
    /// Start a sweep
    Sweep,
    /// Set the excitation DAC (0..=4095)
    SetDac(u16),
    /// Set the digital potentiometer (0..=255)
    SetPot(u8),
    /// Select a multiplexer port (0..=8)
    SetMux { channel: MuxChannel, port: u8 },
    /// Configure the external master clock
    SetMasterClock(MasterClock),
    /// Ask the firmware for a status report
    GetStatus,
    /// Reset the board
    Reset,
}

impl Command {
    /// Check operand ranges against the board's limits
    ///
    /// The hardware forms call this; [`crate::backend::ConnectionManager::send`]
    /// does not, so scripted callers can send any operand.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Command::SetDac(v) if v > DAC_MAX => Err(PanelError::InvalidInput(format!(
                "DAC value {} out of range 0..={}",
                v, DAC_MAX
            ))),
            Command::SetMux { channel, port } if port > MUX_MAX => Err(PanelError::InvalidInput(
                format!("{} port {} out of range 0..={}", channel.keyword(), port, MUX_MAX),
            )),
            _ => Ok(()),
        }
    }

    /// Wire text without the line terminator
    pub fn wire_text(&self) -> String {
        match self {
            Command::ConfigureSweep {
                start_hz,
                increment_hz,
                num_increments,
                ref_resistor_ohm,
            } => format!(
                "setconfig,{},{},{},{}",
                start_hz, increment_hz, num_increments, ref_resistor_ohm
            ),
            Command::Calibrate => "calibrate".to_string(),
            Command::Sweep => "sweep".to_string(),
            Command::SetDac(v) => format!("dac,{}", v),
            Command::SetPot(v) => format!("pot,{}", v),
            Command::SetMux { channel, port } => format!("{},{}", channel.keyword(), port),
            Command::SetMasterClock(MasterClock::Enabled { pin, freq_hz }) => {
                format!("setmclk,{},{}", pin, freq_hz)
            }
            Command::SetMasterClock(MasterClock::Disabled) => "setmclk,0".to_string(),
            Command::GetStatus => "status".to_string(),
            Command::Reset => "reset".to_string(),
        }
    }

    /// Newline-terminated line ready for the port
    pub fn encode(&self) -> String {
        let mut line = self.wire_text();
        line.push('\n');
        line
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.wire_text())
    }
}
