//! Configuration module for the AD5933 panel
//!
//! This module handles application configuration including:
//! - Serial link settings and the port discovery policy
//! - Default values for the sweep and hardware forms
//! - UI preferences persisted across runs
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.ad5933.panel/`
//! - **macOS**: `~/Library/Application Support/dev.ad5933.panel/`
//! - **Windows**: `%APPDATA%\dev.ad5933.panel\`
//!
//! # Files
//!
//! - `app_state.json` - Serial settings, form defaults and UI preferences
//! - `logs/` - Rolling log files
//!
//! Sweep results are never written to disk.
//!
//! # Example
//!
//! ```ignore
//! use ad5933_panel::config::AppState;
//!
//! let mut state = AppState::load_or_default();
//! state.serial.last_port = Some("/dev/ttyACM0".to_string());
//! state.save()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::backend::discovery;
use crate::error::{PanelError, Result, ResultExt};
use crate::types::PortInfo;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.ad5933.panel";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Log directory name inside the app data directory
pub const LOG_DIR: &str = "logs";

/// Serial line rate expected by the firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read timeout for the serial port in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// USB identifier of the ST-Link virtual COM port on the controller board
pub const DEFAULT_HARDWARE_ID: &str = "VID:PID=0483:374B";

/// Default number of lines kept in the log console
pub const DEFAULT_LOG_CAPACITY: usize = 2000;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        PanelError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            PanelError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the app state file
pub fn app_state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(APP_STATE_FILE))
}

// ==================== Serial ====================

/// How the port to connect to is chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum PortSelection {
    /// Use exactly this port identifier
    Manual(String),
    /// Pick the first port whose hardware id contains this text
    HardwareId(String),
}

impl Default for PortSelection {
    fn default() -> Self {
        PortSelection::HardwareId(DEFAULT_HARDWARE_ID.to_string())
    }
}

impl PortSelection {
    /// Resolve the policy against an enumerated port list
    pub fn resolve(&self, ports: &[PortInfo]) -> Result<String> {
        match self {
            PortSelection::Manual(port_id) => Ok(port_id.clone()),
            PortSelection::HardwareId(needle) => discovery::find_by_hardware_id(ports, needle)
                .map(|p| p.port_id.clone())
                .ok_or_else(|| PanelError::PortUnavailable {
                    port: needle.clone(),
                    reason: "no port with a matching hardware id".to_string(),
                }),
        }
    }
}

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Port discovery policy
    #[serde(default)]
    pub selection: PortSelection,

    /// Port used by the last successful connection
    #[serde(default)]
    pub last_port: Option<String>,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            selection: PortSelection::default(),
            last_port: None,
        }
    }
}

impl SerialConfig {
    /// Read timeout as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Hardware id used for auto-selection, if the policy has one
    pub fn hardware_id(&self) -> Option<&str> {
        match &self.selection {
            PortSelection::HardwareId(id) => Some(id.as_str()),
            PortSelection::Manual(_) => None,
        }
    }
}

// ==================== Form Defaults ====================

/// Initial values of the sweep configuration form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepDefaults {
    pub start_hz: u32,
    pub increment_hz: u32,
    pub num_increments: u32,
    pub ref_resistor_ohm: u32,
}

impl Default for SweepDefaults {
    fn default() -> Self {
        Self {
            start_hz: 1000,
            increment_hz: 1000,
            num_increments: 99,
            ref_resistor_ohm: 1000,
        }
    }
}

/// Initial values of the manual hardware controls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareDefaults {
    pub dac: u16,
    pub pot: u8,
    pub mux1: u8,
    pub mux2: u8,
    /// `<pin>,<freq_hz>` or `0`
    pub master_clock: String,
}

impl Default for HardwareDefaults {
    fn default() -> Self {
        Self {
            dac: 2048,
            pot: 190,
            mux1: 4,
            mux2: 5,
            master_clock: "1,1000000".to_string(),
        }
    }
}

// ==================== App State ====================

/// Persistent application state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Version for future migration support
    #[serde(default = "default_app_state_version")]
    pub version: u32,

    /// Serial link settings
    #[serde(default)]
    pub serial: SerialConfig,

    /// Sweep form defaults
    #[serde(default)]
    pub sweep: SweepDefaults,

    /// Hardware form defaults
    #[serde(default)]
    pub hardware: HardwareDefaults,

    /// UI preferences
    #[serde(default)]
    pub ui_preferences: UiPreferences,
}

fn default_app_state_version() -> u32 {
    1
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: 1,
            serial: SerialConfig::default(),
            sweep: SweepDefaults::default(),
            hardware: HardwareDefaults::default(),
            ui_preferences: UiPreferences::default(),
        }
    }
}

impl AppState {
    /// Load app state from the default location
    pub fn load() -> Result<Self> {
        let path = app_state_path().ok_or_else(|| {
            PanelError::Config("Could not determine app state path".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path).with_context(|| format!("Loading {}", path.display()))
    }

    /// Load app state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load app state, using defaults: {}", e);
            Self::default()
        })
    }

    /// Load app state from an explicit path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PanelError::Config(format!("Failed to read app state: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| PanelError::Config(format!("Failed to parse app state: {}", e)))
    }

    /// Save app state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(dir.join(APP_STATE_FILE))
    }

    /// Save app state to an explicit path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PanelError::Config(format!("Failed to serialize app state: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| PanelError::Config(format!("Failed to write app state: {}", e)))
    }

    /// Remember the port of a successful connection
    pub fn update_last_port(&mut self, port_id: &str) {
        self.serial.last_port = Some(port_id.to_string());
    }
}

/// UI preferences that persist across runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiPreferences {
    /// Enable dark mode
    #[serde(default = "default_true")]
    pub dark_mode: bool,

    /// Plot impedance on a log10 axis
    #[serde(default = "default_true")]
    pub impedance_log_scale: bool,

    /// Number of lines kept in the log console
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            dark_mode: true,
            impedance_log_scale: true,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}
