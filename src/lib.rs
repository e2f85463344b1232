//! # AD5933 Panel: Serial Control Panel for Impedance Sweeps
//!
//! A desktop control panel for an impedance analyzer built around the AD5933
//! chip. The board is driven over a serial link with short newline-terminated
//! text commands and reports each sweep point as a telemetry line, which is
//! parsed and plotted live as |Z| and phase against frequency.
//!
//! ## Architecture
//!
//! - **Backend**: A worker thread owns the serial port, splits the byte stream
//!   into lines and parses telemetry
//! - **Connection manager**: A state machine on the UI thread that starts and
//!   stops the worker and publishes notifications
//! - **Frontend**: Renders the UI using eframe/egui with egui_plot for graphs
//! - **Communication**: Crossbeam channels for thread-safe data transfer
//!
//! ## Configuration
//!
//! Serial settings, form defaults and UI preferences are stored in the
//! platform-appropriate data directory under `dev.ad5933.panel`:
//!
//! - **Linux**: `~/.local/share/dev.ad5933.panel/`
//! - **macOS**: `~/Library/Application Support/dev.ad5933.panel/`
//! - **Windows**: `%APPDATA%\dev.ad5933.panel\`
//!
//! ## Example
//!
//! ```ignore
//! use ad5933_panel::{
//!     backend::ConnectionManager,
//!     config::AppState,
//!     frontend::ImpedanceApp,
//! };
//!
//! fn main() -> eframe::Result<()> {
//!     let app_state = AppState::load_or_default();
//!     let manager = ConnectionManager::with_system_ports(app_state.serial.clone());
//!
//!     eframe::run_native(
//!         "AD5933 Impedance Analyzer",
//!         eframe::NativeOptions::default(),
//!         Box::new(|cc| Ok(Box::new(ImpedanceApp::new(cc, manager, app_state)))),
//!     )
//! }
//! ```

pub mod app;
pub mod backend;
pub mod config;
pub mod error;
pub mod frontend;
pub mod types;

// Re-export commonly used types
pub use app::ImpedanceApp;
pub use backend::{BackendMessage, Command, ConnectionManager};
pub use config::{AppState, SerialConfig};
pub use error::{PanelError, Result};
pub use types::{ConnectionStatus, PortInfo, Sample, SweepRun};
