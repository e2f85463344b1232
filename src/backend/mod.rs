//! Backend module for serial communication with the analyzer board
//!
//! This module does all serial I/O in a separate thread to keep the UI
//! responsive. It uses crossbeam channels for thread-safe communication
//! with the frontend.
//!
//! # Architecture
//!
//! - [`ConnectionManager`] - Connection state machine, owned by the UI thread
//! - [`SerialWorker`] - Blocking I/O loop on the worker thread
//! - [`BackendMessage`] - Notifications sent to subscribers (lines, samples, status)
//! - [`NotificationReceiver`] - Subscriber-side handle for receiving notifications
//!
//! # Components
//!
//! - [`LineReader`] - Owns the port, splits bytes into lines, performs writes
//! - [`Command`] - Outbound commands and their wire encoding
//! - [`parse_line`] - Telemetry line parser
//! - [`SystemPortOpener`] - Real serial ports via the `serialport` crate
//! - [`MockPortOpener`] - Scripted devices for tests and the demo mode
//!
//! # Example
//!
//! ```ignore
//! use ad5933_panel::backend::{BackendMessage, Command, ConnectionManager};
//! use ad5933_panel::config::SerialConfig;
//!
//! let mut manager = ConnectionManager::with_system_ports(SerialConfig::default());
//! let notifications = manager.subscribe();
//!
//! manager.connect("/dev/ttyACM0")?;
//!
//! // Once per frame on the UI thread
//! manager.poll();
//! for msg in notifications.drain() {
//!     match msg {
//!         BackendMessage::Sample(sample) => { /* plot it */ }
//!         BackendMessage::Line(line) => { /* log it */ }
//!         _ => {}
//!     }
//! }
//!
//! manager.send(&Command::Sweep)?;
//! ```

pub mod connection;
pub mod discovery;
pub mod encoder;
pub mod line_reader;
pub mod mock_port;
pub mod parser;
pub mod port;
pub mod worker;

pub use connection::ConnectionManager;
pub use encoder::{Command, MasterClock, MuxChannel};
pub use line_reader::{LineReader, LineSplitter, ReadEvent};
pub use mock_port::{DemoPortOpener, MockDevice, MockPortOpener};
pub use parser::{parse_line, ParseOutcome, SampleField, SampleParseError};
pub use port::{PortOpener, SerialLink, SystemPortOpener};
pub use worker::{SerialWorker, WorkerEvent};

use crate::types::{ConnectionStatus, PortInfo, Sample};
use crossbeam_channel::Receiver;
use std::time::Duration;

/// Notification sent from the backend to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    /// Connection status changed
    ConnectionStatus(ConnectionStatus),
    /// The session ended because of an error
    ConnectionError(String),
    /// A raw line from the device, in read order
    Line(String),
    /// A sample extracted from the preceding line
    Sample(Sample),
    /// A telemetry-shaped line had a malformed field
    ParseError { line: String, error: String },
    /// A line was discarded before delivery
    LineDropped(String),
    /// A command was queued for the device
    CommandSent(String),
    /// Port list update
    PortList(Vec<PortInfo>),
}

/// Subscriber handle for backend notifications
pub struct NotificationReceiver {
    /// Receiver for backend messages
    pub receiver: Receiver<BackendMessage>,
}

impl NotificationReceiver {
    pub fn new(receiver: Receiver<BackendMessage>) -> Self {
        Self { receiver }
    }

    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<BackendMessage> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for a message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BackendMessage> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<BackendMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }
}
