//! Error handling for the impedance analyzer panel
//!
//! This module defines the crate-wide error type and a Result alias.
//! Errors fall into two groups:
//!
//! - **Recoverable** ([`PanelError::Decode`], [`PanelError::Parse`],
//!   [`PanelError::InvalidInput`]): reported once and the stream continues.
//! - **Session-ending** ([`PanelError::PortUnavailable`], [`PanelError::Io`],
//!   [`PanelError::WriteFailed`] raised by the worker): the connection state
//!   machine returns to `Disconnected` and publishes one error notification.

use crate::backend::parser::SampleParseError;
use crate::types::ConnectionStatus;
use thiserror::Error;

/// Main error type for panel operations
#[derive(Error, Debug)]
pub enum PanelError {
    /// The serial port could not be opened
    #[error("Port {port} unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },

    /// A write was attempted on a closed port or the OS rejected it
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A command was issued while no connection exists
    #[error("Not connected")]
    NotConnected,

    /// A connect was requested while a session is still active
    #[error("Connection already active ({0})")]
    AlreadyActive(ConnectionStatus),

    /// A received line was not valid UTF-8 (or overflowed the line buffer)
    #[error("Decode error: {0}")]
    Decode(String),

    /// A telemetry line had a malformed numeric field
    #[error("Parse error: {0}")]
    Parse(#[from] SampleParseError),

    /// Operator-supplied form value could not be turned into a command
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Errors reported by the serialport crate (enumeration, settings)
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PanelError>,
    },
}

impl PanelError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PanelError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the error ends the serial session
    pub fn is_fatal(&self) -> bool {
        match self {
            PanelError::PortUnavailable { .. }
            | PanelError::WriteFailed(_)
            | PanelError::Io(_)
            | PanelError::Serial(_) => true,
            PanelError::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

/// Result type alias for panel operations
pub type Result<T> = std::result::Result<T, PanelError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PanelError::PortUnavailable {
            port: "/dev/ttyACM0".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Port /dev/ttyACM0 unavailable: No such file or directory"
        );
        assert_eq!(PanelError::NotConnected.to_string(), "Not connected");
    }

    #[test]
    fn test_error_with_context() {
        let err = PanelError::Config("bad json".to_string());
        let with_ctx = err.with_context("Failed to load preferences");
        assert!(with_ctx.to_string().contains("Failed to load preferences"));
        assert!(with_ctx.to_string().contains("bad json"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(PanelError::WriteFailed("EIO".into()).is_fatal());
        assert!(PanelError::Io(std::io::Error::other("gone")).is_fatal());
        assert!(!PanelError::Decode("invalid utf-8".into()).is_fatal());
        assert!(!PanelError::NotConnected.is_fatal());

        let wrapped = PanelError::Io(std::io::Error::other("gone")).with_context("read loop");
        assert!(wrapped.is_fatal());
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<()> = Err(PanelError::Channel("closed".into()));
        let err = result.context("sending command").unwrap_err();
        assert_eq!(err.to_string(), "sending command: Channel error: closed");
    }
}
