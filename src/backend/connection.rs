//! Connection state machine
//!
//! [`ConnectionManager`] owns the serial session and its worker thread. It
//! lives on the presentation thread, which drives it by calling
//! [`ConnectionManager::poll`] (or [`ConnectionManager::poll_timeout`]).
//!
//! # States
//!
//! ```text
//! Disconnected --connect--> Connecting --opened--> Connected
//!      ^                        |                      |
//!      +-------- failed --------+---- failed / disconnect
//! ```
//!
//! Every path back to `Disconnected` goes through one teardown routine. It
//! takes the session out of the manager and clears the session's running
//! flag before doing anything else, so teardown happens at most once per
//! session and exactly one `Disconnected` notification is published.

use crate::backend::encoder::Command;
use crate::backend::parser::ParseOutcome;
use crate::backend::port::{PortOpener, SystemPortOpener};
use crate::backend::worker::{SerialWorker, WorkerEvent};
use crate::backend::{BackendMessage, NotificationReceiver};
use crate::config::{PortSelection, SerialConfig};
use crate::error::{PanelError, Result};
use crate::types::{ConnectionStatus, IngestStats, PortInfo};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// State held while a worker exists
struct Session {
    port_id: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    events: Receiver<WorkerEvent>,
    writes: Sender<String>,
}

/// Owner of the connection lifecycle and the notification fan-out
pub struct ConnectionManager {
    config: SerialConfig,
    opener: Arc<dyn PortOpener>,
    status: ConnectionStatus,
    session: Option<Session>,
    subscribers: Vec<Sender<BackendMessage>>,
    stats: IngestStats,
}

impl ConnectionManager {
    /// Create a manager that opens ports through `opener`
    pub fn new(config: SerialConfig, opener: Arc<dyn PortOpener>) -> Self {
        Self {
            config,
            opener,
            status: ConnectionStatus::Disconnected,
            session: None,
            subscribers: Vec::new(),
            stats: IngestStats::default(),
        }
    }

    /// Create a manager for real OS serial ports
    pub fn with_system_ports(config: SerialConfig) -> Self {
        Self::new(config, Arc::new(SystemPortOpener))
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Counters for the current (or last) session
    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Port of the active session
    pub fn port_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.port_id.as_str())
    }

    /// Register a new notification subscriber
    pub fn subscribe(&mut self) -> NotificationReceiver {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        NotificationReceiver::new(rx)
    }

    /// Enumerate ports without publishing
    pub fn list_ports(&self) -> Result<Vec<PortInfo>> {
        self.opener.list_ports()
    }

    /// Enumerate ports and publish the list to subscribers
    pub fn refresh_ports(&mut self) -> Vec<PortInfo> {
        match self.opener.list_ports() {
            Ok(ports) => {
                tracing::debug!("Found {} serial ports", ports.len());
                self.publish(BackendMessage::PortList(ports.clone()));
                ports
            }
            Err(e) => {
                tracing::warn!("Serial port enumeration failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Start connecting to `port_id`
    ///
    /// Only accepted while disconnected. The outcome arrives as
    /// notifications once [`Self::poll`] processes the worker's report.
    pub fn connect(&mut self, port_id: &str) -> Result<()> {
        if self.status != ConnectionStatus::Disconnected {
            return Err(PanelError::AlreadyActive(self.status));
        }

        let (event_tx, event_rx) = unbounded();
        let (write_tx, write_rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let worker = SerialWorker::new(
            port_id,
            self.config.clone(),
            self.opener.clone(),
            running.clone(),
            event_tx,
            write_rx,
        );

        let handle = std::thread::Builder::new()
            .name("serial-worker".to_string())
            .spawn(move || worker.run())?;

        tracing::info!("Connecting to {}", port_id);
        self.stats = IngestStats::default();
        self.session = Some(Session {
            port_id: port_id.to_string(),
            running,
            handle: Some(handle),
            events: event_rx,
            writes: write_tx,
        });
        self.set_status(ConnectionStatus::Connecting);
        Ok(())
    }

    /// Resolve a port by policy and connect to it
    pub fn connect_with(&mut self, selection: &PortSelection) -> Result<String> {
        let ports = self.list_ports()?;
        let port_id = selection.resolve(&ports)?;
        self.connect(&port_id)?;
        Ok(port_id)
    }

    /// Stop the session; a no-op when already disconnected
    pub fn disconnect(&mut self) {
        if self.session.is_none() {
            return;
        }
        tracing::info!("Disconnect requested");
        self.teardown();
    }

    /// Queue a command for the device
    ///
    /// Operands go out as given; range hints belong to the forms.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        if self.status != ConnectionStatus::Connected {
            return Err(PanelError::NotConnected);
        }

        let session = self.session.as_ref().ok_or(PanelError::NotConnected)?;
        session
            .writes
            .send(command.encode())
            .map_err(|_| PanelError::Channel("serial worker is not running".to_string()))?;

        self.stats.commands_sent += 1;
        tracing::debug!("Queued command: {}", command);
        self.publish(BackendMessage::CommandSent(command.wire_text()));
        Ok(())
    }

    /// Process all pending worker events; returns how many were handled
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let next = match &self.session {
                Some(session) => session.events.try_recv(),
                None => break,
            };
            match next {
                Ok(event) => {
                    handled += 1;
                    self.handle_event(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.worker_vanished();
                    break;
                }
            }
        }
        handled
    }

    /// Wait up to `timeout` for a worker event, then process everything pending
    pub fn poll_timeout(&mut self, timeout: Duration) -> usize {
        let first = match &self.session {
            Some(session) => session.events.recv_timeout(timeout),
            None => return 0,
        };
        match first {
            Ok(event) => {
                self.handle_event(event);
                1 + self.poll()
            }
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => {
                self.worker_vanished();
                0
            }
        }
    }

    fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Opened => {
                if self.status == ConnectionStatus::Connecting {
                    if let Some(port) = self.port_id() {
                        tracing::info!("Connected to {}", port);
                    }
                    self.set_status(ConnectionStatus::Connected);
                }
            }
            WorkerEvent::Line { text, outcome } => self.deliver_line(text, outcome),
            WorkerEvent::Dropped(reason) => self.deliver_dropped(reason),
            WorkerEvent::Failed(reason) => {
                self.report_failure(reason);
                self.teardown();
            }
            WorkerEvent::Stopped => self.teardown(),
        }
    }

    fn report_failure(&mut self, reason: String) {
        tracing::error!("Connection error: {}", reason);
        self.publish(BackendMessage::ConnectionError(reason));
    }

    fn worker_vanished(&mut self) {
        if self.session.is_some() {
            let reason = "serial worker exited unexpectedly".to_string();
            tracing::error!("{}", reason);
            self.publish(BackendMessage::ConnectionError(reason));
            self.teardown();
        }
    }

    fn deliver_line(&mut self, text: String, outcome: ParseOutcome) {
        self.stats.lines += 1;
        match outcome {
            ParseOutcome::Sample(sample) => {
                self.stats.samples += 1;
                self.publish(BackendMessage::Line(text));
                self.publish(BackendMessage::Sample(sample));
            }
            ParseOutcome::ParseError(e) => {
                self.stats.parse_errors += 1;
                let error = PanelError::from(e);
                tracing::warn!("Malformed telemetry '{}': {}", text, error);
                self.publish(BackendMessage::Line(text.clone()));
                self.publish(BackendMessage::ParseError {
                    line: text,
                    error: error.to_string(),
                });
            }
            ParseOutcome::NoMatch => self.publish(BackendMessage::Line(text)),
        }
    }

    fn deliver_dropped(&mut self, reason: String) {
        self.stats.dropped_lines += 1;
        self.publish(BackendMessage::LineDropped(reason));
    }

    /// Single exit path to `Disconnected`
    fn teardown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.running.store(false, Ordering::SeqCst);

        if let Some(handle) = session.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Serial worker panicked");
            }
        }

        // Lines read before the stop still belong to this session. A stop
        // request ends the worker with `Stopped`, so a queued `Failed` is a
        // port error that happened before it and is reported as one.
        while let Ok(event) = session.events.try_recv() {
            match event {
                WorkerEvent::Line { text, outcome } => self.deliver_line(text, outcome),
                WorkerEvent::Dropped(reason) => self.deliver_dropped(reason),
                WorkerEvent::Failed(reason) => self.report_failure(reason),
                WorkerEvent::Opened | WorkerEvent::Stopped => {}
            }
        }

        tracing::info!("Disconnected from {}", session.port_id);
        self.set_status(ConnectionStatus::Disconnected);
        self.refresh_ports();
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        self.publish(BackendMessage::ConnectionStatus(status));
    }

    fn publish(&mut self, msg: BackendMessage) {
        self.subscribers.retain(|tx| tx.send(msg.clone()).is_ok());
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}
