//! Serial Worker Thread Implementation
//!
//! This module contains the loop that runs in a separate thread and does
//! all blocking serial I/O. It communicates with the connection manager
//! through crossbeam channels.
//!
//! # Responsibilities
//!
//! The worker thread handles:
//!
//! - **Opening the port**: reports [`WorkerEvent::Opened`] or [`WorkerEvent::Failed`]
//! - **Reading lines**: every decoded line is parsed here, so the
//!   presentation thread receives the line together with its [`ParseOutcome`]
//! - **Writing commands**: queued command lines are written between reads
//! - **Closing the port**: always before the thread exits
//!
//! The worker never decides the connection state. It only reports what
//! happened; the [`ConnectionManager`](super::ConnectionManager) owns the
//! state machine.

use crate::backend::line_reader::{LineReader, ReadEvent};
use crate::backend::parser::{parse_line, ParseOutcome};
use crate::backend::port::PortOpener;
use crate::config::SerialConfig;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Events reported by the serial worker
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// The port is open and the read loop is starting
    Opened,
    /// A line was read and parsed
    Line { text: String, outcome: ParseOutcome },
    /// A line was discarded (decode failure or overflow)
    Dropped(String),
    /// Opening the port or serial I/O failed; the port is closed
    Failed(String),
    /// The loop ended because a stop was requested
    Stopped,
}

/// Serial I/O loop for one session
pub struct SerialWorker {
    /// Port to open
    port_id: String,
    /// Serial settings
    config: SerialConfig,
    /// How ports are opened
    opener: Arc<dyn PortOpener>,
    /// Cleared by the manager to request a stop
    running: Arc<AtomicBool>,
    /// Events to the manager
    events: Sender<WorkerEvent>,
    /// Command lines from the manager
    writes: Receiver<String>,
}

impl SerialWorker {
    /// Create a new serial worker
    pub fn new(
        port_id: impl Into<String>,
        config: SerialConfig,
        opener: Arc<dyn PortOpener>,
        running: Arc<AtomicBool>,
        events: Sender<WorkerEvent>,
        writes: Receiver<String>,
    ) -> Self {
        Self {
            port_id: port_id.into(),
            config,
            opener,
            running,
            events,
            writes,
        }
    }

    /// Run the worker until stopped or the port fails
    pub fn run(self) {
        tracing::info!("Serial worker started for {}", self.port_id);

        let mut reader = match LineReader::open(self.opener.as_ref(), &self.port_id, &self.config) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::error!("Failed to open {}: {}", self.port_id, e);
                self.send(WorkerEvent::Failed(e.to_string()));
                return;
            }
        };

        if !self.running.load(Ordering::SeqCst) {
            reader.close();
            self.send(WorkerEvent::Stopped);
            tracing::info!("Serial worker stopped before the session started");
            return;
        }

        self.send(WorkerEvent::Opened);

        let events = &self.events;
        let result = reader.read_loop(&self.running, &self.writes, |event| {
            let msg = match event {
                ReadEvent::Line(text) => {
                    let outcome = parse_line(&text);
                    tracing::debug!("RX {}", text);
                    WorkerEvent::Line { text, outcome }
                }
                ReadEvent::Dropped(reason) => {
                    tracing::warn!("Dropped line: {}", reason);
                    WorkerEvent::Dropped(reason)
                }
            };
            let _ = events.send(msg);
        });

        reader.close();

        match result {
            Ok(()) => self.send(WorkerEvent::Stopped),
            Err(e) => self.send(WorkerEvent::Failed(e.to_string())),
        }

        tracing::info!("Serial worker stopped for {}", self.port_id);
    }

    fn send(&self, event: WorkerEvent) {
        // The manager may already be gone during shutdown
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock_port::{MockDevice, MockPortOpener};
    use crate::types::Sample;
    use crossbeam_channel::{unbounded, RecvTimeoutError};
    use std::time::Duration;

    fn create_test_worker(
        opener: MockPortOpener,
        port_id: &str,
    ) -> (
        SerialWorker,
        Arc<AtomicBool>,
        Receiver<WorkerEvent>,
        Sender<String>,
    ) {
        let (event_tx, event_rx) = unbounded();
        let (write_tx, write_rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let worker = SerialWorker::new(
            port_id,
            SerialConfig::default(),
            Arc::new(opener),
            running.clone(),
            event_tx,
            write_rx,
        );

        (worker, running, event_rx, write_tx)
    }

    fn next(rx: &Receiver<WorkerEvent>) -> WorkerEvent {
        rx.recv_timeout(Duration::from_secs(2))
            .unwrap_or_else(|e: RecvTimeoutError| panic!("no worker event: {}", e))
    }

    #[test]
    fn test_open_failure_reports_failed() {
        let (worker, _running, rx, _tx) = create_test_worker(MockPortOpener::new(), "MISSING");
        worker.run();

        assert!(matches!(next(&rx), WorkerEvent::Failed(msg) if msg.contains("MISSING")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_before_start() {
        let device = MockDevice::new("MOCK0", "Mock");
        let (worker, running, rx, _tx) =
            create_test_worker(MockPortOpener::new().with_device(device.clone()), "MOCK0");

        running.store(false, Ordering::SeqCst);
        worker.run();

        assert_eq!(next(&rx), WorkerEvent::Stopped);
        assert_eq!(device.close_count(), 1);
    }

    #[test]
    fn test_lines_are_parsed_in_order() {
        let device = MockDevice::new("MOCK0", "Mock");
        let (worker, running, rx, _tx) =
            create_test_worker(MockPortOpener::new().with_device(device.clone()), "MOCK0");

        device.push_line("Conectado com sucesso");
        device.push_line("Freq: 1000.0 Hz | Z: 523.4 Ohm | Fase: -12.7 deg");
        device.push_bytes(b"\xff\n");

        let handle = std::thread::spawn(move || worker.run());

        assert_eq!(next(&rx), WorkerEvent::Opened);
        assert_eq!(
            next(&rx),
            WorkerEvent::Line {
                text: "Conectado com sucesso".to_string(),
                outcome: ParseOutcome::NoMatch,
            }
        );
        match next(&rx) {
            WorkerEvent::Line { outcome, .. } => {
                assert_eq!(outcome.sample(), Some(Sample::new(1000.0, 523.4, -12.7)))
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(next(&rx), WorkerEvent::Dropped(_)));

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        assert_eq!(next(&rx), WorkerEvent::Stopped);
        assert!(!device.is_open());
    }

    #[test]
    fn test_io_error_reports_failed_and_closes() {
        let device = MockDevice::new("MOCK0", "Mock");
        let (worker, _running, rx, _tx) =
            create_test_worker(MockPortOpener::new().with_device(device.clone()), "MOCK0");

        let handle = std::thread::spawn(move || worker.run());
        assert_eq!(next(&rx), WorkerEvent::Opened);

        device.fail_reads(std::io::ErrorKind::BrokenPipe);
        assert!(matches!(next(&rx), WorkerEvent::Failed(_)));
        handle.join().unwrap();

        assert_eq!(device.close_count(), 1);
    }

    #[test]
    fn test_queued_commands_are_written() {
        let device = MockDevice::new("MOCK0", "Mock");
        let (worker, running, rx, tx) =
            create_test_worker(MockPortOpener::new().with_device(device.clone()), "MOCK0");

        let handle = std::thread::spawn(move || worker.run());
        assert_eq!(next(&rx), WorkerEvent::Opened);

        tx.send("calibrate\n".to_string()).unwrap();
        tx.send("sweep\n".to_string()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while device.written_lines().len() < 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();
        assert_eq!(device.written_lines(), vec!["calibrate", "sweep"]);
    }
}
