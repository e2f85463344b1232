//! Line-oriented serial reader
//!
//! [`LineReader`] owns the open [`SerialLink`]. It splits the inbound byte
//! stream into text lines and performs outbound writes. The read loop runs
//! on the worker thread:
//!
//! 1. Write every queued outbound command.
//! 2. If bytes are waiting, read them and emit the completed lines.
//! 3. Otherwise wait briefly on the outbound queue, so commands go out
//!    promptly and a stop request is seen within milliseconds.
//!
//! Line handling ([`LineSplitter`]):
//!
//! - Lines end at `\n`; trailing whitespace (including `\r`) is removed.
//! - Empty lines are skipped.
//! - A line that is not valid UTF-8 is dropped and reported.
//! - A line longer than [`MAX_LINE_LEN`] bytes is dropped and reported;
//!   the rest of it, up to the next `\n`, is discarded.

use crate::backend::port::{PortOpener, SerialLink};
use crate::config::SerialConfig;
use crate::error::{PanelError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Longest line accepted before it is dropped
pub const MAX_LINE_LEN: usize = 4096;

/// How long the loop waits for outbound data when the port is idle
pub const IDLE_WAIT: Duration = Duration::from_millis(10);

const READ_CHUNK: usize = 1024;

/// Something the reader produced from the byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// A complete, decoded, non-empty line
    Line(String),
    /// A line that was discarded, with the reason
    Dropped(String),
}

/// Splits a byte stream into decoded lines
#[derive(Debug, Clone)]
pub struct LineSplitter {
    buf: Vec<u8>,
    max_len: usize,
    discarding: bool,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new(MAX_LINE_LEN)
    }
}

impl LineSplitter {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(256),
            max_len,
            discarding: false,
        }
    }

    /// Bytes of the current unterminated line
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Discard the unterminated remainder
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Consume `data`, appending completed lines to `out`
    pub fn push(&mut self, data: &[u8], out: &mut Vec<ReadEvent>) {
        for &byte in data {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    self.buf.clear();
                } else {
                    self.finish_line(out);
                }
                continue;
            }

            if self.discarding {
                continue;
            }

            self.buf.push(byte);
            if self.buf.len() > self.max_len {
                out.push(ReadEvent::Dropped(
                    PanelError::Decode(format!(
                        "line exceeded {} bytes without a terminator",
                        self.max_len
                    ))
                    .to_string(),
                ));
                self.buf.clear();
                self.discarding = true;
            }
        }
    }

    fn finish_line(&mut self, out: &mut Vec<ReadEvent>) {
        let bytes = std::mem::take(&mut self.buf);
        match String::from_utf8(bytes) {
            Ok(text) => {
                let trimmed = text.trim_end();
                if !trimmed.is_empty() {
                    out.push(ReadEvent::Line(trimmed.to_string()));
                }
            }
            Err(e) => {
                let reason = format!(
                    "invalid UTF-8 at byte {}: {}",
                    e.utf8_error().valid_up_to(),
                    String::from_utf8_lossy(e.as_bytes()).trim_end()
                );
                out.push(ReadEvent::Dropped(PanelError::Decode(reason).to_string()));
            }
        }
    }
}

/// Owner of the open port on the worker thread
pub struct LineReader {
    link: Option<Box<dyn SerialLink>>,
    port_id: String,
    splitter: LineSplitter,
}

impl LineReader {
    /// Open `port_id` through `opener`
    pub fn open(opener: &dyn PortOpener, port_id: &str, config: &SerialConfig) -> Result<Self> {
        let link = opener.open(port_id, config)?;
        Ok(Self::from_link(link))
    }

    /// Wrap an already open link
    pub fn from_link(link: Box<dyn SerialLink>) -> Self {
        Self {
            port_id: link.name().to_string(),
            link: Some(link),
            splitter: LineSplitter::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn port_id(&self) -> &str {
        &self.port_id
    }

    /// Write `text` in full
    pub fn write(&mut self, text: &str) -> Result<()> {
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| PanelError::WriteFailed("port is not open".to_string()))?;

        link.write_all(text.as_bytes())
            .map_err(|e| PanelError::WriteFailed(format!("{}: {}", self.port_id, e)))?;

        tracing::debug!("TX {}: {}", self.port_id, text.trim_end());
        Ok(())
    }

    /// Read whatever is waiting and split it into lines
    ///
    /// Returns the number of bytes consumed; 0 means the port was idle.
    pub fn read_available(&mut self, out: &mut Vec<ReadEvent>) -> Result<usize> {
        let link = self.link.as_mut().ok_or(PanelError::NotConnected)?;

        if link.bytes_to_read()? == 0 {
            return Ok(0);
        }

        let mut buf = [0u8; READ_CHUNK];
        let n = match link.read(&mut buf) {
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                0
            }
            Err(e) => return Err(e.into()),
        };

        self.splitter.push(&buf[..n], out);
        Ok(n)
    }

    /// Run until `running` is cleared or the port fails
    ///
    /// Commands received on `writes` are written in order. On a port error
    /// the port is closed before the error is returned.
    pub fn read_loop<F>(
        &mut self,
        running: &AtomicBool,
        writes: &Receiver<String>,
        mut on_event: F,
    ) -> Result<()>
    where
        F: FnMut(ReadEvent),
    {
        let mut events = Vec::new();
        let mut writes_open = true;

        let result = loop {
            if !running.load(Ordering::SeqCst) {
                break Ok(());
            }

            if let Err(e) = self.drain_writes(writes, &mut writes_open) {
                break Err(e);
            }

            let n = match self.read_available(&mut events) {
                Ok(n) => n,
                Err(e) => break Err(e),
            };
            for event in events.drain(..) {
                on_event(event);
            }

            if n == 0 {
                if writes_open {
                    match writes.recv_timeout(IDLE_WAIT) {
                        Ok(text) => {
                            if let Err(e) = self.write(&text) {
                                break Err(e);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => writes_open = false,
                    }
                } else {
                    std::thread::sleep(IDLE_WAIT);
                }
            }
        };

        if let Err(e) = &result {
            tracing::error!("Serial I/O on {} failed: {}", self.port_id, e);
            self.close();
        }
        result
    }

    fn drain_writes(&mut self, writes: &Receiver<String>, writes_open: &mut bool) -> Result<()> {
        while *writes_open {
            match writes.try_recv() {
                Ok(text) => self.write(&text)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => *writes_open = false,
            }
        }
        Ok(())
    }

    /// Release the port; returns false if it was already closed
    pub fn close(&mut self) -> bool {
        match self.link.take() {
            Some(link) => {
                drop(link);
                self.splitter.reset();
                tracing::info!("Closed serial port {}", self.port_id);
                true
            }
            None => false,
        }
    }
}

impl Drop for LineReader {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock_port::{MockDevice, MockPortOpener};
    use crossbeam_channel::unbounded;
    use proptest::prelude::*;

    fn split(chunks: &[&[u8]]) -> Vec<ReadEvent> {
        let mut splitter = LineSplitter::default();
        let mut out = Vec::new();
        for chunk in chunks {
            splitter.push(chunk, &mut out);
        }
        out
    }

    fn line(s: &str) -> ReadEvent {
        ReadEvent::Line(s.to_string())
    }

    fn open_mock() -> (MockDevice, LineReader) {
        let device = MockDevice::new("MOCK0", "Mock");
        let opener = MockPortOpener::new().with_device(device.clone());
        let reader = LineReader::open(&opener, "MOCK0", &SerialConfig::default()).unwrap();
        (device, reader)
    }

    #[test]
    fn test_split_lines_across_chunks() {
        let events = split(&[b"Freq: 1000", b".0 Hz\r\nsecond", b" line\n"]);
        assert_eq!(events, vec![line("Freq: 1000.0 Hz"), line("second line")]);
    }

    #[test]
    fn test_empty_and_whitespace_lines_skipped() {
        let events = split(&[b"\n\r\n   \nok  \t\r\n"]);
        assert_eq!(events, vec![line("ok")]);
    }

    #[test]
    fn test_leading_whitespace_kept() {
        assert_eq!(split(&[b"  indented\n"]), vec![line("  indented")]);
    }

    #[test]
    fn test_invalid_utf8_dropped_stream_continues() {
        let events = split(&[b"good\n\xff\xfebad\nafter\n"]);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], line("good"));
        assert!(matches!(&events[1], ReadEvent::Dropped(r) if r.contains("UTF-8")));
        assert_eq!(events[2], line("after"));
    }

    #[test]
    fn test_overlong_line_dropped_once() {
        let mut splitter = LineSplitter::new(8);
        let mut out = Vec::new();
        splitter.push(b"0123456789abcdef", &mut out);
        splitter.push(b"more garbage\nnext\n", &mut out);

        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], ReadEvent::Dropped(_)));
        assert_eq!(out[1], line("next"));
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn test_unterminated_tail_is_pending() {
        let mut splitter = LineSplitter::default();
        let mut out = Vec::new();
        splitter.push(b"partial", &mut out);
        assert!(out.is_empty());
        assert_eq!(splitter.pending_len(), 7);
        splitter.reset();
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn test_write_and_close() {
        let (device, mut reader) = open_mock();
        assert!(reader.is_open());

        reader.write("status\n").unwrap();
        assert_eq!(device.written_text(), "status\n");

        assert!(reader.close());
        assert!(!reader.close());
        assert_eq!(device.close_count(), 1);
        assert!(matches!(reader.write("x\n"), Err(PanelError::WriteFailed(_))));
    }

    #[test]
    fn test_write_os_error_is_write_failed() {
        let (device, mut reader) = open_mock();
        device.fail_writes(io::ErrorKind::BrokenPipe);
        assert!(matches!(reader.write("sweep\n"), Err(PanelError::WriteFailed(_))));
    }

    #[test]
    fn test_read_loop_delivers_lines_and_writes() {
        let (device, mut reader) = open_mock();
        let running = AtomicBool::new(true);
        let (tx, rx) = unbounded();

        device.push_line("hello");
        device.push_line("world");
        tx.send("calibrate\n".to_string()).unwrap();

        let mut seen = Vec::new();
        reader
            .read_loop(&running, &rx, |event| {
                seen.push(event);
                if seen.len() == 2 {
                    running.store(false, Ordering::SeqCst);
                }
            })
            .unwrap();

        assert_eq!(seen, vec![line("hello"), line("world")]);
        assert_eq!(device.written_lines(), vec!["calibrate"]);
        assert!(reader.is_open());
    }

    #[test]
    fn test_read_loop_io_error_closes_port() {
        let (device, mut reader) = open_mock();
        let running = AtomicBool::new(true);
        let (_tx, rx) = unbounded::<String>();

        device.fail_reads(io::ErrorKind::BrokenPipe);
        let result = reader.read_loop(&running, &rx, |_| {});

        assert!(matches!(result, Err(PanelError::Io(_))));
        assert!(!reader.is_open());
        assert_eq!(device.close_count(), 1);
    }

    #[test]
    fn test_read_loop_write_failure_ends_loop() {
        let (device, mut reader) = open_mock();
        let running = AtomicBool::new(true);
        let (tx, rx) = unbounded();

        device.fail_writes(io::ErrorKind::BrokenPipe);
        tx.send("sweep\n".to_string()).unwrap();

        let result = reader.read_loop(&running, &rx, |_| {});
        assert!(matches!(result, Err(PanelError::WriteFailed(_))));
        assert!(!reader.is_open());
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_lines(
            lines in prop::collection::vec("[a-zA-Z0-9:.| -]{1,40}", 0..20),
            split_at in prop::collection::vec(0usize..400, 0..10),
        ) {
            let stream: Vec<u8> = lines.iter().flat_map(|l| format!("{}\r\n", l).into_bytes()).collect();

            let whole = split(&[stream.as_slice()]);

            let mut cuts: Vec<usize> = split_at.into_iter().map(|c| c.min(stream.len())).collect();
            cuts.sort_unstable();
            let mut chunks: Vec<&[u8]> = Vec::new();
            let mut start = 0;
            for cut in cuts {
                chunks.push(&stream[start..cut]);
                start = cut;
            }
            chunks.push(&stream[start..]);

            prop_assert_eq!(split(&chunks), whole.clone());

            let expected: Vec<ReadEvent> = lines
                .iter()
                .map(|l| l.trim_end())
                .filter(|l| !l.is_empty())
                .map(line)
                .collect();
            prop_assert_eq!(whole, expected);
        }
    }
}
