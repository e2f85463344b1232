//! Mock construction and wait helpers

use super::test_timeout;
use ad5933_panel::backend::{
    BackendMessage, ConnectionManager, MockDevice, MockPortOpener, NotificationReceiver,
};
use ad5933_panel::config::SerialConfig;
use ad5933_panel::types::ConnectionStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A manager whose only ports are `devices`
pub fn create_test_manager(devices: &[MockDevice]) -> (ConnectionManager, NotificationReceiver) {
    let opener = devices
        .iter()
        .fold(MockPortOpener::new(), |opener, d| opener.with_device(d.clone()));
    let mut manager = ConnectionManager::new(SerialConfig::default(), Arc::new(opener));
    let rx = manager.subscribe();
    (manager, rx)
}

/// Poll until `done` returns true for a received message
///
/// Returns every message received, including the matching one.
pub fn collect_until(
    manager: &mut ConnectionManager,
    rx: &NotificationReceiver,
    mut done: impl FnMut(&BackendMessage) -> bool,
) -> Vec<BackendMessage> {
    let deadline = Instant::now() + test_timeout();
    let mut seen = Vec::new();
    loop {
        // One at a time, so messages after the match stay queued
        while let Some(msg) = rx.try_recv() {
            let finished = done(&msg);
            seen.push(msg);
            if finished {
                return seen;
            }
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for notification; saw {:?}",
            seen
        );
        manager.poll_timeout(Duration::from_millis(10));
    }
}

/// Poll until the manager reports `status`
pub fn wait_for_status(
    manager: &mut ConnectionManager,
    rx: &NotificationReceiver,
    status: ConnectionStatus,
) -> Vec<BackendMessage> {
    collect_until(manager, rx, |msg| *msg == BackendMessage::ConnectionStatus(status))
}

/// Connect and wait until the session is up
pub fn connect(manager: &mut ConnectionManager, rx: &NotificationReceiver, port: &str) -> Vec<BackendMessage> {
    manager.connect(port).expect("connect accepted");
    wait_for_status(manager, rx, ConnectionStatus::Connected)
}

/// Wait until the device has received `count` lines
pub fn wait_for_written(device: &MockDevice, count: usize) -> Vec<String> {
    let deadline = Instant::now() + test_timeout();
    while device.written_lines().len() < count {
        assert!(Instant::now() < deadline, "device saw {:?}", device.written_lines());
        std::thread::sleep(Duration::from_millis(5));
    }
    device.written_lines()
}

pub fn samples(messages: &[BackendMessage]) -> Vec<ad5933_panel::Sample> {
    messages
        .iter()
        .filter_map(|m| match m {
            BackendMessage::Sample(s) => Some(*s),
            _ => None,
        })
        .collect()
}

pub fn lines(messages: &[BackendMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            BackendMessage::Line(l) => Some(l.clone()),
            _ => None,
        })
        .collect()
}
