//! AD5933 Impedance Analyzer - Main Entry Point
//!
//! Opens the control panel window. Build with `--features mock-port` to list
//! a simulated analyzer next to the real serial ports.

use ad5933_panel::{
    backend::{ConnectionManager, PortOpener},
    config::{self, AppState},
    frontend::ImpedanceApp,
};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "ad5933-panel.log";

/// Console logging plus a daily rolling file in the app data directory
///
/// The returned guard flushes the file writer when dropped.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match config::ensure_app_data_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join(config::LOG_DIR), LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ad5933_panel=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if guard.is_none() {
        tracing::warn!("No app data directory; logging to stderr only");
    }
    guard
}

#[cfg(feature = "mock-port")]
fn port_opener() -> Arc<dyn PortOpener> {
    tracing::info!("Mock device enabled");
    Arc::new(ad5933_panel::backend::DemoPortOpener::default())
}

#[cfg(not(feature = "mock-port"))]
fn port_opener() -> Arc<dyn PortOpener> {
    Arc::new(ad5933_panel::backend::SystemPortOpener)
}

fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging();

    tracing::info!("Starting AD5933 Impedance Analyzer");

    let app_state = AppState::load_or_default();
    let manager = ConnectionManager::new(app_state.serial.clone(), port_opener());

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([900.0, 600.0])
            .with_title("AD5933 Impedance Analyzer"),
        ..Default::default()
    };

    eframe::run_native(
        "AD5933 Impedance Analyzer",
        native_options,
        Box::new(|cc| Ok(Box::new(ImpedanceApp::new(cc, manager, app_state)))),
    )
    .map_err(|e| anyhow::anyhow!("{}", e))
    .context("UI event loop failed")?;

    tracing::info!("Shutting down...");
    Ok(())
}
