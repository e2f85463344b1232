//! Frontend module for egui UI
//!
//! This module provides the main window using eframe/egui. It drives the
//! [`ConnectionManager`] from the UI thread: every frame it polls the
//! manager, applies the resulting notifications to [`PanelState`] and
//! renders.
//!
//! # Layout
//!
//! - Top: menu bar and connection bar
//! - Left: sweep form and hardware controls
//! - Bottom: log console and ingestion counters
//! - Center: |Z| and phase plots
//!
//! # Main Types
//!
//! - [`ImpedanceApp`] - Application state implementing [`eframe::App`]
//! - [`PanelState`] - Everything displayed, independent of egui
//! - [`SweepPlots`] - Plot rendering with egui_plot

mod panels;
mod plot;
pub mod state;

pub use panels::*;
pub use plot::{format_ohms, impedance_series, SweepPlots};
pub use state::{AppAction, LogBuffer, LogEntry, LogSource, PanelState, SweepCurve, SweepHistory};

use crate::backend::{Command, ConnectionManager, NotificationReceiver};
use crate::config::AppState;
use crate::types::ConnectionStatus;
use std::time::Duration;

/// Repaint interval while a session is open
const LIVE_REPAINT_INTERVAL: Duration = Duration::from_millis(30);

/// Main application
pub struct ImpedanceApp {
    manager: ConnectionManager,
    notifications: NotificationReceiver,
    state: PanelState,
    app_state: AppState,
    plots: SweepPlots,
}

impl ImpedanceApp {
    /// Create the app inside eframe
    pub fn new(cc: &eframe::CreationContext<'_>, manager: ConnectionManager, app_state: AppState) -> Self {
        if app_state.ui_preferences.dark_mode {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
        } else {
            cc.egui_ctx.set_visuals(egui::Visuals::light());
        }
        Self::with_manager(manager, app_state)
    }

    /// Create the app without a window, for tests and headless use
    pub fn with_manager(mut manager: ConnectionManager, app_state: AppState) -> Self {
        let notifications = manager.subscribe();
        let mut state = PanelState::new(&app_state);
        let ports = manager.refresh_ports();
        state.set_ports(ports);
        // The list was applied directly
        let _ = notifications.drain();

        Self {
            manager,
            notifications,
            state,
            app_state,
            plots: SweepPlots::new(),
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Poll the manager and apply every pending notification
    ///
    /// Returns true if anything changed.
    pub fn process_backend_messages(&mut self) -> bool {
        self.manager.poll();
        let messages = self.notifications.drain();
        let had_messages = !messages.is_empty();
        for msg in messages {
            self.state.apply(msg);
        }
        had_messages
    }

    /// Carry out an operator action
    pub fn handle_action(&mut self, action: AppAction) {
        tracing::debug!("Action: {:?}", action);
        match action {
            AppAction::Connect(port) => {
                self.state.selected_port = Some(port.clone());
                if let Err(e) = self.manager.connect(&port) {
                    tracing::warn!("Connect to {} refused: {}", port, e);
                    self.state.report_error(&e);
                }
            }
            AppAction::Disconnect => self.manager.disconnect(),
            AppAction::RefreshPorts => {
                self.manager.refresh_ports();
            }
            AppAction::Send(command) => {
                if let Err(e) = self.manager.send(&command) {
                    self.state.report_error(&e);
                }
            }
            AppAction::StartSweep => match self.manager.send(&Command::Sweep) {
                Ok(()) => self.state.begin_sweep(),
                Err(e) => self.state.report_error(&e),
            },
            AppAction::ClearPlots => self.state.clear_plots(),
            AppAction::ClearLog => self.state.log.clear(),
        }
    }

    /// Disconnect and persist preferences
    pub fn shutdown(&mut self) {
        self.manager.disconnect();
        self.state.store_into(&mut self.app_state);
        if let Err(e) = self.app_state.save() {
            tracing::warn!("Failed to save app state: {}", e);
        }
    }

    fn set_dark_mode(&mut self, ctx: &egui::Context, dark: bool) {
        self.app_state.ui_preferences.dark_mode = dark;
        ctx.set_visuals(if dark {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });
    }
}

impl eframe::App for ImpedanceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let had_messages = self.process_backend_messages();

        if had_messages {
            ctx.request_repaint();
        } else if self.state.status != ConnectionStatus::Disconnected {
            ctx.request_repaint_after(LIVE_REPAINT_INTERVAL);
        }

        let mut actions = Vec::new();

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close();
                    }
                });
                ui.menu_button("View", |ui| {
                    let mut dark = self.app_state.ui_preferences.dark_mode;
                    if ui.checkbox(&mut dark, "Dark mode").changed() {
                        self.set_dark_mode(ctx, dark);
                    }
                    if ui.button("Reset phase range").clicked() {
                        self.state.plot.reset_phase_range();
                        ui.close();
                    }
                });
            });
        });

        egui::TopBottomPanel::top("connection_bar").show(ctx, |ui| {
            actions.extend(ConnectionPanel::render(ui, &mut self.state));
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            StatsPanel::render(ui, &self.manager.stats());
        });

        egui::TopBottomPanel::bottom("log_panel")
            .resizable(true)
            .default_height(160.0)
            .show(ctx, |ui| {
                actions.extend(LogPanel::render(ui, &self.state));
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    actions.extend(SweepPanel::render(ui, &mut self.state));
                    ui.separator();
                    actions.extend(HardwarePanel::render(ui, &mut self.state));
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let curves = self.state.history.curves();
            self.plots.render(ui, &curves, &self.state.plot);
        });

        for action in actions {
            self.handle_action(action);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.shutdown();
    }
}
