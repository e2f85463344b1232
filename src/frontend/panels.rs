//! Panel components for the frontend UI
//!
//! Each panel renders one area of the window and returns the
//! [`AppAction`]s the operator triggered. Panels never talk to the backend.
//!
//! # Panels
//!
//! - [`ConnectionPanel`] - Port selector, connect button and status dot
//! - [`SweepPanel`] - Sweep parameters and the configure/calibrate/sweep buttons
//! - [`HardwarePanel`] - DAC, potentiometer, multiplexer and master clock controls
//! - [`LogPanel`] - Scrolling console of device lines and sent commands
//! - [`StatsPanel`] - Ingestion counters

use crate::backend::{Command, MuxChannel};
use crate::error::Result;
use crate::frontend::state::{hardware_hints, AppAction, LogSource, PanelState};
use crate::types::{ConnectionStatus, IngestStats};
use egui::{Color32, RichText, Ui};

const FIELD_WIDTH: f32 = 80.0;

/// Push the command for a form field, or report why it did not parse
fn push_command(state: &mut PanelState, actions: &mut Vec<AppAction>, command: Result<Command>) {
    match command {
        Ok(cmd) => actions.push(AppAction::Send(cmd)),
        Err(e) => state.report_error(&e),
    }
}

/// Renders the connection bar
pub struct ConnectionPanel;

impl ConnectionPanel {
    pub fn render(ui: &mut Ui, state: &mut PanelState) -> Vec<AppAction> {
        let mut actions = Vec::new();

        ui.horizontal(|ui| {
            let (status_text, status_color) = match state.status {
                ConnectionStatus::Disconnected => ("Disconnected", Color32::GRAY),
                ConnectionStatus::Connecting => ("Connecting...", Color32::YELLOW),
                ConnectionStatus::Connected => ("Connected", Color32::GREEN),
            };
            ui.colored_label(status_color, format!("● {}", status_text));

            ui.separator();

            ui.label("Port:");
            let selected_text = state
                .selected_port
                .as_ref()
                .and_then(|id| state.ports.iter().find(|p| &p.port_id == id))
                .map(|p| p.display_name())
                .or_else(|| state.selected_port.clone())
                .unwrap_or_else(|| "No ports found".to_string());

            let editable = state.status == ConnectionStatus::Disconnected;
            ui.add_enabled_ui(editable, |ui| {
                egui::ComboBox::from_id_salt("port_selector")
                    .width(260.0)
                    .selected_text(selected_text)
                    .show_ui(ui, |ui| {
                        for port in &state.ports {
                            let selected = state.selected_port.as_deref() == Some(port.port_id.as_str());
                            let response = ui.selectable_label(selected, port.display_name());
                            let response = match &port.hardware_id {
                                Some(hwid) => response.on_hover_text(hwid),
                                None => response,
                            };
                            if response.clicked() {
                                state.selected_port = Some(port.port_id.clone());
                            }
                        }
                    });

                if ui.button("🔄").on_hover_text("Refresh ports").clicked() {
                    actions.push(AppAction::RefreshPorts);
                }
            });

            match state.status {
                ConnectionStatus::Disconnected => {
                    let can_connect = state.selected_port.is_some();
                    if ui
                        .add_enabled(can_connect, egui::Button::new("🔌 Connect"))
                        .clicked()
                    {
                        if let Some(port) = state.selected_port.clone() {
                            actions.push(AppAction::Connect(port));
                        }
                    }
                }
                ConnectionStatus::Connecting => {
                    ui.add_enabled(false, egui::Button::new("⏳ Connecting..."));
                    if ui.button("Cancel").clicked() {
                        actions.push(AppAction::Disconnect);
                    }
                }
                ConnectionStatus::Connected => {
                    if ui.button("🔌 Disconnect").clicked() {
                        actions.push(AppAction::Disconnect);
                    }
                }
            }

            if let Some(error) = state.last_error.clone() {
                ui.separator();
                ui.colored_label(Color32::LIGHT_RED, error);
                if ui.small_button("✕").clicked() {
                    state.last_error = None;
                }
            }
        });

        actions
    }
}

/// Renders the sweep parameter form and sweep actions
pub struct SweepPanel;

impl SweepPanel {
    pub fn render(ui: &mut Ui, state: &mut PanelState) -> Vec<AppAction> {
        let mut actions = Vec::new();
        let enabled = state.controls_enabled();

        ui.heading("Sweep");
        egui::Grid::new("sweep_form")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                let form = &mut state.sweep_form;
                for (label, field) in [
                    ("Start frequency (Hz)", &mut form.start_hz),
                    ("Increment (Hz)", &mut form.increment_hz),
                    ("Increments", &mut form.num_increments),
                    ("Reference (Ohm)", &mut form.ref_resistor_ohm),
                ] {
                    ui.label(label);
                    ui.add(egui::TextEdit::singleline(field).desired_width(FIELD_WIDTH));
                    ui.end_row();
                }
            });

        ui.add_space(4.0);
        ui.add_enabled_ui(enabled, |ui| {
            ui.horizontal_wrapped(|ui| {
                if ui.button("Configure").clicked() {
                    let command = state.sweep_form.to_command();
                    push_command(state, &mut actions, command);
                }
                if ui.button("Calibrate").clicked() {
                    actions.push(AppAction::Send(Command::Calibrate));
                }
                if ui.button("▶ Sweep").clicked() {
                    actions.push(AppAction::StartSweep);
                }
            });
            ui.horizontal_wrapped(|ui| {
                if ui.button("Status").clicked() {
                    actions.push(AppAction::Send(Command::GetStatus));
                }
                if ui.button("Reset").clicked() {
                    actions.push(AppAction::Send(Command::Reset));
                }
            });
        });

        ui.separator();
        ui.horizontal(|ui| {
            ui.checkbox(&mut state.plot.impedance_log_scale, "Log |Z|");
            ui.checkbox(&mut state.plot.show_markers, "Markers");
            ui.checkbox(&mut state.plot.show_legend, "Legend");
        });
        if ui.button("🗑 Clear plots").clicked() {
            actions.push(AppAction::ClearPlots);
        }

        actions
    }
}

/// Renders the manual hardware controls
pub struct HardwarePanel;

impl HardwarePanel {
    pub fn render(ui: &mut Ui, state: &mut PanelState) -> Vec<AppAction> {
        let mut actions = Vec::new();
        let enabled = state.controls_enabled();
        let [dac_hint, pot_hint, mux_hint] = hardware_hints();

        ui.heading("Hardware");
        ui.add_enabled_ui(enabled, |ui| {
            egui::Grid::new("hardware_form")
                .num_columns(3)
                .spacing([8.0, 4.0])
                .show(ui, |ui| {
                    ui.label("DAC");
                    ui.add(
                        egui::TextEdit::singleline(&mut state.hardware_form.dac)
                            .desired_width(FIELD_WIDTH)
                            .hint_text(dac_hint.1.as_str()),
                    );
                    if ui.button("Set").clicked() {
                        let command = state.hardware_form.dac_command();
                        push_command(state, &mut actions, command);
                    }
                    ui.end_row();

                    ui.label("POT");
                    ui.add(
                        egui::TextEdit::singleline(&mut state.hardware_form.pot)
                            .desired_width(FIELD_WIDTH)
                            .hint_text(pot_hint.1.as_str()),
                    );
                    if ui.button("Set").clicked() {
                        let command = state.hardware_form.pot_command();
                        push_command(state, &mut actions, command);
                    }
                    ui.end_row();

                    for (label, channel) in [("MUX1", MuxChannel::Mux1), ("MUX2", MuxChannel::Mux2)] {
                        ui.label(label);
                        let field = match channel {
                            MuxChannel::Mux1 => &mut state.hardware_form.mux1,
                            MuxChannel::Mux2 => &mut state.hardware_form.mux2,
                        };
                        ui.add(
                            egui::TextEdit::singleline(field)
                                .desired_width(FIELD_WIDTH)
                                .hint_text(mux_hint.1.as_str()),
                        );
                        if ui.button("Set").clicked() {
                            let command = state.hardware_form.mux_command(channel);
                            push_command(state, &mut actions, command);
                        }
                        ui.end_row();
                    }

                    ui.label("MCLK");
                    ui.add(
                        egui::TextEdit::singleline(&mut state.hardware_form.master_clock)
                            .desired_width(FIELD_WIDTH)
                            .hint_text("pin,freq or 0"),
                    );
                    if ui.button("Set").clicked() {
                        let command = state.hardware_form.master_clock_command();
                        push_command(state, &mut actions, command);
                    }
                    ui.end_row();
                });

            if ui.button("Apply hardware config").clicked() {
                match state.hardware_form.apply_commands() {
                    Ok(commands) => actions.extend(commands.into_iter().map(AppAction::Send)),
                    Err(e) => state.report_error(&e),
                }
            }
        });

        actions
    }
}

/// Renders the log console
pub struct LogPanel;

impl LogPanel {
    pub fn render(ui: &mut Ui, state: &PanelState) -> Vec<AppAction> {
        let mut actions = Vec::new();

        ui.horizontal(|ui| {
            ui.label(RichText::new("Log").strong());
            ui.label(format!("({} lines)", state.log.len()));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("Clear").clicked() {
                    actions.push(AppAction::ClearLog);
                }
            });
        });

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for entry in state.log.iter() {
                    let color = match entry.source {
                        LogSource::Device => ui.visuals().text_color(),
                        LogSource::Command => Color32::LIGHT_BLUE,
                        LogSource::Info => Color32::GRAY,
                        LogSource::Error => Color32::LIGHT_RED,
                    };
                    ui.label(RichText::new(entry.display_text()).monospace().color(color));
                }
            });

        actions
    }
}

/// Renders the ingestion counters
pub struct StatsPanel;

impl StatsPanel {
    pub fn render(ui: &mut Ui, stats: &IngestStats) {
        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("Lines: {}", stats.lines)).monospace());
            ui.separator();
            ui.label(RichText::new(format!("Samples: {}", stats.samples)).monospace());
            ui.separator();

            let error_color = if stats.parse_errors + stats.dropped_lines > 0 {
                Color32::LIGHT_RED
            } else {
                Color32::GRAY
            };
            ui.colored_label(
                error_color,
                format!("Errors: {} / Dropped: {}", stats.parse_errors, stats.dropped_lines),
            );
            ui.separator();
            ui.label(RichText::new(format!("Sent: {}", stats.commands_sent)).monospace());
        });
    }
}
