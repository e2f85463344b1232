//! Impedance and phase plots
//!
//! Draws every sweep curve twice: |Z| against frequency and phase against
//! frequency. The |Z| axis can be logarithmic; in that mode points are
//! plotted as log10(|Z|) and tick labels are mapped back to ohms.

use crate::config::PlotSettings;
use crate::frontend::state::SweepCurve;
use egui::{Color32, Ui};
use egui_plot::{Corner, GridMark, Legend, Line, Plot, Points};
use std::ops::RangeInclusive;

const PLOT_LINE_WIDTH: f32 = 1.5;
const MARKER_RADIUS: f32 = 2.0;

/// |Z| points on the plot's Y axis
///
/// In log mode, samples with non-positive impedance are left out.
pub fn impedance_series(curve: &SweepCurve, settings: &PlotSettings) -> Vec<[f64; 2]> {
    curve
        .impedance
        .iter()
        .filter_map(|[f, z]| settings.impedance_to_axis(*z).map(|y| [*f, y]))
        .collect()
}

/// Compact ohm label: 950, 1.5k, 12k, 3.3M
pub fn format_ohms(ohm: f64) -> String {
    let abs = ohm.abs();
    let (value, suffix) = if abs >= 1e6 {
        (ohm / 1e6, "M")
    } else if abs >= 1e3 {
        (ohm / 1e3, "k")
    } else {
        (ohm, "")
    };
    let text = if value.fract().abs() < 1e-9 {
        format!("{:.0}", value)
    } else if value.abs() >= 100.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    };
    format!("{}{}", text, suffix)
}

fn to_color(rgb: [u8; 3]) -> Color32 {
    Color32::from_rgb(rgb[0], rgb[1], rgb[2])
}

/// The pair of sweep plots
#[derive(Debug, Default)]
pub struct SweepPlots;

impl SweepPlots {
    pub fn new() -> Self {
        Self
    }

    /// Render both plots stacked, splitting the available height
    pub fn render(&self, ui: &mut Ui, curves: &[SweepCurve], settings: &PlotSettings) {
        let height = (ui.available_height() - ui.spacing().item_spacing.y) / 2.0;
        self.render_impedance(ui, curves, settings, height.max(120.0));
        self.render_phase(ui, curves, settings, height.max(120.0));
    }

    fn base_plot(&self, id: &str, settings: &PlotSettings, height: f32) -> Plot<'static> {
        let mut plot = Plot::new(id)
            .height(height)
            .allow_zoom(true)
            .allow_drag(true)
            .show_axes(true)
            .show_grid(true)
            .link_axis("sweep_frequency_axis", [true, false])
            .x_axis_label("Frequency (Hz)");

        if settings.show_legend {
            plot = plot.legend(
                Legend::default()
                    .position(Corner::RightTop)
                    .background_alpha(0.8),
            );
        }
        plot
    }

    fn render_impedance(&self, ui: &mut Ui, curves: &[SweepCurve], settings: &PlotSettings, height: f32) {
        let mut plot = self.base_plot("impedance_plot", settings, height);

        if settings.impedance_log_scale {
            let axis = settings.clone();
            plot = plot
                .y_axis_label("|Z| (Ohm, log)")
                .y_axis_formatter(move |mark: GridMark, _range: &RangeInclusive<f64>| {
                    format_ohms(axis.axis_to_impedance(mark.value))
                });
        } else {
            plot = plot
                .y_axis_label("|Z| (Ohm)")
                .y_axis_formatter(|mark: GridMark, _range: &RangeInclusive<f64>| format_ohms(mark.value));
        }

        plot.show(ui, |plot_ui| {
            for curve in curves {
                let points = impedance_series(curve, settings);
                if points.is_empty() {
                    continue;
                }
                let color = to_color(curve.color);
                if settings.show_markers {
                    plot_ui.points(
                        Points::new(curve.label.clone(), points.clone())
                            .color(color)
                            .radius(MARKER_RADIUS),
                    );
                }
                plot_ui.line(
                    Line::new(curve.label.clone(), points)
                        .color(color)
                        .width(PLOT_LINE_WIDTH),
                );
            }
        });
    }

    fn render_phase(&self, ui: &mut Ui, curves: &[SweepCurve], settings: &PlotSettings, height: f32) {
        let plot = self
            .base_plot("phase_plot", settings, height)
            .y_axis_label("Phase (deg)")
            .include_y(settings.phase_min)
            .include_y(settings.phase_max);

        plot.show(ui, |plot_ui| {
            for curve in curves {
                if curve.phase.is_empty() {
                    continue;
                }
                let color = to_color(curve.color);
                if settings.show_markers {
                    plot_ui.points(
                        Points::new(curve.label.clone(), curve.phase.clone())
                            .color(color)
                            .radius(MARKER_RADIUS),
                    );
                }
                plot_ui.line(
                    Line::new(curve.label.clone(), curve.phase.clone())
                        .color(color)
                        .width(PLOT_LINE_WIDTH),
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(points: &[(f64, f64)]) -> SweepCurve {
        SweepCurve {
            label: "Sweep 1".to_string(),
            color: [255, 255, 0],
            impedance: points.iter().map(|(f, z)| [*f, *z]).collect(),
            phase: Vec::new(),
        }
    }

    #[test]
    fn test_log_series_skips_non_positive() {
        let settings = PlotSettings::default();
        let series = impedance_series(&curve(&[(1000.0, 100.0), (2000.0, 0.0), (3000.0, 1e4)]), &settings);
        assert_eq!(series, vec![[1000.0, 2.0], [3000.0, 4.0]]);
    }

    #[test]
    fn test_linear_series_keeps_all() {
        let settings = PlotSettings {
            impedance_log_scale: false,
            ..PlotSettings::default()
        };
        let series = impedance_series(&curve(&[(1000.0, 100.0), (2000.0, 0.0)]), &settings);
        assert_eq!(series, vec![[1000.0, 100.0], [2000.0, 0.0]]);
    }

    #[test]
    fn test_format_ohms() {
        assert_eq!(format_ohms(950.0), "950");
        assert_eq!(format_ohms(1500.0), "1.5k");
        assert_eq!(format_ohms(10_000.0), "10k");
        assert_eq!(format_ohms(3_300_000.0), "3.3M");
        assert_eq!(format_ohms(12.34), "12.3");
    }
}
