//! Runtime settings that can be modified during application execution
//!
//! These settings control how the two plots are drawn. They are owned by
//! the presentation thread and are seeded from [`super::UiPreferences`].
//!
//! # Main Types
//!
//! - [`PlotSettings`] - Axis options for the impedance and phase plots
//! - [`CURVE_PALETTE`] - Colors assigned to successive sweeps

use serde::{Deserialize, Serialize};

/// Colors for sweep curves, assigned in order and cycled
pub const CURVE_PALETTE: [[u8; 3]; 8] = [
    [255, 255, 0],
    [0, 255, 255],
    [255, 0, 255],
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [100, 100, 255],
    [255, 100, 100],
];

/// Default phase axis range in degrees
pub const DEFAULT_PHASE_RANGE: (f64, f64) = (-100.0, 100.0);

/// Color for the `index`-th sweep since the last clear
pub fn curve_color(index: usize) -> [u8; 3] {
    CURVE_PALETTE[index % CURVE_PALETTE.len()]
}

/// Plot display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSettings {
    /// Draw |Z| on a log10 axis
    pub impedance_log_scale: bool,

    /// Visible phase range in degrees
    pub phase_min: f64,
    pub phase_max: f64,

    /// Show the curve legend
    pub show_legend: bool,

    /// Draw markers at each sample
    pub show_markers: bool,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            impedance_log_scale: true,
            phase_min: DEFAULT_PHASE_RANGE.0,
            phase_max: DEFAULT_PHASE_RANGE.1,
            show_legend: true,
            show_markers: true,
        }
    }
}

impl PlotSettings {
    /// Settings seeded from persisted preferences
    pub fn from_preferences(prefs: &super::UiPreferences) -> Self {
        Self {
            impedance_log_scale: prefs.impedance_log_scale,
            ..Self::default()
        }
    }

    /// Map an impedance value onto the plot's Y axis
    ///
    /// Non-positive values have no log10 and return `None`.
    pub fn impedance_to_axis(&self, ohm: f64) -> Option<f64> {
        if self.impedance_log_scale {
            (ohm > 0.0).then(|| ohm.log10())
        } else {
            Some(ohm)
        }
    }

    /// Inverse of [`Self::impedance_to_axis`], for tick labels
    pub fn axis_to_impedance(&self, y: f64) -> f64 {
        if self.impedance_log_scale {
            10f64.powf(y)
        } else {
            y
        }
    }

    /// Restore the default phase range
    pub fn reset_phase_range(&mut self) {
        self.phase_min = DEFAULT_PHASE_RANGE.0;
        self.phase_max = DEFAULT_PHASE_RANGE.1;
    }
}
