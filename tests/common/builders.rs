//! Test data builders for telemetry text

/// Builder for telemetry lines as the board prints them
pub struct TelemetryLineBuilder {
    frequency: String,
    impedance: String,
    phase: String,
    phase_label: &'static str,
}

impl TelemetryLineBuilder {
    pub fn new() -> Self {
        Self {
            frequency: "1000.0".to_string(),
            impedance: "523.4".to_string(),
            phase: "-12.7".to_string(),
            phase_label: "Fase",
        }
    }

    pub fn frequency(mut self, text: impl ToString) -> Self {
        self.frequency = text.to_string();
        self
    }

    pub fn impedance(mut self, text: impl ToString) -> Self {
        self.impedance = text.to_string();
        self
    }

    pub fn phase(mut self, text: impl ToString) -> Self {
        self.phase = text.to_string();
        self
    }

    /// Use the English "Phase" label
    pub fn english(mut self) -> Self {
        self.phase_label = "Phase";
        self
    }

    pub fn build(self) -> String {
        format!(
            "Freq: {} Hz | Z: {} Ohm | {}: {} deg",
            self.frequency, self.impedance, self.phase_label, self.phase
        )
    }
}

impl Default for TelemetryLineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_builder() {
        let line = TelemetryLineBuilder::new().frequency(2000).phase("1.5").english().build();
        assert_eq!(line, "Freq: 2000 Hz | Z: 523.4 Ohm | Phase: 1.5 deg");
    }
}
