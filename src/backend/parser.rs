//! Telemetry line parser
//!
//! Extracts (frequency, impedance, phase) triples from device output. The
//! firmware prints one line per sweep point, for example:
//!
//! ```text
//! Freq: 1000.0 Hz | Z: 523.4 Ohm | Fase: -12.7 deg
//! ```
//!
//! Fields must appear in that order; anything may sit between them. The
//! phase label is accepted as either `Fase:` or `Phase:`.
//!
//! Lines that do not have the telemetry shape are [`ParseOutcome::NoMatch`]
//! and are only logged. Lines with the shape but a malformed or empty number
//! are [`ParseOutcome::ParseError`]; the caller still forwards the raw line.

use crate::types::Sample;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const TELEMETRY_PATTERN: &str =
    r"Freq:\s*(\S*?)\s*Hz.*?Z:\s*(\S*?)\s*Ohm.*?(?:Fase|Phase):\s*(\S*?)\s*deg";

static TELEMETRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TELEMETRY_PATTERN).expect("telemetry pattern compiles"));

/// Which field of a telemetry line failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleField {
    Frequency,
    Impedance,
    Phase,
}

impl std::fmt::Display for SampleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleField::Frequency => write!(f, "frequency"),
            SampleField::Impedance => write!(f, "impedance"),
            SampleField::Phase => write!(f, "phase"),
        }
    }
}

/// A telemetry-shaped line carried a value that is not a usable number
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid {field} value '{text}': {reason}")]
pub struct SampleParseError {
    /// Field that failed
    pub field: SampleField,
    /// The captured text
    pub text: String,
    /// Why it was rejected
    pub reason: String,
}

/// Result of parsing one line
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The line is a well-formed telemetry record
    Sample(Sample),
    /// The line is not telemetry (status text, echoes, banners)
    NoMatch,
    /// The line looked like telemetry but a field was malformed
    ParseError(SampleParseError),
}

impl ParseOutcome {
    /// The sample, if one was extracted
    pub fn sample(&self) -> Option<Sample> {
        match self {
            ParseOutcome::Sample(s) => Some(*s),
            _ => None,
        }
    }
}

/// Parse a single decoded line
pub fn parse_line(line: &str) -> ParseOutcome {
    let Some(caps) = TELEMETRY_RE.captures(line) else {
        return ParseOutcome::NoMatch;
    };

    let field = |idx: usize| caps.get(idx).map(|m| m.as_str()).unwrap_or_default();

    let result = parse_number(SampleField::Frequency, field(1))
        .and_then(|freq| {
            if freq <= 0.0 {
                return Err(out_of_range(SampleField::Frequency, field(1), "must be > 0"));
            }
            Ok(freq)
        })
        .and_then(|freq| {
            let z = parse_number(SampleField::Impedance, field(2))?;
            if z < 0.0 {
                return Err(out_of_range(SampleField::Impedance, field(2), "must be >= 0"));
            }
            Ok((freq, z))
        })
        .and_then(|(freq, z)| {
            let phase = parse_number(SampleField::Phase, field(3))?;
            Ok(Sample::new(freq, z, phase))
        });

    match result {
        Ok(sample) => ParseOutcome::Sample(sample),
        Err(e) => ParseOutcome::ParseError(e),
    }
}

fn parse_number(field: SampleField, text: &str) -> Result<f64, SampleParseError> {
    if text.is_empty() {
        return Err(out_of_range(field, text, "missing value"));
    }
    let value: f64 = text.parse().map_err(|e: std::num::ParseFloatError| SampleParseError {
        field,
        text: text.to_string(),
        reason: e.to_string(),
    })?;

    if !value.is_finite() {
        return Err(out_of_range(field, text, "not a finite number"));
    }
    Ok(value)
}

fn out_of_range(field: SampleField, text: &str, reason: &str) -> SampleParseError {
    SampleParseError {
        field,
        text: text.to_string(),
        reason: reason.to_string(),
    }
}
