//! Display/storage unit conversion and text parsing for scan parameters.
//!
//! Times are stored in seconds and shown to the user in milliseconds. Lengths
//! are micrometers throughout. Every value shown in a text field is rounded to
//! [`DISPLAY_DECIMALS`] decimal places.

use crate::error::{ScanError, ScanResult};

/// Display units per storage unit (ms per s).
pub const DISPLAY_PER_SECOND: f64 = 1000.0;

/// Decimal places kept when a value is written back to a text field.
pub const DISPLAY_DECIMALS: i32 = 3;

/// Separator between entries of a pulse list.
pub const LIST_SEPARATOR: char = ',';

/// Round to `decimals` places, ties to even.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Round a value the way it appears in a text field.
#[must_use]
pub fn round_display(value: f64) -> f64 {
    round_to(value, DISPLAY_DECIMALS)
}

/// Seconds to the rounded display unit.
#[must_use]
pub fn seconds_to_display(seconds: f64) -> f64 {
    round_display(seconds * DISPLAY_PER_SECOND)
}

/// Display unit to seconds.
#[must_use]
pub fn display_to_seconds(value: f64) -> f64 {
    value / DISPLAY_PER_SECOND
}

/// Seconds value after one trip through a text field.
#[must_use]
pub fn quantize_seconds(seconds: f64) -> f64 {
    display_to_seconds(seconds_to_display(seconds))
}

/// Reject NaN and infinities.
pub fn ensure_finite(field: &str, value: f64) -> ScanResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ScanError::parse(field, value.to_string()))
    }
}

/// Parse a single finite number. Surrounding whitespace is ignored.
pub fn parse_number(field: &str, text: &str) -> ScanResult<f64> {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ScanError::parse(field, text)),
    }
}

/// Parse a comma-separated list where empty entries stand for "no value".
///
/// Empty text yields a single empty slot, mirroring how a cleared field
/// splits into one empty token.
pub fn parse_optional_list(field: &str, text: &str) -> ScanResult<Vec<Option<f64>>> {
    text.split(LIST_SEPARATOR)
        .map(|token| {
            if token.trim().is_empty() {
                Ok(None)
            } else {
                parse_number(field, token).map(Some)
            }
        })
        .collect()
}

/// Format a number for a text field: rounded, always with a decimal point.
#[must_use]
pub fn format_number(value: f64) -> String {
    let value = round_display(value);
    // Avoid "-0.0" in the field
    let value = if value == 0.0 { 0.0 } else { value };
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Format a seconds list in the display unit. Empty slots become empty tokens.
#[must_use]
pub fn format_seconds_list(values: &[Option<f64>]) -> String {
    values
        .iter()
        .map(|value| match value {
            Some(seconds) => format_number(seconds * DISPLAY_PER_SECOND),
            None => String::new(),
        })
        .collect::<Vec<_>>()
        .join(&LIST_SEPARATOR.to_string())
}
