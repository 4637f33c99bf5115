//! Custom error types for the scan timing model.
//!
//! This module defines `ScanError`, the single error type returned by every
//! fallible operation of the model. Using the `thiserror` crate, it keeps the
//! failure kinds explicit so the surrounding GUI can turn them into user-facing
//! messages instead of crashing.
//!
//! ## Error Hierarchy
//!
//! - **`Parse`**: text that should hold a number (or a comma-separated list of
//!   numbers) does not. Also used for non-finite values handed to a setter.
//! - **`Computation`**: a derived quantity cannot be computed, most notably the
//!   pixel count of an axis whose step size is zero.
//! - **`ShapeMismatch`** / **`SeriesLengthMismatch`** / **`InvalidSampleRate`**:
//!   malformed arguments to the pulse preview renderer.
//! - **`PreviewTooLarge`**: a dwell time and sample rate whose product is too
//!   many samples to render.
//! - **`UnknownAxis`** / **`UnknownDevice`** / **`ScanDimOutOfRange`**: lookups
//!   referencing something outside the configured hardware set.
//! - **`UnpairedPulses`** / **`InvalidPulse`** / **`InvalidSeqTime`**: timing
//!   descriptions that cannot drive hardware.
//!
//! None of these are fatal. A call that fails leaves previously stored state
//! untouched.

use thiserror::Error;

/// Convenience alias for results using the scan error type.
pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Failure of a scan model operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Text or value that is not a usable number.
    #[error("Cannot parse '{text}' as a number for {field}")]
    Parse {
        /// Field being edited, e.g. "size of X".
        field: String,
        /// Offending input.
        text: String,
    },

    /// A derived quantity has no valid value.
    #[error("Cannot derive pixel count for axis '{axis}': {reason}")]
    Computation {
        /// Axis the quantity belongs to.
        axis: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Preview inputs of different lengths.
    #[error(
        "Arguments \"areas\", \"signals\" and \"colors\" must be of equal length \
         (got {areas}, {signals}, {colors})"
    )]
    ShapeMismatch {
        /// Number of x-value series.
        areas: usize,
        /// Number of signal series.
        signals: usize,
        /// Number of colors.
        colors: usize,
    },

    /// One preview trace whose x and y lengths differ.
    #[error("Preview series {index} has {area_points} x-values but {signal_points} samples")]
    SeriesLengthMismatch {
        /// Position of the trace.
        index: usize,
        /// Length of its x values.
        area_points: usize,
        /// Length of its samples.
        signal_points: usize,
    },

    /// Sample rate that is zero, negative or not finite.
    #[error("Sample rate must be finite and positive, got {0}")]
    InvalidSampleRate(f64),

    /// Preview cycle with more samples than [`crate::pulse::MAX_PREVIEW_SAMPLES`].
    #[error("Preview of {samples} samples exceeds the limit of {limit}")]
    PreviewTooLarge {
        /// Requested sample count, `seq_time * sample_rate`.
        samples: f64,
        /// Largest accepted sample count.
        limit: usize,
    },

    /// Axis name that is not a configured positioner.
    #[error("Unknown axis '{0}'")]
    UnknownAxis(String),

    /// Device name that is not a configured TTL line.
    #[error("Unknown TTL device '{0}'")]
    UnknownDevice(String),

    /// Scan dimension index past the last dimension.
    #[error("Scan dimension index {index} out of range ({count} dimensions configured)")]
    ScanDimOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of dimensions.
        count: usize,
    },

    /// Start and end lists of different lengths.
    #[error("Device '{device}' has {starts} pulse starts but {ends} pulse ends")]
    UnpairedPulses {
        /// TTL device name.
        device: String,
        /// Number of starts.
        starts: usize,
        /// Number of ends.
        ends: usize,
    },

    /// A start/end pair that cannot describe a pulse.
    #[error("Invalid pulse {index} on device '{device}': {reason}")]
    InvalidPulse {
        /// TTL device name.
        device: String,
        /// Position of the pair in the lists.
        index: usize,
        /// Human-readable cause.
        reason: String,
    },

    /// Dwell time that is zero, negative or not finite.
    #[error("Sequence time must be positive, got {0} s")]
    InvalidSeqTime(f64),
}

impl ScanError {
    pub(crate) fn parse(field: impl Into<String>, text: impl Into<String>) -> Self {
        ScanError::Parse {
            field: field.into(),
            text: text.into(),
        }
    }

    /// True for errors caused by malformed user text.
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, ScanError::Parse { .. })
    }
}
