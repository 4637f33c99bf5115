//! Pulse-train preview.
//!
//! Builds the plot description shown next to the TTL fields: one trace per
//! device, x in samples, y the digital level. The plot is handed to a
//! [`PreviewSink`]; drawing it is the sink's business.

use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};
use crate::units::DISPLAY_PER_SECOND;

/// Fixed y range of the preview, a little wider than the 0..1 logic levels.
pub const PREVIEW_Y_RANGE: (f64, f64) = (-0.1, 1.1);

/// One trace of the preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewSeries {
    /// Sample indices.
    pub x: Vec<f64>,
    /// Signal level per sample.
    pub y: Vec<f64>,
    /// Trace color, e.g. "#00ffff".
    pub color: String,
}

/// Everything a renderer needs to draw the preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewPlot {
    /// One trace per TTL device.
    pub series: Vec<PreviewSeries>,
    /// Visible y range, [`PREVIEW_Y_RANGE`].
    pub y_range: (f64, f64),
    /// Multiply sample indices by this to get display time (ms).
    pub x_scale: f64,
}

impl PreviewPlot {
    /// X values of series `index` in the display time unit.
    #[must_use]
    pub fn scaled_x(&self, index: usize) -> Option<Vec<f64>> {
        self.series
            .get(index)
            .map(|series| series.x.iter().map(|x| x * self.x_scale).collect())
    }
}

/// Receives rendered previews.
pub trait PreviewSink {
    /// Draw `plot`, replacing whatever was shown before.
    fn render(&mut self, plot: &PreviewPlot);
}

/// Sink that keeps the latest plot. Useful for headless front ends and tests.
#[derive(Debug, Default)]
pub struct CapturedPreview {
    /// Most recent plot.
    pub last: Option<PreviewPlot>,
    /// Number of plots received.
    pub renders: usize,
}

impl PreviewSink for CapturedPreview {
    fn render(&mut self, plot: &PreviewPlot) {
        self.last = Some(plot.clone());
        self.renders += 1;
    }
}

/// Validate the preview inputs and hand the plot to `sink`.
///
/// `areas`, `signals` and `colors` run in parallel, one entry per trace, and
/// must have equal lengths. Nothing is rendered when validation fails.
pub fn plot_signal_graph<S: AsRef<str>>(
    sink: &mut dyn PreviewSink,
    areas: &[Vec<f64>],
    signals: &[Vec<f64>],
    colors: &[S],
    sample_rate: f64,
) -> ScanResult<()> {
    if areas.len() != signals.len() || signals.len() != colors.len() {
        return Err(ScanError::ShapeMismatch {
            areas: areas.len(),
            signals: signals.len(),
            colors: colors.len(),
        });
    }
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(ScanError::InvalidSampleRate(sample_rate));
    }

    let mut series = Vec::with_capacity(areas.len());
    for (index, ((x, y), color)) in areas.iter().zip(signals).zip(colors).enumerate() {
        if x.len() != y.len() {
            return Err(ScanError::SeriesLengthMismatch {
                index,
                area_points: x.len(),
                signal_points: y.len(),
            });
        }
        series.push(PreviewSeries {
            x: x.clone(),
            y: y.clone(),
            color: color.as_ref().to_string(),
        });
    }

    let plot = PreviewPlot {
        series,
        y_range: PREVIEW_Y_RANGE,
        x_scale: DISPLAY_PER_SECOND / sample_rate,
    };
    tracing::debug!(traces = plot.series.len(), x_scale = plot.x_scale, "rendering pulse preview");
    sink.render(&plot);
    Ok(())
}

/// Sample indices `0..n` as plot x values.
#[must_use]
pub fn sample_area(samples: usize) -> Vec<f64> {
    (0..samples).map(|i| i as f64).collect()
}
