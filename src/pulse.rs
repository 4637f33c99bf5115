//! TTL pulse trains: per-device start/end times within one sequence cycle.
//!
//! Times are stored in seconds. The user enters them in the device time unit
//! (milliseconds), as comma-separated lists in which an empty entry means "no
//! value". Empty entries are kept at their position so that a list survives a
//! round trip through its text field unchanged.

use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};
use crate::units::{display_to_seconds, ensure_finite, format_seconds_list, quantize_seconds};

/// Default pulse start in seconds.
pub const DEFAULT_START_S: f64 = 0.0;
/// Default pulse end in seconds.
pub const DEFAULT_END_S: f64 = 0.010;

/// Most samples [`PulseTrain::sample`] will produce for one cycle.
pub const MAX_PREVIEW_SAMPLES: usize = 1 << 24;

/// Start/end lists of one device, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseTrain {
    starts: Vec<Option<f64>>,
    ends: Vec<Option<f64>>,
}

impl Default for PulseTrain {
    fn default() -> Self {
        Self {
            starts: vec![Some(DEFAULT_START_S)],
            ends: vec![Some(DEFAULT_END_S)],
        }
    }
}

impl PulseTrain {
    /// Train from start and end lists in seconds, stored as given.
    #[must_use]
    pub fn new(starts: Vec<Option<f64>>, ends: Vec<Option<f64>>) -> Self {
        Self { starts, ends }
    }

    /// Pulse starts in seconds. `None` marks an empty entry.
    #[must_use]
    pub fn starts(&self) -> &[Option<f64>] {
        &self.starts
    }

    /// Pulse ends in seconds. `None` marks an empty entry.
    #[must_use]
    pub fn ends(&self) -> &[Option<f64>] {
        &self.ends
    }

    /// Pair starts with ends.
    ///
    /// Both lists must have the same length. Slots empty on both sides are
    /// skipped; a slot empty on one side only, or a pulse ending before it
    /// starts, is rejected.
    pub fn intervals(&self, device: &str) -> ScanResult<Vec<(f64, f64)>> {
        if self.starts.len() != self.ends.len() {
            return Err(ScanError::UnpairedPulses {
                device: device.to_string(),
                starts: self.starts.len(),
                ends: self.ends.len(),
            });
        }

        let invalid = |index: usize, reason: String| ScanError::InvalidPulse {
            device: device.to_string(),
            index,
            reason,
        };

        let mut intervals = Vec::with_capacity(self.starts.len());
        for (index, (start, end)) in self.starts.iter().zip(&self.ends).enumerate() {
            match (*start, *end) {
                (None, None) => continue,
                (Some(start), Some(end)) if end < start => {
                    return Err(invalid(
                        index,
                        format!("ends at {end} s before it starts at {start} s"),
                    ));
                }
                (Some(start), Some(end)) => intervals.push((start, end)),
                (Some(_), None) => return Err(invalid(index, "has no end".to_string())),
                (None, Some(_)) => return Err(invalid(index, "has no start".to_string())),
            }
        }
        Ok(intervals)
    }

    /// Digital waveform for one sequence cycle.
    ///
    /// The cycle spans `round(seq_time * sample_rate)` samples. Each pulse is
    /// high on samples `[round(start * rate), round(end * rate))`, clipped to
    /// the cycle. A cycle longer than [`MAX_PREVIEW_SAMPLES`] is rejected
    /// with [`ScanError::PreviewTooLarge`].
    pub fn sample(&self, device: &str, seq_time: f64, sample_rate: f64) -> ScanResult<Vec<f64>> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ScanError::InvalidSampleRate(sample_rate));
        }
        if !seq_time.is_finite() || seq_time <= 0.0 {
            return Err(ScanError::InvalidSeqTime(seq_time));
        }

        let samples = (seq_time * sample_rate).round();
        if !samples.is_finite() || samples > MAX_PREVIEW_SAMPLES as f64 {
            return Err(ScanError::PreviewTooLarge {
                samples,
                limit: MAX_PREVIEW_SAMPLES,
            });
        }
        let samples = samples as usize;
        let to_index = |t: f64| ((t * sample_rate).round().max(0.0) as usize).min(samples);

        let mut signal = vec![0.0; samples];
        for (start, end) in self.intervals(device)? {
            let (first, last) = (to_index(start), to_index(end));
            signal[first..last].fill(1.0);
        }
        Ok(signal)
    }
}

/// A TTL output line and its pulse train.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtlDevice {
    name: String,
    train: PulseTrain,
}

impl TtlDevice {
    /// Name of the TTL line.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pulses of this line.
    #[must_use]
    pub fn train(&self) -> &PulseTrain {
        &self.train
    }
}

/// Pulse trains of every configured TTL device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseTrains {
    devices: Vec<TtlDevice>,
    time_unit: String,
}

impl PulseTrains {
    /// One default pulse train per device. `time_unit` is a display label only.
    #[must_use]
    pub fn new<S: AsRef<str>>(device_names: &[S], time_unit: impl Into<String>) -> Self {
        Self::with_default_train(device_names, time_unit, PulseTrain::default())
    }

    /// One copy of `train` per device.
    #[must_use]
    pub fn with_default_train<S: AsRef<str>>(
        device_names: &[S],
        time_unit: impl Into<String>,
        train: PulseTrain,
    ) -> Self {
        let devices = device_names
            .iter()
            .map(|name| TtlDevice {
                name: name.as_ref().to_string(),
                train: train.clone(),
            })
            .collect();
        Self {
            devices,
            time_unit: time_unit.into(),
        }
    }

    /// Label of the time unit the user types in.
    #[must_use]
    pub fn time_unit(&self) -> &str {
        &self.time_unit
    }

    /// All devices in configuration order.
    #[must_use]
    pub fn devices(&self) -> &[TtlDevice] {
        &self.devices
    }

    /// Device names in configuration order.
    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(TtlDevice::name)
    }

    /// Pulse train of `device`.
    pub fn train(&self, device: &str) -> ScanResult<&PulseTrain> {
        self.devices
            .iter()
            .find(|d| d.name == device)
            .map(|d| &d.train)
            .ok_or_else(|| ScanError::UnknownDevice(device.to_string()))
    }

    fn train_mut(&mut self, device: &str) -> ScanResult<&mut PulseTrain> {
        self.devices
            .iter_mut()
            .find(|d| d.name == device)
            .map(|d| &mut d.train)
            .ok_or_else(|| ScanError::UnknownDevice(device.to_string()))
    }

    /// Set starts from values in the display unit.
    pub fn set_starts(&mut self, device: &str, values: &[Option<f64>]) -> ScanResult<()> {
        let starts = from_display(&format!("starts of {device}"), values)?;
        self.train_mut(device)?.starts = starts;
        Ok(())
    }

    /// Set ends from values in the display unit.
    pub fn set_ends(&mut self, device: &str, values: &[Option<f64>]) -> ScanResult<()> {
        let ends = from_display(&format!("ends of {device}"), values)?;
        self.train_mut(device)?.ends = ends;
        Ok(())
    }

    /// Set starts from seconds, rounded as the text field would show them.
    pub fn set_starts_seconds(&mut self, device: &str, seconds: &[Option<f64>]) -> ScanResult<()> {
        let starts = quantized(&format!("starts of {device}"), seconds)?;
        self.train_mut(device)?.starts = starts;
        Ok(())
    }

    /// Set ends from seconds, rounded as the text field would show them.
    pub fn set_ends_seconds(&mut self, device: &str, seconds: &[Option<f64>]) -> ScanResult<()> {
        let ends = quantized(&format!("ends of {device}"), seconds)?;
        self.train_mut(device)?.ends = ends;
        Ok(())
    }

    /// Starts of `device` in seconds.
    pub fn starts(&self, device: &str) -> ScanResult<&[Option<f64>]> {
        Ok(self.train(device)?.starts())
    }

    /// Ends of `device` in seconds.
    pub fn ends(&self, device: &str) -> ScanResult<&[Option<f64>]> {
        Ok(self.train(device)?.ends())
    }

    /// Starts as shown in the text field.
    pub fn display_starts(&self, device: &str) -> ScanResult<String> {
        Ok(format_seconds_list(self.starts(device)?))
    }

    /// Ends as shown in the text field.
    pub fn display_ends(&self, device: &str) -> ScanResult<String> {
        Ok(format_seconds_list(self.ends(device)?))
    }
}

fn from_display(field: &str, values: &[Option<f64>]) -> ScanResult<Vec<Option<f64>>> {
    values
        .iter()
        .map(|value| {
            value
                .map(|v| ensure_finite(field, v).map(display_to_seconds))
                .transpose()
        })
        .collect()
}

fn quantized(field: &str, seconds: &[Option<f64>]) -> ScanResult<Vec<Option<f64>>> {
    seconds
        .iter()
        .map(|value| {
            value
                .map(|s| ensure_finite(field, s).map(quantize_seconds))
                .transpose()
        })
        .collect()
}
