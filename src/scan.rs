//! `ScanModel` - the data behind the scan panel.
//!
//! The panel owns one `ScanModel` and talks to it through three channels:
//!
//! ```text
//! GUI field edits ──► edit_* / set_*  ──► ScanModel ──► ScanEvent listeners
//!                                             │
//! GUI read-back   ◄── scan_* / ttl_* / seq_time_par / snapshot
//! ```
//!
//! Text edits are parsed first and stored only on success, so a typo never
//! replaces the last good value. Every successful change emits exactly one
//! [`ScanEvent`].

use serde::Serialize;

use crate::config::ScanConfig;
use crate::error::{ScanError, ScanResult};
use crate::geometry::{AxisControls, AxisParams, ScanDimSlot, ScanGeometry};
use crate::observable::{Notifier, ScanEvent, SubscriptionId};
use crate::preview::{plot_signal_graph, sample_area, PreviewSink};
use crate::pulse::{PulseTrain, PulseTrains};
use crate::units::{
    display_to_seconds, format_number, parse_number, parse_optional_list, quantize_seconds,
    round_display, DISPLAY_PER_SECOND,
};

/// Default dwell time per pixel in seconds.
pub const DEFAULT_SEQ_TIME_S: f64 = 0.010;

/// Operating mode of the panel. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ScanMode {
    /// Move the stages and fire TTL pulses per pixel.
    #[default]
    Scan,
    /// Fire TTL pulses continuously without moving the stages.
    ContLaser,
}

/// Read-back of one axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisSnapshot {
    /// Positioner name.
    pub name: String,
    /// Scan size in µm.
    pub size: f64,
    /// Step size in µm.
    pub step_size: f64,
    /// `None` when the pixel count cannot be derived.
    pub pixels: Option<u32>,
    /// Center position in µm.
    pub center: f64,
}

/// Read-back of one TTL device, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    /// TTL line name.
    pub name: String,
    /// Pulse starts.
    pub starts: Vec<Option<f64>>,
    /// Pulse ends.
    pub ends: Vec<Option<f64>>,
}

/// Everything the panel shows, in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSnapshot {
    /// Active mode.
    pub mode: ScanMode,
    /// Repeat option.
    pub repeat: bool,
    /// Dwell time per pixel, seconds.
    pub seq_time: f64,
    /// Label of the TTL time unit.
    pub ttl_time_unit: String,
    /// Every axis in configuration order.
    pub axes: Vec<AxisSnapshot>,
    /// Dimension bindings.
    pub scan_dims: Vec<ScanDimSlot>,
    /// Every TTL device in configuration order.
    pub devices: Vec<DeviceSnapshot>,
    /// `None` when some axis has no pixel count.
    pub frame_count: Option<u64>,
    /// Total scan time in seconds, if the frame count is known.
    pub scan_duration: Option<f64>,
}

/// Scan geometry, TTL pulse trains and dwell time of one scan panel.
#[derive(Debug)]
pub struct ScanModel {
    geometry: ScanGeometry,
    pulses: PulseTrains,
    /// Dwell time per pixel, seconds.
    seq_time: f64,
    mode: ScanMode,
    repeat: bool,
    scan_running: bool,
    colors: Vec<String>,
    notifier: Notifier,
}

impl ScanModel {
    /// Build a model for the given hardware with default field values.
    #[must_use]
    pub fn new<P: AsRef<str>, D: AsRef<str>>(
        positioner_names: &[P],
        ttl_device_names: &[D],
        ttl_time_unit: impl Into<String>,
    ) -> Self {
        let pulses = PulseTrains::new(ttl_device_names, ttl_time_unit);
        let colors = (0..ttl_device_names.len())
            .map(|i| crate::config::DEFAULT_PALETTE[i % crate::config::DEFAULT_PALETTE.len()])
            .map(str::to_string)
            .collect();
        Self {
            geometry: ScanGeometry::new(positioner_names),
            pulses,
            seq_time: DEFAULT_SEQ_TIME_S,
            mode: ScanMode::default(),
            repeat: false,
            scan_running: false,
            colors,
            notifier: Notifier::new(),
        }
    }

    /// Build a model from a validated configuration.
    ///
    /// Defaults are rounded as if typed into their fields.
    #[must_use]
    pub fn from_config(config: &ScanConfig) -> Self {
        let defaults = &config.defaults;
        let params = AxisParams {
            size: round_display(defaults.size_um),
            step_size: round_display(defaults.step_size_um),
            center: round_display(defaults.center_um),
        };
        let train = PulseTrain::new(
            vec![Some(quantize_seconds(display_to_seconds(defaults.ttl_start_ms)))],
            vec![Some(quantize_seconds(display_to_seconds(defaults.ttl_end_ms)))],
        );
        let scan = &config.scan;
        Self {
            geometry: ScanGeometry::with_defaults(&scan.positioners, params),
            pulses: PulseTrains::with_default_train(
                &scan.ttl_devices,
                scan.ttl_time_unit.clone(),
                train,
            ),
            seq_time: quantize_seconds(display_to_seconds(scan.seq_time_ms)),
            mode: ScanMode::default(),
            repeat: false,
            scan_running: false,
            colors: scan
                .ttl_devices
                .iter()
                .map(|device| config.color_for(device))
                .collect(),
            notifier: Notifier::new(),
        }
    }

    /// Axes and dimension bindings.
    #[must_use]
    pub fn geometry(&self) -> &ScanGeometry {
        &self.geometry
    }

    /// TTL pulse trains.
    #[must_use]
    pub fn pulses(&self) -> &PulseTrains {
        &self.pulses
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Register a change listener.
    pub fn subscribe(&self, listener: impl Fn(ScanEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    /// Remove a change listener. False if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Revision counter for async consumers, bumped on every event.
    #[must_use]
    pub fn watch(&self) -> tokio::sync::watch::Receiver<u64> {
        self.notifier.watch()
    }

    fn stage_changed(&self, result: ScanResult<()>) -> ScanResult<()> {
        result?;
        self.notifier.notify(ScanEvent::StageParChanged);
        Ok(())
    }

    fn signal_changed(&self, result: ScanResult<()>) -> ScanResult<()> {
        result?;
        self.notifier.notify(ScanEvent::SignalParChanged);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Set the scan size of `axis` in µm.
    pub fn set_scan_size(&mut self, axis: &str, size: f64) -> ScanResult<()> {
        tracing::debug!(axis, size, "scan size");
        let result = self.geometry.set_size(axis, size);
        self.stage_changed(result)
    }

    /// Set the step size of `axis` in µm.
    pub fn set_scan_step_size(&mut self, axis: &str, step_size: f64) -> ScanResult<()> {
        tracing::debug!(axis, step_size, "scan step size");
        let result = self.geometry.set_step_size(axis, step_size);
        self.stage_changed(result)
    }

    /// Set the center position of `axis` in µm.
    pub fn set_scan_center_pos(&mut self, axis: &str, center: f64) -> ScanResult<()> {
        tracing::debug!(axis, center, "scan center");
        let result = self.geometry.set_center(axis, center);
        self.stage_changed(result)
    }

    /// Update size, step size and center of an axis with a single event.
    pub fn set_scan_axis(&mut self, axis: &str, params: AxisParams) -> ScanResult<()> {
        tracing::debug!(axis, ?params, "scan axis");
        let result = self.geometry.set_axis(axis, params);
        self.stage_changed(result)
    }

    /// Size field edit. The value is kept only if `text` parses.
    pub fn edit_size(&mut self, axis: &str, text: &str) -> ScanResult<()> {
        let size = parse_number(&format!("size of {axis}"), text)?;
        self.set_scan_size(axis, size)
    }

    /// Step size field edit.
    pub fn edit_step_size(&mut self, axis: &str, text: &str) -> ScanResult<()> {
        let step_size = parse_number(&format!("step size of {axis}"), text)?;
        self.set_scan_step_size(axis, step_size)
    }

    /// Center field edit.
    pub fn edit_center(&mut self, axis: &str, text: &str) -> ScanResult<()> {
        let center = parse_number(&format!("center of {axis}"), text)?;
        self.set_scan_center_pos(axis, center)
    }

    /// Bind logical dimension `index` to positioner `axis`.
    pub fn set_scan_dim(&mut self, index: usize, axis: &str) -> ScanResult<()> {
        let result = self.geometry.assign_scan_dim(index, axis);
        self.stage_changed(result)?;
        if self.geometry.bindings_of(axis) > 1 {
            tracing::warn!(axis, "positioner bound to more than one scan dimension");
        }
        Ok(())
    }

    /// Mark which fields of `axis` the user may edit. No event.
    pub fn set_scan_controls(&mut self, axis: &str, controls: AxisControls) -> ScanResult<()> {
        self.geometry.set_controls(axis, controls)
    }

    /// Allow or forbid changing dimension `index`. No event.
    pub fn set_scan_dim_enabled(&mut self, index: usize, enabled: bool) -> ScanResult<()> {
        self.geometry.set_scan_dim_enabled(index, enabled)
    }

    /// Scan size of `axis` in µm.
    pub fn scan_size(&self, axis: &str) -> ScanResult<f64> {
        Ok(self.geometry.axis(axis)?.size())
    }

    /// Step size of `axis` in µm.
    pub fn scan_step_size(&self, axis: &str) -> ScanResult<f64> {
        Ok(self.geometry.axis(axis)?.step_size())
    }

    /// Center position of `axis` in µm.
    pub fn scan_center_pos(&self, axis: &str) -> ScanResult<f64> {
        Ok(self.geometry.axis(axis)?.center())
    }

    /// Pixel count of `axis`, derived from size and step size.
    pub fn scan_pixels(&self, axis: &str) -> ScanResult<u32> {
        self.geometry.pixels(axis)
    }

    /// Positioner bound to dimension `index`.
    pub fn scan_dim(&self, index: usize) -> ScanResult<&str> {
        self.geometry.scan_dim(index)
    }

    // ------------------------------------------------------------------
    // TTL pulses
    // ------------------------------------------------------------------

    /// Pulse starts in the display unit (ms).
    pub fn set_starts(&mut self, device: &str, values: &[Option<f64>]) -> ScanResult<()> {
        tracing::debug!(device, ?values, "ttl starts");
        let result = self.pulses.set_starts(device, values);
        self.signal_changed(result)
    }

    /// Pulse ends in the display unit (ms).
    pub fn set_ends(&mut self, device: &str, values: &[Option<f64>]) -> ScanResult<()> {
        tracing::debug!(device, ?values, "ttl ends");
        let result = self.pulses.set_ends(device, values);
        self.signal_changed(result)
    }

    /// Pulse starts in seconds, e.g. from a loaded scan.
    pub fn set_ttl_starts(&mut self, device: &str, seconds: &[Option<f64>]) -> ScanResult<()> {
        let result = self.pulses.set_starts_seconds(device, seconds);
        self.signal_changed(result)
    }

    /// Pulse ends in seconds, e.g. from a loaded scan.
    pub fn set_ttl_ends(&mut self, device: &str, seconds: &[Option<f64>]) -> ScanResult<()> {
        let result = self.pulses.set_ends_seconds(device, seconds);
        self.signal_changed(result)
    }

    /// Starts field edit: a comma-separated ms list, empty entries allowed.
    pub fn edit_starts(&mut self, device: &str, text: &str) -> ScanResult<()> {
        let values = parse_optional_list(&format!("starts of {device}"), text)?;
        self.set_starts(device, &values)
    }

    /// Ends field edit.
    pub fn edit_ends(&mut self, device: &str, text: &str) -> ScanResult<()> {
        let values = parse_optional_list(&format!("ends of {device}"), text)?;
        self.set_ends(device, &values)
    }

    /// Pulse starts in seconds.
    pub fn ttl_starts(&self, device: &str) -> ScanResult<&[Option<f64>]> {
        self.pulses.starts(device)
    }

    /// Pulse ends in seconds.
    pub fn ttl_ends(&self, device: &str) -> ScanResult<&[Option<f64>]> {
        self.pulses.ends(device)
    }

    /// Label of the TTL time unit.
    #[must_use]
    pub fn ttl_time_unit(&self) -> &str {
        self.pulses.time_unit()
    }

    // ------------------------------------------------------------------
    // Sequence timing
    // ------------------------------------------------------------------

    /// Dwell time per pixel in seconds, rounded as the field shows it.
    pub fn set_seq_time_par(&mut self, seconds: f64) -> ScanResult<()> {
        if !seconds.is_finite() {
            return Err(ScanError::parse("dwell time", seconds.to_string()));
        }
        let quantized = quantize_seconds(seconds);
        if quantized <= 0.0 {
            tracing::warn!(seconds, "non-positive dwell time");
        }
        self.seq_time = quantized;
        self.notifier.notify(ScanEvent::SeqTimeParChanged);
        Ok(())
    }

    /// Dwell time edit in the display unit (ms).
    pub fn edit_seq_time(&mut self, text: &str) -> ScanResult<()> {
        let ms = parse_number("dwell time", text)?;
        self.set_seq_time_par(display_to_seconds(ms))
    }

    /// Dwell time per pixel in seconds.
    #[must_use]
    pub fn seq_time_par(&self) -> f64 {
        self.seq_time
    }

    /// Dwell time as shown in its text field (ms).
    #[must_use]
    pub fn display_seq_time(&self) -> String {
        format_number(self.seq_time * DISPLAY_PER_SECOND)
    }

    // ------------------------------------------------------------------
    // Mode and run controls
    // ------------------------------------------------------------------

    /// Active mode.
    #[must_use]
    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Switch mode. Emits [`ScanEvent::ContLaserPulsesToggled`] on change only.
    pub fn set_mode(&mut self, mode: ScanMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        tracing::info!(?mode, "scan mode");
        self.notifier.notify(ScanEvent::ContLaserPulsesToggled {
            enabled: mode == ScanMode::ContLaser,
        });
    }

    /// Select the stage scan.
    pub fn set_scan_mode(&mut self) {
        self.set_mode(ScanMode::Scan);
    }

    /// Select continuous laser pulses.
    pub fn set_cont_laser_mode(&mut self) {
        self.set_mode(ScanMode::ContLaser);
    }

    /// Whether the stage scan is selected.
    #[must_use]
    pub fn is_scan_mode(&self) -> bool {
        self.mode == ScanMode::Scan
    }

    /// Whether continuous laser pulses are selected.
    #[must_use]
    pub fn is_cont_laser_mode(&self) -> bool {
        self.mode == ScanMode::ContLaser
    }

    /// The "Repeat" option: run the scan continuously.
    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    /// State of the "Repeat" option.
    #[must_use]
    pub fn repeat_enabled(&self) -> bool {
        self.repeat
    }

    /// Checked state of the run button.
    pub fn set_scan_running(&mut self, running: bool) {
        self.scan_running = running;
    }

    /// Checked state of the run button.
    #[must_use]
    pub fn scan_running(&self) -> bool {
        self.scan_running
    }

    /// Ask listeners to save the current scan.
    pub fn request_save(&self) {
        self.notifier.notify(ScanEvent::SaveScanRequested);
    }

    /// Ask listeners to load a saved scan.
    pub fn request_load(&self) {
        self.notifier.notify(ScanEvent::LoadScanRequested);
    }

    /// Ask listeners to start the scan.
    pub fn request_run(&self) {
        self.notifier.notify(ScanEvent::RunScanRequested);
    }

    // ------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------

    /// Number of scan points (product of all pixel counts).
    pub fn frame_count(&self) -> ScanResult<u64> {
        self.geometry.frame_count()
    }

    /// Total scan time in seconds: one dwell time per scan point.
    pub fn scan_duration(&self) -> ScanResult<f64> {
        Ok(self.frame_count()? as f64 * self.seq_time)
    }

    /// Check that the current state can drive hardware.
    ///
    /// Both modes need a positive dwell time and well-formed pulse pairs.
    /// Scan mode additionally needs at least one pixel on every axis. Pulses that
    /// fall outside the dwell time are accepted with a warning; the sampled
    /// signal clips them.
    pub fn validate(&self) -> ScanResult<()> {
        if self.seq_time <= 0.0 {
            return Err(ScanError::InvalidSeqTime(self.seq_time));
        }

        if self.mode == ScanMode::Scan {
            for axis in self.geometry.axes() {
                if axis.pixels()? == 0 {
                    return Err(ScanError::Computation {
                        axis: axis.name().to_string(),
                        reason: format!(
                            "0 pixels (size {} with step size {})",
                            axis.size(),
                            axis.step_size()
                        ),
                    });
                }
            }
        }

        for device in self.pulses.devices() {
            for (start, end) in device.train().intervals(device.name())? {
                if start < 0.0 || end > self.seq_time {
                    tracing::warn!(
                        device = device.name(),
                        start,
                        end,
                        seq_time = self.seq_time,
                        "pulse extends outside the dwell time"
                    );
                }
            }
        }
        Ok(())
    }

    /// Sample every device over one dwell period and render the preview.
    pub fn render_signal_preview(
        &self,
        sink: &mut dyn PreviewSink,
        sample_rate: f64,
    ) -> ScanResult<()> {
        let signals = self
            .pulses
            .devices()
            .iter()
            .map(|device| device.train().sample(device.name(), self.seq_time, sample_rate))
            .collect::<ScanResult<Vec<_>>>()?;
        let areas: Vec<Vec<f64>> = signals.iter().map(|s| sample_area(s.len())).collect();
        plot_signal_graph(sink, &areas, &signals, &self.colors, sample_rate)
    }

    /// Current state of every field.
    #[must_use]
    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            mode: self.mode,
            repeat: self.repeat,
            seq_time: self.seq_time,
            ttl_time_unit: self.pulses.time_unit().to_string(),
            axes: self
                .geometry
                .axes()
                .iter()
                .map(|axis| AxisSnapshot {
                    name: axis.name().to_string(),
                    size: axis.size(),
                    step_size: axis.step_size(),
                    pixels: axis.pixels().ok(),
                    center: axis.center(),
                })
                .collect(),
            scan_dims: self.geometry.scan_dims().to_vec(),
            devices: self
                .pulses
                .devices()
                .iter()
                .map(|device| DeviceSnapshot {
                    name: device.name().to_string(),
                    starts: device.train().starts().to_vec(),
                    ends: device.train().ends().to_vec(),
                })
                .collect(),
            frame_count: self.frame_count().ok(),
            scan_duration: self.scan_duration().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::CapturedPreview;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn model() -> ScanModel {
        ScanModel::new(&["X", "Y"], &["Laser1", "Laser2"], "ms")
    }

    fn record(model: &ScanModel) -> Arc<Mutex<Vec<ScanEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        model.subscribe(move |event| sink.lock().push(event));
        events
    }

    #[test]
    fn test_setters_notify() {
        let mut model = model();
        let events = record(&model);

        model.set_scan_size("X", 4.0).unwrap();
        model.edit_starts("Laser1", "1,2").unwrap();
        model.edit_seq_time("20").unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                ScanEvent::StageParChanged,
                ScanEvent::SignalParChanged,
                ScanEvent::SeqTimeParChanged
            ]
        );
    }

    #[test]
    fn test_axis_group_update_emits_one_event() {
        let mut model = model();
        let events = record(&model);

        let params = AxisParams {
            size: 12.0,
            step_size: 4.0,
            center: -1.0,
        };
        model.set_scan_axis("Y", params).unwrap();

        assert_eq!(model.geometry().axis("Y").unwrap().params(), params);
        assert_eq!(model.scan_pixels("Y").unwrap(), 3);
        assert_eq!(*events.lock(), vec![ScanEvent::StageParChanged]);
    }

    #[test]
    fn test_failed_edit_keeps_value_and_is_silent() {
        let mut model = model();
        let events = record(&model);

        model.edit_size("X", "7.5").unwrap();
        let err = model.edit_size("X", "7.5mm").unwrap_err();
        assert!(err.is_parse());
        assert_eq!(model.scan_size("X").unwrap(), 7.5);

        assert!(model.edit_ends("Laser1", "3,oops").is_err());
        assert_eq!(model.ttl_ends("Laser1").unwrap(), &[Some(0.010)]);

        assert!(model.edit_seq_time("").is_err());
        assert_eq!(model.seq_time_par(), DEFAULT_SEQ_TIME_S);

        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_seq_time_display_round_trip() {
        let mut model = model();
        model.set_seq_time_par(0.012_345_6).unwrap();
        assert!((model.seq_time_par() - 0.012_346).abs() < 1e-12);
        assert_eq!(model.display_seq_time(), "12.346");
        assert!(model.set_seq_time_par(f64::NAN).is_err());
    }

    #[test]
    fn test_mode_toggle_event() {
        let mut model = model();
        let events = record(&model);

        assert!(model.is_scan_mode());
        model.set_cont_laser_mode();
        model.set_cont_laser_mode();
        assert!(model.is_cont_laser_mode());
        model.set_scan_mode();

        model.set_repeat(true);
        model.set_scan_running(true);
        assert!(model.repeat_enabled());
        assert!(model.scan_running());
        assert!(model.snapshot().repeat);

        assert_eq!(
            *events.lock(),
            vec![
                ScanEvent::ContLaserPulsesToggled { enabled: true },
                ScanEvent::ContLaserPulsesToggled { enabled: false }
            ]
        );
    }

    #[test]
    fn test_validate_depends_on_mode() {
        let mut model = model();
        model.set_scan_step_size("Y", 0.0).unwrap();
        assert!(matches!(
            model.validate(),
            Err(ScanError::Computation { .. })
        ));

        model.set_cont_laser_mode();
        assert!(model.validate().is_ok());

        model.edit_starts("Laser2", "0,5").unwrap();
        assert!(matches!(
            model.validate(),
            Err(ScanError::UnpairedPulses { starts: 2, ends: 1, .. })
        ));
    }

    #[traced_test]
    #[test]
    fn test_duplicate_scan_dim_is_accepted_with_warning() {
        let mut model = model();
        model.set_scan_dim(1, "X").unwrap();
        assert_eq!(model.scan_dim(1).unwrap(), "X");
        assert!(logs_contain("positioner bound to more than one scan dimension"));
    }

    #[test]
    fn test_validate_rejects_zero_pixel_axis() {
        let mut model = model();
        model.edit_size("X", "0").unwrap();
        assert_eq!(model.scan_pixels("X").unwrap(), 0);
        assert_eq!(model.frame_count().unwrap(), 0);

        match model.validate() {
            Err(ScanError::Computation { axis, reason }) => {
                assert_eq!(axis, "X");
                assert!(reason.contains("0 pixels"));
            }
            other => panic!("expected computation error, got {other:?}"),
        }

        // Continuous pulses do not move the stages
        model.set_cont_laser_mode();
        assert!(model.validate().is_ok());
    }

    #[traced_test]
    #[test]
    fn test_duplicate_warning_names_only_the_rebound_axis() {
        let mut model = ScanModel::new(&["X", "Y", "Z"], &["Laser1"], "ms");
        model.set_scan_dim(1, "X").unwrap();
        // X stays duplicated, but binding Y is not itself a duplicate
        model.set_scan_dim(2, "Y").unwrap();

        logs_assert(|lines: &[&str]| {
            let warnings = lines
                .iter()
                .filter(|line| line.contains("positioner bound to more than one scan dimension"))
                .count();
            if warnings == 1 {
                Ok(())
            } else {
                Err(format!("expected 1 duplicate warning, got {warnings}"))
            }
        });
    }

    #[traced_test]
    #[test]
    fn test_sub_resolution_dwell_time_warns() {
        let mut model = model();
        model.set_seq_time_par(2e-7).unwrap();
        assert_eq!(model.seq_time_par(), 0.0);
        assert!(logs_contain("non-positive dwell time"));
        assert_eq!(model.validate(), Err(ScanError::InvalidSeqTime(0.0)));
    }

    #[test]
    fn test_save_load_run_requests() {
        let model = model();
        let events = record(&model);

        model.request_save();
        model.request_load();
        model.request_run();

        assert_eq!(
            *events.lock(),
            vec![
                ScanEvent::SaveScanRequested,
                ScanEvent::LoadScanRequested,
                ScanEvent::RunScanRequested
            ]
        );
    }

    #[test]
    fn test_preview_rejects_huge_dwell_time() {
        let mut model = model();
        model.edit_seq_time("1e18").unwrap();

        let mut sink = CapturedPreview::default();
        let err = model.render_signal_preview(&mut sink, 100_000.0).unwrap_err();
        assert!(matches!(err, ScanError::PreviewTooLarge { .. }));
        assert_eq!(sink.renders, 0);
    }

    #[traced_test]
    #[test]
    fn test_pulse_outside_dwell_time_warns() {
        let mut model = model();
        model.edit_ends("Laser1", "25").unwrap();
        assert!(model.validate().is_ok());
        assert!(logs_contain("pulse extends outside the dwell time"));
    }

    #[test]
    fn test_scan_duration() {
        let mut model = model();
        model.set_scan_size("X", 10.0).unwrap();
        model.set_scan_step_size("X", 2.0).unwrap();
        model.edit_seq_time("10").unwrap();
        assert_eq!(model.frame_count().unwrap(), 10);
        assert!((model.scan_duration().unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_render_signal_preview() {
        let mut model = model();
        model.edit_starts("Laser1", "2").unwrap();
        model.edit_ends("Laser1", "5").unwrap();

        let mut sink = CapturedPreview::default();
        model.render_signal_preview(&mut sink, 1000.0).unwrap();

        let plot = sink.last.unwrap();
        assert_eq!(plot.series.len(), 2);
        assert_eq!(plot.x_scale, 1.0);
        assert_eq!(plot.series[0].y.len(), 10);
        assert_eq!(plot.series[0].y[1..6], [0.0, 1.0, 1.0, 1.0, 0.0]);
        assert_ne!(plot.series[0].color, plot.series[1].color);
    }

    #[test]
    fn test_snapshot_serializes() {
        let model = model();
        let snapshot = model.snapshot();
        assert_eq!(snapshot.axes[0].pixels, Some(2));
        assert_eq!(snapshot.frame_count, Some(4));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["mode"], "Scan");
        assert_eq!(json["devices"][0]["name"], "Laser1");
        assert_eq!(json["scan_dims"][1]["axis"], "Y");
    }
}
