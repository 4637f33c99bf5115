//! Scan geometry: per-positioner size, step size, pixel count and center.
//!
//! Pixel counts are never stored. They are derived from size and step size on
//! every read, so they cannot drift out of sync with their inputs.

use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};
use crate::units::{ensure_finite, round_display};

/// Default scan size in µm.
pub const DEFAULT_SIZE_UM: f64 = 2.0;
/// Default step size in µm.
pub const DEFAULT_STEP_SIZE_UM: f64 = 1.0;
/// Default center position in µm.
pub const DEFAULT_CENTER_UM: f64 = 0.0;

/// Size, step size and center of one axis, in µm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisParams {
    /// Scan range.
    pub size: f64,
    /// Distance between pixels.
    pub step_size: f64,
    /// Middle of the scan range.
    pub center: f64,
}

impl Default for AxisParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE_UM,
            step_size: DEFAULT_STEP_SIZE_UM,
            center: DEFAULT_CENTER_UM,
        }
    }
}

/// Which fields of an axis the user may edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisControls {
    /// Size field is editable.
    pub size: bool,
    /// Step size field is editable.
    pub step_size: bool,
    /// Center field is editable.
    pub center: bool,
}

impl Default for AxisControls {
    fn default() -> Self {
        Self {
            size: true,
            step_size: true,
            center: true,
        }
    }
}

/// One positioner of the scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    name: String,
    params: AxisParams,
    controls: AxisControls,
}

impl Axis {
    /// Axis with all fields editable.
    #[must_use]
    pub fn new(name: impl Into<String>, params: AxisParams) -> Self {
        Self {
            name: name.into(),
            params,
            controls: AxisControls::default(),
        }
    }

    /// Positioner name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size, step size and center.
    #[must_use]
    pub fn params(&self) -> AxisParams {
        self.params
    }

    /// Editability of the three fields.
    #[must_use]
    pub fn controls(&self) -> AxisControls {
        self.controls
    }

    /// Scan size in µm.
    #[must_use]
    pub fn size(&self) -> f64 {
        self.params.size
    }

    /// Step size in µm.
    #[must_use]
    pub fn step_size(&self) -> f64 {
        self.params.step_size
    }

    /// Center position in µm.
    #[must_use]
    pub fn center(&self) -> f64 {
        self.params.center
    }

    /// `round(size / step_size)`, ties to even.
    ///
    /// A zero step size, or a ratio that is negative or not finite, has no
    /// meaningful pixel count and is reported as [`ScanError::Computation`].
    pub fn pixels(&self) -> ScanResult<u32> {
        let AxisParams {
            size, step_size, ..
        } = self.params;
        if step_size == 0.0 {
            return Err(self.computation_error("step size is zero".to_string()));
        }

        let ratio = size / step_size;
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(self.computation_error(format!(
                "size {size} / step size {step_size} is not a valid pixel count"
            )));
        }

        let pixels = ratio.round_ties_even();
        if pixels > f64::from(u32::MAX) {
            return Err(self.computation_error(format!("{pixels} pixels is too many")));
        }
        Ok(pixels as u32)
    }

    fn computation_error(&self, reason: String) -> ScanError {
        ScanError::Computation {
            axis: self.name.clone(),
            reason,
        }
    }
}

/// Physical axis bound to a logical scan dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDimSlot {
    /// Positioner name.
    pub axis: String,
    /// Whether the user may change the binding.
    pub enabled: bool,
}

/// All axes of a scan plus the dimension-to-axis assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanGeometry {
    axes: Vec<Axis>,
    scan_dims: Vec<ScanDimSlot>,
}

impl ScanGeometry {
    /// One axis per positioner with default parameters. Dimension `i` starts
    /// out bound to positioner `i`.
    #[must_use]
    pub fn new<S: AsRef<str>>(positioner_names: &[S]) -> Self {
        Self::with_defaults(positioner_names, AxisParams::default())
    }

    /// Like [`Self::new`] with `defaults` on every axis.
    #[must_use]
    pub fn with_defaults<S: AsRef<str>>(positioner_names: &[S], defaults: AxisParams) -> Self {
        let axes = positioner_names
            .iter()
            .map(|name| Axis::new(name.as_ref(), defaults))
            .collect();
        let scan_dims = positioner_names
            .iter()
            .map(|name| ScanDimSlot {
                axis: name.as_ref().to_string(),
                enabled: true,
            })
            .collect();
        Self { axes, scan_dims }
    }

    /// All axes in configuration order.
    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Positioner names in configuration order.
    pub fn positioner_names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(Axis::name)
    }

    /// Whether `name` is a configured positioner.
    #[must_use]
    pub fn contains_axis(&self, name: &str) -> bool {
        self.axes.iter().any(|axis| axis.name == name)
    }

    /// Axis by positioner name.
    pub fn axis(&self, name: &str) -> ScanResult<&Axis> {
        self.axes
            .iter()
            .find(|axis| axis.name == name)
            .ok_or_else(|| ScanError::UnknownAxis(name.to_string()))
    }

    fn axis_mut(&mut self, name: &str) -> ScanResult<&mut Axis> {
        self.axes
            .iter_mut()
            .find(|axis| axis.name == name)
            .ok_or_else(|| ScanError::UnknownAxis(name.to_string()))
    }

    /// Set the scan size, rounded to the display precision.
    pub fn set_size(&mut self, axis: &str, size: f64) -> ScanResult<()> {
        let size = ensure_finite(&format!("size of {axis}"), size)?;
        self.axis_mut(axis)?.params.size = round_display(size);
        Ok(())
    }

    /// Set the step size, rounded to the display precision.
    pub fn set_step_size(&mut self, axis: &str, step_size: f64) -> ScanResult<()> {
        let step_size = ensure_finite(&format!("step size of {axis}"), step_size)?;
        self.axis_mut(axis)?.params.step_size = round_display(step_size);
        Ok(())
    }

    /// Set the center position, rounded to the display precision.
    pub fn set_center(&mut self, axis: &str, center: f64) -> ScanResult<()> {
        let center = ensure_finite(&format!("center of {axis}"), center)?;
        self.axis_mut(axis)?.params.center = round_display(center);
        Ok(())
    }

    /// Replace size, step size and center together.
    ///
    /// All three are checked before any is written, so readers never see a
    /// half-updated axis.
    pub fn set_axis(&mut self, axis: &str, params: AxisParams) -> ScanResult<()> {
        let params = AxisParams {
            size: round_display(ensure_finite(&format!("size of {axis}"), params.size)?),
            step_size: round_display(ensure_finite(
                &format!("step size of {axis}"),
                params.step_size,
            )?),
            center: round_display(ensure_finite(&format!("center of {axis}"), params.center)?),
        };
        self.axis_mut(axis)?.params = params;
        Ok(())
    }

    /// Mark which fields of `axis` the user may edit.
    pub fn set_controls(&mut self, axis: &str, controls: AxisControls) -> ScanResult<()> {
        self.axis_mut(axis)?.controls = controls;
        Ok(())
    }

    /// Pixel count of `axis`. See [`Axis::pixels`].
    pub fn pixels(&self, axis: &str) -> ScanResult<u32> {
        self.axis(axis)?.pixels()
    }

    /// Number of logical scan dimensions (one per positioner).
    #[must_use]
    pub fn scan_dim_count(&self) -> usize {
        self.scan_dims.len()
    }

    /// Dimension bindings in dimension order.
    #[must_use]
    pub fn scan_dims(&self) -> &[ScanDimSlot] {
        &self.scan_dims
    }

    fn slot(&self, index: usize) -> ScanResult<&ScanDimSlot> {
        self.scan_dims.get(index).ok_or(ScanError::ScanDimOutOfRange {
            index,
            count: self.scan_dims.len(),
        })
    }

    fn slot_mut(&mut self, index: usize) -> ScanResult<&mut ScanDimSlot> {
        let count = self.scan_dims.len();
        self.scan_dims
            .get_mut(index)
            .ok_or(ScanError::ScanDimOutOfRange { index, count })
    }

    /// Physical axis driven by logical dimension `index`.
    pub fn scan_dim(&self, index: usize) -> ScanResult<&str> {
        Ok(self.slot(index)?.axis.as_str())
    }

    /// Bind logical dimension `index` to `axis`.
    ///
    /// The axis must be one of the configured positioners. Binding the same
    /// axis to several dimensions is allowed; the latest binding simply wins
    /// for its slot.
    pub fn assign_scan_dim(&mut self, index: usize, axis: &str) -> ScanResult<()> {
        if !self.contains_axis(axis) {
            return Err(ScanError::UnknownAxis(axis.to_string()));
        }
        self.slot_mut(index)?.axis = axis.to_string();
        Ok(())
    }

    /// Allow or forbid changing the binding of dimension `index`.
    pub fn set_scan_dim_enabled(&mut self, index: usize, enabled: bool) -> ScanResult<()> {
        self.slot_mut(index)?.enabled = enabled;
        Ok(())
    }

    /// Axes bound to more than one dimension, in first-seen order.
    #[must_use]
    pub fn duplicate_scan_dims(&self) -> Vec<&str> {
        let mut duplicates: Vec<&str> = Vec::new();
        for (i, slot) in self.scan_dims.iter().enumerate() {
            let repeated = self.scan_dims[..i].iter().any(|s| s.axis == slot.axis);
            if repeated && !duplicates.contains(&slot.axis.as_str()) {
                duplicates.push(&slot.axis);
            }
        }
        duplicates
    }

    /// Number of dimensions bound to `axis`.
    #[must_use]
    pub fn bindings_of(&self, axis: &str) -> usize {
        self.scan_dims.iter().filter(|slot| slot.axis == axis).count()
    }

    /// Total number of scan points: the product of every axis pixel count.
    pub fn frame_count(&self) -> ScanResult<u64> {
        self.axes.iter().try_fold(1u64, |total, axis| {
            let pixels = u64::from(axis.pixels()?);
            total.checked_mul(pixels).ok_or_else(|| {
                axis.computation_error("total scan point count overflows".to_string())
            })
        })
    }
}

/// Label for a dimension picker, e.g. "2nd dimension:" for index 1.
#[must_use]
pub fn dimension_label(index: usize) -> String {
    let n = index + 1;
    format!("{n}{} dimension:", ordinal_suffix(n))
}

/// English ordinal suffix for `n` ("st", "nd", "rd", "th").
#[must_use]
pub fn ordinal_suffix(n: usize) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy() -> ScanGeometry {
        ScanGeometry::new(&["X", "Y"])
    }

    #[test]
    fn test_defaults() {
        let geometry = xy();
        let x = geometry.axis("X").unwrap();
        assert_eq!(x.size(), 2.0);
        assert_eq!(x.step_size(), 1.0);
        assert_eq!(x.center(), 0.0);
        assert_eq!(x.pixels().unwrap(), 2);
        assert_eq!(geometry.scan_dim(0).unwrap(), "X");
        assert_eq!(geometry.scan_dim(1).unwrap(), "Y");
    }

    #[test]
    fn test_pixels_follow_size_and_step() {
        let mut geometry = xy();
        geometry.set_size("X", 10.0).unwrap();
        geometry.set_step_size("X", 2.0).unwrap();
        assert_eq!(geometry.pixels("X").unwrap(), 5);

        geometry.set_size("X", 11.0).unwrap();
        assert_eq!(geometry.pixels("X").unwrap(), 6); // 5.5 -> ties to even

        geometry.set_step_size("X", 0.3).unwrap();
        assert_eq!(geometry.pixels("X").unwrap(), 37);
    }

    #[test]
    fn test_zero_step_is_computation_error() {
        let mut geometry = xy();
        geometry.set_size("X", 10.0).unwrap();
        geometry.set_step_size("X", 0.0).unwrap();
        let err = geometry.pixels("X").unwrap_err();
        assert!(matches!(err, ScanError::Computation { ref axis, .. } if axis == "X"));
    }

    #[test]
    fn test_negative_ratio_is_computation_error() {
        let mut geometry = xy();
        geometry.set_step_size("Y", -1.0).unwrap();
        assert!(matches!(
            geometry.pixels("Y"),
            Err(ScanError::Computation { .. })
        ));
    }

    #[test]
    fn test_setters_round_to_three_decimals() {
        let mut geometry = xy();
        geometry.set_center("Y", -1.23456).unwrap();
        assert_eq!(geometry.axis("Y").unwrap().center(), -1.235);
    }

    #[test]
    fn test_non_finite_rejected_without_overwrite() {
        let mut geometry = xy();
        assert!(geometry.set_size("X", f64::NAN).unwrap_err().is_parse());
        assert_eq!(geometry.axis("X").unwrap().size(), 2.0);

        let bad = AxisParams {
            size: 4.0,
            step_size: f64::INFINITY,
            center: 1.0,
        };
        assert!(geometry.set_axis("X", bad).is_err());
        assert_eq!(geometry.axis("X").unwrap().params(), AxisParams::default());
    }

    #[test]
    fn test_unknown_axis() {
        let mut geometry = xy();
        assert_eq!(
            geometry.set_size("Z", 1.0),
            Err(ScanError::UnknownAxis("Z".to_string()))
        );
    }

    #[test]
    fn test_assign_scan_dim_rejects_unknown_axis() {
        let mut geometry = xy();
        let err = geometry.assign_scan_dim(0, "Z").unwrap_err();
        assert_eq!(err, ScanError::UnknownAxis("Z".to_string()));
        assert_eq!(geometry.scan_dim(0).unwrap(), "X");
    }

    #[test]
    fn test_assign_scan_dim_out_of_range() {
        let mut geometry = xy();
        assert_eq!(
            geometry.assign_scan_dim(2, "X"),
            Err(ScanError::ScanDimOutOfRange { index: 2, count: 2 })
        );
    }

    #[test]
    fn test_duplicate_scan_dims_last_write_wins() {
        let mut geometry = xy();
        geometry.assign_scan_dim(1, "X").unwrap();
        assert_eq!(geometry.scan_dim(0).unwrap(), "X");
        assert_eq!(geometry.scan_dim(1).unwrap(), "X");
        assert_eq!(geometry.duplicate_scan_dims(), vec!["X"]);
        assert_eq!(geometry.bindings_of("X"), 2);
        assert_eq!(geometry.bindings_of("Y"), 0);

        geometry.assign_scan_dim(0, "Y").unwrap();
        assert!(geometry.duplicate_scan_dims().is_empty());
        assert_eq!(geometry.bindings_of("X"), 1);
    }

    #[test]
    fn test_controls_and_dim_enable_flags() {
        let mut geometry = xy();
        let locked = AxisControls {
            size: false,
            step_size: false,
            center: true,
        };
        geometry.set_controls("Y", locked).unwrap();
        geometry.set_scan_dim_enabled(1, false).unwrap();

        assert_eq!(geometry.axis("Y").unwrap().controls(), locked);
        assert!(!geometry.scan_dims()[1].enabled);
        // Flags only describe the panel; programmatic setters still apply
        geometry.set_size("Y", 8.0).unwrap();
        assert_eq!(geometry.pixels("Y").unwrap(), 8);
        assert!(geometry.set_scan_dim_enabled(5, true).is_err());
    }

    #[test]
    fn test_frame_count() {
        let mut geometry = xy();
        geometry.set_size("X", 10.0).unwrap();
        geometry.set_step_size("X", 2.0).unwrap();
        assert_eq!(geometry.frame_count().unwrap(), 10);

        geometry.set_step_size("Y", 0.0).unwrap();
        assert!(geometry.frame_count().is_err());
    }

    #[test]
    fn test_dimension_labels() {
        assert_eq!(dimension_label(0), "1st dimension:");
        assert_eq!(dimension_label(1), "2nd dimension:");
        assert_eq!(dimension_label(2), "3rd dimension:");
        assert_eq!(dimension_label(3), "4th dimension:");
        assert_eq!(ordinal_suffix(11), "th");
        assert_eq!(ordinal_suffix(22), "nd");
    }
}
