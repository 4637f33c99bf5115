//! Core library for the scan_timing model.
//!
//! This library holds the data model behind a microscope scan panel: per-axis
//! scan geometry, per-device TTL pulse trains, the shared dwell time and the
//! change notifications a GUI or scan executor listens to. It has no
//! dependency on any GUI toolkit.

pub mod config;
pub mod error;
pub mod geometry;
pub mod observable;
pub mod preview;
pub mod pulse;
pub mod scan;
pub mod units;

pub use error::{ScanError, ScanResult};
pub use scan::{ScanMode, ScanModel};
