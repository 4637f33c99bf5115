//! Scan panel configuration using Figment.
//!
//! Configuration is layered, lowest precedence first:
//! 1. Built-in defaults ([`ScanConfig::default`])
//! 2. A TOML file (default: `config/scan.toml`, optional)
//! 3. Environment variables prefixed with `SCANTIMING_`, with `__` between
//!    nested keys
//!
//! ```text
//! SCANTIMING_APPLICATION__LOG_LEVEL=debug
//! SCANTIMING_SCAN__SAMPLE_RATE_HZ=250000
//! ```
//!
//! # Example
//!
//! ```no_run
//! use scan_timing::config::ScanConfig;
//!
//! let config = ScanConfig::load_from("config/scan.toml")?;
//! println!("Positioners: {:?}", config.scan.positioners);
//! # Ok::<(), scan_timing::config::ConfigError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/scan.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "SCANTIMING_";

/// Preview colors handed out to devices without an explicit color.
pub const DEFAULT_PALETTE: [&str; 6] = [
    "#00ffff", "#ff00ff", "#ffff00", "#00ff00", "#ff8000", "#8080ff",
];

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File or environment could not be read or deserialized.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    /// Values loaded fine but are not usable.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
    /// Configuration could not be written as TOML.
    #[error("Configuration serialization error: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Name and logging.
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Positioners, TTL devices and clocks.
    #[serde(default)]
    pub scan: ScanSetup,
    /// Initial field values.
    #[serde(default)]
    pub defaults: ParameterDefaults,
    /// Preview color per TTL device name.
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name shown in logs.
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "scan-timing".to_string(),
            log_level: default_log_level(),
        }
    }
}

/// Hardware the scan panel is built for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSetup {
    /// Positioner names, one axis each, in dimension order.
    pub positioners: Vec<String>,
    /// TTL output line names.
    #[serde(default)]
    pub ttl_devices: Vec<String>,
    /// Label of the TTL time unit. Display only.
    #[serde(default = "default_time_unit")]
    pub ttl_time_unit: String,
    /// Sample clock shared by stage and TTL signals.
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f64,
    /// Initial dwell time per pixel.
    #[serde(default = "default_seq_time_ms")]
    pub seq_time_ms: f64,
}

impl Default for ScanSetup {
    fn default() -> Self {
        Self {
            positioners: vec!["X".to_string(), "Y".to_string(), "Z".to_string()],
            ttl_devices: Vec::new(),
            ttl_time_unit: default_time_unit(),
            sample_rate_hz: default_sample_rate(),
            seq_time_ms: default_seq_time_ms(),
        }
    }
}

/// Initial field values for every axis and device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefaults {
    /// Scan size of every axis, µm.
    #[serde(default = "default_size")]
    pub size_um: f64,
    /// Step size of every axis, µm.
    #[serde(default = "default_step_size")]
    pub step_size_um: f64,
    /// Center of every axis, µm.
    #[serde(default)]
    pub center_um: f64,
    /// Start of the single default pulse, ms.
    #[serde(default)]
    pub ttl_start_ms: f64,
    /// End of the single default pulse, ms.
    #[serde(default = "default_ttl_end")]
    pub ttl_end_ms: f64,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            size_um: default_size(),
            step_size_um: default_step_size(),
            center_um: 0.0,
            ttl_start_ms: 0.0,
            ttl_end_ms: default_ttl_end(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_log_level() -> String {
    "info".to_string()
}

fn default_time_unit() -> String {
    "ms".to_string()
}

fn default_sample_rate() -> f64 {
    100_000.0
}

fn default_seq_time_ms() -> f64 {
    10.0
}

fn default_size() -> f64 {
    2.0
}

fn default_step_size() -> f64 {
    1.0
}

fn default_ttl_end() -> f64 {
    10.0
}

// ============================================================================
// Loading and Validation
// ============================================================================

impl ScanConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment.
    ///
    /// A missing file is not an error; the built-in defaults apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path.as_ref())
            .extract()
            .map_err(ConfigError::LoadError)?;

        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(ScanConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Check the loaded values.
    ///
    /// - Log level is one of trace, debug, info, warn, error
    /// - At least one positioner; positioner and device names are unique
    /// - Sample rate and dwell time are positive
    /// - Default field values are finite
    /// - Every color entry names a configured device
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.scan.positioners.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one positioner must be configured".to_string(),
            ));
        }
        ensure_unique("positioner", &self.scan.positioners)?;
        ensure_unique("TTL device", &self.scan.ttl_devices)?;

        for (name, value) in [
            ("sample_rate_hz", self.scan.sample_rate_hz),
            ("seq_time_ms", self.scan.seq_time_ms),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid {name} {value}. Must be positive"
                )));
            }
        }

        let d = &self.defaults;
        for (name, value) in [
            ("size_um", d.size_um),
            ("step_size_um", d.step_size_um),
            ("center_um", d.center_um),
            ("ttl_start_ms", d.ttl_start_ms),
            ("ttl_end_ms", d.ttl_end_ms),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "Default {name} must be finite, got {value}"
                )));
            }
        }

        if let Some(unknown) = self
            .colors
            .keys()
            .find(|device| !self.scan.ttl_devices.contains(device))
        {
            return Err(ConfigError::ValidationError(format!(
                "Color given for unknown TTL device '{unknown}'"
            )));
        }

        Ok(())
    }

    /// Preview color of a device: configured, else from [`DEFAULT_PALETTE`]
    /// by device position.
    #[must_use]
    pub fn color_for(&self, device: &str) -> String {
        if let Some(color) = self.colors.get(device) {
            return color.clone();
        }
        let position = self
            .scan
            .ttl_devices
            .iter()
            .position(|name| name == device)
            .unwrap_or(0);
        DEFAULT_PALETTE[position % DEFAULT_PALETTE.len()].to_string()
    }

    /// The effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn ensure_unique(kind: &str, names: &[String]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate {kind} name: '{name}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const SAMPLE: &str = r##"
[application]
name = "widefield"
log_level = "debug"

[scan]
positioners = ["X", "Y"]
ttl_devices = ["Laser488", "Camera"]
sample_rate_hz = 50000.0

[defaults]
size_um = 10.0
step_size_um = 0.5

[colors]
Camera = "#ffffff"
"##;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = ScanConfig::load_from("missing.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.scan.positioners, vec!["X", "Y", "Z"]);
            assert_eq!(config.scan.ttl_time_unit, "ms");
            assert_eq!(config.scan.seq_time_ms, 10.0);
            assert_eq!(config.application.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn test_load_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file("scan.toml", SAMPLE)?;
            let config = ScanConfig::load_from("scan.toml").map_err(|e| e.to_string())?;

            assert_eq!(config.application.name, "widefield");
            assert_eq!(config.scan.ttl_devices, vec!["Laser488", "Camera"]);
            assert_eq!(config.scan.sample_rate_hz, 50_000.0);
            assert_eq!(config.scan.seq_time_ms, 10.0);
            assert_eq!(config.defaults.size_um, 10.0);
            assert_eq!(config.defaults.ttl_end_ms, 10.0);
            assert_eq!(config.color_for("Camera"), "#ffffff");
            assert_eq!(config.color_for("Laser488"), DEFAULT_PALETTE[0]);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("scan.toml", SAMPLE)?;
            jail.set_env("SCANTIMING_APPLICATION__LOG_LEVEL", "warn");
            jail.set_env("SCANTIMING_SCAN__SEQ_TIME_MS", "2.5");
            let config = ScanConfig::load_from("scan.toml").map_err(|e| e.to_string())?;

            assert_eq!(config.application.log_level, "warn");
            assert_eq!(config.scan.seq_time_ms, 2.5);
            Ok(())
        });
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ScanConfig::default();
        assert!(config.validate().is_ok());

        config.application.log_level = "verbose".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("log_level")
        ));

        let mut config = ScanConfig::default();
        config.scan.positioners = vec!["X".to_string(), "X".to_string()];
        assert!(config.validate().is_err());

        let mut config = ScanConfig::default();
        config.scan.sample_rate_hz = 0.0;
        assert!(config.validate().is_err());

        let mut config = ScanConfig::default();
        config
            .colors
            .insert("Ghost".to_string(), "#000000".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ScanConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: ScanConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.scan.positioners, config.scan.positioners);
        assert_eq!(parsed.defaults.step_size_um, 1.0);
    }
}
