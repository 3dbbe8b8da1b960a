//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! A malformed configuration is fatal at startup: nothing is connected and
//! no loop is spawned until `validate()` has passed. Sensitivity tables are
//! checked here by constructing the actual curves, so a table the curve
//! module would reject never reaches the poll loop.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::dispatch::DispatchTiming;
use crate::error::Result;
use crate::input::curve::SensitivityCurve;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub curves: CurvesConfig,
}

/// Camera connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default = "default_camera_host")]
    pub host: String,

    #[serde(default = "default_camera_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Bounded startup retries before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,
}

/// Dispatch loop timing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    #[serde(default = "default_min_command_interval_ms")]
    pub min_command_interval_ms: u64,

    #[serde(default = "default_max_idle_interval_ms")]
    pub max_idle_interval_ms: u64,
}

/// Controller mapping configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Event device path; empty auto-detects the first joystick.
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_poll_rate_hz")]
    pub poll_rate_hz: u32,

    #[serde(default = "default_pan_axis")]
    pub pan_axis: u8,

    #[serde(default = "default_tilt_axis")]
    pub tilt_axis: u8,

    #[serde(default = "default_zoom_axis")]
    pub zoom_axis: u8,

    #[serde(default = "default_invert_pan")]
    pub invert_pan: bool,

    #[serde(default = "default_invert_tilt")]
    pub invert_tilt: bool,

    #[serde(default = "default_invert_zoom")]
    pub invert_zoom: bool,

    #[serde(default = "default_focus_near_button")]
    pub focus_near_button: u8,

    #[serde(default = "default_focus_far_button")]
    pub focus_far_button: u8,

    #[serde(default = "default_focus_toggle_button")]
    pub focus_toggle_button: u8,

    #[serde(default = "default_invert_tilt_button")]
    pub invert_tilt_button: u8,
}

/// One sensitivity table: parallel joystick/camera breakpoint lists.
#[derive(Debug, Deserialize, Clone)]
pub struct CurveTable {
    pub joy: Vec<f32>,
    pub cam: Vec<u32>,
}

impl CurveTable {
    /// Builds the validated curve for this table.
    pub fn curve(&self) -> Result<SensitivityCurve> {
        SensitivityCurve::new(&self.joy, &self.cam)
    }
}

/// Per-axis-class sensitivity tables
#[derive(Debug, Deserialize, Clone)]
pub struct CurvesConfig {
    #[serde(default = "default_pan_table")]
    pub pan: CurveTable,

    #[serde(default = "default_tilt_table")]
    pub tilt: CurveTable,

    #[serde(default = "default_zoom_table")]
    pub zoom: CurveTable,

    #[serde(default = "default_focus_table")]
    pub focus: CurveTable,
}

// Default value functions
fn default_camera_host() -> String { "172.16.0.201".to_string() }
fn default_camera_port() -> u16 { 1259 }
fn default_connect_timeout_ms() -> u64 { 3000 }
fn default_connect_attempts() -> u32 { 5 }
fn default_connect_backoff_ms() -> u64 { 2000 }

fn default_min_command_interval_ms() -> u64 { 10 }
fn default_max_idle_interval_ms() -> u64 { 100 }

fn default_poll_rate_hz() -> u32 { 100 }
fn default_pan_axis() -> u8 { 0 }
fn default_tilt_axis() -> u8 { 1 }
fn default_zoom_axis() -> u8 { 5 }
fn default_invert_pan() -> bool { true }
fn default_invert_tilt() -> bool { true }
fn default_invert_zoom() -> bool { true }
fn default_focus_near_button() -> u8 { 4 }
fn default_focus_far_button() -> u8 { 5 }
fn default_focus_toggle_button() -> u8 { 3 }
fn default_invert_tilt_button() -> u8 { 10 }

fn default_pan_table() -> CurveTable {
    CurveTable {
        joy: vec![0.0, 0.05, 0.3, 0.7, 0.9, 1.0],
        cam: vec![0, 0, 2, 8, 15, 20],
    }
}

fn default_tilt_table() -> CurveTable {
    CurveTable {
        joy: vec![0.0, 0.07, 0.3, 0.65, 0.85, 1.0],
        cam: vec![0, 0, 3, 6, 14, 18],
    }
}

fn default_zoom_table() -> CurveTable {
    CurveTable {
        joy: vec![0.0, 0.2, 1.0],
        cam: vec![0, 0, 7],
    }
}

fn default_focus_table() -> CurveTable {
    default_zoom_table()
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            host: default_camera_host(),
            port: default_camera_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            connect_attempts: default_connect_attempts(),
            connect_backoff_ms: default_connect_backoff_ms(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_command_interval_ms: default_min_command_interval_ms(),
            max_idle_interval_ms: default_max_idle_interval_ms(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            poll_rate_hz: default_poll_rate_hz(),
            pan_axis: default_pan_axis(),
            tilt_axis: default_tilt_axis(),
            zoom_axis: default_zoom_axis(),
            invert_pan: default_invert_pan(),
            invert_tilt: default_invert_tilt(),
            invert_zoom: default_invert_zoom(),
            focus_near_button: default_focus_near_button(),
            focus_far_button: default_focus_far_button(),
            focus_toggle_button: default_focus_toggle_button(),
            invert_tilt_button: default_invert_tilt_button(),
        }
    }
}

impl Default for CurvesConfig {
    fn default() -> Self {
        Self {
            pan: default_pan_table(),
            tilt: default_tilt_table(),
            zoom: default_zoom_table(),
            focus: default_focus_table(),
        }
    }
}

impl DispatchConfig {
    /// Converts the millisecond knobs into dispatch loop timing.
    #[must_use]
    pub fn timing(&self) -> DispatchTiming {
        DispatchTiming {
            min_command_interval: Duration::from_millis(self.min_command_interval_ms),
            max_idle_interval: Duration::from_millis(self.max_idle_interval_ms),
        }
    }
}

impl CameraConfig {
    /// Connect timeout as a duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Backoff between startup connect attempts.
    #[must_use]
    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ptz_joystick::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), ptz_joystick::error::PtzError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.camera.host.is_empty() {
            return Err(crate::error::PtzError::Config(toml::de::Error::custom(
                "camera host cannot be empty",
            )));
        }

        if self.camera.connect_timeout_ms == 0 || self.camera.connect_timeout_ms > 60000 {
            return Err(crate::error::PtzError::Config(toml::de::Error::custom(
                "connect_timeout_ms must be between 1 and 60000",
            )));
        }

        if self.camera.connect_attempts == 0 || self.camera.connect_attempts > 100 {
            return Err(crate::error::PtzError::Config(toml::de::Error::custom(
                "connect_attempts must be between 1 and 100",
            )));
        }

        if self.camera.connect_backoff_ms > 60000 {
            return Err(crate::error::PtzError::Config(toml::de::Error::custom(
                "connect_backoff_ms must be at most 60000",
            )));
        }

        if self.dispatch.min_command_interval_ms == 0
            || self.dispatch.min_command_interval_ms > 1000
        {
            return Err(crate::error::PtzError::Config(toml::de::Error::custom(
                "min_command_interval_ms must be between 1 and 1000",
            )));
        }

        if self.dispatch.max_idle_interval_ms == 0 || self.dispatch.max_idle_interval_ms > 10000 {
            return Err(crate::error::PtzError::Config(toml::de::Error::custom(
                "max_idle_interval_ms must be between 1 and 10000",
            )));
        }

        if self.input.poll_rate_hz == 0 || self.input.poll_rate_hz > 1000 {
            return Err(crate::error::PtzError::Config(toml::de::Error::custom(
                "poll_rate_hz must be between 1 and 1000",
            )));
        }

        let axes = [
            self.input.pan_axis,
            self.input.tilt_axis,
            self.input.zoom_axis,
        ];
        if axes[0] == axes[1] || axes[0] == axes[2] || axes[1] == axes[2] {
            return Err(crate::error::PtzError::Config(toml::de::Error::custom(
                "pan_axis, tilt_axis and zoom_axis must be distinct",
            )));
        }

        // Constructing the curves is the validation
        for (name, table) in [
            ("pan", &self.curves.pan),
            ("tilt", &self.curves.tilt),
            ("zoom", &self.curves.zoom),
            ("focus", &self.curves.focus),
        ] {
            table.curve().map_err(|e| {
                crate::error::PtzError::Config(toml::de::Error::custom(format!(
                    "invalid {} sensitivity table: {}",
                    name, e
                )))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.camera.host, "172.16.0.201");
        assert_eq!(config.camera.port, 1259);
        assert_eq!(config.input.poll_rate_hz, 100);
        assert_eq!(config.dispatch.min_command_interval_ms, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[camera]
host = "10.0.0.40"
port = 5678

[input]
poll_rate_hz = 60
invert_tilt = false

[curves.zoom]
joy = [0.0, 0.1, 1.0]
cam = [0, 0, 5]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.camera.host, "10.0.0.40");
        assert_eq!(config.camera.port, 5678);
        assert_eq!(config.input.poll_rate_hz, 60);
        assert!(!config.input.invert_tilt);
        assert_eq!(config.curves.zoom.cam, vec![0, 0, 5]);
        // Unspecified sections keep their defaults
        assert_eq!(config.curves.pan.cam, vec![0, 0, 2, 8, 15, 20]);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(Config::load("/nonexistent/ptz-joystick.toml").is_err());
    }

    #[test]
    fn test_empty_host_rejected() {
        let mut config = Config::default();
        config.camera.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connect_timeout_bounds() {
        let mut config = Config::default();
        config.camera.connect_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.camera.connect_timeout_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connect_attempts_bounds() {
        let mut config = Config::default();
        config.camera.connect_attempts = 0;
        assert!(config.validate().is_err());

        config.camera.connect_attempts = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_command_interval_bounds() {
        let mut config = Config::default();
        config.dispatch.min_command_interval_ms = 0;
        assert!(config.validate().is_err());

        config.dispatch.min_command_interval_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_idle_interval_bounds() {
        let mut config = Config::default();
        config.dispatch.max_idle_interval_ms = 0;
        assert!(config.validate().is_err());

        config.dispatch.max_idle_interval_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_rate_bounds() {
        let mut config = Config::default();
        config.input.poll_rate_hz = 0;
        assert!(config.validate().is_err());

        config.input.poll_rate_hz = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_axes_rejected() {
        let mut config = Config::default();
        config.input.zoom_axis = config.input.pan_axis;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_curve_rejected() {
        let mut config = Config::default();
        config.curves.tilt = CurveTable {
            joy: vec![0.0, 0.5, 0.4, 1.0],
            cam: vec![0, 1, 2, 3],
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tilt"));
    }

    #[test]
    fn test_curve_with_too_few_points_rejected() {
        let mut config = Config::default();
        config.curves.focus = CurveTable {
            joy: vec![0.0],
            cam: vec![0],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dispatch_timing_conversion() {
        let config = DispatchConfig {
            min_command_interval_ms: 25,
            max_idle_interval_ms: 250,
        };
        let timing = config.timing();
        assert_eq!(timing.min_command_interval, Duration::from_millis(25));
        assert_eq!(timing.max_idle_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_default_tables_match_deployment() {
        let curves = CurvesConfig::default();
        assert_eq!(curves.pan.joy, vec![0.0, 0.05, 0.3, 0.7, 0.9, 1.0]);
        assert_eq!(curves.pan.cam, vec![0, 0, 2, 8, 15, 20]);
        assert_eq!(curves.tilt.cam, vec![0, 0, 3, 6, 14, 18]);
        assert_eq!(curves.zoom.cam, vec![0, 0, 7]);
        // Every default table must construct
        assert!(curves.pan.curve().is_ok());
        assert!(curves.tilt.curve().is_ok());
        assert!(curves.zoom.curve().is_ok());
        assert!(curves.focus.curve().is_ok());
    }
}
