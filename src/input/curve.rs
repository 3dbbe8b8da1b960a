//! # Sensitivity Curve Module
//!
//! Piecewise-linear lookup tables mapping normalized joystick magnitude to
//! camera motor speed.
//!
//! ## Breakpoint Tables
//!
//! A curve is defined by two parallel breakpoint lists: `joy` positions in
//! `[0, 1]` and `cam` speeds (non-negative integers). A lookup interpolates
//! linearly between the two breakpoints bracketing the input magnitude.
//! A flat initial segment (`joy = [0, 0.07, ...]`, `cam = [0, 0, ...]`)
//! doubles as a deadzone.
//!
//! ## Usage
//!
//! ```
//! use ptz_joystick::input::curve::SensitivityCurve;
//!
//! let curve = SensitivityCurve::new(&[0.0, 0.07, 0.3, 0.9, 1.0], &[0, 0, 2, 12, 24])?;
//!
//! assert_eq!(curve.lookup(0.0), 0);
//! assert_eq!(curve.lookup(0.5), 5);
//! assert_eq!(curve.lookup(1.0), 24);
//! # Ok::<(), ptz_joystick::error::PtzError>(())
//! ```

use serde::de::Error;

use crate::error::{PtzError, Result};

/// Monotonic piecewise-linear mapping from input magnitude to motor speed.
///
/// Immutable after construction. One instance exists per axis class
/// (pan, tilt, zoom, focus), selected by configuration.
#[derive(Debug, Clone)]
pub struct SensitivityCurve {
    /// Input breakpoints in [0, 1], strictly increasing, first is 0.
    joy: Vec<f32>,
    /// Output breakpoints, non-decreasing, first is 0. Stored as f32 for
    /// interpolation; every breakpoint is integer-valued.
    cam: Vec<f32>,
}

impl SensitivityCurve {
    /// Creates a curve from parallel breakpoint lists.
    ///
    /// # Arguments
    ///
    /// * `joy` - Input breakpoints in [0, 1], strictly increasing, first must be 0
    /// * `cam` - Output speed breakpoints, non-decreasing, first must be 0
    ///
    /// # Errors
    ///
    /// Returns a configuration error if:
    /// - fewer than 2 breakpoints are given, or the lists differ in length
    /// - the input breakpoints are not strictly increasing, or leave [0, 1]
    /// - the output breakpoints decrease
    /// - the first pair is not (0, 0)
    ///
    /// # Examples
    ///
    /// ```
    /// use ptz_joystick::input::curve::SensitivityCurve;
    ///
    /// let curve = SensitivityCurve::new(&[0.0, 0.2, 1.0], &[0, 0, 7])?;
    /// assert_eq!(curve.lookup(1.0), 7);
    /// # Ok::<(), ptz_joystick::error::PtzError>(())
    /// ```
    pub fn new(joy: &[f32], cam: &[u32]) -> Result<Self> {
        if joy.len() < 2 {
            return Err(config_error("sensitivity table needs at least 2 breakpoints"));
        }

        if joy.len() != cam.len() {
            return Err(config_error(format!(
                "sensitivity table is ragged: {} joy breakpoints but {} cam breakpoints",
                joy.len(),
                cam.len()
            )));
        }

        if joy[0] != 0.0 || cam[0] != 0 {
            return Err(config_error("sensitivity table must start at (0, 0)"));
        }

        for pair in joy.windows(2) {
            if pair[1] <= pair[0] {
                return Err(config_error(format!(
                    "joy breakpoints must be strictly increasing ({} follows {})",
                    pair[1], pair[0]
                )));
            }
        }

        if joy[joy.len() - 1] > 1.0 {
            return Err(config_error("joy breakpoints must stay within [0, 1]"));
        }

        for pair in cam.windows(2) {
            if pair[1] < pair[0] {
                return Err(config_error(format!(
                    "cam breakpoints must be non-decreasing ({} follows {})",
                    pair[1], pair[0]
                )));
            }
        }

        Ok(Self {
            joy: joy.to_vec(),
            cam: cam.iter().map(|&v| v as f32).collect(),
        })
    }

    /// Looks up the motor speed for a normalized input magnitude.
    ///
    /// Magnitudes outside [0, 1] are clamped before lookup; magnitudes beyond
    /// the first/last breakpoint clamp to the boundary output. The interpolated
    /// value is rounded half away from zero, so the first breakpoint with a
    /// nonzero output also fixes the minimum-command threshold.
    ///
    /// Deterministic and pure, no side effects.
    ///
    /// # Arguments
    ///
    /// * `magnitude` - Normalized input magnitude, nominally in [0, 1]
    ///
    /// # Examples
    ///
    /// ```
    /// use ptz_joystick::input::curve::SensitivityCurve;
    ///
    /// let curve = SensitivityCurve::new(&[0.0, 0.07, 0.3, 0.9, 1.0], &[0, 0, 2, 12, 24])?;
    ///
    /// // 0.5 sits a third of the way into the [0.3, 0.9] segment:
    /// // 2 + 0.333 * (12 - 2) = 5.33, rounds to 5
    /// assert_eq!(curve.lookup(0.5), 5);
    /// # Ok::<(), ptz_joystick::error::PtzError>(())
    /// ```
    #[must_use]
    pub fn lookup(&self, magnitude: f32) -> u32 {
        let m = magnitude.clamp(0.0, 1.0);
        let last = self.joy.len() - 1;

        if m <= self.joy[0] {
            return self.cam[0] as u32;
        }
        if m >= self.joy[last] {
            return self.cam[last] as u32;
        }

        // Find the segment with joy[i] <= m < joy[i + 1]. Tables are tiny
        // (3-6 points), a linear scan beats a binary search here.
        let i = self
            .joy
            .windows(2)
            .position(|pair| m < pair[1])
            .unwrap_or(last - 1);

        let t = (m - self.joy[i]) / (self.joy[i + 1] - self.joy[i]);
        let speed = self.cam[i] + t * (self.cam[i + 1] - self.cam[i]);

        // Round half away from zero (f32::round). Speeds are non-negative.
        speed.round() as u32
    }

    /// Returns the largest output speed the curve can produce.
    #[must_use]
    pub fn max_speed(&self) -> u32 {
        self.cam[self.cam.len() - 1] as u32
    }
}

fn config_error(msg: impl std::fmt::Display) -> PtzError {
    PtzError::Config(toml::de::Error::custom(msg))
}
