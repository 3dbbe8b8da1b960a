//! # Axis Mapper Module
//!
//! Converts raw joystick axis positions into signed camera motor speeds.
//!
//! The sign comes from the stick direction (optionally flipped by an
//! inversion flag), the magnitude from a [`SensitivityCurve`] lookup of the
//! absolute position. A centered stick always maps to speed 0, for either
//! inversion setting.
//!
//! ## Usage
//!
//! ```
//! use ptz_joystick::input::curve::SensitivityCurve;
//! use ptz_joystick::input::mapper::map_axis;
//!
//! let curve = SensitivityCurve::new(&[0.0, 0.07, 0.3, 0.9, 1.0], &[0, 0, 2, 12, 24])?;
//!
//! assert_eq!(map_axis(0.5, &curve, false), 5);
//! assert_eq!(map_axis(-0.5, &curve, true), 5);
//! assert_eq!(map_axis(0.0, &curve, true), 0);
//! # Ok::<(), ptz_joystick::error::PtzError>(())
//! ```

use super::curve::SensitivityCurve;

/// One raw axis reading, produced each poll tick and consumed immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSample {
    /// evdev ABS code of the axis.
    pub axis: u8,
    /// Normalized position in [-1, 1].
    pub position: f32,
}

/// Maps a raw axis position to a signed motor speed.
///
/// # Arguments
///
/// * `raw` - Raw axis position in [-1, 1] (values outside are clamped)
/// * `curve` - Sensitivity curve for this axis class
/// * `invert` - Flip the sign of the output
///
/// # Examples
///
/// ```
/// use ptz_joystick::input::curve::SensitivityCurve;
/// use ptz_joystick::input::mapper::map_axis;
///
/// let curve = SensitivityCurve::new(&[0.0, 0.2, 1.0], &[0, 0, 7])?;
/// assert_eq!(map_axis(1.0, &curve, false), 7);
/// assert_eq!(map_axis(1.0, &curve, true), -7);
/// # Ok::<(), ptz_joystick::error::PtzError>(())
/// ```
#[must_use]
pub fn map_axis(raw: f32, curve: &SensitivityCurve, invert: bool) -> i32 {
    // Zero has no natural sign; special-case it so inversion cannot
    // manufacture a spurious -0 command.
    if raw == 0.0 {
        return 0;
    }

    let mut sign: i32 = if raw >= 0.0 { 1 } else { -1 };
    if invert {
        sign = -sign;
    }

    sign * curve.lookup(raw.abs()) as i32
}

/// A sensitivity curve paired with its inversion flag.
///
/// The inversion flag is mutable at runtime: the tilt axis can be flipped
/// from a controller button while the program runs.
#[derive(Debug, Clone)]
pub struct AxisMapper {
    curve: SensitivityCurve,
    invert: bool,
}

impl AxisMapper {
    /// Creates a mapper from a curve and an initial inversion flag.
    #[must_use]
    pub fn new(curve: SensitivityCurve, invert: bool) -> Self {
        Self { curve, invert }
    }

    /// Maps a raw axis position through this mapper's curve and inversion.
    #[must_use]
    pub fn map(&self, raw: f32) -> i32 {
        map_axis(raw, &self.curve, self.invert)
    }

    /// Maps one sampled reading.
    #[must_use]
    pub fn map_sample(&self, sample: AxisSample) -> i32 {
        self.map(sample.position)
    }

    /// Returns the current inversion flag.
    #[must_use]
    pub fn inverted(&self) -> bool {
        self.invert
    }

    /// Flips the inversion flag, returning the new value.
    pub fn toggle_invert(&mut self) -> bool {
        self.invert = !self.invert;
        self.invert
    }
}

/// Rising-edge detector for a digital button.
///
/// Poll-tick sampling sees a held button as pressed on every tick; toggles
/// must fire only on the release-to-press transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonEdge {
    was_pressed: bool,
}

impl ButtonEdge {
    /// Creates an edge detector with the button considered released.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the current pressed state, returning true on a rising edge.
    ///
    /// # Examples
    ///
    /// ```
    /// use ptz_joystick::input::mapper::ButtonEdge;
    ///
    /// let mut edge = ButtonEdge::new();
    /// assert!(edge.rising(true));   // press
    /// assert!(!edge.rising(true));  // held
    /// assert!(!edge.rising(false)); // release
    /// assert!(edge.rising(true));   // press again
    /// ```
    pub fn rising(&mut self, pressed: bool) -> bool {
        let edge = pressed && !self.was_pressed;
        self.was_pressed = pressed;
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pan_tilt_curve() -> SensitivityCurve {
        SensitivityCurve::new(&[0.0, 0.07, 0.3, 0.9, 1.0], &[0, 0, 2, 12, 24]).unwrap()
    }

    #[test]
    fn test_zero_maps_to_zero_for_any_inversion() {
        let curve = pan_tilt_curve();
        assert_eq!(map_axis(0.0, &curve, false), 0);
        assert_eq!(map_axis(0.0, &curve, true), 0);
    }

    #[test]
    fn test_sign_follows_stick_direction() {
        let curve = pan_tilt_curve();
        assert_eq!(map_axis(0.5, &curve, false), 5);
        assert_eq!(map_axis(-0.5, &curve, false), -5);
    }

    #[test]
    fn test_invert_flips_sign() {
        let curve = pan_tilt_curve();
        for raw in [-1.0, -0.5, -0.2, 0.2, 0.5, 1.0] {
            assert_eq!(
                map_axis(raw, &curve, true),
                -map_axis(raw, &curve, false),
                "inverted mapping must mirror the plain mapping at {}",
                raw
            );
        }
    }

    #[test]
    fn test_reference_scenario_inverted_negative_input() {
        // |−0.5| -> 5.33 -> 5; negative sign flipped by invert -> +5
        assert_eq!(map_axis(-0.5, &pan_tilt_curve(), true), 5);
    }

    #[test]
    fn test_out_of_range_input_clamped() {
        let curve = pan_tilt_curve();
        assert_eq!(map_axis(1.7, &curve, false), 24);
        assert_eq!(map_axis(-1.7, &curve, false), -24);
    }

    #[test]
    fn test_deadzone_segment_swallows_small_deflection() {
        let curve = pan_tilt_curve();
        assert_eq!(map_axis(0.05, &curve, false), 0);
        assert_eq!(map_axis(-0.05, &curve, true), 0);
    }

    #[test]
    fn test_axis_mapper_maps_samples() {
        let mapper = AxisMapper::new(pan_tilt_curve(), false);
        let sample = AxisSample {
            axis: 0,
            position: -0.5,
        };
        assert_eq!(mapper.map_sample(sample), -5);
    }

    #[test]
    fn test_axis_mapper_toggle_invert() {
        let mut mapper = AxisMapper::new(pan_tilt_curve(), false);
        assert_eq!(mapper.map(0.5), 5);

        assert!(mapper.toggle_invert());
        assert_eq!(mapper.map(0.5), -5);

        assert!(!mapper.toggle_invert());
        assert_eq!(mapper.map(0.5), 5);
    }

    #[test]
    fn test_button_edge_sequence() {
        let mut edge = ButtonEdge::new();
        assert!(!edge.rising(false));
        assert!(edge.rising(true));
        assert!(!edge.rising(true));
        assert!(!edge.rising(false));
        assert!(edge.rising(true));
    }
}
