//! # Input Module
//!
//! Everything between the physical joystick and the command coalescer.
//!
//! This module handles:
//! - Reading the controller via evdev on a dedicated blocking thread
//! - Piecewise-linear sensitivity curves per axis class
//! - Mapping raw axis positions to signed camera speeds
//! - The fixed-rate poll loop that feeds motion commands downstream

pub mod curve;
pub mod gamepad;
pub mod mapper;
pub mod poll;
pub mod source;

pub use curve::SensitivityCurve;
pub use gamepad::{GamepadReader, SharedPad};
pub use mapper::{map_axis, AxisMapper, AxisSample, ButtonEdge};
pub use poll::{FocusMode, PollHandle, PollLoop};
pub use source::InputSource;
