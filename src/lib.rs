//! # PTZ Joystick Library
//!
//! Control a VISCA PTZ camera with an analog game controller.
//!
//! This library translates live joystick axis positions into pan/tilt/zoom/focus
//! speed commands and dispatches them to a camera over a VISCA-class network
//! link, coalescing bursts of input into the single most recent command per
//! motion group so the slow command channel is never overwhelmed by the fast
//! input-polling loop.

pub mod config;
pub mod error;
pub mod input;
pub mod dispatch;
pub mod link;
