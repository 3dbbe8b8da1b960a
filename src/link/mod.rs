//! # Camera Link Module
//!
//! The seam between the dispatch loop and the camera.
//!
//! The dispatch loop is the exclusive owner of the link: no other component
//! issues link operations, so commands can never reach the device out of
//! order. Every call is fire-and-forget with best-effort delivery; a failed
//! call is reported to the caller and the next state update acts as the
//! implicit retry.
//!
//! [`visca`] provides the TCP adapter for VISCA-class cameras. The trait is
//! mocked in tests.

use async_trait::async_trait;

use crate::error::Result;

pub mod visca;

pub use visca::ViscaLink;

/// Speed-setting operations exposed by a PTZ camera.
///
/// Calls may block on network I/O (bounded by the link's own timeout) and
/// may fail with a link-layer error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CameraLink: Send {
    /// Sets pan and tilt speeds as one atomic command.
    ///
    /// Positive pan is right, positive tilt is up; 0 stops the axis.
    async fn pantilt(&mut self, pan: i32, tilt: i32) -> Result<()>;

    /// Sets the zoom speed. Positive is tele, negative is wide, 0 stops.
    async fn zoom(&mut self, speed: i32) -> Result<()>;

    /// Sets the manual focus speed. Positive is far, negative is near, 0 stops.
    async fn focus(&mut self, speed: i32) -> Result<()>;
}
