//! # VISCA-over-IP Adapter
//!
//! Thin TCP adapter implementing [`CameraLink`] for VISCA-class cameras.
//!
//! Only the three continuous-drive commands the dispatcher needs are
//! encoded here (pan/tilt drive, zoom variable, focus variable). Replies
//! are drained and discarded; command delivery is best-effort by design.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::CameraLink;
use crate::error::{PtzError, Result};

/// Maximum VISCA pan/tilt speed byte.
const PANTILT_SPEED_MAX: u32 = 0x18;

/// Maximum VISCA zoom/focus speed nibble.
const LENS_SPEED_MAX: u32 = 0x07;

/// VISCA direction byte: negative / positive / stop.
fn direction(value: i32, negative: u8, positive: u8) -> u8 {
    match value.signum() {
        -1 => negative,
        1 => positive,
        _ => 0x03,
    }
}

/// Builds the pan/tilt drive payload (without address and terminator).
fn pantilt_payload(pan: i32, tilt: i32) -> [u8; 7] {
    // Speed bytes must be at least 1 even for a stopped axis
    let pan_speed = pan.unsigned_abs().clamp(1, PANTILT_SPEED_MAX) as u8;
    let tilt_speed = tilt.unsigned_abs().clamp(1, PANTILT_SPEED_MAX) as u8;
    [
        0x01,
        0x06,
        0x01,
        pan_speed,
        tilt_speed,
        direction(pan, 0x01, 0x02),
        direction(tilt, 0x02, 0x01),
    ]
}

/// Builds the variable-speed zoom payload.
fn zoom_payload(speed: i32) -> [u8; 4] {
    [0x01, 0x04, 0x07, lens_byte(speed)]
}

/// Builds the variable-speed focus payload.
fn focus_payload(speed: i32) -> [u8; 4] {
    [0x01, 0x04, 0x08, lens_byte(speed)]
}

/// Zoom/focus byte: high nibble selects tele/far (2) or wide/near (3),
/// low nibble carries the speed; 0x00 stops.
fn lens_byte(speed: i32) -> u8 {
    let magnitude = speed.unsigned_abs().clamp(1, LENS_SPEED_MAX) as u8;
    match speed.signum() {
        1 => 0x20 | magnitude,
        -1 => 0x30 | magnitude,
        _ => 0x00,
    }
}

/// TCP connection to a VISCA-class camera.
///
/// Owned exclusively by the dispatch loop once handed over.
pub struct ViscaLink {
    stream: TcpStream,
    peer: String,
}

impl std::fmt::Debug for ViscaLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViscaLink")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl ViscaLink {
    /// Connects to the camera and probes the command channel.
    ///
    /// The probe is a neutral `zoom(0)`; a camera that rejects it at the
    /// protocol level is still considered reachable, but a transport
    /// failure at this stage means the device or network is absent.
    ///
    /// # Arguments
    ///
    /// * `host` - Camera address
    /// * `port` - VISCA TCP port
    /// * `timeout` - Bound on the TCP connect
    ///
    /// # Errors
    ///
    /// Returns [`PtzError::StartupConnect`] if the connect times out, is
    /// refused, or the probe cannot be written.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let peer = format!("{}:{}", host, port);
        debug!("Connecting to camera at {}", peer);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&peer))
            .await
            .map_err(|_| {
                PtzError::StartupConnect(format!("timed out connecting to {}", peer))
            })?
            .map_err(|e| {
                PtzError::StartupConnect(format!("failed to connect to {}: {}", peer, e))
            })?;

        stream.set_nodelay(true).map_err(|e| {
            PtzError::StartupConnect(format!("failed to configure socket for {}: {}", peer, e))
        })?;

        let mut link = Self { stream, peer };

        link.zoom(0)
            .await
            .map_err(|e| PtzError::StartupConnect(format!("handshake probe failed: {}", e)))?;

        info!("Connected to camera at {}", link.peer);
        Ok(link)
    }

    /// Returns the peer address this link is connected to.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Frames and sends one command payload.
    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(payload.len() + 2);
        frame.push(0x81);
        frame.extend_from_slice(payload);
        frame.push(0xFF);

        self.stream.write_all(&frame).await.map_err(|e| {
            PtzError::Link(format!("failed to write command to {}: {}", self.peer, e))
        })?;

        // Drain pending ack/completion replies so the receive buffer never
        // fills; their content is not interpreted.
        let mut scratch = [0u8; 256];
        while let Ok(n) = self.stream.try_read(&mut scratch) {
            if n == 0 {
                break;
            }
        }

        debug!("Sent VISCA command ({} bytes)", frame.len());
        Ok(())
    }
}

#[async_trait]
impl CameraLink for ViscaLink {
    async fn pantilt(&mut self, pan: i32, tilt: i32) -> Result<()> {
        self.send(&pantilt_payload(pan, tilt)).await
    }

    async fn zoom(&mut self, speed: i32) -> Result<()> {
        self.send(&zoom_payload(speed)).await
    }

    async fn focus(&mut self, speed: i32) -> Result<()> {
        self.send(&focus_payload(speed)).await
    }
}
