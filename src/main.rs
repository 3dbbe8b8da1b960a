//! # PTZ Joystick
//!
//! Drive a VISCA-over-IP PTZ camera with a gamepad or joystick.
//!
//! This application maps controller axes through per-axis sensitivity curves
//! into pan/tilt, zoom and focus speed commands, coalesces them so the camera
//! only ever sees the latest intended state, and dispatches them over TCP at
//! a pace the camera can absorb.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber;

use ptz_joystick::config::{CameraConfig, Config};
use ptz_joystick::dispatch::{CommandCoalescer, DispatchLoop};
use ptz_joystick::input::{GamepadReader, PollLoop};
use ptz_joystick::link::ViscaLink;

/// Configuration file used when no path is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Resolves the configuration path from the process arguments.
///
/// The first argument after the binary name wins; anything further is
/// ignored.
fn config_path_from_args<I: Iterator<Item = String>>(mut args: I) -> String {
    args.nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// Connects to the camera, retrying with a fixed backoff.
///
/// A camera that boots slower than this program is the normal case at
/// power-on, so a refused connection is retried up to the configured
/// attempt count before it becomes fatal.
///
/// # Errors
///
/// Returns the last connect error once all attempts are exhausted.
async fn connect_with_retry(camera: &CameraConfig) -> Result<ViscaLink> {
    let mut attempt = 1;
    loop {
        match ViscaLink::connect(&camera.host, camera.port, camera.connect_timeout()).await {
            Ok(link) => {
                info!("Connected to camera at {}", link.peer());
                return Ok(link);
            }
            Err(e) if attempt < camera.connect_attempts => {
                warn!(
                    "Camera connect attempt {}/{} failed: {}",
                    attempt, camera.connect_attempts, e
                );
                sleep(camera.connect_backoff()).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "giving up on {}:{} after {} attempts",
                        camera.host, camera.port, camera.connect_attempts
                    )
                });
            }
        }
    }
}

/// Main entry point for the PTZ joystick application.
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load and validate the TOML configuration
///    - Connect to the camera (bounded retries with backoff)
///    - Open the controller and start its blocking reader thread
///
/// 2. **Steady State**
///    - The poll loop samples the controller at the configured rate and
///      feeds the coalescer
///    - The dispatch loop drains the coalescer and talks to the camera
///    - Ctrl+C is the only exit path
///
/// 3. **Graceful Shutdown**
///    - Stop the poll loop, then the dispatch loop
///    - The dispatch loop parks every axis at speed 0 before exiting
///    - Log total command counts
///
/// # Errors
///
/// Returns error if:
/// - The configuration file is missing or invalid
/// - The camera cannot be reached within the configured attempts
/// - No usable controller device is found
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("PTZ Joystick v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = config_path_from_args(std::env::args());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;
    info!("Loaded configuration from {}", config_path);

    let link = connect_with_retry(&config.camera).await?;

    let (reader, pad) = GamepadReader::open(&config.input.device_path)?;
    // evdev reads block, so the reader gets a plain OS thread; it parks
    // itself if the device goes away
    std::thread::spawn(move || reader.run());

    let coalescer = Arc::new(CommandCoalescer::new());
    let mut dispatch = DispatchLoop::spawn(
        Arc::clone(&coalescer),
        Box::new(link),
        config.dispatch.timing(),
    );

    let poll = PollLoop::new(
        Arc::new(pad),
        Arc::clone(&coalescer),
        config.input.clone(),
        &config.curves,
    )?;
    let mut poll_handle = poll.spawn();

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");

    // Producer first, so nothing refills the coalescer while the dispatch
    // loop drains and parks the camera
    poll_handle.stop();
    poll_handle.join().await;
    dispatch.stop();
    dispatch.join().await;

    info!(
        "Total commands sent: {} ({} failed)",
        dispatch.health().commands_sent(),
        dispatch.health().commands_failed()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> impl Iterator<Item = String> {
        items
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_config_path_defaults_without_argument() {
        assert_eq!(
            config_path_from_args(args(&["ptz-joystick"])),
            DEFAULT_CONFIG_PATH
        );
    }

    #[test]
    fn test_config_path_takes_first_argument() {
        assert_eq!(
            config_path_from_args(args(&["ptz-joystick", "/etc/ptz.toml", "extra"])),
            "/etc/ptz.toml"
        );
    }

    #[test]
    fn test_default_config_path_exists_in_repo() {
        // The shipped default configuration must stay loadable
        assert!(std::path::Path::new(DEFAULT_CONFIG_PATH).exists());
        assert!(Config::load(DEFAULT_CONFIG_PATH).is_ok());
    }
}
