//! # Error Types
//!
//! Custom error types for PTZ Joystick using `thiserror`.

use thiserror::Error;

/// Main error type for PTZ Joystick
#[derive(Debug, Error)]
pub enum PtzError {
    /// Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Camera link call failed (recoverable, the dispatch loop continues)
    #[error("Camera link error: {0}")]
    Link(String),

    /// Initial camera handshake failed (device or network absent)
    #[error("Startup connect error: {0}")]
    StartupConnect(String),

    /// Controller device errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No usable controller device found
    #[error("Controller not found")]
    ControllerNotFound,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for PTZ Joystick
pub type Result<T> = std::result::Result<T, PtzError>;
