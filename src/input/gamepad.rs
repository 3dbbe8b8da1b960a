//! # Gamepad Module
//!
//! Joystick input via the Linux evdev interface.
//!
//! A dedicated reader thread blocks on `fetch_events` and folds each event
//! into a shared snapshot of axis and button state; the poll loop samples
//! that snapshot at its own tick rate. Device enumeration stops at the
//! initial open: either the configured path is used directly, or the first
//! joystick-capable `/dev/input/event*` device is picked. Hotplug after
//! startup is not handled.
//!
//! ## Value Conventions
//!
//! - Analog axes arrive as 0-255 with 128 at center and are normalized to
//!   [-1, 1].
//! - Button ids in configuration are evdev key code offsets from the
//!   button-class base: `BTN_SOUTH` (0x130) for gamepads, `BTN_TRIGGER`
//!   (0x120) for classic joysticks. A device uses one class, so the two
//!   ranges cannot collide.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use evdev::{AbsoluteAxisType, Device, InputEvent, InputEventKind, Key};
use tracing::{debug, info, warn};

use super::source::InputSource;
use crate::error::{PtzError, Result};

/// Raw axis value range.
pub const AXIS_MIN: i32 = 0;
/// Raw axis value range.
pub const AXIS_MAX: i32 = 255;
/// Raw axis center value.
pub const AXIS_CENTER: i32 = 128;

/// Gamepad-class button base (BTN_SOUTH).
const GAMEPAD_BUTTON_BASE: u16 = 0x130;
/// Joystick-class button base (BTN_TRIGGER).
const JOYSTICK_BUTTON_BASE: u16 = 0x120;

/// Latest sampled state of every axis and button seen so far.
#[derive(Debug, Default)]
struct PadState {
    axes: HashMap<u8, f32>,
    buttons: HashMap<u8, bool>,
}

impl PadState {
    fn process_event(&mut self, event: &InputEvent) {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => {
                if let Ok(id) = u8::try_from(axis.0) {
                    self.axes.insert(id, normalize_axis(event.value()));
                }
            }
            InputEventKind::Key(key) => {
                if let Some(id) = button_id(key) {
                    self.buttons.insert(id, event.value() != 0);
                }
            }
            _ => {
                // Sync and misc events carry no state
            }
        }
    }

    /// Centers every axis and releases every button.
    fn neutralize(&mut self) {
        for value in self.axes.values_mut() {
            *value = 0.0;
        }
        for value in self.buttons.values_mut() {
            *value = false;
        }
    }
}

/// Normalizes a raw 0-255 axis value to [-1, 1].
fn normalize_axis(raw: i32) -> f32 {
    let clamped = raw.clamp(AXIS_MIN, AXIS_MAX);
    ((clamped - AXIS_CENTER) as f32 / (AXIS_MAX - AXIS_CENTER) as f32).clamp(-1.0, 1.0)
}

/// Maps an evdev key to a configured button id.
fn button_id(key: Key) -> Option<u8> {
    let code = key.code();
    if (GAMEPAD_BUTTON_BASE..GAMEPAD_BUTTON_BASE + 0x10).contains(&code) {
        Some((code - GAMEPAD_BUTTON_BASE) as u8)
    } else if (JOYSTICK_BUTTON_BASE..JOYSTICK_BUTTON_BASE + 0x10).contains(&code) {
        Some((code - JOYSTICK_BUTTON_BASE) as u8)
    } else {
        None
    }
}

/// Cloneable read handle onto the reader thread's snapshot.
#[derive(Debug, Clone)]
pub struct SharedPad {
    state: Arc<Mutex<PadState>>,
}

impl InputSource for SharedPad {
    fn axis(&self, id: u8) -> f32 {
        self.state
            .lock()
            .expect("pad state mutex poisoned")
            .axes
            .get(&id)
            .copied()
            .unwrap_or(0.0)
    }

    fn button(&self, id: u8) -> bool {
        self.state
            .lock()
            .expect("pad state mutex poisoned")
            .buttons
            .get(&id)
            .copied()
            .unwrap_or(false)
    }
}

/// Owns the evdev device and feeds the shared snapshot.
pub struct GamepadReader {
    device: Device,
    device_path: String,
    state: Arc<Mutex<PadState>>,
}

impl GamepadReader {
    /// Opens a joystick device and returns the reader plus its read handle.
    ///
    /// # Arguments
    ///
    /// * `device_path` - Path to the event device; empty string auto-detects
    ///
    /// # Errors
    ///
    /// - `Controller`: the configured device cannot be opened
    /// - `ControllerNotFound`: auto-detection found no joystick-capable device
    pub fn open(device_path: &str) -> Result<(Self, SharedPad)> {
        let (device, device_path) = if device_path.is_empty() {
            Self::detect()?
        } else {
            let device = Device::open(device_path).map_err(|e| {
                PtzError::Controller(format!("Failed to open {}: {}", device_path, e))
            })?;
            (device, device_path.to_string())
        };

        if let Some(name) = device.name() {
            info!("Using controller '{}' at {}", name, device_path);
        } else {
            info!("Using controller at {}", device_path);
        }

        let state = Arc::new(Mutex::new(PadState::default()));
        let shared = SharedPad {
            state: Arc::clone(&state),
        };
        Ok((
            Self {
                device,
                device_path,
                state,
            },
            shared,
        ))
    }

    /// Scans `/dev/input` for the first device with analog axes and
    /// joystick- or gamepad-class buttons.
    fn detect() -> Result<(Device, String)> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(PtzError::Controller(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| PtzError::Controller(format!("Failed to read /dev/input: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PtzError::Controller(format!("Failed to read directory entry: {}", e)))?;

        // Sorted for deterministic selection when several devices are present
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            match path.file_name() {
                Some(filename) if filename.to_string_lossy().starts_with("event") => {}
                _ => continue,
            }

            match Device::open(&path) {
                Ok(device) => {
                    if is_joystick(&device) {
                        let device_path = path.to_string_lossy().to_string();
                        return Ok((device, device_path));
                    }
                    debug!("Skipping non-joystick device {}", path.display());
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(PtzError::ControllerNotFound)
    }

    /// Returns the `/dev/input/eventX` path in use.
    #[must_use]
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Blocking event loop; run on a dedicated thread.
    ///
    /// Ends when the device goes away. The shared snapshot is neutralized
    /// on the way out, so the poll loop commands a full stop instead of
    /// holding the final stick position; the warning log is the operator's
    /// cue to restart.
    pub fn run(mut self) {
        loop {
            let events = match self.device.fetch_events() {
                Ok(events) => events.collect::<Vec<_>>(),
                Err(e) => {
                    warn!("Controller read failed, centering all axes: {}", e);
                    self.state
                        .lock()
                        .expect("pad state mutex poisoned")
                        .neutralize();
                    return;
                }
            };

            let mut state = self.state.lock().expect("pad state mutex poisoned");
            for event in &events {
                state.process_event(event);
            }
        }
    }
}

/// A usable joystick exposes at least one stick axis and a button class.
fn is_joystick(device: &Device) -> bool {
    let has_stick = device
        .supported_absolute_axes()
        .map_or(false, |axes| axes.contains(AbsoluteAxisType::ABS_X));

    let has_buttons = device.supported_keys().map_or(false, |keys| {
        keys.contains(Key::BTN_SOUTH) || keys.contains(Key::BTN_TRIGGER)
    });

    has_stick && has_buttons
}
