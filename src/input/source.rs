//! Trait abstraction over the joystick state to enable testing

/// Read access to the latest sampled controller state.
///
/// Implementations cache the most recent value per axis and button; the
/// poll loop reads that cache at its own fixed tick rate, independent of
/// how fast the device produces events.
pub trait InputSource: Send + Sync {
    /// Latest normalized position of an axis, in [-1, 1]. Unknown axes
    /// read as 0.0 (centered).
    fn axis(&self, id: u8) -> f32;

    /// Latest pressed state of a button. Unknown buttons read as released.
    fn button(&self, id: u8) -> bool;
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scriptable input source for poll loop tests
    #[derive(Debug, Default)]
    pub struct FakeInputSource {
        axes: Mutex<HashMap<u8, f32>>,
        buttons: Mutex<HashMap<u8, bool>>,
    }

    impl FakeInputSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_axis(&self, id: u8, position: f32) {
            self.axes.lock().unwrap().insert(id, position);
        }

        pub fn set_button(&self, id: u8, pressed: bool) {
            self.buttons.lock().unwrap().insert(id, pressed);
        }
    }

    impl InputSource for FakeInputSource {
        fn axis(&self, id: u8) -> f32 {
            self.axes.lock().unwrap().get(&id).copied().unwrap_or(0.0)
        }

        fn button(&self, id: u8) -> bool {
            self.buttons.lock().unwrap().get(&id).copied().unwrap_or(false)
        }
    }
}
