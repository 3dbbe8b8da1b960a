//! # Input Poll Loop Module
//!
//! Samples the controller at a fixed tick rate and feeds mapped motion
//! commands into the [`CommandCoalescer`].
//!
//! Each tick reads the configured axes from the input source, maps them
//! through their sensitivity curves, and pushes one command per group —
//! but only when the mapped value changed since the previous tick, so a
//! stick held steady produces no traffic at all. Discrete controls
//! (focus-mode toggle, focus near/far, tilt-inversion toggle) are
//! edge-detected from buttons on the same tick.
//!
//! The poll rate can be far higher than the camera accepts commands; the
//! coalescer and dispatch loop absorb the difference.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::mapper::{AxisMapper, AxisSample, ButtonEdge};
use super::source::InputSource;
use crate::config::{CurvesConfig, InputConfig};
use crate::dispatch::{CommandCoalescer, MotionCommand};
use crate::error::Result;

/// Focus control mode, toggled from a controller button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    /// Camera autofocus; near/far buttons are ignored.
    Auto,
    /// Manual focus driven by the near/far buttons.
    Manual,
}

impl FocusMode {
    fn toggled(self) -> Self {
        match self {
            FocusMode::Auto => FocusMode::Manual,
            FocusMode::Manual => FocusMode::Auto,
        }
    }
}

/// Fixed-rate producer feeding the coalescer from controller state.
pub struct PollLoop {
    source: Arc<dyn InputSource>,
    coalescer: Arc<CommandCoalescer>,
    settings: InputConfig,

    pan: AxisMapper,
    tilt: AxisMapper,
    zoom: AxisMapper,
    /// Fixed manual-focus speed: the focus curve at full deflection.
    focus_speed: i32,

    focus_mode: FocusMode,
    focus_toggle_edge: ButtonEdge,
    invert_tilt_edge: ButtonEdge,

    // Mapped values as of the previous tick; only changes are pushed
    last_pan_tilt: (i32, i32),
    last_zoom: i32,
    last_focus: i32,
}

impl PollLoop {
    /// Builds a poll loop from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any sensitivity table is malformed
    /// (already caught by [`Config::validate`](crate::config::Config::validate)
    /// when the tables come from a loaded file).
    pub fn new(
        source: Arc<dyn InputSource>,
        coalescer: Arc<CommandCoalescer>,
        settings: InputConfig,
        curves: &CurvesConfig,
    ) -> Result<Self> {
        let focus_curve = curves.focus.curve()?;
        Ok(Self {
            pan: AxisMapper::new(curves.pan.curve()?, settings.invert_pan),
            tilt: AxisMapper::new(curves.tilt.curve()?, settings.invert_tilt),
            zoom: AxisMapper::new(curves.zoom.curve()?, settings.invert_zoom),
            focus_speed: focus_curve.max_speed() as i32,
            focus_mode: FocusMode::Auto,
            focus_toggle_edge: ButtonEdge::new(),
            invert_tilt_edge: ButtonEdge::new(),
            last_pan_tilt: (0, 0),
            last_zoom: 0,
            last_focus: 0,
            source,
            coalescer,
            settings,
        })
    }

    /// Current focus mode.
    #[must_use]
    pub fn focus_mode(&self) -> FocusMode {
        self.focus_mode
    }

    /// Spawns the loop on the current runtime at the configured tick rate.
    pub fn spawn(mut self) -> PollHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let rate = self.settings.poll_rate_hz.max(1);

        let task = tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs_f64(1.0 / f64::from(rate)));
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Input poll loop running at {} Hz", rate);

            while !flag.load(Ordering::SeqCst) {
                tick.tick().await;
                self.sample();
            }
            info!("Input poll loop stopped");
        });

        PollHandle {
            stop,
            task: Some(task),
        }
    }

    /// One poll tick: buttons first, then the continuous axes.
    pub(crate) fn sample(&mut self) {
        let toggle_pressed = self.source.button(self.settings.focus_toggle_button);
        if self.focus_toggle_edge.rising(toggle_pressed) {
            self.focus_mode = self.focus_mode.toggled();
            info!("Focus mode: {:?}", self.focus_mode);
        }

        let invert_pressed = self.source.button(self.settings.invert_tilt_button);
        if self.invert_tilt_edge.rising(invert_pressed) {
            let inverted = self.tilt.toggle_invert();
            info!(
                "Tilt inversion {}",
                if inverted { "enabled" } else { "disabled" }
            );
        }

        let pan = self.pan.map_sample(self.read_axis(self.settings.pan_axis));
        let tilt = self.tilt.map_sample(self.read_axis(self.settings.tilt_axis));
        if (pan, tilt) != self.last_pan_tilt {
            self.coalescer
                .update(MotionCommand::PanTilt { pan, tilt });
            self.last_pan_tilt = (pan, tilt);
        }

        let zoom = self.zoom.map_sample(self.read_axis(self.settings.zoom_axis));
        if zoom != self.last_zoom {
            self.coalescer.update(MotionCommand::Zoom(zoom));
            self.last_zoom = zoom;
        }

        let focus = self.focus_command();
        if focus != self.last_focus {
            self.coalescer.update(MotionCommand::Focus(focus));
            self.last_focus = focus;
        }
    }

    fn read_axis(&self, axis: u8) -> AxisSample {
        AxisSample {
            axis,
            position: self.source.axis(axis),
        }
    }

    /// Manual-focus speed from the near/far buttons; 0 in auto mode or
    /// when both buttons are held.
    fn focus_command(&self) -> i32 {
        if self.focus_mode != FocusMode::Manual {
            return 0;
        }
        let near = self.source.button(self.settings.focus_near_button);
        let far = self.source.button(self.settings.focus_far_button);
        match (near, far) {
            (true, false) => -self.focus_speed,
            (false, true) => self.focus_speed,
            _ => 0,
        }
    }
}

/// Handle to a spawned poll loop.
#[derive(Debug)]
pub struct PollHandle {
    stop: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Signals the loop to stop after its current tick. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Waits for the loop to finish. Call [`PollHandle::stop`] first.
    /// Further calls return immediately.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if task.await.is_err() {
                warn!("Poll task aborted or panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::CommandGroup;
    use crate::input::source::fakes::FakeInputSource;

    fn poll_fixture() -> (Arc<FakeInputSource>, Arc<CommandCoalescer>, PollLoop) {
        let source = Arc::new(FakeInputSource::new());
        let coalescer = Arc::new(CommandCoalescer::new());
        // No inversion: tests reason about raw signs
        let settings = InputConfig {
            invert_pan: false,
            invert_tilt: false,
            invert_zoom: false,
            ..InputConfig::default()
        };
        let poll = PollLoop::new(
            Arc::clone(&source) as Arc<dyn InputSource>,
            Arc::clone(&coalescer),
            settings,
            &CurvesConfig::default(),
        )
        .unwrap();
        (source, coalescer, poll)
    }

    #[test]
    fn test_centered_sticks_produce_no_commands() {
        let (_source, coalescer, mut poll) = poll_fixture();
        poll.sample();
        poll.sample();
        assert!(coalescer.dirty_groups().is_empty());
    }

    #[test]
    fn test_deflection_produces_pan_tilt_command() {
        let (source, coalescer, mut poll) = poll_fixture();
        source.set_axis(0, 0.5); // default pan axis
        poll.sample();

        // Pan curve: 0.5 -> (0.5-0.3)/(0.7-0.3) of 2..8 = 5
        assert_eq!(
            coalescer.take_if_dirty(CommandGroup::PanTilt),
            Some(MotionCommand::PanTilt { pan: 5, tilt: 0 })
        );
    }

    #[test]
    fn test_steady_stick_produces_no_repeat_commands() {
        let (source, coalescer, mut poll) = poll_fixture();
        source.set_axis(0, 0.5);
        poll.sample();
        let _ = coalescer.take_if_dirty(CommandGroup::PanTilt);

        // Held steady: raw value identical, nothing new pushed
        poll.sample();
        poll.sample();
        assert_eq!(coalescer.take_if_dirty(CommandGroup::PanTilt), None);
    }

    #[test]
    fn test_return_to_center_pushes_stop_command() {
        let (source, coalescer, mut poll) = poll_fixture();
        source.set_axis(0, 1.0);
        poll.sample();
        let _ = coalescer.take_if_dirty(CommandGroup::PanTilt);

        source.set_axis(0, 0.0);
        poll.sample();
        assert_eq!(
            coalescer.take_if_dirty(CommandGroup::PanTilt),
            Some(MotionCommand::PanTilt { pan: 0, tilt: 0 })
        );
    }

    #[test]
    fn test_zoom_axis_flows_to_zoom_group() {
        let (source, coalescer, mut poll) = poll_fixture();
        source.set_axis(5, -1.0); // default zoom axis
        poll.sample();
        assert_eq!(
            coalescer.take_if_dirty(CommandGroup::Zoom),
            Some(MotionCommand::Zoom(-7))
        );
    }

    #[test]
    fn test_focus_buttons_inert_in_auto_mode() {
        let (source, coalescer, mut poll) = poll_fixture();
        source.set_button(5, true); // focus far
        poll.sample();
        assert_eq!(coalescer.take_if_dirty(CommandGroup::Focus), None);
    }

    #[test]
    fn test_manual_focus_near_and_far() {
        let (source, coalescer, mut poll) = poll_fixture();

        // Toggle into manual mode (default toggle button is 3)
        source.set_button(3, true);
        poll.sample();
        assert_eq!(poll.focus_mode(), FocusMode::Manual);
        source.set_button(3, false);

        source.set_button(5, true); // far
        poll.sample();
        assert_eq!(
            coalescer.take_if_dirty(CommandGroup::Focus),
            Some(MotionCommand::Focus(7))
        );

        source.set_button(5, false);
        source.set_button(4, true); // near
        poll.sample();
        assert_eq!(
            coalescer.take_if_dirty(CommandGroup::Focus),
            Some(MotionCommand::Focus(-7))
        );

        // Both held cancel out (back to 0)
        source.set_button(5, true);
        poll.sample();
        assert_eq!(
            coalescer.take_if_dirty(CommandGroup::Focus),
            Some(MotionCommand::Focus(0))
        );
    }

    #[test]
    fn test_focus_toggle_requires_fresh_press() {
        let (source, _coalescer, mut poll) = poll_fixture();
        source.set_button(3, true);
        poll.sample();
        poll.sample();
        poll.sample();
        // Held button toggles exactly once
        assert_eq!(poll.focus_mode(), FocusMode::Manual);
    }

    #[test]
    fn test_leaving_manual_mode_stops_focus_motion() {
        let (source, coalescer, mut poll) = poll_fixture();
        source.set_button(3, true);
        poll.sample();
        source.set_button(3, false);
        source.set_button(5, true);
        poll.sample();
        let _ = coalescer.take_if_dirty(CommandGroup::Focus);

        // Back to auto while the far button is still held
        source.set_button(3, true);
        poll.sample();
        assert_eq!(
            coalescer.take_if_dirty(CommandGroup::Focus),
            Some(MotionCommand::Focus(0))
        );
    }

    #[tokio::test]
    async fn test_poll_handle_stop_and_repeated_join() {
        let (_source, _coalescer, poll) = poll_fixture();
        let mut handle = poll.spawn();

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        handle.stop();
        handle.join().await;
        // A second join returns immediately instead of panicking
        handle.join().await;
    }

    #[test]
    fn test_tilt_inversion_toggle() {
        let (source, coalescer, mut poll) = poll_fixture();
        source.set_axis(1, 0.5); // default tilt axis
        poll.sample();
        // Tilt curve at 0.5: 3 + (0.5-0.3)/(0.65-0.3) * (6-3) = 4.71 -> 5
        let before = coalescer.take_if_dirty(CommandGroup::PanTilt);
        assert_eq!(before, Some(MotionCommand::PanTilt { pan: 0, tilt: 5 }));

        source.set_button(10, true); // default invert-tilt button
        poll.sample();
        assert_eq!(
            coalescer.take_if_dirty(CommandGroup::PanTilt),
            Some(MotionCommand::PanTilt { pan: 0, tilt: -5 })
        );
    }
}
