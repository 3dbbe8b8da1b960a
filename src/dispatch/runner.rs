//! # Dispatch Loop Module
//!
//! The single execution context that drains the [`CommandCoalescer`] and
//! forwards commands to the camera link.
//!
//! The loop decouples the input-sampling cadence (100 Hz and up) from the
//! command-send cadence the camera can actually absorb: it suppresses sends
//! identical to the last value delivered for a group, enforces a minimum
//! inter-command spacing, and relies on the coalescer to drop intermediate
//! states. A failed link call is logged and counted but never terminates
//! the loop; the next naturally arriving state update is the implicit
//! retry. Only the out-of-band stop signal ends the loop.
//!
//! ## Lifecycle
//!
//! ```text
//! STOPPED --spawn--> RUNNING --stop--> STOPPING --(park camera)--> STOPPED
//! ```
//!
//! `stop` is idempotent and is observed within one `max_idle_interval`
//! even when no input arrives, because the coalescer wait is bounded.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::atomic::{AtomicU32, AtomicU64};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::coalescer::{CommandCoalescer, CommandGroup, MotionCommand};
use crate::link::CameraLink;

/// Number of delivered commands between status log messages.
const LOG_INTERVAL_COMMANDS: u64 = 500;

/// Timing knobs for the dispatch loop.
#[derive(Debug, Clone, Copy)]
pub struct DispatchTiming {
    /// Minimum spacing between two sends to the same group.
    pub min_command_interval: Duration,
    /// Upper bound on one coalescer wait; also bounds stop latency.
    pub max_idle_interval: Duration,
}

impl Default for DispatchTiming {
    fn default() -> Self {
        Self {
            min_command_interval: Duration::from_millis(10),
            max_idle_interval: Duration::from_millis(100),
        }
    }
}

/// Dispatch loop lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Not running (initial and final state).
    Stopped,
    /// Draining the coalescer and sending commands.
    Running,
    /// Stop signalled; finishing the in-progress call and parking the camera.
    Stopping,
}

/// Externally observable health of the camera link.
///
/// Transient failures are invisible to the operator except through logs and
/// these counters; a persistent fault shows up as a growing consecutive
/// failure count while the camera holds its last commanded state.
#[derive(Debug, Default)]
pub struct LinkHealth {
    sent: AtomicU64,
    failed: AtomicU64,
    consecutive_failures: AtomicU32,
}

impl LinkHealth {
    /// Total commands delivered successfully.
    #[must_use]
    pub fn commands_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Total commands that failed at the link layer.
    #[must_use]
    pub fn commands_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Failures since the last successful send.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// True when the most recent send succeeded.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures() == 0
    }

    fn record_success(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// State shared between the running loop and its handle.
#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    health: LinkHealth,
}

const STATE_STOPPED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPING: u8 = 2;

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_RUNNING),
            health: LinkHealth::default(),
        }
    }

    fn state(&self) -> DispatchState {
        match self.state.load(Ordering::SeqCst) {
            STATE_RUNNING => DispatchState::Running,
            STATE_STOPPING => DispatchState::Stopping,
            _ => DispatchState::Stopped,
        }
    }

    /// RUNNING -> STOPPING. Returns false if the loop was already leaving.
    fn request_stop(&self) -> bool {
        self.state
            .compare_exchange(
                STATE_RUNNING,
                STATE_STOPPING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    fn mark_stopped(&self) {
        self.state.store(STATE_STOPPED, Ordering::SeqCst);
    }
}

/// Handle to a spawned dispatch loop.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use ptz_joystick::dispatch::coalescer::CommandCoalescer;
/// use ptz_joystick::dispatch::runner::{DispatchLoop, DispatchTiming};
/// use ptz_joystick::link::ViscaLink;
///
/// # async fn example() -> anyhow::Result<()> {
/// let coalescer = Arc::new(CommandCoalescer::new());
/// let link = ViscaLink::connect("172.16.0.201", 1259, std::time::Duration::from_secs(3)).await?;
/// let mut handle = DispatchLoop::spawn(coalescer, Box::new(link), DispatchTiming::default());
///
/// // ... feed the coalescer from the poll loop ...
///
/// handle.stop();
/// handle.join().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DispatchHandle {
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl DispatchHandle {
    /// Signals the loop to stop.
    ///
    /// Out-of-band: the signal is never delivered through the coalescer, so
    /// a flood of motion updates cannot starve it. Idempotent; returns true
    /// only for the call that initiated the stop.
    pub fn stop(&self) -> bool {
        if self.shared.request_stop() {
            info!("Dispatch stop requested");
            true
        } else {
            false
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DispatchState {
        self.shared.state()
    }

    /// Link health counters.
    #[must_use]
    pub fn health(&self) -> &LinkHealth {
        &self.shared.health
    }

    /// Waits for the loop to finish. Call [`DispatchHandle::stop`] first;
    /// the loop does not end on its own. Further calls return immediately.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if task.await.is_err() {
                warn!("Dispatch task aborted or panicked");
            }
        }
    }
}

/// The dispatch loop: exclusive owner of the camera link.
pub struct DispatchLoop {
    coalescer: Arc<CommandCoalescer>,
    link: Box<dyn CameraLink>,
    timing: DispatchTiming,
    shared: Arc<Shared>,
    /// Last command delivered per group and when, used for duplicate
    /// suppression and rate limiting.
    last_sent: [Option<(MotionCommand, Instant)>; 3],
}

impl DispatchLoop {
    /// Spawns the dispatch loop on the current runtime.
    ///
    /// The returned handle is the only way to stop it.
    pub fn spawn(
        coalescer: Arc<CommandCoalescer>,
        link: Box<dyn CameraLink>,
        timing: DispatchTiming,
    ) -> DispatchHandle {
        let shared = Arc::new(Shared::new());
        let dispatch = DispatchLoop {
            coalescer,
            link,
            timing,
            shared: Arc::clone(&shared),
            last_sent: [None; 3],
        };
        let task = tokio::spawn(dispatch.run());
        DispatchHandle {
            shared,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        info!("Dispatch loop running");

        while self.shared.state() == DispatchState::Running {
            let dirty = self
                .coalescer
                .wait_for_any(self.timing.max_idle_interval)
                .await;

            // Re-check after the bounded wait so a stop issued during an
            // idle period is honored before any further sends
            if self.shared.state() != DispatchState::Running {
                break;
            }

            for group in dirty {
                if let Some(command) = self.coalescer.take_if_dirty(group) {
                    self.send(command).await;
                }
            }
        }

        self.park().await;
        self.shared.mark_stopped();
        info!(
            "Dispatch loop stopped ({} commands sent, {} failed)",
            self.shared.health.commands_sent(),
            self.shared.health.commands_failed()
        );
    }

    /// Delivers one command, applying duplicate suppression and rate limiting.
    async fn send(&mut self, command: MotionCommand) {
        let slot = &mut self.last_sent[command.group().index()];

        if let Some((last, _)) = slot {
            if *last == command {
                debug!("Suppressing duplicate command {:?}", command);
                return;
            }
        }

        if let Some((_, sent_at)) = slot {
            let elapsed = sent_at.elapsed();
            if elapsed < self.timing.min_command_interval {
                tokio::time::sleep(self.timing.min_command_interval - elapsed).await;
            }
        }

        match Self::call_link(self.link.as_mut(), command).await {
            Ok(()) => {
                self.shared.health.record_success();
                let sent = self.shared.health.commands_sent();
                if sent % LOG_INTERVAL_COMMANDS == 0 {
                    info!(
                        "Sent {} commands ({} failed)",
                        sent,
                        self.shared.health.commands_failed()
                    );
                }
            }
            Err(e) => {
                warn!("Camera link call failed: {}", e);
                self.shared.health.record_failure();
            }
        }

        // Recorded regardless of outcome: retrying a command against a slow
        // or faulty camera would only pile more traffic onto it, and the
        // next state update supersedes this one anyway
        *slot = Some((command, Instant::now()));
    }

    /// Leaves every axis stationary before exiting. Best-effort; a dropped
    /// link at this point must not keep the loop alive.
    async fn park(&mut self) {
        for group in CommandGroup::ALL {
            let command = MotionCommand::neutral(group);
            if let Err(e) = Self::call_link(self.link.as_mut(), command).await {
                debug!("Park command failed during shutdown: {}", e);
            }
        }
    }

    async fn call_link(
        link: &mut dyn CameraLink,
        command: MotionCommand,
    ) -> crate::error::Result<()> {
        match command {
            MotionCommand::PanTilt { pan, tilt } => link.pantilt(pan, tilt).await,
            MotionCommand::Zoom(speed) => link.zoom(speed).await,
            MotionCommand::Focus(speed) => link.focus(speed).await,
        }
    }
}
