//! # Command Coalescer Module
//!
//! Last-write-wins handoff of motion commands between the input-polling task
//! (producer) and the dispatch task (consumer).
//!
//! The coalescer keeps exactly one pending command per [`CommandGroup`]:
//! intermediate values produced between two dispatcher reads are silently
//! superseded. There is no queue and no history, so a 100 Hz input loop can
//! never build up a backlog of stale commands for a camera that accepts a
//! handful of commands per second. Dropping intermediate states is correct
//! for a continuous control signal; only the final intended state matters.
//!
//! ## Usage
//!
//! ```
//! use ptz_joystick::dispatch::coalescer::{CommandCoalescer, CommandGroup, MotionCommand};
//!
//! let coalescer = CommandCoalescer::new();
//! coalescer.update(MotionCommand::PanTilt { pan: 3, tilt: 0 });
//! coalescer.update(MotionCommand::PanTilt { pan: 5, tilt: 0 });
//!
//! // Only the newest value survives
//! assert_eq!(
//!     coalescer.take_if_dirty(CommandGroup::PanTilt),
//!     Some(MotionCommand::PanTilt { pan: 5, tilt: 0 })
//! );
//! assert_eq!(coalescer.take_if_dirty(CommandGroup::PanTilt), None);
//! ```

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

/// A set of axes dispatched together as one atomic camera command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandGroup {
    /// Pan and tilt speeds, sent as a single drive command.
    PanTilt,
    /// Zoom speed.
    Zoom,
    /// Focus speed (manual focus).
    Focus,
}

impl CommandGroup {
    /// All groups, in dispatch order.
    pub const ALL: [CommandGroup; 3] = [
        CommandGroup::PanTilt,
        CommandGroup::Zoom,
        CommandGroup::Focus,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            CommandGroup::PanTilt => 0,
            CommandGroup::Zoom => 1,
            CommandGroup::Focus => 2,
        }
    }
}

/// Desired motion state for one command group, as of some poll tick.
///
/// A command is atomic per group: a pan/tilt pair always comes from a single
/// tick, never an interleaving of two ticks' values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionCommand {
    /// Signed pan and tilt speeds.
    PanTilt { pan: i32, tilt: i32 },
    /// Signed zoom speed (positive = tele, negative = wide).
    Zoom(i32),
    /// Signed focus speed (positive = far, negative = near).
    Focus(i32),
}

impl MotionCommand {
    /// Returns the group this command belongs to.
    #[must_use]
    pub fn group(&self) -> CommandGroup {
        match self {
            MotionCommand::PanTilt { .. } => CommandGroup::PanTilt,
            MotionCommand::Zoom(_) => CommandGroup::Zoom,
            MotionCommand::Focus(_) => CommandGroup::Focus,
        }
    }

    /// Returns the all-stop command for a group.
    #[must_use]
    pub fn neutral(group: CommandGroup) -> Self {
        match group {
            CommandGroup::PanTilt => MotionCommand::PanTilt { pan: 0, tilt: 0 },
            CommandGroup::Zoom => MotionCommand::Zoom(0),
            CommandGroup::Focus => MotionCommand::Focus(0),
        }
    }
}

/// Pending state for one group: the latest command and whether the
/// dispatcher has consumed it yet.
#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    latest: Option<MotionCommand>,
    dirty: bool,
}

/// Cross-task holder of the latest desired command per group.
///
/// This is the only structure shared between the poll task and the dispatch
/// task. All per-group state sits behind one mutex; critical sections are a
/// few loads and stores, and there are exactly two contenders.
#[derive(Debug, Default)]
pub struct CommandCoalescer {
    slots: Mutex<[Slot; 3]>,
    notify: Notify,
}

impl CommandCoalescer {
    /// Creates an empty coalescer with no pending commands.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer side: overwrites the pending command for the group and wakes
    /// the dispatcher.
    ///
    /// Never blocks and never fails. If the previous value for this group was
    /// not yet consumed it is discarded (last write wins).
    pub fn update(&self, command: MotionCommand) {
        {
            let mut slots = self.slots.lock().expect("coalescer mutex poisoned");
            let slot = &mut slots[command.group().index()];
            slot.latest = Some(command);
            slot.dirty = true;
        }
        // notify_one stores a permit when the dispatcher is not currently
        // waiting, so an update can never slip between its dirty check and
        // its wait.
        self.notify.notify_one();
    }

    /// Consumer side: atomically reads and clears the dirty flag, returning
    /// the pending command if there was one.
    ///
    /// Never blocks.
    #[must_use]
    pub fn take_if_dirty(&self, group: CommandGroup) -> Option<MotionCommand> {
        let mut slots = self.slots.lock().expect("coalescer mutex poisoned");
        let slot = &mut slots[group.index()];
        if slot.dirty {
            slot.dirty = false;
            slot.latest
        } else {
            None
        }
    }

    /// Returns the groups that currently hold an unconsumed command.
    #[must_use]
    pub fn dirty_groups(&self) -> Vec<CommandGroup> {
        let slots = self.slots.lock().expect("coalescer mutex poisoned");
        CommandGroup::ALL
            .into_iter()
            .filter(|group| slots[group.index()].dirty)
            .collect()
    }

    /// Consumer side: waits until any group turns dirty or the timeout
    /// elapses, whichever comes first.
    ///
    /// Returns the dirty groups, or an empty vec on timeout. The bounded wait
    /// is what lets the dispatch loop observe an out-of-band stop signal
    /// within one idle interval even when no input arrives.
    pub async fn wait_for_any(&self, timeout: Duration) -> Vec<CommandGroup> {
        let deadline = Instant::now() + timeout;
        loop {
            let dirty = self.dirty_groups();
            if !dirty.is_empty() {
                return dirty;
            }
            if timeout_at(deadline, self.notify.notified()).await.is_err() {
                return Vec::new();
            }
        }
    }
}
