//! # Dispatch Module
//!
//! Asynchronous delivery of coalesced motion commands to the camera link.
//!
//! This module handles:
//! - Last-write-wins coalescing of commands per motion group
//! - The dedicated dispatch loop draining the coalescer
//! - Duplicate suppression and minimum inter-command spacing
//! - Out-of-band stop signalling and link health counters

pub mod coalescer;
pub mod runner;

pub use coalescer::{CommandCoalescer, CommandGroup, MotionCommand};
pub use runner::{DispatchHandle, DispatchLoop, DispatchState, DispatchTiming, LinkHealth};
