// SPDX-License-Identifier: GPL-3.0-only

//! Frame feed handlers
//!
//! Two handlers share the same shape: an ordered transform chain, a
//! start/stop lifecycle and a [`HandlerSignals`](crate::signals::HandlerSignals)
//! event surface.
//!
//! - [`MediaHandler`]: continuous feed from a camera or video file, paced by
//!   a repeating timer at `1000 / fps` milliseconds
//! - [`ImageHandler`]: one image file, or every image in a directory, run
//!   synchronously with cooperative cancellation between files
//!
//! Handlers are cheap to clone; clones share the same feed. All lifecycle
//! calls are expected from one dispatch thread, but listeners may call back
//! into the handler that is emitting.

pub mod image;
pub mod media;
pub mod timer;

pub use image::ImageHandler;
pub use media::MediaHandler;
pub use timer::RepeatingTimer;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lifecycle state of a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerState {
    /// Nothing running: never started, open failed, or the feed ran out
    #[default]
    Idle,
    /// Feed open and emitting frames
    Active,
    /// Halted by an explicit `stop()`
    Stopped,
}

impl std::fmt::Display for HandlerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerState::Idle => write!(f, "idle"),
            HandlerState::Active => write!(f, "active"),
            HandlerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Lock handler state, recovering from a poisoned mutex
///
/// Listeners and transforms never run under handler locks, so a panic that
/// poisons one leaves the state consistent.
pub(crate) fn lock_state<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
