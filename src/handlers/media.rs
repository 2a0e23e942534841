// SPDX-License-Identifier: GPL-3.0-only

//! Continuous camera / video feed
//!
//! ```text
//!  start() ──► backend.open(source) ──► timer @ 1000/fps ms
//!                                         │ tick
//!                                         ▼
//!                         read_frame ─► transform chain ─► frame_ready
//!                             │ None
//!                             ▼
//!                       timer stops (no event)
//! ```
//!
//! The handler never spawns anything. Whoever owns it drives the timer,
//! either with [`MediaHandler::run`] / [`MediaHandler::run_blocking`] or
//! from an existing event loop via [`MediaHandler::next_deadline`] and
//! [`MediaHandler::dispatch`].

use super::{HandlerState, RepeatingTimer, lock_state};
use crate::backends::capture::{CaptureBackend, CaptureSource, SourceDescriptor, SourceInfo};
use crate::constants::timing;
use crate::errors::HandlerError;
use crate::media::{Transform, TransformChain};
use crate::signals::HandlerSignals;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Handle to a camera or video feed
///
/// Clones share the same feed, so a clone can be moved into a listener or
/// a Ctrl-C handler to stop it.
#[derive(Clone)]
pub struct MediaHandler {
    shared: Arc<Shared>,
}

struct Shared {
    backend: Box<dyn CaptureBackend>,
    signals: HandlerSignals,
    state: Mutex<MediaState>,
}

struct MediaState {
    source: SourceDescriptor,
    fps: u32,
    chain: TransformChain,
    capture: Option<Box<dyn CaptureSource>>,
    timer: RepeatingTimer,
    status: HandlerState,
}

impl MediaHandler {
    /// Feed from the primary camera at the default frame rate
    pub fn new(backend: impl CaptureBackend + 'static) -> Self {
        Self::build(
            Box::new(backend),
            SourceDescriptor::default(),
            timing::DEFAULT_FPS,
        )
    }

    /// Feed from `source` at `fps` frames per second
    pub fn with_source(
        backend: impl CaptureBackend + 'static,
        source: impl Into<SourceDescriptor>,
        fps: u32,
    ) -> Result<Self, HandlerError> {
        validate_fps(fps)?;
        Ok(Self::build(Box::new(backend), source.into(), fps))
    }

    fn build(backend: Box<dyn CaptureBackend>, source: SourceDescriptor, fps: u32) -> Self {
        debug!(backend = backend.name(), source = %source, fps, "Creating media handler");
        Self {
            shared: Arc::new(Shared {
                backend,
                signals: HandlerSignals::new(),
                state: Mutex::new(MediaState {
                    source,
                    fps,
                    chain: TransformChain::new(),
                    capture: None,
                    timer: RepeatingTimer::new(),
                    status: HandlerState::Idle,
                }),
            }),
        }
    }

    /// Event surface: connect listeners here
    pub fn signals(&self) -> &HandlerSignals {
        &self.shared.signals
    }

    /// Append a transform; it runs after every transform added before it
    pub fn add_transform(&self, transform: Transform) {
        debug!(transform = transform.name(), "Adding frame transform");
        self.lock().chain.push(transform);
    }

    /// Remove a previously added transform
    pub fn remove_transform(&self, transform: &Transform) -> Result<(), HandlerError> {
        self.lock().chain.remove(transform)?;
        debug!(transform = transform.name(), "Removed frame transform");
        Ok(())
    }

    pub fn transform_count(&self) -> usize {
        self.lock().chain.len()
    }

    /// Replace the source; takes effect on the next `start()`
    pub fn set_source(&self, source: impl Into<SourceDescriptor>) {
        let source = source.into();
        debug!(source = %source, "Media source set");
        self.lock().source = source;
    }

    pub fn source(&self) -> SourceDescriptor {
        self.lock().source.clone()
    }

    /// Change the target frame rate
    ///
    /// A running feed switches to the new `1000 / fps` ms interval at once.
    pub fn set_frame_rate(&self, fps: u32) -> Result<(), HandlerError> {
        validate_fps(fps)?;

        let mut state = self.lock();
        state.fps = fps;
        if state.timer.is_active() {
            state.timer.set_interval(frame_interval(fps), Instant::now());
        }
        info!(fps, "Frame rate changed");
        Ok(())
    }

    pub fn frame_rate(&self) -> u32 {
        self.lock().fps
    }

    /// Interval the timer uses for the configured frame rate
    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.lock().fps)
    }

    /// Geometry, device frame rate and frame count of the open source
    pub fn source_info(&self) -> Result<SourceInfo, HandlerError> {
        self.lock()
            .capture
            .as_ref()
            .map(|capture| capture.info())
            .ok_or(HandlerError::NoSourceOpen)
    }

    /// Whether the acquisition timer is running
    pub fn is_active(&self) -> bool {
        self.lock().timer.is_active()
    }

    pub fn state(&self) -> HandlerState {
        self.lock().status
    }

    /// Open the source and start the timer
    ///
    /// Emits `stop_other_activities` first. An open failure is reported
    /// through `failed` and leaves the handler idle; success emits `opened`.
    /// Calling this while the feed is running does nothing.
    pub fn start(&self) {
        let (source, lingering) = {
            let mut state = self.lock();
            if state.timer.is_active() {
                warn!(source = %state.source, "Media feed already running, ignoring start");
                return;
            }
            (state.source.clone(), state.capture.take())
        };

        // A feed that ran out still holds its source until stopped
        if let Some(mut capture) = lingering {
            capture.release();
            debug!("Released exhausted source before restart");
            self.shared.signals.closed.emit(&());
        }

        self.shared.signals.stop_other_activities.emit(&());

        match self.shared.backend.open(&source) {
            Ok(capture) => {
                let interval = {
                    let mut state = self.lock();
                    let interval = frame_interval(state.fps);
                    state.capture = Some(capture);
                    state.timer.start(interval, Instant::now());
                    state.status = HandlerState::Active;
                    interval
                };
                info!(
                    source = %source,
                    interval_ms = interval.as_millis() as u64,
                    "Media feed opened"
                );
                self.shared.signals.opened.emit(&());
            }
            Err(e) => {
                warn!(source = %source, error = %e, "Failed to open media source");
                self.lock().status = HandlerState::Idle;
                self.shared
                    .signals
                    .failed
                    .emit(&format!("Unable to open device: {}", source));
            }
        }
    }

    /// Stop the timer, release the source and emit `closed`
    ///
    /// Safe to call at any time; `closed` is only emitted when a source was
    /// actually open.
    pub fn stop(&self) {
        let capture = {
            let mut state = self.lock();
            state.timer.stop();
            let capture = state.capture.take();
            if capture.is_some() {
                state.status = HandlerState::Stopped;
            }
            capture
        };

        match capture {
            Some(mut capture) => {
                capture.release();
                info!("Media feed closed");
                self.shared.signals.closed.emit(&());
            }
            None => debug!("Media feed not open, nothing to stop"),
        }
    }

    /// When the owning loop should next call [`dispatch`](Self::dispatch)
    ///
    /// `None` once the feed is no longer active.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.lock().timer.next_deadline()
    }

    /// Run one acquisition tick if the timer is due at `now`
    ///
    /// Reads a frame, runs the transform chain and emits `frame_ready`. A
    /// failed read ends the feed without any event, which is how files end.
    /// A failing transform drops that frame only. Returns whether a tick ran.
    pub fn dispatch(&self, now: Instant) -> bool {
        let (frame, chain) = {
            let mut state = self.lock();
            if !state.timer.fire_if_due(now) {
                return false;
            }

            match state.capture.as_mut().and_then(|capture| capture.read_frame()) {
                Some(frame) => (frame, state.chain.clone()),
                None => {
                    state.timer.stop();
                    state.status = HandlerState::Idle;
                    info!(source = %state.source, "Media feed ended");
                    return true;
                }
            }
        };

        match chain.apply(frame) {
            Ok(frame) => self.shared.signals.frame_ready.emit(&frame),
            Err(e) => warn!(error = %e, "Dropping frame after transform failure"),
        }
        true
    }

    /// Drive the feed on the current tokio runtime until it stops
    pub async fn run(&self) {
        while let Some(deadline) = self.next_deadline() {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            self.dispatch(Instant::now());
        }
    }

    /// Drive the feed on the calling thread until it stops
    pub fn run_blocking(&self) {
        while let Some(deadline) = self.next_deadline() {
            let wait = deadline.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
            self.dispatch(Instant::now());
        }
    }

    fn lock(&self) -> MutexGuard<'_, MediaState> {
        lock_state(&self.shared.state)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(mut capture) = state.capture.take() {
            debug!("Media handler dropped with source open, releasing");
            capture.release();
        }
    }
}

impl std::fmt::Debug for MediaHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MediaHandler")
            .field("backend", &self.shared.backend.name())
            .field("source", &state.source)
            .field("fps", &state.fps)
            .field("transforms", &state.chain.len())
            .field("status", &state.status)
            .finish()
    }
}

fn validate_fps(fps: u32) -> Result<(), HandlerError> {
    if fps == 0 {
        Err(HandlerError::InvalidFrameRate(fps))
    } else {
        Ok(())
    }
}

/// Whole-millisecond timer period for `fps`
fn frame_interval(fps: u32) -> Duration {
    Duration::from_millis(u64::from(timing::MILLIS_PER_SECOND / fps.max(1)))
}
