// SPDX-License-Identifier: GPL-3.0-only

//! Still image feed
//!
//! `start()` runs the whole batch synchronously on the calling thread. A
//! single file is decoded, transformed and emitted once. A directory is
//! walked in name order, skipping hidden entries, non-files and anything
//! without an image signature. `stop()` (usually from a listener) ends the
//! batch before the next file.

use super::{HandlerState, lock_state};
use crate::errors::{FrameError, HandlerError};
use crate::media::{Transform, TransformChain, has_image_signature, load_image_frame};
use crate::signals::HandlerSignals;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Handle to a still-image feed
#[derive(Clone)]
pub struct ImageHandler {
    shared: Arc<Shared>,
}

struct Shared {
    signals: HandlerSignals,
    /// Set for the duration of a batch; cleared by `stop()` to cancel it
    processing: AtomicBool,
    state: Mutex<ImageState>,
}

#[derive(Default)]
struct ImageState {
    path: Option<PathBuf>,
    chain: TransformChain,
    file_name: Option<PathBuf>,
    /// `opened` was emitted and no `closed` has answered it yet
    close_pending: bool,
    status: HandlerState,
}

impl ImageHandler {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                signals: HandlerSignals::new(),
                processing: AtomicBool::new(false),
                state: Mutex::new(ImageState::default()),
            }),
        }
    }

    /// Handler for an image file or directory
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let handler = Self::new();
        handler.set_path(path);
        handler
    }

    pub fn signals(&self) -> &HandlerSignals {
        &self.shared.signals
    }

    pub fn add_transform(&self, transform: Transform) {
        debug!(transform = transform.name(), "Adding image transform");
        self.lock().chain.push(transform);
    }

    pub fn remove_transform(&self, transform: &Transform) -> Result<(), HandlerError> {
        self.lock().chain.remove(transform)?;
        debug!(transform = transform.name(), "Removed image transform");
        Ok(())
    }

    pub fn transform_count(&self) -> usize {
        self.lock().chain.len()
    }

    /// File or directory to process on the next `start()`
    pub fn set_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!(path = %path.display(), "Image path set");
        self.lock().path = Some(path);
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    /// File currently (or most recently) processed
    pub fn file_name(&self) -> Option<PathBuf> {
        self.lock().file_name.clone()
    }

    /// Whether a batch is in progress
    pub fn is_active(&self) -> bool {
        self.shared.processing.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> HandlerState {
        self.lock().status
    }

    /// Process the configured path
    ///
    /// Emits `stop_other_activities`, then `opened`, then one `frame_ready`
    /// per decoded image or `failed` per unusable one. Returns when the batch
    /// is done or cancelled. Without a path, or while a batch is already
    /// running, only `stop_other_activities` is emitted.
    pub fn start(&self) {
        self.shared.signals.stop_other_activities.emit(&());

        let Some(path) = self.path() else {
            debug!("No image path set, nothing to start");
            return;
        };
        if self.shared.processing.swap(true, Ordering::SeqCst) {
            warn!(path = %path.display(), "Image batch already running, ignoring start");
            return;
        }

        {
            let mut state = self.lock();
            state.close_pending = true;
            state.status = HandlerState::Active;
        }
        info!(path = %path.display(), "Image processing started");
        self.shared.signals.opened.emit(&());

        if path.is_file() {
            self.process_file(&path);
        } else if path.is_dir() {
            self.process_directory(&path);
        } else {
            warn!(path = %path.display(), "Image path does not exist");
            self.shared
                .signals
                .failed
                .emit(&format!("Path does not exist: {}", path.display()));
        }

        self.shared.processing.store(false, Ordering::SeqCst);
        let mut state = self.lock();
        if state.status == HandlerState::Active {
            state.status = HandlerState::Idle;
        }
        debug!(status = %state.status, "Image processing finished");
    }

    /// Cancel the batch and emit `closed` if an `opened` is outstanding
    ///
    /// The file being processed when this is called still completes.
    pub fn stop(&self) {
        self.shared.processing.store(false, Ordering::SeqCst);

        let close = {
            let mut state = self.lock();
            let pending = std::mem::take(&mut state.close_pending);
            if pending {
                state.status = HandlerState::Stopped;
            }
            pending
        };

        if close {
            info!("Image processing stopped");
            self.shared.signals.closed.emit(&());
        } else {
            debug!("Image handler not open, nothing to stop");
        }
    }

    fn process_directory(&self, dir: &Path) {
        let entries = match candidate_files(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Failed to list directory");
                self.shared.signals.failed.emit(&format!(
                    "Failed to read directory {}: {}",
                    dir.display(),
                    e
                ));
                return;
            }
        };
        debug!(path = %dir.display(), candidates = entries.len(), "Walking image directory");

        for path in entries {
            if !self.shared.processing.load(Ordering::SeqCst) {
                info!(path = %dir.display(), "Image batch cancelled");
                break;
            }
            if !has_image_signature(&path) {
                debug!(path = %path.display(), "Skipping file without image signature");
                continue;
            }
            self.process_file(&path);
        }
    }

    fn process_file(&self, path: &Path) {
        let chain = {
            let mut state = self.lock();
            state.file_name = Some(path.to_path_buf());
            state.chain.clone()
        };

        let result = load_image_frame(path)
            .map_err(|e| decode_cause(&e))
            .and_then(|frame| chain.apply(frame).map_err(|e| e.to_string()));

        match result {
            Ok(frame) => {
                debug!(path = %path.display(), "Image frame ready");
                self.shared.signals.frame_ready.emit(&frame);
            }
            Err(cause) => {
                warn!(path = %path.display(), error = %cause, "Failed to process image");
                self.shared.signals.failed.emit(&format!(
                    "Failed to open image at {}: {}",
                    path.display(),
                    cause
                ));
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ImageState> {
        lock_state(&self.shared.state)
    }
}

impl Default for ImageHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ImageHandler")
            .field("path", &state.path)
            .field("transforms", &state.chain.len())
            .field("status", &state.status)
            .finish()
    }
}

/// Visible regular files in `dir`, sorted by name
///
/// Entries that cannot be read are skipped; only failing to open the
/// directory itself is an error.
fn candidate_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| visible_file(dir, entry))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn visible_file(dir: &Path, entry: std::io::Result<std::fs::DirEntry>) -> Option<PathBuf> {
    let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Skipping unreadable directory entry");
            return None;
        }
    };
    if entry.file_name().to_string_lossy().starts_with('.') {
        return None;
    }
    let path = entry.path();
    path.is_file().then_some(path)
}

/// The part of a load error worth showing after the path
fn decode_cause(error: &FrameError) -> String {
    match error {
        FrameError::Io { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
