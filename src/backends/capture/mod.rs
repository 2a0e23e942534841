// SPDX-License-Identifier: GPL-3.0-only

//! Capture backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │    MediaHandler     │  ← timer, transform chain, signals
//! └──────────┬──────────┘
//!            │ open(SourceDescriptor)
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureBackend Trait│  ← one per acquisition library
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureSource Trait │  ← one open camera or container stream
//! └─────────────────────┘
//! ```
//!
//! Backends are only ever driven from the handler's dispatch thread, one read
//! per timer tick.

#[cfg(feature = "gstreamer")]
pub mod gst;

use crate::errors::CaptureError;
use crate::media::Frame;
use std::fmt;
use std::path::{Path, PathBuf};

/// Result type for capture backend operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Where a `MediaHandler` reads frames from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceDescriptor {
    /// Hardware camera index (platform dependent meaning)
    Camera(u32),
    /// Video container file
    File(PathBuf),
}

impl SourceDescriptor {
    /// Parse a command line argument: all-digit strings are camera indices
    pub fn parse(value: &str) -> Self {
        match value.parse::<u32>() {
            Ok(index) if value.chars().all(|c| c.is_ascii_digit()) => {
                SourceDescriptor::Camera(index)
            }
            _ => SourceDescriptor::File(PathBuf::from(value)),
        }
    }

    pub fn is_camera(&self) -> bool {
        matches!(self, SourceDescriptor::Camera(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            SourceDescriptor::File(path) => Some(path),
            SourceDescriptor::Camera(_) => None,
        }
    }
}

impl Default for SourceDescriptor {
    /// The primary camera
    fn default() -> Self {
        SourceDescriptor::Camera(0)
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Camera(index) => write!(f, "{}", index),
            SourceDescriptor::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<u32> for SourceDescriptor {
    fn from(index: u32) -> Self {
        SourceDescriptor::Camera(index)
    }
}

impl From<PathBuf> for SourceDescriptor {
    fn from(path: PathBuf) -> Self {
        SourceDescriptor::File(path)
    }
}

impl From<&Path> for SourceDescriptor {
    fn from(path: &Path) -> Self {
        SourceDescriptor::File(path.to_path_buf())
    }
}

impl From<&str> for SourceDescriptor {
    fn from(path: &str) -> Self {
        SourceDescriptor::File(PathBuf::from(path))
    }
}

/// Properties of an open source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Frame rate reported by the device or container
    pub fps: f64,
    /// Total frame count; `None` when the source does not report one (cameras)
    pub frames: Option<u64>,
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} @ {:.2}fps", self.width, self.height, self.fps)?;
        match self.frames {
            Some(frames) => write!(f, ", {} frames", frames),
            None => write!(f, ", live"),
        }
    }
}

/// An open camera or container stream
pub trait CaptureSource: Send {
    /// Read the next frame
    ///
    /// `None` means no frame could be read. For files this is the normal end
    /// of the stream; for cameras it usually means the device went away. The
    /// two cases are not distinguished.
    fn read_frame(&mut self) -> Option<Frame>;

    /// Geometry and timing of the open source
    fn info(&self) -> SourceInfo;

    /// Release the underlying device or file handle
    ///
    /// Called exactly once by the handler; implementations should also
    /// release on drop.
    fn release(&mut self);
}

/// Factory for capture sources
pub trait CaptureBackend: Send + Sync {
    /// Open a camera (integer descriptor) or a container file (path)
    fn open(&self, source: &SourceDescriptor) -> CaptureResult<Box<dyn CaptureSource>>;

    /// Short backend name for logs
    fn name(&self) -> &str;
}

impl<B: CaptureBackend + ?Sized> CaptureBackend for Box<B> {
    fn open(&self, source: &SourceDescriptor) -> CaptureResult<Box<dyn CaptureSource>> {
        (**self).open(source)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Get the backend compiled into this build
pub fn default_backend() -> CaptureResult<Box<dyn CaptureBackend>> {
    #[cfg(feature = "gstreamer")]
    {
        Ok(Box::new(gst::GstBackend::new()?))
    }

    #[cfg(not(feature = "gstreamer"))]
    {
        Err(CaptureError::Unsupported(
            "built without a capture backend (enable the `gstreamer` feature)".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camera_index() {
        assert_eq!(SourceDescriptor::parse("0"), SourceDescriptor::Camera(0));
        assert_eq!(SourceDescriptor::parse("12"), SourceDescriptor::Camera(12));
    }

    #[test]
    fn test_parse_file_path() {
        assert_eq!(
            SourceDescriptor::parse("clip.mp4"),
            SourceDescriptor::File(PathBuf::from("clip.mp4"))
        );
        // Signs are not camera indices
        assert!(!SourceDescriptor::parse("+1").is_camera());
    }

    #[test]
    fn test_display() {
        assert_eq!(SourceDescriptor::Camera(2).to_string(), "2");
        assert_eq!(SourceDescriptor::from("a/b.mkv").to_string(), "a/b.mkv");
    }

    #[test]
    fn test_source_info_display() {
        let info = SourceInfo {
            width: 640,
            height: 480,
            fps: 30.0,
            frames: None,
        };
        assert_eq!(info.to_string(), "640x480 @ 30.00fps, live");
    }

    #[cfg(not(feature = "gstreamer"))]
    #[test]
    fn test_default_backend_without_feature() {
        assert!(matches!(
            default_backend(),
            Err(CaptureError::Unsupported(_))
        ));
    }
}
