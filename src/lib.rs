// SPDX-License-Identifier: GPL-3.0-only

//! framefeed - frame feeds with transform chains and observer events
//!
//! Two handlers produce frames: [`MediaHandler`] for cameras and video files,
//! paced by a repeating timer, and [`ImageHandler`] for a single image or a
//! directory of images. Each runs every frame through its ordered
//! [`TransformChain`] and reports lifecycle and frames through
//! [`HandlerSignals`].
//!
//! # Architecture
//!
//! - [`backends`]: capture backend traits and the GStreamer implementation
//! - [`handlers`]: `MediaHandler`, `ImageHandler` and their timer
//! - [`media`]: frame type, image loading, transforms and built-in filters
//! - [`signals`]: observer registry
//! - [`detector`]: object detector contract
//! - [`accounts`]: SQLite user store
//! - [`config`]: persistent settings
//!
//! # Example
//!
//! ```ignore
//! let handler = ImageHandler::with_path("photos/");
//! handler.add_transform(filters::grayscale());
//! handler.signals().frame_ready.connect(|frame| println!("{}x{}", frame.width, frame.height));
//! handler.start();
//! ```

pub mod accounts;
pub mod backends;
pub mod config;
pub mod constants;
pub mod detector;
pub mod errors;
pub mod handlers;
pub mod media;
pub mod signals;

// Re-export commonly used types
pub use backends::capture::{CaptureBackend, CaptureSource, SourceDescriptor, SourceInfo};
pub use config::Config;
pub use errors::{AppError, AppResult, HandlerError};
pub use handlers::{HandlerState, ImageHandler, MediaHandler};
pub use media::{Frame, PixelFormat, Transform, TransformChain, filters};
pub use signals::{HandlerSignals, Signal};
