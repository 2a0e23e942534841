// SPDX-License-Identifier: GPL-3.0-only

//! Frames and frame transforms
//!
//! - [`frame`]: the `Frame` pixel buffer and still-image decoding
//! - [`transform`]: shared transform handles and ordered chains
//! - [`filters`]: stock CPU transforms (mirror, rotate, grayscale, resize)

pub mod filters;
pub mod frame;
pub mod transform;

pub use frame::{Frame, PixelFormat, has_image_signature, load_image_frame};
pub use transform::{ChainError, Transform, TransformChain};
