// SPDX-License-Identifier: GPL-3.0-only

//! Frame type shared by every source and transform

use crate::constants::file_formats;
use crate::errors::FrameError;
use image::{DynamicImage, RgbImage, RgbaImage};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Pixel layout of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGB - 24-bit, 3 bytes per pixel
    /// Canonical format: decoded still images are always normalised to it
    Rgb24,
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    Rgba,
    /// Gray8 - 8-bit single channel
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Rgb24 => write!(f, "RGB"),
            PixelFormat::Rgba => write!(f, "RGBA"),
            PixelFormat::Gray8 => write!(f, "GRAY8"),
        }
    }
}

/// A single decoded image from a camera, video or image file
///
/// Pixel rows are tightly packed (`width * bytes_per_pixel` bytes per row).
/// The data is reference counted so frames can be handed to several
/// listeners without copying.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Arc<[u8]>,
    /// When the frame was read from its source
    pub captured_at: Instant,
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.data == other.data
    }
}

impl Eq for Frame {}

impl Frame {
    /// Build a frame from raw, tightly packed pixel bytes
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<Self, FrameError> {
        let data = data.into();
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(FrameError::InvalidLayout {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            format,
            data,
            captured_at: Instant::now(),
        })
    }

    /// Solid-colour RGB frame
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            format: PixelFormat::Rgb24,
            data: Arc::from(data.into_boxed_slice()),
            captured_at: Instant::now(),
        }
    }

    /// Bytes per pixel row
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Normalise any decoded image to a three-channel frame
    ///
    /// Alpha is dropped and single-channel images are expanded, so downstream
    /// transforms always see RGB.
    pub fn from_image(image: DynamicImage) -> Self {
        Self::from_rgb_image(image.to_rgb8())
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgb24,
            data: Arc::from(image.into_raw().into_boxed_slice()),
            captured_at: Instant::now(),
        }
    }

    /// Copy the pixels into an `image` buffer of matching layout
    pub fn to_dynamic_image(&self) -> Result<DynamicImage, FrameError> {
        let layout_error = || FrameError::InvalidLayout {
            expected: self.width as usize * self.height as usize * self.format.bytes_per_pixel(),
            actual: self.data.len(),
        };
        let raw = self.data.to_vec();

        match self.format {
            PixelFormat::Rgb24 => RgbImage::from_raw(self.width, self.height, raw)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(layout_error),
            PixelFormat::Rgba => RgbaImage::from_raw(self.width, self.height, raw)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(layout_error),
            PixelFormat::Gray8 => image::GrayImage::from_raw(self.width, self.height, raw)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(layout_error),
        }
    }

    /// Convert to an RGB image buffer regardless of the stored format
    pub fn to_rgb_image(&self) -> Result<RgbImage, FrameError> {
        match self.format {
            PixelFormat::Rgb24 => RgbImage::from_raw(self.width, self.height, self.data.to_vec())
                .ok_or(FrameError::InvalidLayout {
                    expected: self.width as usize * self.height as usize * 3,
                    actual: self.data.len(),
                }),
            _ => Ok(self.to_dynamic_image()?.to_rgb8()),
        }
    }

    /// Write the frame to disk; the format follows the file extension
    pub fn save(&self, path: &Path) -> Result<(), FrameError> {
        self.to_dynamic_image()?.save(path)?;
        debug!(path = %path.display(), width = self.width, height = self.height, "Frame saved");
        Ok(())
    }
}

/// Read and decode an image file into a frame
///
/// Reads the bytes through `std::fs` and decodes from memory, so any path the
/// platform can open works, including non-ASCII ones.
pub fn load_image_frame(path: &Path) -> Result<Frame, FrameError> {
    let bytes = std::fs::read(path).map_err(|source| FrameError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let image = image::load_from_memory(&bytes)?;
    let frame = Frame::from_image(image);

    debug!(
        path = %path.display(),
        width = frame.width,
        height = frame.height,
        "Image decoded"
    );
    Ok(frame)
}

/// Check whether a file starts with a recognised image signature
///
/// Only the leading bytes are inspected; the extension is ignored.
pub fn has_image_signature(path: &Path) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };

    let mut head = Vec::with_capacity(file_formats::SIGNATURE_LEN);
    if file
        .take(file_formats::SIGNATURE_LEN as u64)
        .read_to_end(&mut head)
        .is_err()
    {
        return false;
    }

    image::guess_format(&head).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_short_buffer() {
        let result = Frame::new(2, 2, PixelFormat::Rgb24, vec![0u8; 11]);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLayout {
                expected: 12,
                actual: 11
            })
        ));
    }

    #[test]
    fn test_filled_frame_layout() {
        let frame = Frame::filled(4, 3, [10, 20, 30]);
        assert_eq!(frame.data.len(), 4 * 3 * 3);
        assert_eq!(frame.stride(), 12);
        assert_eq!(&frame.data[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_equality_ignores_capture_time() {
        let a = Frame::filled(2, 2, [1, 2, 3]);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = Frame::filled(2, 2, [1, 2, 3]);
        assert_eq!(a, b);
        assert_ne!(a, Frame::filled(2, 2, [3, 2, 1]));
    }

    #[test]
    fn test_gray_image_is_expanded_to_rgb() {
        let gray = image::GrayImage::from_pixel(3, 2, image::Luma([77]));
        let frame = Frame::from_image(DynamicImage::ImageLuma8(gray));
        assert_eq!(frame.format, PixelFormat::Rgb24);
        assert!(frame.data.iter().all(|&b| b == 77));
    }

    #[test]
    fn test_alpha_is_dropped() {
        let rgba = RgbaImage::from_pixel(1, 1, image::Rgba([5, 6, 7, 8]));
        let frame = Frame::from_image(DynamicImage::ImageRgba8(rgba));
        assert_eq!(&frame.data[..], &[5, 6, 7]);
    }

    #[test]
    fn test_load_image_frame_unicode_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("图像_ñ.png");
        RgbImage::from_pixel(5, 4, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let frame = load_image_frame(&path).unwrap();
        assert_eq!((frame.width, frame.height), (5, 4));
        assert!(has_image_signature(&path));
    }

    #[test]
    fn test_signature_rejects_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, "definitely not an image").unwrap();
        assert!(!has_image_signature(&path));
        assert!(load_image_frame(&path).is_err());
    }
}
