// SPDX-License-Identifier: GPL-3.0-only

//! Stock CPU transforms
//!
//! Small building blocks for transform chains. They operate on tightly
//! packed frames of any [`PixelFormat`] and keep the input format, except
//! [`resize`] which goes through the `image` crate and returns RGB.
//! [`draw_boxes`] overlays translucent rectangles, e.g. detector output.

use super::{Frame, PixelFormat, Transform};
use crate::errors::TransformError;
use image::imageops::FilterType;
use std::sync::Arc;

/// Mirror the frame left to right (selfie view)
pub fn mirror_horizontal() -> Transform {
    Transform::map("mirror", |frame| {
        let bpp = frame.format.bytes_per_pixel();
        let width = frame.width as usize;
        let row_bytes = frame.stride();
        if row_bytes == 0 {
            return frame;
        }
        let mut data = frame.data.to_vec();

        for row in data.chunks_exact_mut(row_bytes) {
            for x in 0..width / 2 {
                let left = x * bpp;
                let right = (width - 1 - x) * bpp;
                for i in 0..bpp {
                    row.swap(left + i, right + i);
                }
            }
        }

        with_data(frame, data)
    })
}

/// Rotate the frame by 180 degrees
pub fn rotate_180() -> Transform {
    Transform::map("rotate180", |frame| {
        let bpp = frame.format.bytes_per_pixel();
        let mut data = Vec::with_capacity(frame.data.len());
        for pixel in frame.data.chunks_exact(bpp).rev() {
            data.extend_from_slice(pixel);
        }
        with_data(frame, data)
    })
}

/// Desaturate using BT.601 luma weights
///
/// The output keeps the input channel layout so later transforms do not
/// have to handle a format change.
pub fn grayscale() -> Transform {
    Transform::map("grayscale", |frame| match frame.format {
        PixelFormat::Gray8 => frame,
        PixelFormat::Rgb24 | PixelFormat::Rgba => {
            let bpp = frame.format.bytes_per_pixel();
            let mut data = frame.data.to_vec();
            for pixel in data.chunks_exact_mut(bpp) {
                let luma = luma(pixel[0], pixel[1], pixel[2]);
                pixel[0] = luma;
                pixel[1] = luma;
                pixel[2] = luma;
            }
            with_data(frame, data)
        }
    })
}

/// Scale to exactly `width` x `height`
pub fn resize(width: u32, height: u32) -> Transform {
    Transform::new("resize", move |frame| {
        if width == 0 || height == 0 {
            return Err(TransformError::new(format!(
                "cannot resize to {}x{}",
                width, height
            )));
        }
        let rgb = frame
            .to_rgb_image()
            .map_err(|e| TransformError::new(e.to_string()))?;
        let scaled = image::imageops::resize(&rgb, width, height, FilterType::Triangle);

        let mut out = Frame::from_rgb_image(scaled);
        out.captured_at = frame.captured_at;
        Ok(out)
    })
}

/// Rectangle painted by [`draw_boxes`]
///
/// Covers `x1..x2` by `y1..y2` in pixels; parts outside the frame are clipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxOverlay {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub color: [u8; 3],
    /// Fill opacity from 0.0 to 1.0; the outline is always opaque
    pub alpha: f32,
    /// Outline width; `None` scales with the frame size
    pub thickness: Option<u32>,
}

impl BoxOverlay {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32, color: [u8; 3]) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            color,
            alpha: 0.25,
            thickness: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = Some(thickness);
        self
    }
}

/// Paint boxes with a solid outline and translucent fill
pub fn draw_boxes(boxes: Vec<BoxOverlay>) -> Transform {
    Transform::map("draw_boxes", move |frame| {
        if boxes.is_empty() || frame.data.is_empty() {
            return frame;
        }
        let bpp = frame.format.bytes_per_pixel();
        let (width, height) = (frame.width, frame.height);
        let default_thickness = (0.001 * (width + height) as f32).round() as u32 + 1;
        let mut data = frame.data.to_vec();

        for overlay in &boxes {
            let (x1, x2) = (overlay.x1.min(width), overlay.x2.min(width));
            let (y1, y2) = (overlay.y1.min(height), overlay.y2.min(height));
            if x1 >= x2 || y1 >= y2 {
                continue;
            }
            let edge = overlay.thickness.unwrap_or(default_thickness).max(1);
            let fill = overlay.alpha.clamp(0.0, 1.0);

            for y in y1..y2 {
                for x in x1..x2 {
                    let on_edge = x < overlay.x1.saturating_add(edge)
                        || x.saturating_add(edge) >= overlay.x2
                        || y < overlay.y1.saturating_add(edge)
                        || y.saturating_add(edge) >= overlay.y2;
                    let start = (y as usize * width as usize + x as usize) * bpp;
                    paint(
                        &mut data[start..start + bpp],
                        frame.format,
                        overlay.color,
                        if on_edge { 1.0 } else { fill },
                    );
                }
            }
        }

        with_data(frame, data)
    })
}

fn paint(pixel: &mut [u8], format: PixelFormat, color: [u8; 3], alpha: f32) {
    let gray = [luma(color[0], color[1], color[2])];
    let target: &[u8] = match format {
        PixelFormat::Gray8 => &gray,
        PixelFormat::Rgb24 | PixelFormat::Rgba => &color,
    };
    // Rgba keeps its alpha channel
    for (channel, &value) in pixel.iter_mut().zip(target) {
        *channel = (*channel as f32 * (1.0 - alpha) + value as f32 * alpha).round() as u8;
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn with_data(frame: Frame, data: Vec<u8>) -> Frame {
    Frame {
        data: Arc::from(data.into_boxed_slice()),
        ..frame
    }
}
