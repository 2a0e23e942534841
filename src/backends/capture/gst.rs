// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture backend
//!
//! Cameras and container files both end in the same tail:
//!
//! ```text
//! <source> ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink
//! ```
//!
//! where `<source>` is the platform camera element for an index, or
//! `filesrc ! decodebin` for a path. Frames are pulled from the appsink one
//! per handler tick, so the handler's timer sets the pace (`sync=false`).

use super::{CaptureBackend, CaptureResult, CaptureSource, SourceDescriptor, SourceInfo};
use crate::constants::capture as timing;
use crate::errors::CaptureError;
use crate::media::{Frame, PixelFormat};
use gstreamer::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Backend opening sources as GStreamer pipelines
pub struct GstBackend;

impl GstBackend {
    /// Initialise GStreamer and create the backend
    pub fn new() -> CaptureResult<Self> {
        gstreamer::init()
            .map_err(|e| CaptureError::Unsupported(format!("GStreamer init failed: {}", e)))?;
        Ok(Self)
    }
}

impl CaptureBackend for GstBackend {
    fn open(&self, source: &SourceDescriptor) -> CaptureResult<Box<dyn CaptureSource>> {
        let description = match source {
            SourceDescriptor::Camera(index) => camera_pipeline(*index),
            SourceDescriptor::File(path) => file_pipeline(path)?,
        };
        info!(source = %source, pipeline = %description, "Opening GStreamer source");

        let stream = GstStream::open(&description, source.is_camera())?;
        Ok(Box::new(stream))
    }

    fn name(&self) -> &str {
        "gstreamer"
    }
}

/// Camera element for the current platform
fn camera_pipeline(index: u32) -> String {
    let source = if cfg!(target_os = "windows") {
        format!("ksvideosrc device-index={}", index)
    } else if cfg!(target_os = "macos") {
        format!("avfvideosrc device-index={}", index)
    } else {
        format!("v4l2src device=/dev/video{}", index)
    };

    // Cameras deliver the latest frame; stale ones are dropped
    format!(
        "{} ! videoconvert ! video/x-raw,format=RGB ! \
         appsink name=sink max-buffers=1 drop=true sync=false",
        source
    )
}

/// Container decode pipeline for a file
fn file_pipeline(path: &Path) -> CaptureResult<String> {
    if !path.is_file() {
        return Err(CaptureError::OpenFailed(format!(
            "no such file: {}",
            path.display()
        )));
    }

    // Escape for the launch syntax; every frame of a file is kept in order
    let location = path
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    Ok(format!(
        "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
         appsink name=sink max-buffers=2 drop=false sync=false",
        location
    ))
}

/// An open GStreamer pipeline with its appsink
struct GstStream {
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    info: SourceInfo,
    /// First sample, pulled while opening to prove the source works
    pending: Option<Frame>,
    released: bool,
}

impl GstStream {
    fn open(description: &str, live: bool) -> CaptureResult<Self> {
        let pipeline = gstreamer::parse::launch(description)
            .map_err(|e| CaptureError::OpenFailed(format!("Failed to create pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| CaptureError::OpenFailed("Failed to downcast to Pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CaptureError::OpenFailed("Failed to find appsink".into()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| CaptureError::OpenFailed("Failed to downcast to AppSink".into()))?;

        pipeline.set_state(gstreamer::State::Playing).map_err(|e| {
            let _ = pipeline.set_state(gstreamer::State::Null);
            CaptureError::OpenFailed(format!("Failed to start pipeline: {:?}", e))
        })?;

        if let Err(e) = wait_for_preroll(&pipeline) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(e);
        }

        let sample = match appsink.try_pull_sample(clock_time(timing::OPEN_TIMEOUT)) {
            Some(sample) => sample,
            None => {
                let _ = pipeline.set_state(gstreamer::State::Null);
                return Err(CaptureError::OpenFailed(
                    "source produced no frames".into(),
                ));
            }
        };

        let (first, video_info) = match sample_to_frame(&sample) {
            Ok(decoded) => decoded,
            Err(e) => {
                let _ = pipeline.set_state(gstreamer::State::Null);
                return Err(e);
            }
        };

        let fps_fraction = video_info.fps();
        let fps = if fps_fraction.denom() != 0 {
            fps_fraction.numer() as f64 / fps_fraction.denom() as f64
        } else {
            0.0
        };

        let frames = if live {
            None
        } else {
            pipeline
                .query_duration::<gstreamer::ClockTime>()
                .filter(|_| fps > 0.0)
                .map(|duration| (duration.seconds_f64() * fps).round() as u64)
        };

        let info = SourceInfo {
            width: video_info.width(),
            height: video_info.height(),
            fps,
            frames,
        };
        info!(%info, "GStreamer source opened");

        Ok(Self {
            pipeline,
            appsink,
            info,
            pending: Some(first),
            released: false,
        })
    }
}

impl CaptureSource for GstStream {
    fn read_frame(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        if let Some(frame) = self.pending.take() {
            return Some(frame);
        }
        if self.appsink.is_eos() {
            debug!("End of stream");
            return None;
        }

        let sample = self
            .appsink
            .try_pull_sample(clock_time(timing::READ_TIMEOUT))?;
        match sample_to_frame(&sample) {
            Ok((frame, _)) => Some(frame),
            Err(e) => {
                warn!(error = %e, "Dropping undecodable sample");
                None
            }
        }
    }

    fn info(&self) -> SourceInfo {
        self.info
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.pending = None;
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        debug!("GStreamer source released");
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Wait for the pipeline to reach a running state or report an error
fn wait_for_preroll(pipeline: &gstreamer::Pipeline) -> CaptureResult<()> {
    let bus = pipeline
        .bus()
        .ok_or_else(|| CaptureError::OpenFailed("No bus on pipeline".into()))?;
    let deadline = Instant::now() + timing::OPEN_TIMEOUT;

    while Instant::now() < deadline {
        let Some(msg) = bus.timed_pop(clock_time(timing::BUS_POLL_INTERVAL)) else {
            continue;
        };

        use gstreamer::MessageView;
        match msg.view() {
            MessageView::Error(err) => {
                return Err(CaptureError::OpenFailed(format!(
                    "Pipeline error: {}",
                    err.error()
                )));
            }
            MessageView::AsyncDone(_) => return Ok(()),
            MessageView::StateChanged(state)
                if state.src() == Some(pipeline.upcast_ref())
                    && state.current() == gstreamer::State::Playing =>
            {
                return Ok(());
            }
            _ => {}
        }
    }

    // Live sources may never post AsyncDone; the first sample decides
    Ok(())
}

/// Copy an RGB sample into a tightly packed frame
///
/// GStreamer pads RGB rows to 4-byte boundaries, so rows are copied one by
/// one when the stride is wider than the pixels.
fn sample_to_frame(
    sample: &gstreamer::Sample,
) -> CaptureResult<(Frame, gstreamer_video::VideoInfo)> {
    let caps = sample
        .caps()
        .ok_or_else(|| CaptureError::Backend("No caps on sample".into()))?;
    let video_info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| CaptureError::Backend(format!("Invalid video caps: {}", e)))?;

    let buffer = sample
        .buffer()
        .ok_or_else(|| CaptureError::Backend("No buffer in sample".into()))?;
    let map = buffer
        .map_readable()
        .map_err(|_| CaptureError::Backend("Failed to map buffer".into()))?;
    let src = map.as_slice();

    let width = video_info.width();
    let height = video_info.height();
    let row_bytes = width as usize * 3;
    let stride = video_info.stride()[0] as usize;

    if stride < row_bytes || src.len() < stride * (height as usize).saturating_sub(1) + row_bytes {
        return Err(CaptureError::Backend(format!(
            "Buffer too small for {}x{} RGB (stride {}, {} bytes)",
            width,
            height,
            stride,
            src.len()
        )));
    }

    let data: Vec<u8> = if stride == row_bytes {
        src[..row_bytes * height as usize].to_vec()
    } else {
        let mut packed = Vec::with_capacity(row_bytes * height as usize);
        for row in src.chunks(stride).take(height as usize) {
            packed.extend_from_slice(&row[..row_bytes]);
        }
        packed
    };

    let frame = Frame {
        width,
        height,
        format: PixelFormat::Rgb24,
        data: Arc::from(data.into_boxed_slice()),
        captured_at: Instant::now(),
    };
    Ok((frame, video_info))
}

fn clock_time(duration: std::time::Duration) -> gstreamer::ClockTime {
    gstreamer::ClockTime::from_mseconds(duration.as_millis() as u64)
}
