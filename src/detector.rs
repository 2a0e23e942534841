// SPDX-License-Identifier: GPL-3.0-only

//! Object detector contract
//!
//! A detector turns a frame into application-level results in three steps:
//! `preprocess` shapes the frame into model input, `predict` runs the model
//! and `postprocess` decodes raw predictions (boxes, classes, scores).
//! Concrete models live outside this crate; anything implementing
//! [`Detector`] can be attached to a handler as a transform or driven from a
//! `frame_ready` listener.

use crate::constants::detector::DEFAULT_IMAGE_SIZE;
use crate::errors::DetectorError;
use crate::media::Frame;
use std::fmt;
use std::path::PathBuf;

/// Where inference runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceDevice {
    #[default]
    Cpu,
    /// CUDA device by index
    Cuda(u32),
}

impl fmt::Display for InferenceDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceDevice::Cpu => write!(f, "cpu"),
            InferenceDevice::Cuda(index) => write!(f, "cuda:{}", index),
        }
    }
}

impl std::str::FromStr for InferenceDevice {
    type Err = DetectorError;

    /// Accepts `cpu`, `cuda` and `cuda:N`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(InferenceDevice::Cpu),
            "cuda" => Ok(InferenceDevice::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|index| index.parse().ok())
                .map(InferenceDevice::Cuda)
                .ok_or_else(|| DetectorError::ModelLoad(format!("unknown device '{}'", s))),
        }
    }
}

/// Settings shared by every detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    pub model_path: PathBuf,
    pub device: InferenceDevice,
    /// Square input edge in pixels
    pub image_size: u32,
}

impl DetectorConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            device: InferenceDevice::default(),
            image_size: DEFAULT_IMAGE_SIZE,
        }
    }

    pub fn with_device(mut self, device: InferenceDevice) -> Self {
        self.device = device;
        self
    }

    pub fn with_image_size(mut self, image_size: u32) -> Self {
        self.image_size = image_size;
        self
    }
}

pub trait Detector {
    /// Model input produced by `preprocess`
    type Input;
    /// Raw model output
    type Prediction;
    /// Decoded detections
    type Output;

    /// Load model weights; must succeed before any other call
    fn load_model(&mut self, config: &DetectorConfig) -> Result<(), DetectorError>;

    fn preprocess(&self, frame: &Frame) -> Result<Self::Input, DetectorError>;

    fn predict(&self, input: Self::Input) -> Result<Self::Prediction, DetectorError>;

    fn postprocess(&self, prediction: Self::Prediction) -> Result<Self::Output, DetectorError>;

    /// Run preprocess, predict and postprocess on one frame
    fn detect(&self, frame: &Frame) -> Result<Self::Output, DetectorError> {
        let input = self.preprocess(frame)?;
        let prediction = self.predict(input)?;
        self.postprocess(prediction)
    }
}
