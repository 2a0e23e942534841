// SPDX-License-Identifier: GPL-3.0-only

//! Ordered frame transform chains
//!
//! A [`Transform`] is a shared handle to a frame-in/frame-out function.
//! Handlers hold clones of the handles in a [`TransformChain`]; the caller
//! keeps its own clone to remove the transform again later. Two handles are
//! the same transform when they point at the same function object.

use super::Frame;
use crate::errors::{HandlerError, TransformError};
use std::fmt;
use std::sync::Arc;

type TransformFn = dyn Fn(Frame) -> Result<Frame, TransformError> + Send + Sync;

/// Shared handle to a frame transform
#[derive(Clone)]
pub struct Transform {
    func: Arc<TransformFn>,
    name: Arc<str>,
}

impl Transform {
    /// Wrap a fallible transform function
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(Frame) -> Result<Frame, TransformError> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            name: Arc::from(name),
        }
    }

    /// Wrap a transform that cannot fail
    pub fn map<F>(name: &str, func: F) -> Self
    where
        F: Fn(Frame) -> Frame + Send + Sync + 'static,
    {
        Self::new(name, move |frame| Ok(func(frame)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, frame: Frame) -> Result<Frame, TransformError> {
        (self.func)(frame)
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl Eq for Transform {}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform").field("name", &self.name).finish()
    }
}

/// Failure of one step of a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainError {
    /// Position of the failing transform in the chain
    pub index: usize,
    /// Name of the failing transform
    pub transform: String,
    pub error: TransformError,
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transform #{} ({}) failed: {}",
            self.index, self.transform, self.error
        )
    }
}

impl std::error::Error for ChainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Ordered list of transforms applied left to right
#[derive(Debug, Clone, Default)]
pub struct TransformChain {
    transforms: Vec<Transform>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform to the end of the chain
    pub fn push(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    /// Remove the first occurrence of `transform`
    ///
    /// The chain is left untouched when the transform is not present.
    pub fn remove(&mut self, transform: &Transform) -> Result<(), HandlerError> {
        let index = self
            .transforms
            .iter()
            .position(|t| t == transform)
            .ok_or(HandlerError::NotFound)?;
        self.transforms.remove(index);
        Ok(())
    }

    pub fn contains(&self, transform: &Transform) -> bool {
        self.transforms.iter().any(|t| t == transform)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transform> {
        self.transforms.iter()
    }

    /// Run `frame` through every transform in order
    ///
    /// Each transform consumes the previous one's output. Stops at the first
    /// failure.
    pub fn apply(&self, frame: Frame) -> Result<Frame, ChainError> {
        self.transforms
            .iter()
            .enumerate()
            .try_fold(frame, |frame, (index, transform)| {
                transform.apply(frame).map_err(|error| ChainError {
                    index,
                    transform: transform.name().to_string(),
                    error,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PixelFormat;

    fn add(value: u8) -> Transform {
        Transform::map("add", move |frame: Frame| {
            let data: Vec<u8> = frame.data.iter().map(|b| b.wrapping_add(value)).collect();
            Frame::new(frame.width, frame.height, frame.format, data).unwrap()
        })
    }

    fn double() -> Transform {
        Transform::map("double", |frame: Frame| {
            let data: Vec<u8> = frame.data.iter().map(|b| b.wrapping_mul(2)).collect();
            Frame::new(frame.width, frame.height, frame.format, data).unwrap()
        })
    }

    #[test]
    fn test_chain_applies_in_registration_order() {
        let mut chain = TransformChain::new();
        chain.push(add(1));
        chain.push(double());

        let frame = Frame::new(1, 1, PixelFormat::Gray8, vec![3u8]).unwrap();
        let out = chain.apply(frame).unwrap();
        // (3 + 1) * 2, not 3 * 2 + 1
        assert_eq!(&out.data[..], &[8]);
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = TransformChain::new();
        let frame = Frame::filled(2, 2, [9, 9, 9]);
        assert_eq!(chain.apply(frame.clone()).unwrap(), frame);
    }

    #[test]
    fn test_remove_uses_handle_identity() {
        let first = add(1);
        let lookalike = add(1);
        let mut chain = TransformChain::new();
        chain.push(first.clone());

        assert_eq!(chain.remove(&lookalike), Err(HandlerError::NotFound));
        assert_eq!(chain.len(), 1);

        chain.remove(&first).unwrap();
        assert!(chain.is_empty());
        assert_eq!(chain.remove(&first), Err(HandlerError::NotFound));
    }

    #[test]
    fn test_failure_reports_position() {
        let mut chain = TransformChain::new();
        chain.push(add(1));
        chain.push(Transform::new("boom", |_| Err(TransformError::new("exploded"))));
        chain.push(double());

        let err = chain.apply(Frame::filled(1, 1, [0, 0, 0])).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.transform, "boom");
        assert!(err.to_string().contains("exploded"));
    }
}
