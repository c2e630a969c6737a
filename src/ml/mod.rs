//! Hand landmarks and gesture features
//!
//! A [`LandmarkExtractor`] turns a frame into zero or more 21-point hand
//! landmark sets; [`FeatureVector::from_landmarks`] flattens one set into the
//! 42-value vector the [`GestureClassifier`] consumes.

mod classifier;
#[cfg(feature = "onnx")]
mod landmarker;

pub use classifier::{ClassifierModel, GestureClassifier, Label, ModelError};
#[cfg(feature = "onnx")]
pub use landmarker::OnnxHandLandmarker;

use thiserror::Error;

use crate::video::Frame;

/// Landmarks per detected hand
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Values per feature vector (x and y of every landmark)
pub const FEATURE_LEN: usize = HAND_LANDMARK_COUNT * 2;

/// Hand landmark connections (MediaPipe hand topology)
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    // Thumb
    (0, 1), (1, 2), (2, 3), (3, 4),
    // Index
    (0, 5), (5, 6), (6, 7), (7, 8),
    // Middle
    (9, 10), (10, 11), (11, 12),
    // Ring
    (13, 14), (14, 15), (15, 16),
    // Pinky
    (0, 17), (17, 18), (18, 19), (19, 20),
    // Palm
    (5, 9), (9, 13), (13, 17),
];

/// Hand landmark (normalized image coordinates)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HandLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl HandLandmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Landmarks of one detected hand, in detector order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkSet {
    pub points: Vec<HandLandmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<HandLandmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Flattened (x, y) coordinates of one hand
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector([f32; FEATURE_LEN]);

impl FeatureVector {
    /// Flatten a landmark set. Returns None unless the flattened length is
    /// exactly [`FEATURE_LEN`].
    pub fn from_landmarks(set: &LandmarkSet) -> Option<Self> {
        let flat: Vec<f32> = set.points.iter().flat_map(|p| [p.x, p.y]).collect();
        Self::from_slice(&flat)
    }

    /// Wrap raw values, rejecting any length other than [`FEATURE_LEN`]
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        <[f32; FEATURE_LEN]>::try_from(values).ok().map(Self)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }
}

/// Errors from the landmark detector; they only affect the current cycle
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Landmark model not found: {0}")]
    ModelNotFound(String),
    #[error("Failed to load landmark model: {0}")]
    LoadFailed(String),
    #[error("Landmark inference failed: {0}")]
    InferenceFailed(String),
    #[error("Landmark detector unavailable: built without the `{0}` feature")]
    Unavailable(&'static str),
}

/// Hand landmark detector
pub trait LandmarkExtractor {
    fn detect_hands(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, ExtractError>;
}

impl<E: LandmarkExtractor + ?Sized> LandmarkExtractor for Box<E> {
    fn detect_hands(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, ExtractError> {
        (**self).detect_hands(frame)
    }
}
