//! Hand landmark detection via ONNX Runtime
//!
//! Runs a MediaPipe-compatible hand landmark model (PINTO Model Zoo export)
//! over the whole frame. Output 0 holds 21 (x, y, z) triples in input-pixel
//! units, output 1 the hand presence score.

use std::path::Path;

use ndarray::Array4;

use super::{ExtractError, HandLandmark, LandmarkExtractor, LandmarkSet, HAND_LANDMARK_COUNT};
use crate::video::Frame;

const INPUT_SIZE: u32 = 224;

/// ONNX hand landmark detector
pub struct OnnxHandLandmarker {
    session: ort::session::Session,
    min_confidence: f32,
}

impl OnnxHandLandmarker {
    /// Load the landmark model
    pub fn new<P: AsRef<Path>>(model_path: P, min_confidence: f32) -> Result<Self, ExtractError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(ExtractError::ModelNotFound(model_path.display().to_string()));
        }

        let session = ort::session::Session::builder()
            .map_err(|e| ExtractError::LoadFailed(format!("Failed to create session builder: {}", e)))?
            .with_intra_threads(2)
            .map_err(|e| ExtractError::LoadFailed(format!("Failed to set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| ExtractError::LoadFailed(e.to_string()))?;

        tracing::info!("Loaded hand landmark model from {:?}", model_path);

        Ok(Self {
            session,
            min_confidence,
        })
    }

    /// Resize to the model input and convert to NHWC float [0, 1]
    fn preprocess(frame: &Frame) -> Vec<f32> {
        let mut output = vec![0.0f32; (INPUT_SIZE * INPUT_SIZE * 3) as usize];

        let x_ratio = frame.width() as f32 / INPUT_SIZE as f32;
        let y_ratio = frame.height() as f32 / INPUT_SIZE as f32;

        for y in 0..INPUT_SIZE {
            for x in 0..INPUT_SIZE {
                let src_x = ((x as f32 * x_ratio) as u32).min(frame.width().saturating_sub(1));
                let src_y = ((y as f32 * y_ratio) as u32).min(frame.height().saturating_sub(1));
                let pixel = frame.image.get_pixel(src_x, src_y);

                let out_idx = ((y * INPUT_SIZE + x) * 3) as usize;
                output[out_idx] = pixel[0] as f32 / 255.0;
                output[out_idx + 1] = pixel[1] as f32 / 255.0;
                output[out_idx + 2] = pixel[2] as f32 / 255.0;
            }
        }

        output
    }
}

/// Presence outputs are logits in some exports and probabilities in others
fn presence_probability(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}

impl LandmarkExtractor for OnnxHandLandmarker {
    fn detect_hands(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, ExtractError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }

        let input = Self::preprocess(frame);
        let input_array =
            Array4::from_shape_vec((1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3), input)
                .map_err(|e| ExtractError::InferenceFailed(format!("Failed to create input array: {}", e)))?;

        let input_tensor = ort::value::Tensor::from_array(input_array)
            .map_err(|e| ExtractError::InferenceFailed(format!("Failed to create tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ExtractError::InferenceFailed(e.to_string()))?;

        let mut values = outputs.iter();
        let (_, landmark_output) = values
            .next()
            .ok_or_else(|| ExtractError::InferenceFailed("No landmark output".to_string()))?;
        let (_, presence_output) = values
            .next()
            .ok_or_else(|| ExtractError::InferenceFailed("No presence output".to_string()))?;

        let (_shape, presence) = presence_output
            .try_extract_tensor::<f32>()
            .map_err(|e| ExtractError::InferenceFailed(format!("Failed to extract presence: {}", e)))?;
        let score = presence.first().copied().map(presence_probability).unwrap_or(0.0);
        if score < self.min_confidence {
            return Ok(Vec::new());
        }

        let (_shape, coords) = landmark_output
            .try_extract_tensor::<f32>()
            .map_err(|e| ExtractError::InferenceFailed(format!("Failed to extract landmarks: {}", e)))?;
        if coords.len() < HAND_LANDMARK_COUNT * 3 {
            return Err(ExtractError::InferenceFailed(format!(
                "Expected {} landmark values, got {}",
                HAND_LANDMARK_COUNT * 3,
                coords.len()
            )));
        }

        let scale = INPUT_SIZE as f32;
        let points = coords
            .chunks_exact(3)
            .take(HAND_LANDMARK_COUNT)
            .map(|c| HandLandmark {
                x: c[0] / scale,
                y: c[1] / scale,
                z: c[2] / scale,
            })
            .collect();

        tracing::trace!("Hand detected (presence {:.2}) in frame {}", score, frame.frame_number);

        // Single-pass model: at most one hand per frame
        Ok(vec![LandmarkSet::new(points)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_probability() {
        assert_eq!(presence_probability(0.8), 0.8);
        assert!(presence_probability(4.0) > 0.98);
        assert!(presence_probability(-4.0) < 0.02);
    }

    #[test]
    fn test_preprocess_layout() {
        let frame = Frame::solid(640, 480, [255, 0, 51, 255], 0);
        let input = OnnxHandLandmarker::preprocess(&frame);
        assert_eq!(input.len(), (INPUT_SIZE * INPUT_SIZE * 3) as usize);
        assert_eq!(input[0], 1.0);
        assert_eq!(input[1], 0.0);
        assert!((input[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_missing_model() {
        let result = OnnxHandLandmarker::new("does/not/exist.onnx", 0.7);
        assert!(matches!(result, Err(ExtractError::ModelNotFound(_))));
    }
}
