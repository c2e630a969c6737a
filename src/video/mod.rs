//! Frames and reply video decoding
//!
//! Reply clips are decoded with FFmpeg via the `ffmpeg-next` crate (feature
//! `ffmpeg`) into RGBA frames. Callers open clips through [`VideoOpener`] so
//! playback can be driven by other decoders in tests.

#[cfg(feature = "ffmpeg")]
mod decoder;
mod frame;

#[cfg(feature = "ffmpeg")]
pub use decoder::{FfmpegOpener, VideoDecoder};
pub use frame::Frame;

use std::path::Path;

use thiserror::Error;

use crate::camera::FrameSource;

/// Errors that can occur opening or decoding a video
#[derive(Error, Debug)]
pub enum VideoDecoderError {
    #[error("Failed to open video file: {0}")]
    OpenFailed(String),
    #[error("No video stream found in file")]
    NoVideoStream,
    #[error("Failed to create decoder: {0}")]
    DecoderCreationFailed(String),
    #[error("Failed to create scaler: {0}")]
    ScalerCreationFailed(String),
    #[error("Decoding failed: {0}")]
    DecodeFailed(String),
    #[error("Video decoding unavailable: built without the `ffmpeg` feature")]
    Unavailable,
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),
}

/// Opens video files as frame sources
pub trait VideoOpener: Send {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, VideoDecoderError>;
}

/// Opener used when the crate is built without a video backend
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVideoBackend;

impl VideoOpener for NoVideoBackend {
    fn open(&self, _path: &Path) -> Result<Box<dyn FrameSource>, VideoDecoderError> {
        Err(VideoDecoderError::Unavailable)
    }
}
