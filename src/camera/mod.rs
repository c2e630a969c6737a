//! Frame sources
//!
//! Every loop pulls frames through [`FrameSource`]: the webcam, reply videos
//! and the selected screen region all implement it. The webcam adapter uses
//! the nokhwa crate and is compiled with the `camera` feature.

use std::time::Duration;

use thiserror::Error;

use crate::video::Frame;

/// Errors raised while acquiring a frame
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The device could not be opened
    #[error("Failed to open capture device: {0}")]
    OpenFailed(String),
    /// The device stopped delivering frames
    #[error("Capture device failed: {0}")]
    DeviceFailed(String),
    /// A frame arrived but could not be decoded
    #[error("Failed to decode frame: {0}")]
    DecodeFailed(String),
    /// The requested backend was not compiled in
    #[error("Capture backend unavailable: built without the `{0}` feature")]
    Unavailable(&'static str),
}

impl CaptureError {
    /// Transient errors skip one cycle; anything else stops the loop
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::DecodeFailed(_))
    }
}

/// A blocking source of frames
pub trait FrameSource {
    /// Acquire the next frame. `Ok(None)` means the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Native spacing between frames, for sources with a fixed rate
    fn frame_interval(&self) -> Option<Duration> {
        None
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        (**self).next_frame()
    }

    fn frame_interval(&self) -> Option<Duration> {
        (**self).frame_interval()
    }
}

#[cfg(feature = "camera")]
pub use webcam::{list_cameras, CameraInfo, CameraSource};

#[cfg(feature = "camera")]
mod webcam {
    use nokhwa::pixel_format::RgbAFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
    use nokhwa::Camera;

    use super::{CaptureError, FrameSource};
    use crate::video::Frame;

    /// Information about an available camera
    #[derive(Clone, Debug)]
    pub struct CameraInfo {
        pub index: u32,
        pub name: String,
    }

    /// List available cameras
    pub fn list_cameras() -> Vec<CameraInfo> {
        match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
            Ok(camera_list) => camera_list
                .iter()
                .enumerate()
                .map(|(idx, info)| CameraInfo {
                    index: idx as u32,
                    name: info.human_name().to_string(),
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to enumerate cameras: {:?}", e);
                Vec::new()
            }
        }
    }

    /// Webcam opened with its stream running; the stream stops on drop
    pub struct CameraSource {
        camera: Camera,
        frame_count: u64,
    }

    impl CameraSource {
        /// Open camera `camera_index`, falling back through progressively
        /// looser format requests
        pub fn open(camera_index: u32) -> Result<Self, CaptureError> {
            let index = CameraIndex::Index(camera_index);

            let attempts = [
                RequestedFormatType::AbsoluteHighestResolution,
                RequestedFormatType::HighestResolution(Resolution::new(640, 480)),
                RequestedFormatType::None,
            ];

            let mut last_error = String::new();
            let mut opened = None;
            for request in attempts {
                match Camera::new(index.clone(), RequestedFormat::new::<RgbAFormat>(request)) {
                    Ok(camera) => {
                        opened = Some(camera);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Camera {} rejected format request: {:?}", camera_index, e);
                        last_error = e.to_string();
                    }
                }
            }
            let mut camera = opened.ok_or(CaptureError::OpenFailed(last_error))?;

            camera
                .open_stream()
                .map_err(|e| CaptureError::OpenFailed(format!("Failed to open camera stream: {}", e)))?;

            tracing::info!(
                "Camera opened: {} ({}x{})",
                camera.info().human_name(),
                camera.resolution().width(),
                camera.resolution().height()
            );

            Ok(Self {
                camera,
                frame_count: 0,
            })
        }
    }

    impl FrameSource for CameraSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            let buffer = self
                .camera
                .frame()
                .map_err(|e| CaptureError::DeviceFailed(e.to_string()))?;

            let image = buffer
                .decode_image::<RgbAFormat>()
                .map_err(|e| CaptureError::DecodeFailed(e.to_string()))?;

            let (width, height) = (image.width(), image.height());
            let frame_number = self.frame_count;
            self.frame_count += 1;

            Frame::from_rgba(image.into_raw(), width, height, frame_number)
                .map(Some)
                .ok_or_else(|| CaptureError::DecodeFailed("frame size mismatch".to_string()))
        }
    }

    impl Drop for CameraSource {
        fn drop(&mut self) {
            if let Err(e) = self.camera.stop_stream() {
                tracing::warn!("Failed to stop camera stream: {:?}", e);
            }
            tracing::info!("Camera released after {} frames", self.frame_count);
        }
    }
}
