//! Video decoder using FFmpeg
//!
//! Decodes the best video stream of a file to RGBA frames using the
//! ffmpeg-next crate (software decode path).

use std::path::Path;
use std::time::Duration;

use super::{Frame, VideoDecoderError, VideoOpener};
use crate::camera::{CaptureError, FrameSource};

/// Video decoder that reads frames from a video file
pub struct VideoDecoder {
    /// The input format context
    input: ffmpeg_next::format::context::Input,
    /// Index of the video stream
    video_stream_index: usize,
    /// Video decoder
    decoder: ffmpeg_next::decoder::Video,
    /// Scaler for converting to RGBA
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    /// Frame rate (fps)
    frame_rate: f64,
    /// Number of frames returned so far
    frame_index: u64,
    /// Whether the decoder has been drained
    eof: bool,
}

impl VideoDecoder {
    /// Open a video file for decoding
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VideoDecoderError> {
        // Initialize FFmpeg (safe to call multiple times)
        ffmpeg_next::init()?;

        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();

        let input = ffmpeg_next::format::input(&path)
            .map_err(|_| VideoDecoderError::OpenFailed(path_str.clone()))?;

        let video_stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(VideoDecoderError::NoVideoStream)?;
        let video_stream_index = video_stream.index();

        let frame_rate = video_stream.avg_frame_rate();
        let frame_rate_f64 = if frame_rate.denominator() > 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            // Unknown; playback falls back to the configured delay
            0.0
        };

        let context = ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())?;
        let decoder = context.decoder().video().map_err(|e| {
            VideoDecoderError::DecoderCreationFailed(format!("Failed to create video decoder: {}", e))
        })?;

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGBA,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| VideoDecoderError::ScalerCreationFailed(e.to_string()))?;

        tracing::info!(
            "Opened video {}: {}x{} @ {:.2}fps",
            path_str,
            width,
            height,
            frame_rate_f64
        );

        Ok(Self {
            input,
            video_stream_index,
            decoder,
            scaler,
            width,
            height,
            frame_rate: frame_rate_f64,
            frame_index: 0,
            eof: false,
        })
    }

    /// Decode the next frame, returning None at end of file
    pub fn decode_next_frame(&mut self) -> Result<Option<Frame>, VideoDecoderError> {
        let mut decoded_frame = ffmpeg_next::frame::Video::empty();

        loop {
            // First, try to receive any pending frames from the decoder
            match self.decoder.receive_frame(&mut decoded_frame) {
                Ok(()) => {
                    if decoded_frame.format() != self.scaler.input().format {
                        self.scaler = ffmpeg_next::software::scaling::Context::get(
                            decoded_frame.format(),
                            self.width,
                            self.height,
                            ffmpeg_next::format::Pixel::RGBA,
                            self.width,
                            self.height,
                            ffmpeg_next::software::scaling::Flags::BILINEAR,
                        )
                        .map_err(|e| VideoDecoderError::ScalerCreationFailed(e.to_string()))?;
                    }

                    let mut rgba_frame = ffmpeg_next::frame::Video::empty();
                    self.scaler.run(&decoded_frame, &mut rgba_frame)?;

                    let data = rgba_frame.data(0);
                    let stride = rgba_frame.stride(0);
                    let expected_stride = (self.width as usize) * 4;
                    let size = Frame::expected_size(self.width, self.height);

                    let rgba_data = if stride == expected_stride {
                        data[..size].to_vec()
                    } else {
                        let mut output = Vec::with_capacity(size);
                        for y in 0..self.height as usize {
                            let row_start = y * stride;
                            output.extend_from_slice(&data[row_start..row_start + expected_stride]);
                        }
                        output
                    };

                    let frame = Frame::from_rgba(rgba_data, self.width, self.height, self.frame_index)
                        .ok_or_else(|| VideoDecoderError::DecodeFailed("frame size mismatch".to_string()))?;
                    self.frame_index += 1;
                    return Ok(Some(frame));
                }
                Err(ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::error::EAGAIN,
                }) => {
                    // Need more input - read next packet
                }
                Err(ffmpeg_next::Error::Eof) => {
                    return Ok(None);
                }
                Err(e) => {
                    return Err(VideoDecoderError::DecodeFailed(e.to_string()));
                }
            }

            if self.eof {
                // Drained without EOF from the decoder
                return Ok(None);
            }

            // Read next packet and send to decoder
            loop {
                match self.input.packets().next() {
                    Some((stream, packet)) => {
                        if stream.index() == self.video_stream_index {
                            self.decoder.send_packet(&packet)?;
                            break;
                        }
                    }
                    None => {
                        self.decoder.send_eof()?;
                        self.eof = true;
                        break;
                    }
                }
            }
        }
    }

    /// Get the video frame rate (fps)
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}

impl FrameSource for VideoDecoder {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        self.decode_next_frame().map_err(|e| match e {
            VideoDecoderError::DecodeFailed(msg) => CaptureError::DecodeFailed(msg),
            other => CaptureError::DeviceFailed(other.to_string()),
        })
    }

    fn frame_interval(&self) -> Option<Duration> {
        frame_interval_for(self.frame_rate())
    }
}

/// Frame spacing for a stream rate; None for unknown or absurd rates
fn frame_interval_for(fps: f64) -> Option<Duration> {
    if fps.is_finite() && (1.0..=240.0).contains(&fps) {
        Some(Duration::from_secs_f64(1.0 / fps))
    } else {
        None
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        tracing::debug!("Released video decoder after {} frames", self.frame_index);
    }
}

/// Opens reply clips with [`VideoDecoder`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegOpener;

impl VideoOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, VideoDecoderError> {
        Ok(Box::new(VideoDecoder::open(path)?))
    }
}
