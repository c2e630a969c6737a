//! Frame representation shared by every capture source
//!
//! A frame is an RGBA8 pixel grid plus the sequence number assigned by the
//! source that produced it. Frames are consumed and dropped each cycle.

use image::{Rgba, RgbaImage};

/// A single RGBA frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Pixel data (RGBA, 4 bytes/pixel)
    pub image: RgbaImage,
    /// Frame number within its source (0-based)
    pub frame_number: u64,
}

impl Frame {
    /// Wrap an existing RGBA image
    pub fn new(image: RgbaImage, frame_number: u64) -> Self {
        Self { image, frame_number }
    }

    /// Build a frame from raw RGBA bytes, returning None if the buffer size
    /// does not match the dimensions
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32, frame_number: u64) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(|image| Self { image, frame_number })
    }

    /// A frame filled with a single color
    pub fn solid(width: u32, height: u32, color: [u8; 4], frame_number: u64) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba(color)),
            frame_number,
        }
    }

    /// Get the expected data size for RGBA frame dimensions (width * height * 4)
    pub fn expected_size(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 4
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pack pixels as `0RGB` words for framebuffer windows
    pub fn to_0rgb(&self) -> Vec<u32> {
        self.image
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect()
    }

    /// Create a nearest-neighbour downscaled copy that fits inside the bounds,
    /// returning the copy and the scale factor applied (<= 1.0)
    pub fn fit_within(&self, max_width: u32, max_height: u32) -> (Frame, f32) {
        let (w, h) = (self.width().max(1), self.height().max(1));
        let scale = (max_width as f32 / w as f32)
            .min(max_height as f32 / h as f32)
            .min(1.0);
        if scale >= 1.0 {
            return (self.clone(), 1.0);
        }

        let target_w = ((w as f32 * scale) as u32).max(1);
        let target_h = ((h as f32 * scale) as u32).max(1);
        let resized = image::imageops::resize(
            &self.image,
            target_w,
            target_h,
            image::imageops::FilterType::Nearest,
        );
        (Frame::new(resized, self.frame_number), scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_checks_size() {
        let data = vec![0u8; Frame::expected_size(4, 3)];
        assert!(Frame::from_rgba(data, 4, 3, 0).is_some());
        assert!(Frame::from_rgba(vec![0u8; 10], 4, 3, 0).is_none());
    }

    #[test]
    fn test_to_0rgb() {
        let frame = Frame::solid(2, 1, [0x12, 0x34, 0x56, 0xff], 7);
        assert_eq!(frame.to_0rgb(), vec![0x0012_3456, 0x0012_3456]);
    }

    #[test]
    fn test_fit_within() {
        let frame = Frame::solid(400, 200, [0, 0, 0, 255], 0);
        let (fitted, scale) = frame.fit_within(200, 200);
        assert_eq!(scale, 0.5);
        assert_eq!((fitted.width(), fitted.height()), (200, 100));

        let (same, scale) = frame.fit_within(1000, 1000);
        assert_eq!(scale, 1.0);
        assert_eq!(same.width(), 400);
    }
}
