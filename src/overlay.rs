//! Prediction overlay
//!
//! Draws the hand skeleton and the `label -> reply` caption onto a frame.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::ml::{LandmarkSet, HAND_CONNECTIONS};
use crate::reply::Reply;
use crate::video::Frame;

const CAPTION_ORIGIN: (i32, i32) = (10, 50);
const CAPTION_SCALE: i32 = 3;
const CAPTION_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const JOINT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BONE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const JOINT_RADIUS: i32 = 4;

/// Caption text for a prediction
pub fn caption(label: &str, reply: &Reply) -> String {
    format!("{} -> {}", label, reply.text())
}

/// Renders landmarks and captions onto frames
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer;

impl OverlayRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Draw one hand's landmarks and its caption, returning the caption
    pub fn render(&self, frame: &mut Frame, hand: &LandmarkSet, label: &str, reply: &Reply) -> String {
        self.draw_landmarks(&mut frame.image, hand);
        let text = caption(label, reply);
        draw_text(&mut frame.image, CAPTION_ORIGIN.0, CAPTION_ORIGIN.1, &text, CAPTION_SCALE, CAPTION_COLOR);
        text
    }

    fn draw_landmarks(&self, img: &mut RgbaImage, hand: &LandmarkSet) {
        let (w, h) = (img.width() as f32, img.height() as f32);
        let to_px = |i: usize| -> Option<(f32, f32)> {
            hand.points.get(i).map(|p| (p.x * w, p.y * h))
        };

        for &(from, to) in HAND_CONNECTIONS.iter() {
            if let (Some(a), Some(b)) = (to_px(from), to_px(to)) {
                draw_line_segment_mut(img, a, b, BONE_COLOR);
            }
        }

        for point in &hand.points {
            let center = ((point.x * w) as i32, (point.y * h) as i32);
            draw_filled_circle_mut(img, center, JOINT_RADIUS, JOINT_COLOR);
        }
    }
}

/// Draw text with the built-in 8x8 font; unknown characters render as '?'
pub fn draw_text(img: &mut RgbaImage, x: i32, y: i32, text: &str, scale: i32, color: Rgba<u8>) {
    let scale = scale.max(1);
    let mut cursor_x = x;
    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += 8 * scale;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8 {
                if (row >> col_idx) & 1 == 0 {
                    continue;
                }
                let px = cursor_x + col_idx * scale;
                let py = y + row_idx as i32 * scale;
                for sy in 0..scale {
                    for sx in 0..scale {
                        let (tx, ty) = (px + sx, py + sy);
                        if tx >= 0 && ty >= 0 && (tx as u32) < img.width() && (ty as u32) < img.height() {
                            img.put_pixel(tx as u32, ty as u32, color);
                        }
                    }
                }
            }
        }
        cursor_x += 8 * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::tests::synthetic_hand;
    use crate::reply::Gesture;

    #[test]
    fn test_caption_format() {
        assert_eq!(caption("Hello", &Reply::Known(Gesture::Hello)), "Hello -> Hi");
        assert_eq!(caption("Wave", &Reply::Unknown), "Wave -> ...");
    }

    #[test]
    fn test_render_draws_pixels() {
        let mut frame = Frame::solid(320, 240, [0, 0, 0, 255], 0);
        let text = OverlayRenderer::new().render(
            &mut frame,
            &synthetic_hand(0.3),
            "Yes",
            &Reply::Known(Gesture::Yes),
        );
        assert_eq!(text, "Yes -> Okay");

        let caption_pixels = frame.image.pixels().filter(|p| **p == CAPTION_COLOR).count();
        let joint_pixels = frame.image.pixels().filter(|p| **p == JOINT_COLOR).count();
        assert!(caption_pixels > 0);
        assert!(joint_pixels > 0);
    }

    #[test]
    fn test_draw_text_clips_at_edges() {
        let mut img = RgbaImage::new(16, 16);
        draw_text(&mut img, -4, -4, "HELLO WORLD", 2, CAPTION_COLOR);
        draw_text(&mut img, 12, 12, "\u{2603}", 1, CAPTION_COLOR);
    }
}
