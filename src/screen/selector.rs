//! One-shot region selection over a screen snapshot

use std::time::Duration;

use image::Rgba;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use minifb::{KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use super::{ScreenError, ScreenGrabber, ScreenRegion};
use crate::display::{DisplayError, KeyEvent, SELECT_TITLE};
use crate::overlay::draw_text;
use crate::task::CancelToken;
use crate::video::Frame;

const SELECTION_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const HINT_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);
const HINT: &str = "Drag to select, Enter to confirm, C to cancel";

/// Rectangle in snapshot pixels, before clamping
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PickedRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Result of an interactive pick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickOutcome {
    Confirmed(PickedRect),
    Cancelled,
}

/// Interactive rectangle picker
pub trait RegionPicker {
    /// Block until the user confirms or cancels a rectangle over `snapshot`
    fn pick(&mut self, snapshot: &Frame, cancel: &CancelToken) -> Result<PickOutcome, ScreenError>;
}

/// Takes one snapshot and asks the user for a region of it
pub struct ScreenRegionSelector;

impl ScreenRegionSelector {
    /// Returns None when the user cancelled or confirmed an empty rectangle
    pub fn select(
        grabber: &mut dyn ScreenGrabber,
        picker: &mut dyn RegionPicker,
        cancel: &CancelToken,
    ) -> Result<Option<ScreenRegion>, ScreenError> {
        let snapshot = grabber.grab()?;
        let bounds = (snapshot.width(), snapshot.height());

        match picker.pick(&snapshot, cancel)? {
            PickOutcome::Cancelled => {
                tracing::info!("Region selection cancelled");
                Ok(None)
            }
            PickOutcome::Confirmed(rect) => {
                let region = ScreenRegion::clamped(rect, bounds);
                if region.is_none() {
                    tracing::warn!("Empty region selected ({:?}); screen capture not started", rect);
                }
                Ok(region)
            }
        }
    }
}

/// Mouse drag state in view coordinates
#[derive(Clone, Copy, Debug, Default)]
pub struct DragSelection {
    anchor: Option<(f32, f32)>,
    current: Option<(f32, f32)>,
    dragging: bool,
}

impl DragSelection {
    /// Feed one mouse sample. A new press starts a new rectangle.
    pub fn update(&mut self, pos: Option<(f32, f32)>, button_down: bool) {
        let Some(pos) = pos else {
            return;
        };
        if button_down {
            if !self.dragging {
                self.anchor = Some(pos);
                self.dragging = true;
            }
            self.current = Some(pos);
        } else {
            self.dragging = false;
        }
    }

    /// Normalized (x, y, width, height) in view coordinates
    pub fn view_rect(&self) -> Option<(f32, f32, f32, f32)> {
        let ((ax, ay), (cx, cy)) = (self.anchor?, self.current?);
        Some((ax.min(cx), ay.min(cy), (ax - cx).abs(), (ay - cy).abs()))
    }

    /// Rectangle scaled back to snapshot pixels; empty without a drag
    pub fn to_snapshot(&self, scale: f32) -> PickedRect {
        let Some((x, y, w, h)) = self.view_rect() else {
            return PickedRect::default();
        };
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let left = (x / scale).round() as i64;
        let top = (y / scale).round() as i64;
        let right = ((x + w) / scale).round() as i64;
        let bottom = ((y + h) / scale).round() as i64;
        PickedRect {
            x: left,
            y: top,
            width: (right - left).max(0) as u32,
            height: (bottom - top).max(0) as u32,
        }
    }
}

/// Picker drawing the drag rectangle over a downscaled snapshot (minifb)
pub struct MinifbRegionPicker {
    max_width: u32,
    max_height: u32,
    frame_interval: Duration,
}

impl MinifbRegionPicker {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl Default for MinifbRegionPicker {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl RegionPicker for MinifbRegionPicker {
    fn pick(&mut self, snapshot: &Frame, cancel: &CancelToken) -> Result<PickOutcome, ScreenError> {
        let (view, scale) = snapshot.fit_within(self.max_width, self.max_height);
        let (width, height) = (view.width() as usize, view.height() as usize);

        let mut window = Window::new(SELECT_TITLE, width, height, WindowOptions::default()).map_err(|e| {
            DisplayError::CreateFailed {
                title: SELECT_TITLE.to_string(),
                message: e.to_string(),
            }
        })?;

        let mut selection = DragSelection::default();
        loop {
            if cancel.is_cancelled() || !window.is_open() {
                return Ok(PickOutcome::Cancelled);
            }

            selection.update(
                window.get_mouse_pos(MouseMode::Clamp),
                window.get_mouse_down(MouseButton::Left),
            );

            for key in window.get_keys_pressed(KeyRepeat::No) {
                match KeyEvent::from_key(key) {
                    Some(KeyEvent::Confirm) => {
                        return Ok(PickOutcome::Confirmed(selection.to_snapshot(scale)));
                    }
                    Some(KeyEvent::Cancel) | Some(KeyEvent::Quit) => return Ok(PickOutcome::Cancelled),
                    _ => {}
                }
            }

            let mut canvas = view.clone();
            draw_text(&mut canvas.image, 10, 10, HINT, 2, HINT_COLOR);
            if let Some((x, y, w, h)) = selection.view_rect() {
                let rect = Rect::at(x as i32, y as i32).of_size((w as u32).max(1), (h as u32).max(1));
                draw_hollow_rect_mut(&mut canvas.image, rect, SELECTION_COLOR);
            }

            window
                .update_with_buffer(&canvas.to_0rgb(), width, height)
                .map_err(|e| DisplayError::PresentFailed(e.to_string()))?;
            std::thread::sleep(self.frame_interval);
        }
    }
}
