//! Display surfaces and key input
//!
//! Each loop owns its surfaces exclusively. A surface is a titled window that
//! shows frames and reports key presses; dropping it closes the window.

use std::collections::VecDeque;
use std::time::Duration;

use minifb::{Key, KeyRepeat, ScaleMode, Window, WindowOptions};
use thiserror::Error;

use crate::video::Frame;

pub const RECOGNITION_TITLE: &str = "Hand Sign Recognition";
pub const REPLY_TITLE: &str = "Reply Sign";
pub const SELECT_TITLE: &str = "Select Area";
pub const SCREEN_CAPTURE_TITLE: &str = "Screen Capture";

/// Display errors
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Failed to create window '{title}': {message}")]
    CreateFailed { title: String, message: String },
    #[error("Failed to present frame: {0}")]
    PresentFailed(String),
}

/// Key events understood by the loops
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    /// `q`: stop the current loop or playback
    Quit,
    /// `r`: play the pending reply video
    PlayReply,
    /// Enter / Space
    Confirm,
    /// `c` / Escape
    Cancel,
}

impl KeyEvent {
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::Q => Some(KeyEvent::Quit),
            Key::R => Some(KeyEvent::PlayReply),
            Key::Enter | Key::Space | Key::NumPadEnter => Some(KeyEvent::Confirm),
            Key::C | Key::Escape => Some(KeyEvent::Cancel),
            _ => None,
        }
    }
}

/// A window that shows frames and reports keys
pub trait Surface {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError>;

    /// Wait up to `wait` for input and return the oldest pending key
    fn poll_key(&mut self, wait: Duration) -> Option<KeyEvent>;

    /// False once the user closed the window
    fn is_open(&self) -> bool;
}

/// Opens titled surfaces
pub trait SurfaceFactory: Send {
    fn open(&self, title: &str) -> Result<Box<dyn Surface>, DisplayError>;
}

/// Software framebuffer window (minifb). The window is created on the first
/// frame so it takes the frame's size.
pub struct MinifbSurface {
    title: String,
    window: Option<Window>,
    pending: VecDeque<KeyEvent>,
    closed: bool,
}

impl MinifbSurface {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            pending: VecDeque::new(),
            closed: false,
        }
    }

    fn collect_keys(&mut self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if !window.is_open() {
            self.closed = true;
        }
        for key in window.get_keys_pressed(KeyRepeat::No) {
            if let Some(event) = KeyEvent::from_key(key) {
                self.pending.push_back(event);
            }
        }
    }
}

impl Surface for MinifbSurface {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let (width, height) = (frame.width() as usize, frame.height() as usize);

        if self.window.is_none() {
            let options = WindowOptions {
                resize: true,
                scale_mode: ScaleMode::AspectRatioStretch,
                ..WindowOptions::default()
            };
            let window = Window::new(&self.title, width.max(1), height.max(1), options).map_err(|e| {
                DisplayError::CreateFailed {
                    title: self.title.clone(),
                    message: e.to_string(),
                }
            })?;
            tracing::debug!("Opened window '{}' ({}x{})", self.title, width, height);
            self.window = Some(window);
        }

        if let Some(window) = self.window.as_mut() {
            window
                .update_with_buffer(&frame.to_0rgb(), width, height)
                .map_err(|e| DisplayError::PresentFailed(e.to_string()))?;
        }
        self.collect_keys();
        Ok(())
    }

    fn poll_key(&mut self, wait: Duration) -> Option<KeyEvent> {
        if self.pending.is_empty() {
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
            if let Some(window) = self.window.as_mut() {
                window.update();
            }
            self.collect_keys();
        }
        self.pending.pop_front()
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}

impl Drop for MinifbSurface {
    fn drop(&mut self) {
        if self.window.take().is_some() {
            tracing::debug!("Closed window '{}'", self.title);
        }
    }
}

/// Factory for [`MinifbSurface`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifbSurfaces;

impl SurfaceFactory for MinifbSurfaces {
    fn open(&self, title: &str) -> Result<Box<dyn Surface>, DisplayError> {
        Ok(Box::new(MinifbSurface::new(title)))
    }
}
