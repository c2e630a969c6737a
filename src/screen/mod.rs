//! Screen region capture
//!
//! A region is picked once over a full-monitor snapshot
//! ([`ScreenRegionSelector`]), then [`ScreenCaptureLoop`] keeps grabbing the
//! monitor, cropping that region and showing it until the user quits.

mod selector;
#[cfg(feature = "screen")]
mod xcap_grabber;

pub use selector::{DragSelection, MinifbRegionPicker, PickOutcome, PickedRect, RegionPicker, ScreenRegionSelector};
#[cfg(feature = "screen")]
pub use xcap_grabber::XcapGrabber;

use std::time::Duration;

use image::imageops;
use thiserror::Error;

use crate::camera::{CaptureError, FrameSource};
use crate::display::{DisplayError, KeyEvent, SurfaceFactory, SCREEN_CAPTURE_TITLE};
use crate::recognition::{LoopSummary, StopReason};
use crate::task::CancelToken;
use crate::video::Frame;

/// Screen capture errors
#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("Monitor {0} not found")]
    NoMonitor(usize),
    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),
    #[error("Screen capture unavailable: built without the `{0}` feature")]
    Unavailable(&'static str),
    #[error(transparent)]
    Display(#[from] DisplayError),
}

/// Rectangle of the screen in monitor pixels. Width and height are never 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenRegion {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRegion {
    /// Returns None for an empty rectangle
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self {
            left,
            top,
            width,
            height,
        })
    }

    /// Clamp a picked rectangle to a `bounds` sized screen. None if nothing
    /// of it remains.
    pub fn clamped(rect: PickedRect, bounds: (u32, u32)) -> Option<Self> {
        let (max_x, max_y) = (i64::from(bounds.0), i64::from(bounds.1));
        let left = rect.x.clamp(0, max_x);
        let top = rect.y.clamp(0, max_y);
        let right = (rect.x + i64::from(rect.width)).clamp(0, max_x);
        let bottom = (rect.y + i64::from(rect.height)).clamp(0, max_y);
        Self::new(
            left as u32,
            top as u32,
            (right - left).max(0) as u32,
            (bottom - top).max(0) as u32,
        )
    }

    /// Crop this region out of a full-screen frame. None if the region no
    /// longer fits (monitor resolution changed).
    pub fn crop(&self, frame: &Frame) -> Option<Frame> {
        let right = u64::from(self.left) + u64::from(self.width);
        let bottom = u64::from(self.top) + u64::from(self.height);
        if right > u64::from(frame.width()) || bottom > u64::from(frame.height()) {
            return None;
        }
        let view = imageops::crop_imm(&frame.image, self.left, self.top, self.width, self.height);
        Some(Frame::new(view.to_image(), frame.frame_number))
    }
}

/// Full-monitor snapshots
pub trait ScreenGrabber {
    fn grab(&mut self) -> Result<Frame, ScreenError>;
}

impl<G: ScreenGrabber + ?Sized> ScreenGrabber for Box<G> {
    fn grab(&mut self) -> Result<Frame, ScreenError> {
        (**self).grab()
    }
}

/// Frame source streaming one region of the screen
pub struct RegionSource<G: ScreenGrabber> {
    grabber: G,
    region: ScreenRegion,
}

impl<G: ScreenGrabber> RegionSource<G> {
    pub fn new(grabber: G, region: ScreenRegion) -> Self {
        Self { grabber, region }
    }
}

impl<G: ScreenGrabber> FrameSource for RegionSource<G> {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let screen = self
            .grabber
            .grab()
            .map_err(|e| CaptureError::DeviceFailed(e.to_string()))?;
        self.region.crop(&screen).map(Some).ok_or_else(|| {
            CaptureError::DeviceFailed(format!(
                "region {:?} outside {}x{} screen",
                self.region,
                screen.width(),
                screen.height()
            ))
        })
    }
}

/// Shows a frame source until quit
pub struct ScreenCaptureLoop {
    source: Box<dyn FrameSource>,
    key_poll: Duration,
}

impl ScreenCaptureLoop {
    pub fn new(source: Box<dyn FrameSource>, key_poll: Duration) -> Self {
        Self { source, key_poll }
    }

    pub fn run(mut self, surfaces: &dyn SurfaceFactory, cancel: &CancelToken) -> LoopSummary {
        let mut summary = LoopSummary::new(StopReason::Cancelled);

        let mut surface = match surfaces.open(SCREEN_CAPTURE_TITLE) {
            Ok(surface) => surface,
            Err(e) => {
                tracing::error!("Failed to open screen capture window: {}", e);
                summary.stop_reason = StopReason::DisplayFailure(e.to_string());
                return summary;
            }
        };

        tracing::info!("Screen capture loop started");
        summary.stop_reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            match self.source.next_frame() {
                Ok(Some(frame)) => {
                    if let Err(e) = surface.show(&frame) {
                        break StopReason::DisplayFailure(e.to_string());
                    }
                    summary.frames_shown += 1;
                }
                Ok(None) => break StopReason::EndOfStream,
                Err(e) if e.is_transient() => {
                    tracing::warn!("Skipping screen frame: {}", e);
                    summary.skipped_cycles += 1;
                }
                Err(e) => break StopReason::DeviceFailure(e.to_string()),
            }

            if surface.poll_key(self.key_poll) == Some(KeyEvent::Quit) {
                break StopReason::UserQuit;
            }
            if !surface.is_open() {
                break StopReason::WindowClosed;
            }
        };
        drop(surface);

        tracing::info!("Screen capture loop stopped: {:?}", summary);
        summary
    }
}

/// Pick a region, then stream it until the user quits. Returns None when no
/// region was selected.
pub fn select_and_capture<G: ScreenGrabber + 'static>(
    mut grabber: G,
    picker: &mut dyn RegionPicker,
    surfaces: &dyn SurfaceFactory,
    key_poll: Duration,
    cancel: &CancelToken,
) -> Result<Option<LoopSummary>, ScreenError> {
    let Some(region) = ScreenRegionSelector::select(&mut grabber, picker, cancel)? else {
        return Ok(None);
    };

    tracing::info!(
        "Capturing region {}x{} at ({}, {})",
        region.width,
        region.height,
        region.left,
        region.top
    );
    let source = RegionSource::new(grabber, region);
    Ok(Some(ScreenCaptureLoop::new(Box::new(source), key_poll).run(surfaces, cancel)))
}
