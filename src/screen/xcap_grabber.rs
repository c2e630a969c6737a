//! Monitor snapshots via xcap

use xcap::Monitor;

use super::{ScreenError, ScreenGrabber};
use crate::video::Frame;

/// Grabs full snapshots of one monitor
pub struct XcapGrabber {
    monitor: Monitor,
    monitor_index: usize,
    grabs: u64,
}

impl XcapGrabber {
    pub fn new(monitor_index: usize) -> Result<Self, ScreenError> {
        let monitors = Monitor::all().map_err(|e| ScreenError::CaptureFailed(e.to_string()))?;
        tracing::debug!("Found {} monitors", monitors.len());

        let monitor = monitors
            .into_iter()
            .nth(monitor_index)
            .ok_or(ScreenError::NoMonitor(monitor_index))?;

        Ok(Self {
            monitor,
            monitor_index,
            grabs: 0,
        })
    }
}

impl ScreenGrabber for XcapGrabber {
    fn grab(&mut self) -> Result<Frame, ScreenError> {
        let image = self
            .monitor
            .capture_image()
            .map_err(|e| ScreenError::CaptureFailed(format!("monitor {}: {}", self.monitor_index, e)))?;

        let (width, height) = (image.width(), image.height());
        let frame = Frame::from_rgba(image.into_raw(), width, height, self.grabs)
            .ok_or_else(|| ScreenError::CaptureFailed("snapshot size mismatch".to_string()))?;
        self.grabs += 1;
        Ok(frame)
    }
}
