//! Reply video playback
//!
//! [`PlaybackController`] is idle until asked to play a reply. Playing opens
//! the reply's video, shows it frame by frame in its own window and returns to
//! idle when the clip ends or the user cancels. The caller is blocked for the
//! whole session; other threads can watch it through [`PlaybackStatus`].
//! Frames are paced at the clip's own rate when the decoder knows it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::camera::FrameSource;
use crate::display::{KeyEvent, Surface, SurfaceFactory, REPLY_TITLE};
use crate::reply::{Reply, ReplyAssets};
use crate::task::CancelToken;
use crate::video::VideoOpener;

/// Controller state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Shared view of a controller's state, readable while a clip plays
#[derive(Clone, Debug, Default)]
pub struct PlaybackStatus(Arc<AtomicBool>);

impl PlaybackStatus {
    pub fn state(&self) -> PlaybackState {
        if self.0.load(Ordering::Acquire) {
            PlaybackState::Playing
        } else {
            PlaybackState::Idle
        }
    }

    fn set(&self, state: PlaybackState) {
        self.0.store(state == PlaybackState::Playing, Ordering::Release);
    }
}

/// How a playback request ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The reply has no video (placeholder reply)
    NoAsset,
    /// The reply's video file does not exist
    MissingAsset(PathBuf),
    /// The clip played to its end
    Finished { frames: u64 },
    /// The user or the owning task stopped the clip
    Cancelled { frames: u64 },
    /// The clip or its window could not be opened, or the decoder failed
    Failed(String),
}

impl PlaybackOutcome {
    /// True if a playback session was actually created
    pub fn started(&self) -> bool {
        matches!(
            self,
            PlaybackOutcome::Finished { .. } | PlaybackOutcome::Cancelled { .. }
        )
    }
}

/// Plays reply videos on demand
pub struct PlaybackController {
    assets: ReplyAssets,
    opener: Box<dyn VideoOpener>,
    frame_delay: Duration,
    status: PlaybackStatus,
}

impl PlaybackController {
    /// `frame_delay` paces clips whose frame rate is unknown
    pub fn new(assets: ReplyAssets, opener: Box<dyn VideoOpener>, frame_delay: Duration) -> Self {
        Self {
            assets,
            opener,
            frame_delay,
            status: PlaybackStatus::default(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.status.state()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.clone()
    }

    /// Play the video for `reply`, blocking until it ends or is cancelled.
    /// The controller is idle again when this returns.
    pub fn play(
        &mut self,
        reply: &Reply,
        surfaces: &dyn SurfaceFactory,
        cancel: &CancelToken,
    ) -> PlaybackOutcome {
        let Some(path) = self.assets.path_for(reply) else {
            tracing::warn!("No reply video for placeholder reply '{}'", reply);
            return PlaybackOutcome::NoAsset;
        };

        if !path.is_file() {
            tracing::warn!("Reply video not found: {}", path.display());
            return PlaybackOutcome::MissingAsset(path);
        }

        let mut source = match self.opener.open(&path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Failed to open reply video {}: {}", path.display(), e);
                return PlaybackOutcome::Failed(e.to_string());
            }
        };

        let mut surface = match surfaces.open(REPLY_TITLE) {
            Ok(surface) => surface,
            Err(e) => {
                tracing::warn!("Failed to open reply window: {}", e);
                return PlaybackOutcome::Failed(e.to_string());
            }
        };

        tracing::info!("Playing reply '{}' from {}", reply, path.display());
        self.status.set(PlaybackState::Playing);
        let outcome = self.run_session(source.as_mut(), surface.as_mut(), cancel);
        self.status.set(PlaybackState::Idle);

        // Window and decoder are released before returning to the caller
        drop(surface);
        drop(source);

        tracing::info!("Reply playback ended: {:?}", outcome);
        outcome
    }

    fn run_session(
        &self,
        source: &mut dyn FrameSource,
        surface: &mut dyn Surface,
        cancel: &CancelToken,
    ) -> PlaybackOutcome {
        let delay = source.frame_interval().unwrap_or(self.frame_delay);
        tracing::debug!("Reply frame interval {:?}", delay);

        let mut frames = 0u64;
        loop {
            if cancel.is_cancelled() {
                return PlaybackOutcome::Cancelled { frames };
            }

            match source.next_frame() {
                Ok(Some(frame)) => {
                    if let Err(e) = surface.show(&frame) {
                        return PlaybackOutcome::Failed(e.to_string());
                    }
                    frames += 1;
                }
                Ok(None) => return PlaybackOutcome::Finished { frames },
                Err(e) if e.is_transient() => {
                    tracing::debug!("Skipping undecodable reply frame: {}", e);
                }
                Err(e) => {
                    tracing::warn!("Reply video failed after {} frames: {}", frames, e);
                    return PlaybackOutcome::Failed(e.to_string());
                }
            }

            match surface.poll_key(delay) {
                Some(KeyEvent::Quit) | Some(KeyEvent::Cancel) => {
                    return PlaybackOutcome::Cancelled { frames };
                }
                _ => {}
            }
            if !surface.is_open() {
                return PlaybackOutcome::Cancelled { frames };
            }
        }
    }
}
