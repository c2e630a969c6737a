//! Live recognition loop
//!
//! Each cycle pulls a frame, detects hands, classifies every valid hand,
//! resolves its reply and draws the overlay, then shows the frame and polls
//! one key. The reply of the last classified hand is kept in a [`ReplySlot`]
//! so `r` can play it back; playback blocks the loop until it returns.

use std::sync::Arc;
use std::time::Duration;

use crate::camera::FrameSource;
use crate::display::{KeyEvent, Surface, SurfaceFactory, RECOGNITION_TITLE};
use crate::ml::{FeatureVector, GestureClassifier, Label, LandmarkExtractor};
use crate::overlay::OverlayRenderer;
use crate::playback::{PlaybackController, PlaybackOutcome};
use crate::reply::{self, Reply};
use crate::task::CancelToken;
use crate::video::Frame;

/// Why a loop stopped
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Quit key
    UserQuit,
    /// The window was closed
    WindowClosed,
    /// The source ran out of frames
    EndOfStream,
    /// The source failed and cannot continue
    DeviceFailure(String),
    /// The display could not be opened or updated
    DisplayFailure(String),
    /// The owning task was cancelled
    Cancelled,
}

/// Counters reported when a loop ends
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames_shown: u64,
    pub skipped_cycles: u64,
    pub predictions: u64,
    pub playbacks: u64,
    pub missing_assets: u64,
    pub stop_reason: StopReason,
}

impl LoopSummary {
    pub(crate) fn new(stop_reason: StopReason) -> Self {
        Self {
            frames_shown: 0,
            skipped_cycles: 0,
            predictions: 0,
            playbacks: 0,
            missing_assets: 0,
            stop_reason,
        }
    }
}

/// Most recent reply, overwritten by every prediction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplySlot(Option<Reply>);

impl ReplySlot {
    pub fn set(&mut self, reply: Reply) {
        self.0 = Some(reply);
    }

    pub fn get(&self) -> Option<Reply> {
        self.0
    }
}

/// Label and reply produced for one hand
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prediction {
    pub label: Label,
    pub reply: Reply,
    pub caption: String,
}

/// Recognition loop over a frame source
pub struct RecognitionLoop {
    source: Box<dyn FrameSource>,
    extractor: Box<dyn LandmarkExtractor>,
    classifier: Arc<dyn GestureClassifier>,
    overlay: OverlayRenderer,
    playback: PlaybackController,
    key_poll: Duration,
    slot: ReplySlot,
    predictions: u64,
    playbacks: u64,
    missing_assets: u64,
}

impl RecognitionLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        extractor: Box<dyn LandmarkExtractor>,
        classifier: Arc<dyn GestureClassifier>,
        playback: PlaybackController,
        key_poll: Duration,
    ) -> Self {
        Self {
            source,
            extractor,
            classifier,
            overlay: OverlayRenderer::new(),
            playback,
            key_poll,
            slot: ReplySlot::default(),
            predictions: 0,
            playbacks: 0,
            missing_assets: 0,
        }
    }

    /// Reply that `r` would currently play
    pub fn current_reply(&self) -> Option<Reply> {
        self.slot.get()
    }

    /// Detect, classify and annotate one frame in place
    pub fn process_frame(&mut self, frame: &mut Frame) -> Vec<Prediction> {
        let hands = match self.extractor.detect_hands(frame) {
            Ok(hands) => hands,
            Err(e) => {
                tracing::warn!("Hand detection failed on frame {}: {}", frame.frame_number, e);
                return Vec::new();
            }
        };

        let mut predictions = Vec::with_capacity(hands.len());
        for hand in &hands {
            let Some(features) = FeatureVector::from_landmarks(hand) else {
                tracing::debug!(
                    "Skipping hand with {} landmarks on frame {}",
                    hand.len(),
                    frame.frame_number
                );
                continue;
            };

            let label = self.classifier.predict(&features);
            let reply = reply::resolve(&label);
            self.slot.set(reply);
            self.predictions += 1;

            let caption = self.overlay.render(frame, hand, &label, &reply);
            tracing::trace!("Frame {}: {}", frame.frame_number, caption);
            predictions.push(Prediction {
                label,
                reply,
                caption,
            });
        }
        predictions
    }

    /// Play the pending reply. Returns None when no reply is pending.
    pub fn request_playback(
        &mut self,
        surfaces: &dyn SurfaceFactory,
        cancel: &CancelToken,
    ) -> Option<PlaybackOutcome> {
        let Some(reply) = self.slot.get() else {
            tracing::debug!("Playback requested with no pending reply");
            return None;
        };

        let outcome = self.playback.play(&reply, surfaces, cancel);
        match &outcome {
            PlaybackOutcome::MissingAsset(_) | PlaybackOutcome::NoAsset => self.missing_assets += 1,
            o if o.started() => self.playbacks += 1,
            _ => {}
        }
        Some(outcome)
    }

    /// One acquire / recognize / show / poll cycle. Returns a reason when the
    /// loop should stop.
    pub fn step(
        &mut self,
        surface: &mut dyn Surface,
        surfaces: &dyn SurfaceFactory,
        cancel: &CancelToken,
        summary: &mut LoopSummary,
    ) -> Option<StopReason> {
        if cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }

        match self.source.next_frame() {
            Ok(Some(mut frame)) => {
                self.process_frame(&mut frame);
                if let Err(e) = surface.show(&frame) {
                    return Some(StopReason::DisplayFailure(e.to_string()));
                }
                summary.frames_shown += 1;
            }
            Ok(None) => return Some(StopReason::EndOfStream),
            Err(e) if e.is_transient() => {
                tracing::warn!("Skipping frame: {}", e);
                summary.skipped_cycles += 1;
            }
            Err(e) => return Some(StopReason::DeviceFailure(e.to_string())),
        }

        match surface.poll_key(self.key_poll) {
            Some(KeyEvent::Quit) => return Some(StopReason::UserQuit),
            Some(KeyEvent::PlayReply) => {
                self.request_playback(surfaces, cancel);
            }
            _ => {}
        }

        if !surface.is_open() {
            return Some(StopReason::WindowClosed);
        }
        None
    }

    /// Run until quit, end of stream, device failure or cancellation
    pub fn run(mut self, surfaces: &dyn SurfaceFactory, cancel: &CancelToken) -> LoopSummary {
        let mut summary = LoopSummary::new(StopReason::Cancelled);

        let mut surface = match surfaces.open(RECOGNITION_TITLE) {
            Ok(surface) => surface,
            Err(e) => {
                tracing::error!("Failed to open recognition window: {}", e);
                summary.stop_reason = StopReason::DisplayFailure(e.to_string());
                return summary;
            }
        };

        tracing::info!("Recognition loop started");
        let stop_reason = loop {
            if let Some(reason) = self.step(surface.as_mut(), surfaces, cancel, &mut summary) {
                break reason;
            }
        };
        drop(surface);

        summary.stop_reason = stop_reason;
        summary.predictions = self.predictions;
        summary.playbacks = self.playbacks;
        summary.missing_assets = self.missing_assets;
        tracing::info!("Recognition loop stopped: {:?}", summary);
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::camera::tests::ScriptedSource;
    use crate::camera::CaptureError;
    use crate::display::tests::FakeSurfaces;
    use crate::display::REPLY_TITLE;
    use crate::ml::tests::{synthetic_hand, FixedClassifier, ScriptedExtractor};
    use crate::ml::{ExtractError, HandLandmark, LandmarkSet};
    use crate::playback::tests::{asset_dir_with, FakeOpener};
    use crate::reply::{Gesture, ReplyAssets};
    use crate::telemetry::tests::with_captured_logs;

    /// Labels hands left of centre "Hello" and the rest "Yes"
    struct SideClassifier;

    impl GestureClassifier for SideClassifier {
        fn predict(&self, features: &FeatureVector) -> Label {
            if features.values()[0] < 0.5 {
                "Hello".to_string()
            } else {
                "Yes".to_string()
            }
        }
    }

    fn playback_in(dir: &std::path::Path, opener: FakeOpener) -> PlaybackController {
        PlaybackController::new(ReplyAssets::new(dir, "mp4"), Box::new(opener), Duration::ZERO)
    }

    fn build_loop(
        source: ScriptedSource,
        extractor: ScriptedExtractor,
        classifier: Arc<dyn GestureClassifier>,
        playback: PlaybackController,
    ) -> RecognitionLoop {
        RecognitionLoop::new(
            Box::new(source),
            Box::new(extractor),
            classifier,
            playback,
            Duration::ZERO,
        )
    }

    #[test]
    fn test_single_hello_hand_sets_reply() {
        let dir = tempfile::tempdir().unwrap();
        let mut recognition = build_loop(
            ScriptedSource::frames(0),
            ScriptedExtractor::new(vec![Ok(vec![synthetic_hand(0.2)])]),
            Arc::new(FixedClassifier("Hello")),
            playback_in(dir.path(), FakeOpener::with_frames(1)),
        );

        let mut frame = Frame::solid(160, 120, [0, 0, 0, 255], 0);
        let predictions = recognition.process_frame(&mut frame);

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, "Hello");
        assert!(predictions[0].caption.contains("Hello -> Hi"));
        assert_eq!(recognition.current_reply().map(|r| r.text()), Some("Hi"));
        assert!(frame.image.pixels().any(|p| p.0 != [0, 0, 0, 255]));
    }

    #[test]
    fn test_playback_without_reply_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let opener = FakeOpener::with_frames(3);
        let surfaces = FakeSurfaces::default();
        let mut recognition = build_loop(
            ScriptedSource::frames(0),
            ScriptedExtractor::new(vec![]),
            Arc::new(FixedClassifier("Hello")),
            playback_in(dir.path(), opener.clone()),
        );

        assert_eq!(recognition.current_reply(), None);
        assert_eq!(recognition.request_playback(&surfaces, &CancelToken::new()), None);
        assert_eq!(surfaces.log.opened.load(Ordering::SeqCst), 0);
        assert_eq!(opener.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_asset_keeps_loop_running() {
        let dir = tempfile::tempdir().unwrap();
        let surfaces = FakeSurfaces::default();
        surfaces.script(RECOGNITION_TITLE, vec![Some(KeyEvent::PlayReply)]);
        let recognition = build_loop(
            ScriptedSource::frames(4),
            ScriptedExtractor::new(vec![Ok(vec![synthetic_hand(0.2)])]),
            Arc::new(FixedClassifier("Hello")),
            playback_in(dir.path(), FakeOpener::with_frames(3)),
        );

        let (summary, logs) = with_captured_logs(|| recognition.run(&surfaces, &CancelToken::new()));

        let missing = dir.path().join("Hi.mp4").display().to_string();
        assert!(logs
            .warnings()
            .iter()
            .any(|line| line.contains("Reply video not found") && line.contains(&missing)));
        assert_eq!(summary.missing_assets, 1);
        assert_eq!(summary.playbacks, 0);
        assert_eq!(summary.frames_shown, 4);
        assert_eq!(summary.stop_reason, StopReason::EndOfStream);
        assert_eq!(surfaces.log.frames_on(REPLY_TITLE), 0);
        assert_eq!(surfaces.log.open_count(), 0);
    }

    #[test]
    fn test_play_key_plays_pending_reply() {
        let reply = Reply::Known(Gesture::Hello);
        let dir = asset_dir_with(&reply);
        let opener = FakeOpener::with_frames(6);
        let surfaces = FakeSurfaces::default();
        surfaces.script(RECOGNITION_TITLE, vec![Some(KeyEvent::PlayReply), None, Some(KeyEvent::Quit)]);
        let recognition = build_loop(
            ScriptedSource::frames(10),
            ScriptedExtractor::new(vec![Ok(vec![synthetic_hand(0.2)])]),
            Arc::new(FixedClassifier("Hello")),
            playback_in(dir.path(), opener.clone()),
        );

        let summary = recognition.run(&surfaces, &CancelToken::new());

        assert_eq!(summary.playbacks, 1);
        assert_eq!(summary.frames_shown, 3);
        assert_eq!(summary.stop_reason, StopReason::UserQuit);
        assert_eq!(surfaces.log.frames_on(REPLY_TITLE), 6);
        assert_eq!(surfaces.log.frames_on(RECOGNITION_TITLE), 3);
        assert_eq!(surfaces.log.open_count(), 0);
        assert_eq!(opener.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_hands_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let short_hand = LandmarkSet::new(vec![HandLandmark::new(0.5, 0.5); 20]);
        let mut recognition = build_loop(
            ScriptedSource::frames(0),
            ScriptedExtractor::new(vec![Ok(vec![short_hand])]),
            Arc::new(FixedClassifier("Hello")),
            playback_in(dir.path(), FakeOpener::with_frames(1)),
        );

        let mut frame = Frame::solid(64, 48, [0, 0, 0, 255], 0);
        let before = frame.clone();
        assert!(recognition.process_frame(&mut frame).is_empty());
        assert_eq!(recognition.current_reply(), None);
        assert!(frame.image == before.image);
    }

    #[test]
    fn test_last_hand_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut recognition = build_loop(
            ScriptedSource::frames(0),
            ScriptedExtractor::new(vec![Ok(vec![synthetic_hand(0.1), synthetic_hand(0.6)])]),
            Arc::new(SideClassifier),
            playback_in(dir.path(), FakeOpener::with_frames(1)),
        );

        let mut frame = Frame::solid(64, 48, [0, 0, 0, 255], 0);
        let predictions = recognition.process_frame(&mut frame);

        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].label, "Hello");
        assert_eq!(predictions[1].label, "Yes");
        assert_eq!(recognition.current_reply(), Some(Reply::Known(Gesture::Yes)));
    }

    #[test]
    fn test_unknown_label_gets_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let mut recognition = build_loop(
            ScriptedSource::frames(0),
            ScriptedExtractor::new(vec![Ok(vec![synthetic_hand(0.3)])]),
            Arc::new(FixedClassifier("Wave")),
            playback_in(dir.path(), FakeOpener::with_frames(1)),
        );

        let mut frame = Frame::solid(64, 48, [0, 0, 0, 255], 0);
        let predictions = recognition.process_frame(&mut frame);
        assert_eq!(predictions[0].caption, "Wave -> ...");
        assert_eq!(recognition.current_reply(), Some(Reply::Unknown));
    }

    #[test]
    fn test_reply_persists_across_empty_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut recognition = build_loop(
            ScriptedSource::frames(0),
            ScriptedExtractor::new(vec![
                Ok(vec![synthetic_hand(0.2)]),
                Ok(vec![]),
                Err(ExtractError::InferenceFailed("bad tensor".into())),
            ]),
            Arc::new(FixedClassifier("Help")),
            playback_in(dir.path(), FakeOpener::with_frames(1)),
        );

        for n in 0..3 {
            let mut frame = Frame::solid(64, 48, [0, 0, 0, 255], n);
            recognition.process_frame(&mut frame);
        }
        assert_eq!(recognition.current_reply(), Some(Reply::Known(Gesture::Help)));
    }

    #[test]
    fn test_transient_errors_skip_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let surfaces = FakeSurfaces::default();
        let mut source = ScriptedSource::frames(0);
        source.script.push_back(Ok(Some(Frame::solid(8, 8, [0, 0, 0, 255], 0))));
        source.script.push_back(Err(CaptureError::DecodeFailed("corrupt".into())));
        source.script.push_back(Ok(Some(Frame::solid(8, 8, [0, 0, 0, 255], 1))));
        source.script.push_back(Err(CaptureError::DeviceFailed("unplugged".into())));
        source.script.push_back(Ok(Some(Frame::solid(8, 8, [0, 0, 0, 255], 2))));

        let recognition = build_loop(
            source,
            ScriptedExtractor::new(vec![]),
            Arc::new(FixedClassifier("Hello")),
            playback_in(dir.path(), FakeOpener::with_frames(1)),
        );
        let summary = recognition.run(&surfaces, &CancelToken::new());

        assert_eq!(summary.frames_shown, 2);
        assert_eq!(summary.skipped_cycles, 1);
        assert_eq!(
            summary.stop_reason,
            StopReason::DeviceFailure(CaptureError::DeviceFailed("unplugged".into()).to_string())
        );
        assert_eq!(surfaces.log.open_count(), 0);
    }

    #[test]
    fn test_cancelled_before_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let surfaces = FakeSurfaces::default();
        let recognition = build_loop(
            ScriptedSource::frames(100),
            ScriptedExtractor::new(vec![]),
            Arc::new(FixedClassifier("Hello")),
            playback_in(dir.path(), FakeOpener::with_frames(1)),
        );

        let cancel = CancelToken::new();
        cancel.cancel();
        let summary = recognition.run(&surfaces, &cancel);

        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.frames_shown, 0);
        assert_eq!(surfaces.log.open_count(), 0);
    }

    #[test]
    fn test_same_vector_same_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let mut recognition = build_loop(
            ScriptedSource::frames(0),
            ScriptedExtractor::new(vec![
                Ok(vec![synthetic_hand(0.4)]),
                Ok(vec![synthetic_hand(0.4)]),
            ]),
            Arc::new(SideClassifier),
            playback_in(dir.path(), FakeOpener::with_frames(1)),
        );

        let mut first = Frame::solid(64, 48, [0, 0, 0, 255], 0);
        let mut second = Frame::solid(64, 48, [0, 0, 0, 255], 1);
        assert_eq!(
            recognition.process_frame(&mut first),
            recognition.process_frame(&mut second)
        );
    }

    #[test]
    fn test_closing_window_stops_loop() {
        let dir = tempfile::tempdir().unwrap();
        let surfaces = FakeSurfaces::default();
        surfaces.close_after(RECOGNITION_TITLE, 3);
        let recognition = build_loop(
            ScriptedSource::frames(50),
            ScriptedExtractor::new(vec![]),
            Arc::new(FixedClassifier("Hello")),
            playback_in(dir.path(), FakeOpener::with_frames(1)),
        );

        let summary = recognition.run(&surfaces, &CancelToken::new());

        assert_eq!(summary.stop_reason, StopReason::WindowClosed);
        assert_eq!(summary.frames_shown, 3);
        assert_eq!(surfaces.log.open_count(), 0);
    }
}
