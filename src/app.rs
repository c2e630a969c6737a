//! Launcher window and worker start-up
//!
//! The launcher is a small eframe window with one button per loop. Each button
//! starts a worker thread that builds its own camera / screen / window
//! resources and runs the loop until the user quits it. Exit cancels every
//! worker and waits briefly for them; a worker stuck in a device read is left
//! behind rather than holding the launcher open.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::{self, Color32};

use crate::camera::{CaptureError, FrameSource};
use crate::display::MinifbSurfaces;
use crate::ml::{ExtractError, GestureClassifier, LandmarkExtractor};
use crate::playback::PlaybackController;
use crate::recognition::RecognitionLoop;
use crate::screen::{self, MinifbRegionPicker, ScreenError, ScreenGrabber};
use crate::settings::Settings;
use crate::task::{CancelToken, TaskHandle};
use crate::video::VideoOpener;

/// How long Exit waits for cancelled workers
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Loops the launcher can start
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerKind {
    Recognition,
    ScreenCapture,
}

impl WorkerKind {
    pub fn thread_name(&self) -> &'static str {
        match self {
            WorkerKind::Recognition => "recognition",
            WorkerKind::ScreenCapture => "screen-capture",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WorkerKind::Recognition => "Webcam + Gesture",
            WorkerKind::ScreenCapture => "Screen Capture",
        }
    }
}

/// Started workers, newest last
#[derive(Default)]
pub struct Workers {
    handles: Vec<(WorkerKind, TaskHandle)>,
}

impl Workers {
    /// Start `work` unless a worker of the same kind is still running
    pub fn start<F>(&mut self, kind: WorkerKind, work: F) -> bool
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        if self.is_running(kind) {
            tracing::info!("{} is already running", kind.display_name());
            return false;
        }
        match TaskHandle::spawn(kind.thread_name(), work) {
            Ok(handle) => {
                self.handles.push((kind, handle));
                true
            }
            Err(e) => {
                tracing::error!("Failed to start {} worker: {}", kind.display_name(), e);
                false
            }
        }
    }

    pub fn is_running(&self, kind: WorkerKind) -> bool {
        self.handles
            .iter()
            .any(|(k, handle)| *k == kind && !handle.is_finished())
    }

    pub fn iter(&self) -> impl Iterator<Item = (WorkerKind, &TaskHandle)> + '_ {
        self.handles.iter().map(|(kind, handle)| (*kind, handle))
    }

    /// Cancel every worker and wait up to [`SHUTDOWN_GRACE`] for them
    pub fn shutdown(&mut self) {
        self.shutdown_within(SHUTDOWN_GRACE);
    }

    /// Cancel every worker and wait up to `grace` for them to stop. Workers
    /// still running after that are detached.
    pub fn shutdown_within(&mut self, grace: Duration) {
        for (_, handle) in &self.handles {
            handle.cancel();
        }

        let deadline = Instant::now() + grace;
        while self.handles.iter().any(|(_, handle)| !handle.is_finished()) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        for (kind, handle) in &mut self.handles {
            if handle.is_finished() {
                handle.join();
            } else {
                tracing::warn!(
                    "{} worker did not stop within {:?}; leaving it behind",
                    kind.display_name(),
                    grace
                );
                handle.detach();
            }
        }
    }
}

/// Launcher application state
pub struct LauncherApp {
    settings: Settings,
    classifier: Arc<dyn GestureClassifier>,
    workers: Workers,
    exiting: bool,
}

impl LauncherApp {
    pub fn new(settings: Settings, classifier: Arc<dyn GestureClassifier>) -> Self {
        Self {
            settings,
            classifier,
            workers: Workers::default(),
            exiting: false,
        }
    }

    fn start_recognition(&mut self) {
        let settings = self.settings.clone();
        let classifier = Arc::clone(&self.classifier);
        self.workers.start(WorkerKind::Recognition, move |cancel| {
            run_recognition_worker(&settings, classifier, &cancel);
        });
    }

    fn start_screen_capture(&mut self) {
        let settings = self.settings.clone();
        self.workers.start(WorkerKind::ScreenCapture, move |cancel| {
            run_screen_capture_worker(&settings, &cancel);
        });
    }

    fn exit(&mut self) {
        if !self.exiting {
            self.exiting = true;
            tracing::info!("Exit requested, stopping workers");
            self.workers.shutdown();
        }
    }
}

impl eframe::App for LauncherApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Sign Reply");
            ui.add_space(8.0);

            let recognition_idle = !self.workers.is_running(WorkerKind::Recognition);
            if ui
                .add_enabled(recognition_idle, egui::Button::new("Start Webcam + Gesture"))
                .clicked()
            {
                self.start_recognition();
            }

            let capture_idle = !self.workers.is_running(WorkerKind::ScreenCapture);
            if ui
                .add_enabled(capture_idle, egui::Button::new("Start Screen Capture"))
                .clicked()
            {
                self.start_screen_capture();
            }

            if ui.button("Exit").clicked() {
                self.exit();
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }

            ui.separator();
            ui.label("Press 'q' in a capture window to stop it, 'r' to play the reply.");

            for (kind, handle) in self.workers.iter() {
                ui.horizontal(|ui| {
                    ui.label(kind.display_name());
                    if handle.is_finished() {
                        ui.colored_label(Color32::GRAY, "finished");
                    } else {
                        ui.colored_label(Color32::GREEN, "running");
                    }
                });
            }
        });

        // Worker state changes happen off the UI thread
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

impl Drop for LauncherApp {
    fn drop(&mut self) {
        self.exit();
    }
}

/// Webcam source for the configured camera
#[cfg(feature = "camera")]
pub fn open_camera(settings: &Settings) -> Result<Box<dyn FrameSource>, CaptureError> {
    for camera in crate::camera::list_cameras() {
        tracing::debug!("Camera {}: {}", camera.index, camera.name);
    }
    Ok(Box::new(crate::camera::CameraSource::open(settings.camera_index)?))
}

#[cfg(not(feature = "camera"))]
pub fn open_camera(_settings: &Settings) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::Unavailable("camera"))
}

/// Hand landmark detector from the configured model
#[cfg(feature = "onnx")]
pub fn open_extractor(settings: &Settings) -> Result<Box<dyn LandmarkExtractor>, ExtractError> {
    Ok(Box::new(crate::ml::OnnxHandLandmarker::new(
        &settings.landmark_model_path,
        settings.min_detection_confidence,
    )?))
}

#[cfg(not(feature = "onnx"))]
pub fn open_extractor(_settings: &Settings) -> Result<Box<dyn LandmarkExtractor>, ExtractError> {
    Err(ExtractError::Unavailable("onnx"))
}

/// Reply video decoder
#[cfg(feature = "ffmpeg")]
pub fn video_opener() -> Box<dyn VideoOpener> {
    Box::new(crate::video::FfmpegOpener)
}

#[cfg(not(feature = "ffmpeg"))]
pub fn video_opener() -> Box<dyn VideoOpener> {
    tracing::warn!("Built without the `ffmpeg` feature; reply videos cannot be played");
    Box::new(crate::video::NoVideoBackend)
}

/// Snapshot grabber for the configured monitor
#[cfg(feature = "screen")]
pub fn open_grabber(settings: &Settings) -> Result<Box<dyn ScreenGrabber>, ScreenError> {
    Ok(Box::new(crate::screen::XcapGrabber::new(settings.monitor_index)?))
}

#[cfg(not(feature = "screen"))]
pub fn open_grabber(_settings: &Settings) -> Result<Box<dyn ScreenGrabber>, ScreenError> {
    Err(ScreenError::Unavailable("screen"))
}

/// Build and run the recognition loop on the current thread
pub fn run_recognition_worker(settings: &Settings, classifier: Arc<dyn GestureClassifier>, cancel: &CancelToken) {
    let source = match open_camera(settings) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("Cannot start recognition: {}", e);
            return;
        }
    };
    let extractor = match open_extractor(settings) {
        Ok(extractor) => extractor,
        Err(e) => {
            tracing::error!("Cannot start recognition: {}", e);
            return;
        }
    };

    let playback = PlaybackController::new(
        settings.reply_assets(),
        video_opener(),
        settings.playback_frame_delay(),
    );
    let recognition = RecognitionLoop::new(source, extractor, classifier, playback, settings.key_poll());
    recognition.run(&MinifbSurfaces, cancel);
}

/// Select a region and run the screen capture loop on the current thread
pub fn run_screen_capture_worker(settings: &Settings, cancel: &CancelToken) {
    let grabber = match open_grabber(settings) {
        Ok(grabber) => grabber,
        Err(e) => {
            tracing::error!("Cannot start screen capture: {}", e);
            return;
        }
    };

    let mut picker = MinifbRegionPicker::default();
    match screen::select_and_capture(grabber, &mut picker, &MinifbSurfaces, settings.key_poll(), cancel) {
        Ok(Some(_)) => {}
        Ok(None) => tracing::info!("No region selected, screen capture not started"),
        Err(e) => tracing::error!("Screen capture failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::ml::tests::FixedClassifier;

    fn wait_loop(started: Arc<AtomicUsize>) -> impl FnOnce(CancelToken) + Send + 'static {
        move |cancel| {
            started.fetch_add(1, Ordering::SeqCst);
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }

    #[test]
    fn test_one_worker_per_kind() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut workers = Workers::default();

        assert!(workers.start(WorkerKind::Recognition, wait_loop(Arc::clone(&started))));
        assert!(!workers.start(WorkerKind::Recognition, wait_loop(Arc::clone(&started))));
        assert!(workers.start(WorkerKind::ScreenCapture, wait_loop(Arc::clone(&started))));
        assert!(workers.is_running(WorkerKind::Recognition));
        assert_eq!(workers.iter().count(), 2);

        workers.shutdown();
        assert!(workers.iter().all(|(_, handle)| handle.is_finished()));
        assert!(!workers.is_running(WorkerKind::Recognition));
    }

    #[test]
    fn test_shutdown_does_not_hang_on_stuck_worker() {
        let (release, blocked) = std::sync::mpsc::channel::<()>();
        let mut workers = Workers::default();
        // Never polls its token
        assert!(workers.start(WorkerKind::Recognition, move |_| {
            let _ = blocked.recv();
        }));

        let started = Instant::now();
        workers.shutdown_within(Duration::from_millis(50));

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(workers.is_running(WorkerKind::Recognition));

        release.send(()).unwrap();
        while workers.is_running(WorkerKind::Recognition) {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_finished_worker_can_restart() {
        let mut workers = Workers::default();
        assert!(workers.start(WorkerKind::ScreenCapture, |_| {}));
        workers.shutdown();
        assert!(workers.start(WorkerKind::ScreenCapture, |_| {}));
        workers.shutdown();
        assert_eq!(workers.iter().count(), 2);
    }

    #[test]
    fn test_exit_stops_workers() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut app = LauncherApp::new(Settings::default(), Arc::new(FixedClassifier("Hello")));
        app.workers
            .start(WorkerKind::Recognition, wait_loop(Arc::clone(&started)));

        app.exit();
        assert!(app.workers.iter().all(|(_, handle)| handle.is_finished()));
        // Second exit is a no-op
        app.exit();
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn test_recognition_worker_without_camera_returns() {
        run_recognition_worker(
            &Settings::default(),
            Arc::new(FixedClassifier("Hello")),
            &CancelToken::new(),
        );
    }

    #[cfg(not(feature = "screen"))]
    #[test]
    fn test_grabber_unavailable() {
        assert!(matches!(
            open_grabber(&Settings::default()),
            Err(ScreenError::Unavailable("screen"))
        ));
    }
}
