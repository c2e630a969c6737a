//! Sign Reply - live hand-sign recognition with suggested replies
//!
//! Shows hand gestures from a webcam with a predicted label and a canned reply,
//! plays a reply video on request, and streams a user-selected screen region
//! in its own window.

pub mod app;
pub mod camera;
pub mod display;
pub mod ml;
pub mod overlay;
pub mod playback;
pub mod recognition;
pub mod reply;
pub mod screen;
pub mod settings;
pub mod task;
pub mod telemetry;
pub mod video;

pub use app::LauncherApp;
pub use recognition::{LoopSummary, RecognitionLoop, StopReason};
pub use settings::Settings;
