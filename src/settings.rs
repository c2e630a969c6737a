//! Settings management for Sign Reply
//!
//! Settings live in an XML file in the user's config directory (or the path in
//! `SIGN_REPLY_SETTINGS`). Every field has a default so partial files load.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::reply::ReplyAssets;

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "SIGN_REPLY_SETTINGS";

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "SignReplySettings", rename_all = "camelCase", default)]
pub struct Settings {
    /// Webcam index used by the recognition loop
    pub camera_index: u32,

    /// Serialized gesture classifier (JSON)
    pub classifier_model_path: String,

    /// ONNX hand landmark model
    pub landmark_model_path: String,

    /// Directory holding one reply video per reply text
    pub reply_video_dir: String,

    /// Reply video file extension, without the dot
    pub reply_video_extension: String,

    /// Minimum hand presence score (0.0-1.0)
    pub min_detection_confidence: f32,

    /// Monitor used for screen capture
    pub monitor_index: usize,

    /// Key poll wait per loop cycle, in milliseconds
    pub key_poll_ms: u64,

    /// Delay between reply video frames when the clip has no frame rate, in milliseconds
    pub playback_frame_delay_ms: u64,

    /// Optional log file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera_index: 0,
            classifier_model_path: "models/hand_sign_model.json".to_string(),
            landmark_model_path: "models/hand_landmark.onnx".to_string(),
            reply_video_dir: "sign_videos".to_string(),
            reply_video_extension: "mp4".to_string(),
            min_detection_confidence: 0.7,
            monitor_index: 0,
            key_poll_ms: 1,
            playback_frame_delay_ms: 25,
            log_file: None,
        }
    }
}

impl Settings {
    /// Clamp values to their valid ranges
    pub fn clamp(&mut self) {
        self.min_detection_confidence = if self.min_detection_confidence.is_nan() {
            Self::default().min_detection_confidence
        } else {
            self.min_detection_confidence.clamp(0.0, 1.0)
        };
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let mut settings: Self = from_str(&contents)?;
        settings.clamp();
        Ok(settings)
    }

    /// Save settings to an XML file, creating its directory
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let xml = to_string(self)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        fs::write(path, formatted)?;
        Ok(())
    }

    /// Settings file location: the override if given, else the config directory
    pub fn settings_path(override_path: Option<PathBuf>) -> Option<PathBuf> {
        override_path.or_else(|| {
            dirs::config_dir().map(|mut p| {
                p.push("SignReply");
                p.push("settings.xml");
                p
            })
        })
    }

    /// Load from `path`. A missing file yields defaults that are written back;
    /// an unreadable one yields defaults with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            let settings = Self::default();
            match settings.save_to_file(path) {
                Ok(()) => tracing::info!("Wrote default settings to {}", path.display()),
                Err(e) => tracing::warn!("Failed to write default settings to {}: {}", path.display(), e),
            }
            return settings;
        }

        match Self::load_from_file(path) {
            Ok(settings) => {
                tracing::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                tracing::warn!("Ignoring settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load from the standard location
    pub fn load() -> Self {
        let override_path = std::env::var_os(SETTINGS_ENV).map(PathBuf::from);
        match Self::settings_path(override_path) {
            Some(path) => Self::load_or_default(&path),
            None => {
                tracing::warn!("No config directory; using default settings");
                Self::default()
            }
        }
    }

    pub fn key_poll(&self) -> Duration {
        Duration::from_millis(self.key_poll_ms)
    }

    pub fn playback_frame_delay(&self) -> Duration {
        Duration::from_millis(self.playback_frame_delay_ms)
    }

    pub fn reply_assets(&self) -> ReplyAssets {
        ReplyAssets::new(&self.reply_video_dir, &self.reply_video_extension)
    }
}

/// Settings-related errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.camera_index, 0);
        assert_eq!(settings.min_detection_confidence, 0.7);
        assert_eq!(settings.key_poll(), Duration::from_millis(1));
        assert_eq!(settings.playback_frame_delay(), Duration::from_millis(25));
        assert_eq!(settings.reply_assets().dir(), Path::new("sign_videos"));
        assert!(settings.log_file.is_none());
    }

    #[test]
    fn test_clamping() {
        let mut settings = Settings {
            min_detection_confidence: 1.5,
            ..Settings::default()
        };
        settings.clamp();
        assert_eq!(settings.min_detection_confidence, 1.0);

        settings.min_detection_confidence = f32::NAN;
        settings.clamp();
        assert_eq!(settings.min_detection_confidence, 0.7);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.xml");
        let settings = Settings {
            camera_index: 2,
            reply_video_dir: "/srv/replies".to_string(),
            log_file: Some("sign-reply.log".to_string()),
            ..Settings::default()
        };

        settings.save_to_file(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("<cameraIndex>2</cameraIndex>"));

        assert_eq!(Settings::load_from_file(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.xml");
        fs::write(
            &path,
            "<SignReplySettings><monitorIndex>1</monitorIndex><minDetectionConfidence>2.5</minDetectionConfidence></SignReplySettings>",
        )
        .unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.monitor_index, 1);
        assert_eq!(settings.min_detection_confidence, 1.0);
        assert_eq!(settings.reply_video_extension, "mp4");
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SignReply").join("settings.xml");

        let settings = Settings::load_or_default(&path);
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
    }

    #[test]
    fn test_garbage_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.xml");
        fs::write(&path, "<SignReplySettings><cameraIndex>not a number").unwrap();

        assert_eq!(Settings::load_or_default(&path), Settings::default());
    }

    #[test]
    fn test_override_path_wins() {
        let path = PathBuf::from("/tmp/custom.xml");
        assert_eq!(Settings::settings_path(Some(path.clone())), Some(path));
    }
}
