//! Sign Reply - Main Entry Point
//!
//! Loads settings and the gesture classifier, then opens the launcher window.
//! A classifier that cannot be loaded stops start-up with a non-zero exit.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use eframe::egui;
use sign_reply::ml::{ClassifierModel, GestureClassifier};
use sign_reply::reply::{Gesture, Reply};
use sign_reply::telemetry::{init_logging, LogConfig};
use sign_reply::{LauncherApp, Settings};

const WINDOW_TITLE: &str = "Sign Reply";

fn main() -> anyhow::Result<()> {
    let settings = Settings::load();

    let log_config = LogConfig::with_file(settings.log_file.as_ref().map(PathBuf::from));
    let _log_guard = init_logging(&log_config).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("Starting Sign Reply v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Settings: {:?}", settings);

    let model = match ClassifierModel::load(&settings.classifier_model_path) {
        Ok(model) => model,
        Err(e) => {
            tracing::error!(
                "Failed to load classifier model {}: {}",
                settings.classifier_model_path,
                e
            );
            return Err(e).with_context(|| format!("loading classifier model {}", settings.classifier_model_path));
        }
    };
    for label in model.distinct_labels() {
        if Gesture::from_label(label).is_none() {
            tracing::warn!("Classifier label '{}' has no reply and will show '{}'", label, Reply::PLACEHOLDER);
        }
    }
    let classifier: Arc<dyn GestureClassifier> = Arc::new(model);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([360.0, 260.0])
            .with_title(WINDOW_TITLE),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        native_options,
        Box::new(move |_cc| Ok(Box::new(LauncherApp::new(settings, classifier)))),
    )
    .map_err(|e| anyhow::anyhow!("Launcher failed: {}", e))?;

    tracing::info!("Sign Reply exited");
    Ok(())
}
