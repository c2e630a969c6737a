//! Reply catalogue
//!
//! The supported gestures form a closed set. Each one maps to a canned reply
//! and each reply to one video asset; labels outside the set resolve to
//! [`Reply::Unknown`], which has no asset.

use std::fmt;
use std::path::{Path, PathBuf};

/// Gestures the classifier is trained on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gesture {
    Hello,
    Yes,
    No,
    ThankYou,
    Help,
    ILoveYou,
}

impl Gesture {
    pub const ALL: [Gesture; 6] = [
        Gesture::Hello,
        Gesture::Yes,
        Gesture::No,
        Gesture::ThankYou,
        Gesture::Help,
        Gesture::ILoveYou,
    ];

    /// Classifier label for this gesture
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::Hello => "Hello",
            Gesture::Yes => "Yes",
            Gesture::No => "No",
            Gesture::ThankYou => "Thank You",
            Gesture::Help => "Help",
            Gesture::ILoveYou => "I Love You",
        }
    }

    /// Exact-match lookup from a classifier label
    pub fn from_label(label: &str) -> Option<Gesture> {
        Self::ALL.into_iter().find(|g| g.label() == label)
    }

    /// Suggested reply text
    pub fn reply_text(&self) -> &'static str {
        match self {
            Gesture::Hello => "Hi",
            Gesture::Yes => "Okay",
            Gesture::No => "Why not",
            Gesture::ThankYou => "You're welcome",
            Gesture::Help => "What do you need?",
            Gesture::ILoveYou => "Me too",
        }
    }
}

/// Reply suggested for a prediction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reply {
    Known(Gesture),
    /// Placeholder for labels outside the catalogue
    Unknown,
}

impl Reply {
    pub const PLACEHOLDER: &'static str = "...";

    pub fn text(&self) -> &'static str {
        match self {
            Reply::Known(gesture) => gesture.reply_text(),
            Reply::Unknown => Self::PLACEHOLDER,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Resolve a classifier label to its reply
pub fn resolve(label: &str) -> Reply {
    Gesture::from_label(label).map_or(Reply::Unknown, Reply::Known)
}

/// Location of reply videos: `<dir>/<reply text>.<extension>`
#[derive(Debug, Clone)]
pub struct ReplyAssets {
    dir: PathBuf,
    extension: String,
}

impl ReplyAssets {
    pub fn new<P: AsRef<Path>>(dir: P, extension: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Path of the video for a reply. The placeholder reply has none.
    pub fn path_for(&self, reply: &Reply) -> Option<PathBuf> {
        match reply {
            Reply::Known(gesture) => Some(
                self.dir
                    .join(format!("{}.{}", gesture.reply_text(), self.extension)),
            ),
            Reply::Unknown => None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_labels() {
        assert_eq!(resolve("Hello").text(), "Hi");
        assert_eq!(resolve("Yes").text(), "Okay");
        assert_eq!(resolve("No").text(), "Why not");
        assert_eq!(resolve("Thank You").text(), "You're welcome");
        assert_eq!(resolve("Help").text(), "What do you need?");
        assert_eq!(resolve("I Love You").text(), "Me too");
    }

    #[test]
    fn test_resolve_unknown_labels() {
        for label in ["Unknown", "", "hello", "Hello ", "Goodbye"] {
            assert_eq!(resolve(label), Reply::Unknown);
            assert_eq!(resolve(label).text(), Reply::PLACEHOLDER);
        }
    }

    #[test]
    fn test_labels_round_trip() {
        for gesture in Gesture::ALL {
            assert_eq!(Gesture::from_label(gesture.label()), Some(gesture));
        }
    }

    #[test]
    fn test_asset_paths() {
        let assets = ReplyAssets::new("sign_videos", ".mp4");
        assert_eq!(
            assets.path_for(&Reply::Known(Gesture::Hello)),
            Some(PathBuf::from("sign_videos/Hi.mp4"))
        );
        assert_eq!(
            assets.path_for(&Reply::Known(Gesture::Help)),
            Some(PathBuf::from("sign_videos/What do you need?.mp4"))
        );
        assert_eq!(assets.path_for(&Reply::Unknown), None);
    }
}
