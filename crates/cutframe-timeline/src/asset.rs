//! Media assets referenced by media elements.

use cutframe_core::{FrameRate, Size};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of media asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

/// An imported media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Unique asset ID
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub kind: MediaKind,
    /// Location of the underlying file
    pub path: PathBuf,
    /// Natural width in pixels
    #[serde(default)]
    pub width: u32,
    /// Natural height in pixels
    #[serde(default)]
    pub height: u32,
    /// Duration in seconds (zero for still images)
    #[serde(default)]
    pub duration: f64,
    /// Native frame rate, when known
    #[serde(default)]
    pub frame_rate: Option<FrameRate>,
    #[serde(default)]
    pub url: Option<String>,
}

impl MediaAsset {
    /// Create an asset of `kind` backed by `path`.
    pub fn new(kind: MediaKind, path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            name,
            kind,
            path,
            width,
            height,
            duration: 0.0,
            frame_rate: None,
            url: None,
        }
    }

    /// Set the duration in seconds.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// Natural size of the asset.
    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Whether the asset contributes pixels to a frame.
    #[inline]
    pub fn is_visual(&self) -> bool {
        matches!(self.kind, MediaKind::Video | MediaKind::Image)
    }
}
