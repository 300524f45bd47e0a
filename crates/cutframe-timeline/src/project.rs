//! Project-wide render settings.

use cutframe_core::{FrameRate, Size};
use serde::{Deserialize, Serialize};

/// How the area behind the foreground elements is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    /// Solid color, gradient, or nothing (`transparent`)
    #[default]
    Color,
    /// Blurred cover-fit copy of the first visible media element
    Blur,
}

/// Background configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSettings {
    /// CSS color, `linear-gradient(...)`/`radial-gradient(...)`, or `transparent`
    pub color: String,
    #[serde(default)]
    pub mode: BackgroundMode,
    /// Blur radius in canvas pixels, used in blur mode
    #[serde(default = "default_blur_intensity")]
    pub blur_intensity: f32,
}

fn default_blur_intensity() -> f32 {
    8.0
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            mode: BackgroundMode::Color,
            blur_intensity: default_blur_intensity(),
        }
    }
}

/// Canvas size, frame rate and background of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Project canvas size; element positions and font sizes are in these units
    pub canvas_size: Size,
    /// Default frame rate
    #[serde(default)]
    pub fps: FrameRate,
    #[serde(default)]
    pub background: BackgroundSettings,
}

impl ProjectSettings {
    /// Settings for a canvas of `width` x `height` at 30 fps on black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas_size: Size::new(width, height),
            fps: FrameRate::FPS_30,
            background: BackgroundSettings::default(),
        }
    }
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}
