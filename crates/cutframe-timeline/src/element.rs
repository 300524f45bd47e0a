//! Timeline elements: media clips and text overlays.

use cutframe_core::TimeWindow;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time-bounded visual item placed on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Unique element ID
    pub id: Uuid,
    /// Element name (displayed in UI)
    #[serde(default)]
    pub name: String,
    /// Timeline position of the untrimmed element, in seconds
    pub start_time: f64,
    /// Untrimmed duration in seconds
    pub duration: f64,
    /// Seconds cut from the head of the source
    #[serde(default)]
    pub trim_start: f64,
    /// Seconds cut from the tail of the source
    #[serde(default)]
    pub trim_end: f64,
    /// Hidden elements are never drawn
    #[serde(default)]
    pub hidden: bool,
    /// Type-specific payload
    #[serde(flatten)]
    pub content: ElementContent,
}

/// Type-specific element payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementContent {
    Media(MediaContent),
    Text(TextContent),
}

/// A reference to a media asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaContent {
    pub media_id: Uuid,
}

/// Horizontal anchor of a text run around its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// A styled text overlay. Sizes and positions are in project canvas pixels;
/// `x`/`y` are offsets from the canvas center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
    pub font_size: f32,
    pub font_family: String,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub font_style: FontStyle,
    /// CSS color of the glyphs
    pub color: String,
    /// CSS color of the padded box behind the text, if any
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub text_align: TextAlign,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Rotation in degrees, clockwise
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "full_opacity")]
    pub opacity: f32,
}

fn full_opacity() -> f32 {
    1.0
}

impl TextContent {
    /// Plain text with default styling.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            font_size: 48.0,
            font_family: "Arial".to_string(),
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            color: "#ffffff".to_string(),
            background_color: None,
            text_align: TextAlign::Center,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

impl Element {
    /// A media element referencing `media_id`, untrimmed.
    pub fn media(media_id: Uuid, start_time: f64, duration: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            start_time,
            duration,
            trim_start: 0.0,
            trim_end: 0.0,
            hidden: false,
            content: ElementContent::Media(MediaContent { media_id }),
        }
    }

    /// A text element, untrimmed.
    pub fn text(text: TextContent, start_time: f64, duration: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: text.content.clone(),
            start_time,
            duration,
            trim_start: 0.0,
            trim_end: 0.0,
            hidden: false,
            content: ElementContent::Text(text),
        }
    }

    /// Trimmed on-timeline duration.
    #[inline]
    pub fn visible_duration(&self) -> f64 {
        self.duration - self.trim_start - self.trim_end
    }

    /// Half-open window during which the element is on screen.
    #[inline]
    pub fn visible_window(&self) -> TimeWindow {
        TimeWindow::from_start_duration(self.start_time, self.visible_duration())
    }

    /// Exclusive end of the visible window.
    #[inline]
    pub fn end_time(&self) -> f64 {
        self.visible_window().end
    }

    /// Whether the element is visible at `time` (ignores track mute).
    #[inline]
    pub fn is_active_at(&self, time: f64) -> bool {
        !self.hidden && self.visible_window().contains(time)
    }

    /// Position in the source media that corresponds to timeline `time`.
    #[inline]
    pub fn source_time_at(&self, time: f64) -> f64 {
        time - self.start_time + self.trim_start
    }

    /// Asset referenced by a media element.
    pub fn media_id(&self) -> Option<Uuid> {
        match &self.content {
            ElementContent::Media(media) => Some(media.media_id),
            ElementContent::Text(_) => None,
        }
    }

    /// Short type tag, as used in logs and fingerprints.
    pub fn type_name(&self) -> &'static str {
        match self.content {
            ElementContent::Media(_) => "media",
            ElementContent::Text(_) => "text",
        }
    }
}
