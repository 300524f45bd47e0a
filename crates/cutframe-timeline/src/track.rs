//! Track types for the timeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::Element;

/// Kind of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Media,
    Text,
    Audio,
}

/// A visibility layer holding elements ordered by start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track ID
    pub id: Uuid,
    /// Track name
    #[serde(default)]
    pub name: String,
    /// Track kind
    pub kind: TrackKind,
    /// Elements in this track
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Is track muted
    #[serde(default)]
    pub muted: bool,
}

impl Track {
    /// Create an empty track of the given kind.
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            elements: Vec::new(),
            muted: false,
        }
    }

    /// Create a new media track.
    pub fn new_media(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Media, name)
    }

    /// Create a new text track.
    pub fn new_text(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Text, name)
    }

    /// Create a new audio track.
    pub fn new_audio(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Audio, name)
    }

    /// Builder-style element append.
    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Add an element to the track.
    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Whether the track contributes pixels to rendered frames.
    #[inline]
    pub fn is_visual(&self) -> bool {
        self.kind != TrackKind::Audio
    }

    /// Exclusive end of the last element on this track.
    pub fn duration(&self) -> f64 {
        self.elements
            .iter()
            .map(Element::end_time)
            .fold(0.0, f64::max)
    }

    /// Elements drawn at `time`; empty when the track is muted.
    pub fn active_elements_at(&self, time: f64) -> impl Iterator<Item = &Element> {
        let muted = self.muted;
        self.elements
            .iter()
            .filter(move |element| !muted && element.is_active_at(time))
    }

    /// Find an element by UUID.
    pub fn find_element(&self, id: Uuid) -> Option<&Element> {
        self.elements.iter().find(|element| element.id == id)
    }

    /// Find an element mutably by UUID.
    pub fn find_element_mut(&mut self, id: Uuid) -> Option<&mut Element> {
        self.elements.iter_mut().find(|element| element.id == id)
    }
}
