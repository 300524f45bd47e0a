//! Immutable snapshot of everything that determines a rendered frame.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::MediaAsset;
use crate::element::Element;
use crate::project::ProjectSettings;
use crate::track::Track;

/// Tracks, assets and settings handed to the render core.
///
/// Track order is stacking order: `tracks[0]` is drawn on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Optional identifier of the scene within a multi-scene project
    #[serde(default)]
    pub scene_id: Option<Uuid>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub assets: Vec<MediaAsset>,
    #[serde(default)]
    pub settings: ProjectSettings,
}

/// An element visible at some time, with the track it sits on.
#[derive(Debug, Clone, Copy)]
pub struct ActiveElement<'a> {
    /// Index of the track in the scene (0 = topmost)
    pub track_index: usize,
    pub track: &'a Track,
    pub element: &'a Element,
}

impl Scene {
    /// Create a scene from its parts.
    pub fn new(tracks: Vec<Track>, assets: Vec<MediaAsset>, settings: ProjectSettings) -> Self {
        Self {
            scene_id: None,
            tracks,
            assets,
            settings,
        }
    }

    /// Look up an asset by ID.
    pub fn asset(&self, id: Uuid) -> Option<&MediaAsset> {
        self.assets.iter().find(|asset| asset.id == id)
    }

    /// Timeline length: the latest visible end over all tracks.
    pub fn duration(&self) -> f64 {
        self.tracks.iter().map(Track::duration).fold(0.0, f64::max)
    }

    /// Elements visible at `time`, in track order (topmost first).
    ///
    /// Audio tracks, muted tracks and hidden elements never contribute.
    pub fn active_elements(&self, time: f64) -> Vec<ActiveElement<'_>> {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| track.is_visual())
            .flat_map(|(track_index, track)| {
                track
                    .active_elements_at(time)
                    .map(move |element| ActiveElement {
                        track_index,
                        track,
                        element,
                    })
            })
            .collect()
    }

    /// Find an element anywhere in the scene.
    pub fn find_element_mut(&mut self, id: Uuid) -> Option<&mut Element> {
        self.tracks
            .iter_mut()
            .find_map(|track| track.find_element_mut(id))
    }
}
