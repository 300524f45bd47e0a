//! Cutframe Timeline - the data the renderer consumes
//!
//! The editing layer owns and mutates this model; the render core only
//! reads immutable [`Scene`] snapshots of it:
//! - Tracks holding time-bounded elements (media clips and text)
//! - Media assets referenced by media elements
//! - Project settings (canvas, frame rate, background)

pub mod asset;
pub mod element;
pub mod project;
pub mod scene;
pub mod serialization;
pub mod track;

pub use asset::{MediaAsset, MediaKind};
pub use element::{
    Element, ElementContent, FontStyle, FontWeight, MediaContent, TextAlign, TextContent,
};
pub use project::{BackgroundMode, BackgroundSettings, ProjectSettings};
pub use scene::{ActiveElement, Scene};
pub use serialization::SceneFile;
pub use track::{Track, TrackKind};
