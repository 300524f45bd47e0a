//! Shared scene builders.

use std::sync::Arc;

use cutframe_core::{FrameRate, Size};
use cutframe_media::{DecodeCache, SyntheticDecoder};
use cutframe_render::{BlockRasterizer, Compositor};
use cutframe_timeline::{
    Element, MediaAsset, MediaKind, ProjectSettings, Scene, TextContent, Track,
};

pub const CANVAS: Size = Size::new(160, 90);
pub const RED: [u8; 4] = [255, 0, 0, 255];

pub fn decoder() -> Arc<SyntheticDecoder> {
    Arc::new(SyntheticDecoder::new(FrameRate::FPS_30))
}

pub fn compositor_with(decoder: Arc<SyntheticDecoder>) -> Compositor {
    Compositor::new(
        Arc::new(DecodeCache::new(decoder)),
        Arc::new(BlockRasterizer::default()),
    )
}

pub fn compositor() -> Compositor {
    compositor_with(decoder())
}

pub fn video_asset(duration: f64) -> MediaAsset {
    MediaAsset::new(MediaKind::Video, "clip.mp4", CANVAS.width, CANVAS.height)
        .with_duration(duration)
}

/// Red 40px text, centered on the canvas.
pub fn red_text(content: &str) -> TextContent {
    let mut text = TextContent::new(content);
    text.font_size = 40.0;
    text.color = "#ff0000".into();
    text
}

/// Track 0: text "A" on [0, 2). Track 1: a full-frame video on [0, 5).
pub fn layered_scene() -> Scene {
    let asset = video_asset(10.0);
    let titles = Track::new_text("Titles").with_element(Element::text(red_text("A"), 0.0, 2.0));
    let video = Track::new_media("V1").with_element(Element::media(asset.id, 0.0, 5.0));
    Scene::new(
        vec![titles, video],
        vec![asset],
        ProjectSettings::new(CANVAS.width, CANVAS.height),
    )
}

/// Pixel color of source frame `index`.
pub fn video_pixel(index: u64) -> [u8; 4] {
    SyntheticDecoder::frame_color(index).to_rgba8()
}
