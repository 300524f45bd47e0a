//! Integration tests for the compositor.
//!
//! Exercises cutframe-render against synthetic video from cutframe-media.

use std::sync::Arc;

use cutframe_core::{FrameBuffer, PixelFormat, Size};
use cutframe_media::DecodeCache;
use cutframe_render::Compositor;
use cutframe_timeline::{
    Element, MediaAsset, MediaKind, ProjectSettings, Scene, TextContent, Track,
};

use crate::support::{
    compositor, compositor_with, decoder, layered_scene, red_text, video_pixel, CANVAS, RED,
};

const CENTER: (u32, u32) = (80, 45);
const CORNER: (u32, u32) = (5, 5);

// ── Layering ───────────────────────────────────────────────────

#[test]
fn text_over_video_while_both_active() {
    let frame = compositor().render(1.0, &layered_scene(), CANVAS).unwrap();
    assert_eq!(frame.pixel(CENTER.0, CENTER.1), RED);
    assert_eq!(frame.pixel(CORNER.0, CORNER.1), video_pixel(30));
}

#[test]
fn only_video_after_text_ends() {
    let frame = compositor().render(3.0, &layered_scene(), CANVAS).unwrap();
    assert_eq!(frame.pixel(CENTER.0, CENTER.1), video_pixel(90));
    assert_eq!(frame.pixel(CORNER.0, CORNER.1), video_pixel(90));
}

#[test]
fn first_track_is_drawn_on_top() {
    let mut scene = layered_scene();
    let mut green = red_text("B");
    green.color = "#00ff00".into();
    scene
        .tracks
        .insert(0, Track::new_text("Top").with_element(Element::text(green, 0.0, 2.0)));
    let frame = compositor().render(1.0, &scene, CANVAS).unwrap();
    assert_eq!(frame.pixel(CENTER.0, CENTER.1), [0, 255, 0, 255]);
}

#[test]
fn element_disappears_at_window_end() {
    let scene = layered_scene();
    let compositor = compositor();
    let before = compositor.render(1.999, &scene, CANVAS).unwrap();
    let at_end = compositor.render(2.0, &scene, CANVAS).unwrap();
    assert_eq!(before.pixel(CENTER.0, CENTER.1), RED);
    assert_eq!(at_end.pixel(CENTER.0, CENTER.1), video_pixel(60));
}

#[test]
fn hidden_and_muted_content_is_not_drawn() {
    let mut scene = layered_scene();
    scene.tracks[0].elements[0].hidden = true;
    scene.tracks[1].muted = true;
    scene.settings.background.color = "#0000ff".into();
    let frame = compositor().render(1.0, &scene, CANVAS).unwrap();
    assert_eq!(frame.pixel(CENTER.0, CENTER.1), [0, 0, 255, 255]);
}

// ── Text placement ─────────────────────────────────────────────

/// A single title on a black canvas.
fn title_scene(text: TextContent) -> Scene {
    let mut settings = ProjectSettings::new(CANVAS.width, CANVAS.height);
    settings.background.color = "#000000".into();
    let titles = Track::new_text("Titles").with_element(Element::text(text, 0.0, 2.0));
    Scene::new(vec![titles], Vec::new(), settings)
}

#[test]
fn rotated_text_turns_around_its_center() {
    // 40px blocks: 96x40 laid along x, spanning x 32..128 and y 25..65.
    let level = compositor().render(1.0, &title_scene(red_text("AAAA")), CANVAS).unwrap();
    assert_eq!(level.pixel(40, 45), RED);
    assert_eq!(level.pixel(80, 12), [0, 0, 0, 255]);

    let mut upright = red_text("AAAA");
    upright.rotation = 90.0;
    let turned = compositor().render(1.0, &title_scene(upright), CANVAS).unwrap();
    assert_eq!(turned.pixel(80, 12), RED);
    assert_eq!(turned.pixel(80, 78), RED);
    assert_eq!(turned.pixel(40, 45), [0, 0, 0, 255]);
    assert_eq!(turned.pixel(120, 45), [0, 0, 0, 255]);
}

#[test]
fn half_opacity_text_blends_with_background() {
    let mut faded = red_text("AAAA");
    faded.opacity = 0.5;
    let frame = compositor().render(1.0, &title_scene(faded), CANVAS).unwrap();
    let [r, g, b, a] = frame.pixel(CENTER.0, CENTER.1);
    assert!((127..=128).contains(&r), "red {r}");
    assert_eq!((g, b, a), (0, 0, 255));
}

// ── Determinism ────────────────────────────────────────────────

#[test]
fn rendering_twice_is_bit_identical() {
    let scene = layered_scene();
    let compositor = compositor();
    let first = compositor.render(1.5, &scene, CANVAS).unwrap();
    let second = compositor.render(1.5, &scene, CANVAS).unwrap();
    assert_eq!(first, second);

    // A cold compositor must agree with a warm one.
    let fresh = crate::support::compositor().render(1.5, &scene, CANVAS).unwrap();
    assert_eq!(first, fresh);
}

#[test]
fn surface_is_overwritten_not_accumulated() {
    let scene = layered_scene();
    let compositor = compositor();
    let mut surface = FrameBuffer::new(CANVAS.width, CANVAS.height, PixelFormat::Rgba8);
    compositor.render_frame(1.0, &scene, &mut surface).unwrap();
    compositor.render_frame(3.0, &scene, &mut surface).unwrap();
    assert_eq!(surface, compositor.render(3.0, &scene, CANVAS).unwrap());
}

// ── Scaling ────────────────────────────────────────────────────

#[test]
fn half_size_output_scales_everything() {
    let half = Size::new(CANVAS.width / 2, CANVAS.height / 2);
    let frame = compositor().render(1.0, &layered_scene(), half).unwrap();
    assert_eq!((frame.width, frame.height), (80, 45));
    assert_eq!(frame.pixel(40, 22), RED);
    // 20px glyph block is 12px wide: columns 34..46
    assert_eq!(frame.pixel(47, 22), video_pixel(30));
}

#[test]
fn wide_video_is_letterboxed_in_square_output() {
    let mut scene = layered_scene();
    scene.tracks.remove(0);
    let frame = compositor().render(0.0, &scene, Size::new(90, 90)).unwrap();
    assert_eq!(frame.pixel(45, 45), video_pixel(0));
    assert_eq!(frame.pixel(45, 2), [0, 0, 0, 255]);
}

// ── Failure isolation ──────────────────────────────────────────

#[test]
fn broken_video_does_not_hide_other_elements() {
    let decoder = decoder();
    decoder.mark_broken("clip.mp4");
    let cache = Arc::new(DecodeCache::new(decoder.clone()));
    let compositor = Compositor::new(
        Arc::clone(&cache),
        Arc::new(cutframe_render::BlockRasterizer::default()),
    );
    let scene = layered_scene();

    let frame = compositor.render(1.0, &scene, CANVAS).unwrap();
    assert_eq!(frame.pixel(CENTER.0, CENTER.1), RED);
    assert_eq!(frame.pixel(CORNER.0, CORNER.1), [0, 0, 0, 255]);

    // The failure is remembered rather than retried.
    compositor.render(1.1, &scene, CANVAS).unwrap();
    let asset_id = scene.assets[0].id;
    assert!(cache.failure(asset_id).is_some());
    assert_eq!(cache.stats().failed, 1);
    assert_eq!(decoder.counters().opens(), 0);
}

#[test]
fn video_past_its_end_renders_nothing() {
    let mut scene = layered_scene();
    scene.tracks.remove(0);
    scene.assets[0] = MediaAsset {
        duration: 1.0,
        ..scene.assets[0].clone()
    };
    scene.settings.background.color = "#ffffff".into();
    let frame = compositor().render(3.0, &scene, CANVAS).unwrap();
    assert_eq!(frame.pixel(CENTER.0, CENTER.1), [255, 255, 255, 255]);
}

// ── Sequential decoding ────────────────────────────────────────

#[test]
fn playback_reads_one_stream_forward() {
    let decoder = decoder();
    let compositor = compositor_with(decoder.clone());
    let mut scene = layered_scene();
    scene.tracks.remove(0);

    for index in 0..60u64 {
        let time = index as f64 / 30.0;
        let frame = compositor.render(time, &scene, CANVAS).unwrap();
        assert_eq!(frame.pixel(CORNER.0, CORNER.1), video_pixel(index), "frame {index}");
    }
    let counters = decoder.counters();
    assert_eq!(counters.opens(), 1);
    assert_eq!(counters.streams(), 1);
    assert_eq!(counters.frames(), 60);
}

#[test]
fn jump_back_reopens_the_stream() {
    let decoder = decoder();
    let compositor = compositor_with(decoder.clone());
    let scene = layered_scene();

    compositor.render(4.0, &scene, CANVAS).unwrap();
    let frame = compositor.render(0.5, &scene, CANVAS).unwrap();
    assert_eq!(frame.pixel(CORNER.0, CORNER.1), video_pixel(15));
    assert_eq!(decoder.counters().streams(), 2);
    assert_eq!(decoder.counters().opens(), 1);
}

// ── Still images ───────────────────────────────────────────────

#[test]
fn image_assets_are_loaded_and_drawn() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("still.png");
    image::RgbaImage::from_pixel(32, 18, image::Rgba([10, 200, 30, 255]))
        .save(&path)
        .unwrap();

    let asset = MediaAsset::new(MediaKind::Image, &path, 32, 18);
    let track = Track::new_media("Stills").with_element(Element::media(asset.id, 0.0, 3.0));
    let scene = Scene::new(vec![track], vec![asset], ProjectSettings::new(64, 36));

    let compositor = compositor();
    let frame = compositor.render(1.0, &scene, Size::new(64, 36)).unwrap();
    assert_eq!(frame.pixel(32, 18), [10, 200, 30, 255]);
    assert_eq!(compositor.images().len(), 1);
}

#[test]
fn gradient_background_runs_left_to_right() {
    let mut scene = Scene::new(Vec::new(), Vec::new(), ProjectSettings::new(100, 10));
    scene.settings.background.color = "linear-gradient(#000000, #ffffff)".into();
    let frame = compositor().render(0.0, &scene, Size::new(100, 10)).unwrap();
    let left = frame.pixel(2, 5)[0];
    let middle = frame.pixel(50, 5)[0];
    let right = frame.pixel(97, 5)[0];
    assert!(left < middle && middle < right, "{left} {middle} {right}");
}
