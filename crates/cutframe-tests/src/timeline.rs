//! Integration tests for the timeline model as the renderer sees it.
//!
//! Exercises cutframe-timeline together with cutframe-core time types.

use cutframe_core::{FrameRate, TimeWindow};
use cutframe_timeline::{
    BackgroundMode, Element, MediaAsset, MediaKind, ProjectSettings, Scene, SceneFile,
    TextContent, Track,
};

use crate::support::{layered_scene, red_text};

fn ids(scene: &Scene, time: f64) -> Vec<uuid::Uuid> {
    scene
        .active_elements(time)
        .iter()
        .map(|item| item.element.id)
        .collect()
}

// ── Active-element resolution ──────────────────────────────────

#[test]
fn active_set_preserves_track_order() {
    let scene = layered_scene();
    let active = scene.active_elements(1.0);
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].track_index, 0);
    assert_eq!(active[0].element.type_name(), "text");
    assert_eq!(active[1].track_index, 1);
    assert_eq!(active[1].element.type_name(), "media");
}

#[test]
fn window_is_half_open() {
    let element = Element::text(TextContent::new("x"), 1.5, 2.0);
    let scene = Scene::new(
        vec![Track::new_text("T").with_element(element.clone())],
        Vec::new(),
        ProjectSettings::new(16, 9),
    );
    assert!(ids(&scene, 1.4999).is_empty());
    assert_eq!(ids(&scene, 1.5), vec![element.id]);
    assert_eq!(ids(&scene, 3.4999), vec![element.id]);
    assert!(ids(&scene, 3.5).is_empty());
}

#[test]
fn trims_shrink_the_visible_window() {
    let mut element = Element::text(TextContent::new("x"), 1.0, 4.0);
    element.trim_start = 0.5;
    element.trim_end = 1.0;
    assert_eq!(element.visible_window(), TimeWindow::new(1.0, 3.5));
    assert!(element.is_active_at(3.4));
    assert!(!element.is_active_at(3.5));
}

#[test]
fn hidden_elements_are_never_active() {
    let mut scene = layered_scene();
    scene.tracks[0].elements[0].hidden = true;
    for time in [0.0, 0.5, 1.0, 1.99] {
        let active = scene.active_elements(time);
        assert!(active.iter().all(|item| item.track_index != 0), "t = {time}");
    }
}

#[test]
fn muted_tracks_are_never_active() {
    let mut scene = layered_scene();
    scene.tracks[1].muted = true;
    for time in [0.0, 1.0, 2.5, 4.9] {
        let active = scene.active_elements(time);
        assert!(active.iter().all(|item| item.track_index != 1), "t = {time}");
    }
}

#[test]
fn audio_tracks_count_toward_duration_only() {
    let mut scene = layered_scene();
    let music = MediaAsset::new(MediaKind::Audio, "music.wav", 0, 0).with_duration(30.0);
    scene
        .tracks
        .push(Track::new_audio("A1").with_element(Element::media(music.id, 0.0, 12.0)));
    scene.assets.push(music);

    assert_eq!(scene.duration(), 12.0);
    assert!(scene.active_elements(8.0).is_empty());
}

#[test]
fn duration_is_latest_visible_end() {
    let scene = layered_scene();
    assert_eq!(scene.duration(), 5.0);
    assert_eq!(FrameRate::FPS_30.frames_in(scene.duration()), 150);
}

// ── Serialization ──────────────────────────────────────────────

#[test]
fn scene_survives_serialization_roundtrip() {
    let mut scene = layered_scene();
    scene.scene_id = Some(uuid::Uuid::new_v4());
    scene.settings.background.mode = BackgroundMode::Blur;
    scene.settings.background.blur_intensity = 12.0;
    let mut caption = red_text("caption");
    caption.background_color = Some("rgba(0, 0, 0, 0.5)".into());
    scene.tracks[0].push(Element::text(caption, 2.0, 1.0));

    let json = SceneFile::new(scene.clone()).to_json().unwrap();
    let loaded = SceneFile::from_json(&json).unwrap();
    assert_eq!(loaded.scene, scene);
}
