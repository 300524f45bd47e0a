//! Integration tests for the memoized preview path.

use std::sync::Arc;

use cutframe_render::{PreviewCache, PreviewCacheConfig, PreviewRenderer};
use cutframe_timeline::ElementContent;

use crate::support::{compositor, layered_scene, video_pixel, CANVAS, RED};

fn renderer() -> PreviewRenderer {
    PreviewRenderer::new(compositor(), CANVAS)
}

// ── Memo equivalence ───────────────────────────────────────────

#[test]
fn memo_hit_equals_direct_render() {
    let scene = layered_scene();
    let preview = renderer();
    let miss = preview.render(1.0, &scene).unwrap();
    let hit = preview.render(1.0, &scene).unwrap();
    let direct = compositor().render(1.0, &scene, CANVAS).unwrap();

    assert!(!miss.from_cache);
    assert!(hit.from_cache);
    assert_eq!(*miss.frame, direct);
    assert_eq!(*hit.frame, direct);
}

#[test]
fn disabling_memo_does_not_change_output() {
    let scene = layered_scene();
    let memoized = renderer();
    let mut direct = renderer();
    direct.set_memo_enabled(false);

    for time in [0.0, 0.5, 1.0, 0.5, 2.5, 1.0, 4.9] {
        let a = memoized.render(time, &scene).unwrap();
        let b = direct.render(time, &scene).unwrap();
        assert!(!b.from_cache);
        assert_eq!(a.frame, b.frame, "t = {time}");
    }
}

// ── Invalidation ───────────────────────────────────────────────

#[test]
fn edit_invalidates_only_buckets_showing_it() {
    let mut scene = layered_scene();
    let preview = renderer();
    preview.render(1.0, &scene).unwrap();
    preview.render(3.0, &scene).unwrap();

    let ElementContent::Text(text) = &mut scene.tracks[0].elements[0].content else {
        panic!("track 0 holds the title");
    };
    text.color = "#00ff00".into();

    let edited = preview.render(1.0, &scene).unwrap();
    assert!(!edited.from_cache);
    assert_eq!(edited.frame.pixel(80, 45), [0, 255, 0, 255]);

    let untouched = preview.render(3.0, &scene).unwrap();
    assert!(untouched.from_cache);
    assert_eq!(untouched.frame.pixel(80, 45), video_pixel(90));
}

#[test]
fn moving_an_element_invalidates_old_and_new_windows() {
    let mut scene = layered_scene();
    let preview = renderer();
    preview.render(1.0, &scene).unwrap();
    preview.render(3.0, &scene).unwrap();

    scene.tracks[0].elements[0].start_time = 2.5;

    assert!(!preview.is_cached(1.0, &scene));
    assert!(!preview.is_cached(3.0, &scene));
    let moved = preview.render(3.0, &scene).unwrap();
    assert_eq!(moved.frame.pixel(80, 45), RED);
}

#[test]
fn scene_id_change_invalidates() {
    let mut scene = layered_scene();
    let preview = renderer();
    preview.render(0.5, &scene).unwrap();
    scene.scene_id = Some(uuid::Uuid::new_v4());
    assert!(!preview.is_cached(0.5, &scene));
}

#[test]
fn invalidate_drops_everything() {
    let scene = layered_scene();
    let preview = renderer();
    preview.render(0.5, &scene).unwrap();
    preview.render(3.5, &scene).unwrap();
    preview.invalidate();
    assert_eq!(preview.cache_stats().entries, 0);
    assert!(!preview.render(0.5, &scene).unwrap().from_cache);
}

// ── Eviction ───────────────────────────────────────────────────

#[test]
fn eviction_keeps_size_within_bound() {
    let scene = layered_scene();
    let frame = Arc::new(compositor().render(0.0, &scene, CANVAS).unwrap());
    let mut cache = PreviewCache::new(PreviewCacheConfig {
        max_entries: 50,
        ..PreviewCacheConfig::default()
    });

    for bucket in 0..140u32 {
        let time = (bucket as f64 + 0.5) / 30.0;
        cache.set(time, &scene, Arc::clone(&frame));
        assert!(cache.len() <= 50, "bucket {bucket}");
    }
    // Newest entries survive, the oldest are gone.
    assert!(cache.contains(139.5 / 30.0, &scene));
    assert!(!cache.contains(0.5 / 30.0, &scene));
    assert!(cache.stats().evictions > 0);
}

// ── Request tickets and pre-rendering ──────────────────────────

#[test]
fn newer_request_supersedes_older_ticket() {
    let scene = layered_scene();
    let preview = renderer();
    let first = preview.render(0.2, &scene).unwrap();
    let second = preview.render(0.4, &scene).unwrap();
    assert!(second.ticket > first.ticket);
    assert!(!preview.is_current(first.ticket));
    assert!(preview.is_current(second.ticket));
}

#[test]
fn prerendered_frames_match_interactive_ones() {
    let scene = Arc::new(layered_scene());
    let preview = PreviewRenderer::with_config(
        compositor(),
        CANVAS,
        PreviewCacheConfig {
            prerender_window_secs: 0.5,
            max_prerender_per_pass: 10,
            ..PreviewCacheConfig::default()
        },
    );
    let stored = preview.prerender_now(1.0, Arc::clone(&scene));
    assert_eq!(stored, 10);

    // The plan starts at the playhead and works forward first.
    assert!(preview.is_cached(1.0, &scene));
    let hit = preview.render(1.0, &scene).unwrap();
    assert!(hit.from_cache);
    assert_eq!(*hit.frame, compositor().render(1.0, &scene, CANVAS).unwrap());
}
