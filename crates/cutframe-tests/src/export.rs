//! Integration tests for the export sequencer.

use std::sync::Arc;

use cutframe_core::{CutframeError, FrameRate, RationalTime, Size};
use cutframe_media::{ExportCancel, MemorySink};
use cutframe_render::{
    export_project, BlockRasterizer, ExportOptions, ExportOutcome, ExportSequencer,
    PreviewRenderer,
};
use cutframe_timeline::{Element, ProjectSettings, Scene, TextContent, Track};

use crate::support::{
    compositor, decoder, layered_scene, video_asset, video_pixel, CANVAS, RED,
};

fn sequencer() -> ExportSequencer {
    ExportSequencer::new(decoder(), Arc::new(BlockRasterizer::default()))
}

/// A ten second title on a tiny canvas.
fn ten_second_scene() -> Scene {
    let track = Track::new_text("Titles")
        .with_element(Element::text(TextContent::new("10s"), 0.0, 10.0));
    let mut settings = ProjectSettings::new(16, 9);
    settings.fps = FrameRate::FPS_30;
    Scene::new(vec![track], Vec::new(), settings)
}

#[test]
fn ten_seconds_at_30_fps_is_300_frames() {
    let mut sink = MemorySink::new();
    let outcome = sequencer().run(
        &ten_second_scene(),
        &ExportOptions::default(),
        &mut sink,
        |_| {},
        &ExportCancel::new(),
    );
    assert!(outcome.is_succeeded());

    assert_eq!(sink.frames.len(), 300);
    let tick = RationalTime::new(1, 30);
    for (index, captured) in sink.frames.iter().enumerate() {
        assert_eq!(captured.time, RationalTime::new(index as i64, 30));
        assert_eq!(captured.duration, tick);
    }
    assert_eq!(sink.frames[299].time.to_seconds_f64(), 299.0 / 30.0);
}

#[test]
fn fps_override_changes_frame_grid() {
    let mut sink = MemorySink::new();
    let options = ExportOptions {
        fps: Some(FrameRate::FPS_24),
        ..ExportOptions::default()
    };
    sequencer()
        .run(&ten_second_scene(), &options, &mut sink, |_| {}, &ExportCancel::new())
        .into_result()
        .unwrap();
    assert_eq!(sink.frames.len(), 240);
    assert_eq!(sink.settings.unwrap().frame_rate, FrameRate::FPS_24);
}

#[test]
fn cancelling_before_frame_k_stops_at_k() {
    const K: u64 = 7;
    let cancel = ExportCancel::new();
    let trigger = cancel.clone();
    let mut sink = MemorySink::new();

    let outcome = sequencer().run(
        &ten_second_scene(),
        &ExportOptions::default(),
        &mut sink,
        |progress| {
            if progress.current_frame + 1 == K {
                trigger.cancel();
            }
        },
        &cancel,
    );

    assert!(matches!(outcome, ExportOutcome::Cancelled));
    assert_eq!(sink.frames.len(), K as usize);
    assert!(sink.cancelled);
    assert!(!sink.closed);
}

#[test]
fn progress_is_monotonic_and_ends_at_one() {
    let mut fractions = Vec::new();
    let mut sink = MemorySink::new();
    sequencer()
        .run(
            &ten_second_scene(),
            &ExportOptions::default(),
            &mut sink,
            |progress| fractions.push(progress.fraction()),
            &ExportCancel::new(),
        )
        .into_result()
        .unwrap();

    assert_eq!(fractions.len(), 301);
    assert!(fractions.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(fractions[0], 0.0);
    assert_eq!(fractions[300], 1.0);
}

#[test]
fn empty_timeline_fails_before_the_sink_starts() {
    let mut sink = MemorySink::new();
    let outcome = sequencer().run(
        &Scene::new(Vec::new(), Vec::new(), ProjectSettings::new(16, 9)),
        &ExportOptions::default(),
        &mut sink,
        |_| panic!("no progress expected"),
        &ExportCancel::new(),
    );
    assert!(matches!(outcome, ExportOutcome::Failed(CutframeError::Timeline(_))));
    assert!(sink.settings.is_none());
}

#[test]
fn exported_frames_match_the_compositor() {
    let scene = layered_scene();
    let mut sink = MemorySink::new();
    let options = ExportOptions {
        size: Some(Size::new(CANVAS.width / 2, CANVAS.height / 2)),
        ..ExportOptions::default()
    };
    sequencer()
        .run(&scene, &options, &mut sink, |_| {}, &ExportCancel::new())
        .into_result()
        .unwrap();

    assert_eq!(sink.frames.len(), 150);
    let reference = compositor();
    for index in [0usize, 29, 30, 59, 60, 61, 149] {
        let captured = &sink.frames[index];
        let expected = reference
            .render(captured.time.to_seconds_f64(), &scene, options.size.unwrap())
            .unwrap();
        assert_eq!(captured.frame, expected, "frame {index}");
        assert_eq!(captured.frame.pixel(2, 2), video_pixel(index as u64));
    }
    // Title on [0, 2): present in frame 59, gone in frame 60.
    assert_eq!(sink.frames[59].frame.pixel(40, 22), RED);
    assert_eq!(sink.frames[60].frame.pixel(40, 22), video_pixel(60));
}

#[test]
fn ntsc_export_shows_every_source_frame_once() {
    let mut asset = video_asset(10.0);
    asset.frame_rate = Some(FrameRate::FPS_29_97);
    let video = Track::new_media("V1").with_element(Element::media(asset.id, 0.0, 2.0));
    let mut settings = ProjectSettings::new(16, 9);
    settings.fps = FrameRate::FPS_29_97;
    let scene = Scene::new(vec![video], vec![asset], settings);

    let mut sink = MemorySink::new();
    sequencer()
        .run(&scene, &ExportOptions::default(), &mut sink, |_| {}, &ExportCancel::new())
        .into_result()
        .unwrap();

    assert_eq!(sink.frames.len(), 60);
    for (index, captured) in sink.frames.iter().enumerate() {
        assert_eq!(captured.frame.pixel(8, 4), video_pixel(index as u64), "frame {index}");
    }
}

#[test]
fn export_decodes_independently_of_preview() {
    let scene = layered_scene();
    let preview = PreviewRenderer::new(compositor(), CANVAS);
    preview.render(2.5, &scene).unwrap();
    let preview_stats = preview.compositor().lock().decode_cache().stats();

    let sequencer = sequencer();
    let mut sink = MemorySink::new();
    sequencer
        .run(&scene, &ExportOptions::default(), &mut sink, |_| {}, &ExportCancel::new())
        .into_result()
        .unwrap();

    // Export reads its own sessions and releases them when done.
    assert_eq!(sequencer.compositor().decode_cache().stats().sessions, 0);
    assert_eq!(preview.compositor().lock().decode_cache().stats(), preview_stats);
    assert!(!preview.render(2.5, &scene).unwrap().frame.is_empty());
}

#[test]
fn export_project_accepts_any_compositor() {
    let mut sink = MemorySink::new();
    let outcome = export_project(
        &compositor(),
        &ten_second_scene(),
        &ExportOptions {
            fps: Some(FrameRate::from_fps(1)),
            ..ExportOptions::default()
        },
        &mut sink,
        |_| {},
        &ExportCancel::new(),
    );
    let bytes = outcome.into_result().unwrap();
    assert_eq!(sink.frames.len(), 10);
    assert_eq!(bytes.len(), 10 * 16 * 9 * 4);
}
