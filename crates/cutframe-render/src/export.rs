//! Offline export: every frame of the timeline, in order, into an encoding sink.
//!
//! Export renders through its own [`Compositor`] and [`DecodeCache`] and never
//! touches the preview memo, so output does not depend on what was scrubbed.

use cutframe_core::{CutframeError, FrameBuffer, FrameRate, PixelFormat, RationalTime, Result, Size};
use cutframe_media::{
    DecodeCache, EncodeSettings, EncodingSink, ExportCancel, ExportFormat, ExportProgress,
    ExportQuality, VideoDecoder,
};
use cutframe_timeline::Scene;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::compositor::Compositor;
use crate::text::TextRasterizer;

/// User-facing export choices. Unset fields follow the project settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub quality: ExportQuality,
    pub fps: Option<FrameRate>,
    pub size: Option<Size>,
}

/// How an export ended.
#[derive(Debug)]
pub enum ExportOutcome {
    /// Encoded output as returned by the sink
    Succeeded(Vec<u8>),
    Cancelled,
    Failed(CutframeError),
}

impl ExportOutcome {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Collapse into a `Result`; cancellation becomes [`CutframeError::Cancelled`].
    pub fn into_result(self) -> Result<Vec<u8>> {
        match self {
            Self::Succeeded(bytes) => Ok(bytes),
            Self::Cancelled => Err(CutframeError::Cancelled),
            Self::Failed(e) => Err(e),
        }
    }
}

/// A planned export: resolved settings and a frame cursor.
#[derive(Debug, Clone)]
pub struct ExportJob {
    settings: EncodeSettings,
    total_frames: u64,
    next_frame: u64,
}

impl ExportJob {
    /// Resolve `options` against `scene`. Fails on an empty timeline.
    pub fn plan(scene: &Scene, options: &ExportOptions) -> Result<Self> {
        let duration = scene.duration();
        if duration.is_nan() || duration <= 0.0 {
            return Err(CutframeError::Timeline("empty project".into()));
        }
        let frame_rate = options.fps.unwrap_or(scene.settings.fps);
        if !frame_rate.is_valid() {
            return Err(CutframeError::InvalidParameter(format!(
                "invalid export frame rate {}/{}",
                frame_rate.numerator, frame_rate.denominator
            )));
        }
        let size = options.size.unwrap_or(scene.settings.canvas_size);
        if size.is_empty() {
            return Err(CutframeError::InvalidParameter(format!(
                "invalid export size {}x{}",
                size.width, size.height
            )));
        }

        Ok(Self {
            settings: EncodeSettings {
                format: options.format,
                quality: options.quality,
                size,
                frame_rate,
            },
            total_frames: frame_rate.frames_in(duration),
            next_frame: 0,
        })
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Presentation time of frame `index`.
    pub fn frame_time(&self, index: u64) -> RationalTime {
        RationalTime::from_frames(index as i64, self.settings.frame_rate)
    }

    /// Next frame index and its time, until the timeline is exhausted.
    pub fn advance(&mut self) -> Option<(u64, RationalTime)> {
        if self.next_frame >= self.total_frames {
            return None;
        }
        let index = self.next_frame;
        self.next_frame += 1;
        Some((index, self.frame_time(index)))
    }
}

/// Render every frame of `scene` into `sink`.
///
/// `cancel` is checked before each frame. `on_progress` sees frame `i` as
/// `i / total` and a final report at completion.
pub fn export_project(
    compositor: &Compositor,
    scene: &Scene,
    options: &ExportOptions,
    sink: &mut dyn EncodingSink,
    mut on_progress: impl FnMut(&ExportProgress),
    cancel: &ExportCancel,
) -> ExportOutcome {
    let mut job = match ExportJob::plan(scene, options) {
        Ok(job) => job,
        Err(e) => {
            tracing::warn!(error = %e, "Export rejected");
            return ExportOutcome::Failed(e);
        }
    };

    let settings = job.settings().clone();
    let total_frames = job.total_frames();
    tracing::info!(
        format = ?settings.format,
        quality = ?settings.quality,
        width = settings.size.width,
        height = settings.size.height,
        fps = settings.frame_rate.to_fps_f64(),
        total_frames,
        "Export started"
    );

    if let Err(e) = sink.start(&settings) {
        sink.cancel();
        return ExportOutcome::Failed(e);
    }

    let frame_duration = settings.frame_rate.frame_duration();
    let mut surface = FrameBuffer::new(settings.size.width, settings.size.height, PixelFormat::Rgba8);
    let started = Instant::now();

    while let Some((index, time)) = job.advance() {
        if cancel.is_cancelled() {
            tracing::info!(frame = index, total_frames, "Export cancelled");
            sink.cancel();
            return ExportOutcome::Cancelled;
        }

        let step = compositor
            .render_frame(time.to_seconds_f64(), scene, &mut surface)
            .and_then(|()| sink.add(&surface, time, frame_duration));
        if let Err(e) = step {
            tracing::warn!(frame = index, error = %e, "Export failed");
            sink.cancel();
            return ExportOutcome::Failed(e);
        }

        let elapsed = started.elapsed().as_secs_f64();
        let fps = if elapsed > 0.0 {
            (index + 1) as f64 / elapsed
        } else {
            0.0
        };
        let eta_seconds = if fps > 0.0 {
            (total_frames - index - 1) as f64 / fps
        } else {
            0.0
        };
        on_progress(&ExportProgress {
            current_frame: index,
            total_frames,
            eta_seconds,
            fps,
        });
    }

    let finished = sink.close().and_then(|()| sink.finalize());
    match finished {
        Ok(bytes) => {
            on_progress(&ExportProgress {
                current_frame: total_frames,
                total_frames,
                eta_seconds: 0.0,
                fps: total_frames as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON),
            });
            tracing::info!(
                total_frames,
                bytes = bytes.len(),
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Export finished"
            );
            ExportOutcome::Succeeded(bytes)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Encoder failed to finish");
            sink.cancel();
            ExportOutcome::Failed(e)
        }
    }
}

/// Owns a compositor whose decode sessions are private to export.
pub struct ExportSequencer {
    compositor: Compositor,
}

impl ExportSequencer {
    pub fn new(decoder: Arc<dyn VideoDecoder>, text: Arc<dyn TextRasterizer>) -> Self {
        let decode_cache = Arc::new(DecodeCache::new(decoder));
        Self {
            compositor: Compositor::new(decode_cache, text),
        }
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Export `scene`, then release every decode session the run opened.
    pub fn run(
        &self,
        scene: &Scene,
        options: &ExportOptions,
        sink: &mut dyn EncodingSink,
        on_progress: impl FnMut(&ExportProgress),
        cancel: &ExportCancel,
    ) -> ExportOutcome {
        let outcome = export_project(&self.compositor, scene, options, sink, on_progress, cancel);
        self.compositor.decode_cache().clear_all();
        outcome
    }
}

impl std::fmt::Debug for ExportSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportSequencer")
            .field("compositor", &self.compositor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::BlockRasterizer;
    use cutframe_media::{MemorySink, SyntheticDecoder};
    use cutframe_timeline::{Element, ProjectSettings, TextContent, Track};

    fn sequencer() -> ExportSequencer {
        ExportSequencer::new(
            Arc::new(SyntheticDecoder::new(FrameRate::FPS_30)),
            Arc::new(BlockRasterizer::default()),
        )
    }

    fn scene(duration: f64) -> Scene {
        let track = Track::new_text("Titles")
            .with_element(Element::text(TextContent::new("End"), 0.0, duration));
        let mut settings = ProjectSettings::new(16, 8);
        settings.fps = FrameRate::FPS_30;
        Scene::new(vec![track], Vec::new(), settings)
    }

    #[test]
    fn test_plan_rounds_frame_count_up() {
        let job = ExportJob::plan(&scene(1.01), &ExportOptions::default()).unwrap();
        assert_eq!(job.total_frames(), 31);
        assert_eq!(job.frame_time(30), RationalTime::new(1, 1));
    }

    #[test]
    fn test_plan_uses_overrides() {
        let options = ExportOptions {
            fps: Some(FrameRate::FPS_24),
            size: Some(Size::new(8, 4)),
            ..ExportOptions::default()
        };
        let job = ExportJob::plan(&scene(2.0), &options).unwrap();
        assert_eq!(job.total_frames(), 48);
        assert_eq!(job.settings().size, Size::new(8, 4));
    }

    #[test]
    fn test_cursor_is_monotonic() {
        let mut job = ExportJob::plan(&scene(0.1), &ExportOptions::default()).unwrap();
        let indices: Vec<u64> = std::iter::from_fn(|| job.advance()).map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(job.advance().is_none());
    }

    #[test]
    fn test_empty_project_never_starts_sink() {
        let empty = Scene::new(Vec::new(), Vec::new(), ProjectSettings::new(16, 8));
        let mut sink = MemorySink::new();
        let outcome = sequencer().run(
            &empty,
            &ExportOptions::default(),
            &mut sink,
            |_| {},
            &ExportCancel::new(),
        );
        match outcome {
            ExportOutcome::Failed(CutframeError::Timeline(message)) => {
                assert_eq!(message, "empty project")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(sink.settings.is_none());
    }

    #[test]
    fn test_success_reports_progress_to_one() {
        let mut sink = MemorySink::new();
        let mut fractions = Vec::new();
        let outcome = sequencer().run(
            &scene(0.1),
            &ExportOptions::default(),
            &mut sink,
            |progress| fractions.push(progress.fraction()),
            &ExportCancel::new(),
        );
        let bytes = outcome.into_result().unwrap();
        assert_eq!(bytes.len(), 3 * 16 * 8 * 4);
        assert_eq!(fractions.len(), 4);
        assert_eq!(fractions[0], 0.0);
        assert_eq!(*fractions.last().unwrap(), 1.0);
        assert!(sink.closed);
    }

    #[test]
    fn test_failing_sink_fails_export() {
        struct Refusing(bool);
        impl EncodingSink for Refusing {
            fn start(&mut self, _: &EncodeSettings) -> Result<()> {
                Ok(())
            }
            fn add(&mut self, _: &FrameBuffer, _: RationalTime, _: RationalTime) -> Result<()> {
                Err(CutframeError::Encoder("disk full".into()))
            }
            fn close(&mut self) -> Result<()> {
                Ok(())
            }
            fn finalize(&mut self) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }
            fn cancel(&mut self) {
                self.0 = true;
            }
        }

        let mut sink = Refusing(false);
        let outcome = sequencer().run(
            &scene(1.0),
            &ExportOptions::default(),
            &mut sink,
            |_| {},
            &ExportCancel::new(),
        );
        assert!(matches!(outcome, ExportOutcome::Failed(CutframeError::Encoder(_))));
        assert!(sink.0);
    }
}
