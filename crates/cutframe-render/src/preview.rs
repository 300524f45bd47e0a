//! Interactive preview: memoized rendering plus idle pre-rendering.
//!
//! Interactive requests lock the compositor outright. The pre-render worker
//! only ever `try_lock`s it and backs off, so it never delays a scrub.

use cutframe_core::{FrameBuffer, Result, SharedFrameBuffer, Size};
use cutframe_timeline::Scene;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::compositor::Compositor;
use crate::preview_cache::{PreviewCache, PreviewCacheConfig, PreviewCacheStats};

/// Pause between attempts to grab a compositor held by the interactive path.
const IDLE_BACKOFF: Duration = Duration::from_millis(4);

/// A rendered preview frame.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    /// Request ticket; compare with [`PreviewRenderer::is_current`]
    pub ticket: u64,
    pub time: f64,
    pub frame: SharedFrameBuffer,
    pub from_cache: bool,
}

struct PrerenderJob {
    playhead: f64,
    scene: Arc<Scene>,
    size: Size,
    generation: u64,
}

/// State shared between the interactive path and the pre-render worker.
struct Shared {
    compositor: Mutex<Compositor>,
    cache: Mutex<PreviewCache>,
    /// Bumped whenever cached frames stop being valid wholesale
    generation: AtomicU64,
    prerendered: AtomicU64,
}

impl Shared {
    /// Render the planned frames around `playhead`, returning how many were stored.
    ///
    /// `yield_to` is polled between frames; a pending job there ends the pass early.
    fn prerender_pass(&self, job: &PrerenderJob, yield_to: Option<&Receiver<PrerenderJob>>) -> usize {
        let plan = self.cache.lock().prerender_plan(job.playhead, &job.scene);
        let superseded = || yield_to.is_some_and(|rx| !rx.is_empty());
        let mut stored = 0;

        for time in plan {
            if superseded() || self.generation.load(Ordering::Acquire) != job.generation {
                break;
            }
            let compositor = match yield_to {
                // Background: wait for the interactive path to let go
                Some(_) => loop {
                    if let Some(guard) = self.compositor.try_lock() {
                        break Some(guard);
                    }
                    if superseded() {
                        break None;
                    }
                    thread::sleep(IDLE_BACKOFF);
                },
                None => Some(self.compositor.lock()),
            };
            let Some(compositor) = compositor else {
                break;
            };
            let rendered = compositor.render(time, &job.scene, job.size);
            drop(compositor);

            match rendered {
                Ok(frame) => {
                    let mut cache = self.cache.lock();
                    if self.generation.load(Ordering::Acquire) != job.generation {
                        break;
                    }
                    if !cache.contains(time, &job.scene) {
                        cache.set(time, &job.scene, Arc::new(frame));
                        stored += 1;
                    }
                }
                Err(e) => tracing::debug!(time, error = %e, "Pre-render skipped frame"),
            }
        }

        self.prerendered.fetch_add(stored as u64, Ordering::Relaxed);
        if stored > 0 {
            tracing::debug!(playhead = job.playhead, stored, "Pre-render pass done");
        }
        stored
    }
}

fn run_worker(shared: Arc<Shared>, jobs: Receiver<PrerenderJob>) {
    while let Ok(mut job) = jobs.recv() {
        // Only the newest playhead matters
        while let Ok(newer) = jobs.try_recv() {
            job = newer;
        }
        shared.prerender_pass(&job, Some(&jobs));
    }
    tracing::debug!("Pre-render worker stopped");
}

/// Memoizing front end to the [`Compositor`] for playback and scrubbing.
pub struct PreviewRenderer {
    shared: Arc<Shared>,
    output_size: Size,
    memo_enabled: bool,
    ticket: AtomicU64,
    jobs: Option<Sender<PrerenderJob>>,
    worker: Option<JoinHandle<()>>,
}

impl PreviewRenderer {
    pub fn new(compositor: Compositor, output_size: Size) -> Self {
        Self::with_config(compositor, output_size, PreviewCacheConfig::default())
    }

    pub fn with_config(compositor: Compositor, output_size: Size, config: PreviewCacheConfig) -> Self {
        let shared = Arc::new(Shared {
            compositor: Mutex::new(compositor),
            cache: Mutex::new(PreviewCache::new(config)),
            generation: AtomicU64::new(0),
            prerendered: AtomicU64::new(0),
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let worker_shared = Arc::clone(&shared);
        let (jobs, worker) = match thread::Builder::new()
            .name("cutframe-prerender".into())
            .spawn(move || run_worker(worker_shared, rx))
        {
            Ok(handle) => (Some(tx), Some(handle)),
            Err(e) => {
                tracing::warn!(error = %e, "Pre-render worker unavailable");
                (None, None)
            }
        };

        Self {
            shared,
            output_size,
            memo_enabled: true,
            ticket: AtomicU64::new(0),
            jobs,
            worker,
        }
    }

    pub fn output_size(&self) -> Size {
        self.output_size
    }

    /// Change the output size. Cached frames of the old size are dropped.
    pub fn set_output_size(&mut self, size: Size) {
        if size != self.output_size {
            self.output_size = size;
            self.invalidate();
        }
    }

    pub fn memo_enabled(&self) -> bool {
        self.memo_enabled
    }

    pub fn set_memo_enabled(&mut self, enabled: bool) {
        self.memo_enabled = enabled;
    }

    /// Shared compositor; hold the lock briefly.
    pub fn compositor(&self) -> &Mutex<Compositor> {
        &self.shared.compositor
    }

    /// Render the scene at `time`, from the memo when possible.
    pub fn render(&self, time: f64, scene: &Scene) -> Result<PreviewFrame> {
        let ticket = self.ticket.fetch_add(1, Ordering::AcqRel) + 1;

        if self.memo_enabled {
            if let Some(frame) = self.shared.cache.lock().get(time, scene) {
                return Ok(PreviewFrame {
                    ticket,
                    time,
                    frame,
                    from_cache: true,
                });
            }
        }

        let generation = self.shared.generation.load(Ordering::Acquire);
        let frame = Arc::new(self.shared.compositor.lock().render(time, scene, self.output_size)?);
        if self.memo_enabled {
            let mut cache = self.shared.cache.lock();
            if self.shared.generation.load(Ordering::Acquire) == generation {
                cache.set(time, scene, Arc::clone(&frame));
            }
        }

        Ok(PreviewFrame {
            ticket,
            time,
            frame,
            from_cache: false,
        })
    }

    /// Render into a caller-owned surface of the output size.
    pub fn render_into(&self, time: f64, scene: &Scene, surface: &mut FrameBuffer) -> Result<PreviewFrame> {
        let preview = self.render(time, scene)?;
        surface.clone_from(&preview.frame);
        Ok(preview)
    }

    /// Whether `ticket` belongs to the most recent request.
    pub fn is_current(&self, ticket: u64) -> bool {
        self.ticket.load(Ordering::Acquire) == ticket
    }

    /// Queue idle pre-rendering around `playhead`. Newer requests replace queued ones.
    pub fn schedule_prerender(&self, playhead: f64, scene: Arc<Scene>) {
        if !self.memo_enabled {
            return;
        }
        let Some(jobs) = &self.jobs else {
            return;
        };
        let job = self.job(playhead, scene);
        if jobs.send(job).is_err() {
            tracing::debug!("Pre-render worker gone; request dropped");
        }
    }

    /// Run one pre-render pass on the calling thread.
    pub fn prerender_now(&self, playhead: f64, scene: Arc<Scene>) -> usize {
        if !self.memo_enabled {
            return 0;
        }
        let job = self.job(playhead, scene);
        self.shared.prerender_pass(&job, None)
    }

    fn job(&self, playhead: f64, scene: Arc<Scene>) -> PrerenderJob {
        PrerenderJob {
            playhead,
            scene,
            size: self.output_size,
            generation: self.shared.generation.load(Ordering::Acquire),
        }
    }

    /// Frames stored by pre-rendering since creation.
    pub fn prerendered_count(&self) -> u64 {
        self.shared.prerendered.load(Ordering::Relaxed)
    }

    /// Whether a valid memo entry exists for `time`.
    pub fn is_cached(&self, time: f64, scene: &Scene) -> bool {
        self.shared.cache.lock().contains(time, scene)
    }

    /// Drop every memoized frame, including ones a running pass is about to store.
    pub fn invalidate(&self) {
        let mut cache = self.shared.cache.lock();
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        cache.invalidate_all();
    }

    pub fn cache_stats(&self) -> PreviewCacheStats {
        self.shared.cache.lock().stats()
    }
}

impl Drop for PreviewRenderer {
    fn drop(&mut self) {
        // Closing the channel stops the worker after its current frame
        drop(self.jobs.take());
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Pre-render worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for PreviewRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewRenderer")
            .field("output_size", &self.output_size)
            .field("memo_enabled", &self.memo_enabled)
            .field("ticket", &self.ticket.load(Ordering::Relaxed))
            .field("worker", &self.worker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::BlockRasterizer;
    use cutframe_core::FrameRate;
    use cutframe_media::{DecodeCache, SyntheticDecoder};
    use cutframe_timeline::{Element, ProjectSettings, TextContent, Track};
    use std::time::Instant;

    fn renderer(config: PreviewCacheConfig) -> PreviewRenderer {
        let decoder = Arc::new(SyntheticDecoder::new(FrameRate::FPS_30));
        let compositor = Compositor::new(
            Arc::new(DecodeCache::new(decoder)),
            Arc::new(BlockRasterizer::default()),
        );
        PreviewRenderer::with_config(compositor, Size::new(32, 18), config)
    }

    fn scene() -> Scene {
        let track = Track::new_text("Titles")
            .with_element(Element::text(TextContent::new("Hi"), 0.0, 2.0));
        Scene::new(vec![track], Vec::new(), ProjectSettings::new(64, 36))
    }

    #[test]
    fn test_second_request_hits_memo() {
        let preview = renderer(PreviewCacheConfig::default());
        let scene = scene();
        let first = preview.render(0.5, &scene).unwrap();
        let second = preview.render(0.5, &scene).unwrap();
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(*first.frame, *second.frame);
        assert!(!preview.is_current(first.ticket));
        assert!(preview.is_current(second.ticket));
    }

    #[test]
    fn test_disabled_memo_renders_every_time() {
        let mut preview = renderer(PreviewCacheConfig::default());
        preview.set_memo_enabled(false);
        let scene = scene();
        preview.render(0.5, &scene).unwrap();
        let again = preview.render(0.5, &scene).unwrap();
        assert!(!again.from_cache);
        assert_eq!(preview.cache_stats().entries, 0);
    }

    #[test]
    fn test_resize_invalidates() {
        let mut preview = renderer(PreviewCacheConfig::default());
        let scene = scene();
        preview.render(0.5, &scene).unwrap();
        preview.set_output_size(Size::new(16, 9));
        let frame = preview.render(0.5, &scene).unwrap();
        assert!(!frame.from_cache);
        assert_eq!((frame.frame.width, frame.frame.height), (16, 9));
    }

    #[test]
    fn test_render_into_copies_frame() {
        let preview = renderer(PreviewCacheConfig::default());
        let scene = scene();
        let mut surface = FrameBuffer::new(1, 1, cutframe_core::PixelFormat::Rgba8);
        let frame = preview.render_into(0.5, &scene, &mut surface).unwrap();
        assert_eq!(surface, *frame.frame);
    }

    #[test]
    fn test_prerender_now_fills_plan() {
        let config = PreviewCacheConfig {
            resolution: 4.0,
            prerender_window_secs: 0.5,
            ..PreviewCacheConfig::default()
        };
        let preview = renderer(config);
        let scene = Arc::new(scene());
        let stored = preview.prerender_now(0.0, Arc::clone(&scene));
        // second 0 at 4 buckets per second
        assert_eq!(stored, 4);
        assert!(preview.is_cached(0.75, &scene));
        assert!(!preview.is_cached(1.0, &scene));
        assert_eq!(preview.prerender_now(0.0, scene), 0);
    }

    #[test]
    fn test_background_worker_prerenders() {
        let config = PreviewCacheConfig {
            resolution: 4.0,
            prerender_window_secs: 0.5,
            ..PreviewCacheConfig::default()
        };
        let preview = renderer(config);
        let scene = Arc::new(scene());
        preview.schedule_prerender(0.0, Arc::clone(&scene));

        let deadline = Instant::now() + Duration::from_secs(10);
        while preview.prerendered_count() < 4 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(preview.prerendered_count(), 4);
        let hit = preview.render(0.25, &scene).unwrap();
        assert!(hit.from_cache);
    }
}
