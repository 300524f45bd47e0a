//! Video decoding interfaces.
//!
//! A [`VideoDecoder`] opens a [`VideoSource`] once per asset (the expensive
//! part: probing, codec setup). A source hands out [`FrameStream`]s that
//! iterate forward from a start time; a seek is simply a new stream.

use cutframe_core::{
    Color, CutframeError, FrameBuffer, FrameRate, PixelFormat, RationalTime, Result,
    SharedFrameBuffer, Size, TimeWindow,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The file behind a video asset plus what is known about it up front.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub path: PathBuf,
    /// Natural size of the video
    pub size: Size,
    /// Native frame rate, when known
    pub frame_rate: Option<FrameRate>,
    /// Duration in seconds
    pub duration: f64,
}

impl MediaSource {
    pub fn new(path: impl Into<PathBuf>, size: Size) -> Self {
        Self {
            path: path.into(),
            size,
            frame_rate: None,
            duration: 0.0,
        }
    }
}

/// A decoded video frame with its presentation window.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Frame data in RGBA8 format
    pub buffer: SharedFrameBuffer,
    /// Presentation timestamp in seconds (source time)
    pub timestamp: f64,
    /// Display duration in seconds
    pub duration: f64,
}

impl DecodedFrame {
    /// `[timestamp, timestamp + duration)`: the times this frame is correct for.
    #[inline]
    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_start_duration(self.timestamp, self.duration)
    }
}

/// Timestamp and duration of frame `index` on a constant-rate grid.
///
/// Both ends come from [`RationalTime::from_frames`], the same conversion
/// export uses for its frame times, so export time `k` is exactly the start
/// of frame `k`. The window of frame `n` ends where frame `n + 1` starts.
pub(crate) fn frame_slot(index: u64, rate: FrameRate) -> (f64, f64) {
    let timestamp = RationalTime::from_frames(index as i64, rate).to_seconds_f64();
    let next = RationalTime::from_frames(index as i64 + 1, rate).to_seconds_f64();
    (timestamp, next - timestamp)
}

/// Index of the grid frame whose window contains `time`.
pub(crate) fn frame_index_at(time: f64, rate: FrameRate) -> u64 {
    let mut index = (time.max(0.0) * rate.to_fps_f64()).floor() as u64;
    // The float estimate can land one frame off either side of a boundary.
    while index > 0 && frame_slot(index, rate).0 > time {
        index -= 1;
    }
    while frame_slot(index + 1, rate).0 <= time {
        index += 1;
    }
    index
}

/// Forward iterator over decoded frames.
pub trait FrameStream: Send {
    /// Decode the next frame; `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>>;
}

/// An opened, decodable video.
pub trait VideoSource: Send {
    /// Start a new stream whose first frame covers `start`.
    fn frames_from(&mut self, start: f64) -> Result<Box<dyn FrameStream>>;
}

/// Factory for video sources.
pub trait VideoDecoder: Send + Sync {
    /// Open `source` for decoding. Fails for unsupported codecs, files without
    /// a video track, or corrupt data.
    fn open(&self, source: &MediaSource) -> Result<Box<dyn VideoSource>>;
}

// ── Synthetic decoder ──────────────────────────────────────────

/// Counters shared by every source and stream of a [`SyntheticDecoder`].
#[derive(Debug, Default)]
pub struct DecodeCounters {
    /// Sources opened (session initializations)
    pub opens: AtomicUsize,
    /// Streams started (initial opens and seeks)
    pub streams: AtomicUsize,
    /// Frames produced
    pub frames: AtomicUsize,
}

impl DecodeCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn streams(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

/// Decoder that generates frames instead of reading files.
///
/// Frame `n` is a solid fill of [`SyntheticDecoder::frame_color`]`(n)`, so a
/// rendered pixel tells which source frame was used. Useful for previews
/// without ffmpeg and for exercising the decode cache.
pub struct SyntheticDecoder {
    frame_rate: FrameRate,
    counters: Arc<DecodeCounters>,
    broken: Mutex<HashSet<PathBuf>>,
    gaps: Mutex<HashMap<PathBuf, Vec<TimeWindow>>>,
}

impl SyntheticDecoder {
    pub fn new(frame_rate: FrameRate) -> Self {
        Self {
            frame_rate,
            counters: Arc::new(DecodeCounters::default()),
            broken: Mutex::new(HashSet::new()),
            gaps: Mutex::new(HashMap::new()),
        }
    }

    /// Shared counters for every source this decoder opens.
    pub fn counters(&self) -> Arc<DecodeCounters> {
        Arc::clone(&self.counters)
    }

    /// Make `open` fail for `path`, as a corrupt file would.
    pub fn mark_broken(&self, path: impl AsRef<Path>) {
        self.broken.lock().insert(path.as_ref().to_path_buf());
    }

    /// Leave out every frame of `path` that starts inside `window`, as in a
    /// file with missing packets.
    pub fn mark_gap(&self, path: impl AsRef<Path>, window: TimeWindow) {
        self.gaps
            .lock()
            .entry(path.as_ref().to_path_buf())
            .or_default()
            .push(window);
    }

    /// Fill color of frame `index`.
    pub fn frame_color(index: u64) -> Color {
        Color::from_rgba8((index % 256) as u8, ((index / 256) % 256) as u8, 200, 255)
    }
}

impl VideoDecoder for SyntheticDecoder {
    fn open(&self, source: &MediaSource) -> Result<Box<dyn VideoSource>> {
        if self.broken.lock().contains(&source.path) {
            return Err(CutframeError::Decoder(format!(
                "no decodable video track in {}",
                source.path.display()
            )));
        }
        if source.size.is_empty() {
            return Err(CutframeError::UnsupportedFormat(format!(
                "{} reports an empty frame size",
                source.path.display()
            )));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticSource {
            size: source.size,
            frame_rate: source.frame_rate.unwrap_or(self.frame_rate),
            duration: source.duration,
            gaps: self.gaps.lock().get(&source.path).cloned().unwrap_or_default(),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct SyntheticSource {
    size: Size,
    frame_rate: FrameRate,
    duration: f64,
    gaps: Vec<TimeWindow>,
    counters: Arc<DecodeCounters>,
}

impl VideoSource for SyntheticSource {
    fn frames_from(&mut self, start: f64) -> Result<Box<dyn FrameStream>> {
        self.counters.streams.fetch_add(1, Ordering::SeqCst);
        let first = frame_index_at(start, self.frame_rate);
        Ok(Box::new(SyntheticStream {
            size: self.size,
            frame_rate: self.frame_rate,
            next_index: first,
            total: self.frame_rate.frames_in(self.duration),
            gaps: self.gaps.clone(),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct SyntheticStream {
    size: Size,
    frame_rate: FrameRate,
    next_index: u64,
    total: u64,
    gaps: Vec<TimeWindow>,
    counters: Arc<DecodeCounters>,
}

impl FrameStream for SyntheticStream {
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        let (index, timestamp, duration) = loop {
            if self.next_index >= self.total {
                return Ok(None);
            }
            let index = self.next_index;
            self.next_index += 1;
            let (timestamp, duration) = frame_slot(index, self.frame_rate);
            if !self.gaps.iter().any(|gap| gap.contains(timestamp)) {
                break (index, timestamp, duration);
            }
        };
        self.counters.frames.fetch_add(1, Ordering::SeqCst);

        let mut buffer = FrameBuffer::new(self.size.width, self.size.height, PixelFormat::Rgba8);
        buffer.fill(SyntheticDecoder::frame_color(index));
        Ok(Some(DecodedFrame {
            buffer: Arc::new(buffer),
            timestamp,
            duration,
        }))
    }
}
