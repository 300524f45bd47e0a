//! Encoding sinks for rendered frames.
//!
//! The export sequencer hands every composited frame to an [`EncodingSink`].
//! [`FfmpegSink`] pipes raw RGBA into an ffmpeg subprocess; [`MemorySink`]
//! keeps frames in memory.

use cutframe_core::{CutframeError, FrameBuffer, FrameRate, RationalTime, Result, Size};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ── Format presets ──────────────────────────────────────────────

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Mp4,
    WebM,
}

impl ExportFormat {
    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::Mp4 => "libx264",
            Self::WebM => "libvpx-vp9",
        }
    }

    /// File extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::WebM => "webm",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::WebM => "video/webm",
        }
    }
}

/// Export quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportQuality {
    Low,
    Medium,
    #[default]
    High,
    VeryHigh,
}

impl ExportQuality {
    /// Target video bitrate in kbps for a 1080p frame.
    fn base_bitrate_kbps(self) -> u32 {
        match self {
            Self::Low => 2_000,
            Self::Medium => 5_000,
            Self::High => 10_000,
            Self::VeryHigh => 20_000,
        }
    }

    /// Target video bitrate in kbps, scaled by pixel count relative to 1080p.
    pub fn bitrate_kbps(self, size: Size) -> u32 {
        let pixels = size.width as f64 * size.height as f64;
        let factor = (pixels / (1920.0 * 1080.0)).max(0.05);
        (self.base_bitrate_kbps() as f64 * factor).round() as u32
    }
}

/// Everything an encoder needs to know before the first frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeSettings {
    pub format: ExportFormat,
    pub quality: ExportQuality,
    pub size: Size,
    pub frame_rate: FrameRate,
}

impl EncodeSettings {
    /// Bytes in one tightly packed RGBA frame.
    pub fn frame_bytes(&self) -> usize {
        self.size.width as usize * self.size.height as usize * 4
    }

    /// FFmpeg arguments reading raw frames from stdin and writing `output`.
    pub fn ffmpeg_args(&self, output: &Path) -> Vec<String> {
        let mut args = Vec::new();

        // Input from pipe (raw frames)
        args.extend_from_slice(&[
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            "rgba".into(),
            "-video_size".into(),
            format!("{}x{}", self.size.width, self.size.height),
            "-framerate".into(),
            format!(
                "{}/{}",
                self.frame_rate.numerator, self.frame_rate.denominator
            ),
            "-i".into(),
            "pipe:0".into(),
        ]);

        args.extend_from_slice(&["-c:v".into(), self.format.ffmpeg_encoder().into()]);
        args.extend_from_slice(&[
            "-b:v".into(),
            format!("{}k", self.quality.bitrate_kbps(self.size)),
        ]);

        // Transparent pixels only survive in VP9
        let pix_fmt = match self.format {
            ExportFormat::Mp4 => "yuv420p",
            ExportFormat::WebM => "yuva420p",
        };
        args.extend_from_slice(&["-pix_fmt".into(), pix_fmt.into()]);
        if self.format == ExportFormat::Mp4 {
            args.extend_from_slice(&["-movflags".into(), "+faststart".into()]);
        }

        args.push(output.to_string_lossy().into_owned());
        args
    }
}

// ── Progress and cancellation ───────────────────────────────────

/// Export progress information.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Frames handed to the sink so far.
    pub current_frame: u64,
    /// Total frames to render.
    pub total_frames: u64,
    /// Estimated time remaining in seconds.
    pub eta_seconds: f64,
    /// Frames per second (render + encode speed).
    pub fps: f64,
}

impl ExportProgress {
    /// Completion fraction (0.0 to 1.0).
    pub fn fraction(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.current_frame as f64 / self.total_frames as f64
    }
}

/// Handle for cancelling an in-progress export.
#[derive(Debug, Clone)]
pub struct ExportCancel(Arc<AtomicBool>);

impl ExportCancel {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for ExportCancel {
    fn default() -> Self {
        Self::new()
    }
}

// ── Sinks ───────────────────────────────────────────────────────

/// Destination for rendered frames.
///
/// Call order is `start`, any number of `add`, `close`, `finalize`.
/// `cancel` may be called at any point after `start` and ends the session.
pub trait EncodingSink: Send {
    fn start(&mut self, settings: &EncodeSettings) -> Result<()>;

    /// Append one frame presented at `time` for `duration`.
    fn add(&mut self, frame: &FrameBuffer, time: RationalTime, duration: RationalTime) -> Result<()>;

    /// No more frames will follow.
    fn close(&mut self) -> Result<()>;

    /// The finished output.
    fn finalize(&mut self) -> Result<Vec<u8>>;

    /// Abandon the output and release encoder resources.
    fn cancel(&mut self);
}

/// A frame captured by [`MemorySink`].
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub time: RationalTime,
    pub duration: RationalTime,
    pub frame: FrameBuffer,
}

/// Keeps every frame in memory. `finalize` returns the raw RGBA stream.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub settings: Option<EncodeSettings>,
    pub frames: Vec<CapturedFrame>,
    pub closed: bool,
    pub cancelled: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EncodingSink for MemorySink {
    fn start(&mut self, settings: &EncodeSettings) -> Result<()> {
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn add(&mut self, frame: &FrameBuffer, time: RationalTime, duration: RationalTime) -> Result<()> {
        if self.settings.is_none() {
            return Err(CutframeError::Encoder("frame added before start".into()));
        }
        self.frames.push(CapturedFrame {
            time,
            duration,
            frame: frame.clone(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        if !self.closed {
            return Err(CutframeError::Encoder("finalize called before close".into()));
        }
        Ok(self
            .frames
            .iter()
            .flat_map(|captured| captured.frame.to_packed())
            .collect())
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }
}

/// Encodes through an `ffmpeg` subprocess writing to `output_path`.
///
/// `finalize` reads the finished file back.
pub struct FfmpegSink {
    output_path: PathBuf,
    ffmpeg: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    settings: Option<EncodeSettings>,
}

impl FfmpegSink {
    /// Sink writing to `output_path`, using the first `ffmpeg` on `PATH`.
    pub fn new(output_path: impl Into<PathBuf>) -> Result<Self> {
        let ffmpeg = which::which("ffmpeg")
            .map_err(|e| CutframeError::Encoder(format!("ffmpeg not found: {e}")))?;
        Ok(Self::with_binary(output_path, ffmpeg))
    }

    pub fn with_binary(output_path: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            ffmpeg: ffmpeg.into(),
            child: None,
            stdin: None,
            settings: None,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl EncodingSink for FfmpegSink {
    fn start(&mut self, settings: &EncodeSettings) -> Result<()> {
        let args = settings.ffmpeg_args(&self.output_path);
        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CutframeError::Encoder(format!("Failed to spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CutframeError::Encoder("Failed to open ffmpeg stdin".into()))?;

        tracing::info!(
            output = %self.output_path.display(),
            encoder = settings.format.ffmpeg_encoder(),
            "Encoder started"
        );
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn add(&mut self, frame: &FrameBuffer, _time: RationalTime, _duration: RationalTime) -> Result<()> {
        let (Some(stdin), Some(settings)) = (self.stdin.as_mut(), self.settings.as_ref()) else {
            return Err(CutframeError::Encoder("frame added to an idle encoder".into()));
        };
        if frame.width != settings.size.width || frame.height != settings.size.height {
            return Err(CutframeError::Encoder(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width, frame.height, settings.size.width, settings.size.height
            )));
        }
        // Rows are padded in memory; ffmpeg wants them packed.
        for y in 0..frame.height {
            stdin
                .write_all(frame.plane.row(y))
                .map_err(|e| CutframeError::Encoder(format!("Failed to write frame: {e}")))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Close stdin to signal end-of-stream
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| CutframeError::Encoder(format!("Failed to wait for ffmpeg: {e}")))?;

        if !status.success() {
            return Err(CutframeError::Encoder(format!(
                "ffmpeg exited with status: {}",
                status
            )));
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        let bytes = std::fs::read(&self.output_path)?;
        tracing::info!(output = %self.output_path.display(), bytes = bytes.len(), "Export written");
        Ok(bytes)
    }

    fn cancel(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = std::fs::remove_file(&self.output_path);
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
