//! Video decoding through an ffmpeg subprocess.
//!
//! Each stream is one `ffmpeg` process seeking to the requested time and
//! writing raw RGBA frames, scaled to the asset's natural size, to stdout.

use cutframe_core::{CutframeError, FrameBuffer, FrameRate, Result, Size};
use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::{ffmpeg_is_installed, FfmpegCommand};
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::process::ChildStdout;
use std::sync::Arc;

use crate::decoder::{
    frame_index_at, frame_slot, DecodedFrame, FrameStream, MediaSource, VideoDecoder, VideoSource,
};

/// Decoder backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    /// Rate used when the asset does not report one
    pub default_frame_rate: FrameRate,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self {
            default_frame_rate: FrameRate::FPS_30,
        }
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, source: &MediaSource) -> Result<Box<dyn VideoSource>> {
        if !ffmpeg_is_installed() {
            return Err(CutframeError::Decoder("ffmpeg binary not found".into()));
        }
        if !source.path.is_file() {
            return Err(CutframeError::NotFound(format!(
                "video file not found: {}",
                source.path.display()
            )));
        }
        if source.size.is_empty() {
            return Err(CutframeError::UnsupportedFormat(format!(
                "{} has no known frame size",
                source.path.display()
            )));
        }

        let frame_rate = source
            .frame_rate
            .filter(|rate| rate.is_valid())
            .unwrap_or(self.default_frame_rate);
        tracing::info!(
            path = %source.path.display(),
            width = source.size.width,
            height = source.size.height,
            fps = frame_rate.to_fps_f64(),
            "Opened video source"
        );

        Ok(Box::new(FfmpegSource {
            path: source.path.clone(),
            size: source.size,
            frame_rate,
        }))
    }
}

struct FfmpegSource {
    path: PathBuf,
    size: Size,
    frame_rate: FrameRate,
}

impl VideoSource for FfmpegSource {
    fn frames_from(&mut self, start: f64) -> Result<Box<dyn FrameStream>> {
        // Snap to the frame grid so windows line up across seeks.
        let first_index = frame_index_at(start, self.frame_rate);
        let (seek, _) = frame_slot(first_index, self.frame_rate);

        let seek_arg = format!("{seek:.6}");
        let scale = format!("scale={}:{}", self.size.width, self.size.height);
        let rate = format!("{}/{}", self.frame_rate.numerator, self.frame_rate.denominator);

        let mut child = FfmpegCommand::new()
            .hide_banner()
            .args(["-loglevel", "error", "-nostats"])
            .args(["-ss", seek_arg.as_str()])
            .input(&self.path)
            .args([
                "-an",
                "-vf",
                scale.as_str(),
                "-r",
                rate.as_str(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
            ])
            .output("-")
            .spawn()
            .map_err(|e| CutframeError::Decoder(format!("Failed to spawn ffmpeg: {e}")))?;

        let stdout = child
            .take_stdout()
            .ok_or_else(|| CutframeError::Decoder("Failed to open ffmpeg stdout".into()))?;

        tracing::debug!(path = %self.path.display(), seek, "Started decode stream");

        Ok(Box::new(FfmpegStream {
            child,
            stdout,
            size: self.size,
            frame_rate: self.frame_rate,
            next_index: first_index,
            scratch: vec![0u8; self.size.width as usize * self.size.height as usize * 4],
        }))
    }
}

struct FfmpegStream {
    child: FfmpegChild,
    stdout: ChildStdout,
    size: Size,
    frame_rate: FrameRate,
    next_index: u64,
    scratch: Vec<u8>,
}

impl FrameStream for FfmpegStream {
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        match self.stdout.read_exact(&mut self.scratch) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(CutframeError::Decoder(format!("Failed to read frame: {e}"))),
        }

        let index = self.next_index;
        self.next_index += 1;
        let buffer = FrameBuffer::from_rgba8(self.size.width, self.size.height, &self.scratch)?;
        let (timestamp, duration) = frame_slot(index, self.frame_rate);
        Ok(Some(DecodedFrame {
            buffer: Arc::new(buffer),
            timestamp,
            duration,
        }))
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
