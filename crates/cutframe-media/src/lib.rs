//! Cutframe Media - decoding and encoding around the compositor
//!
//! This crate handles:
//! - Video decoding (ffmpeg subprocess, or synthetic frames for tests)
//! - Per-asset decode sessions with forward-scan/seek selection
//! - Still image loading
//! - Encoding sinks and export presets

pub mod decode_cache;
pub mod decoder;
pub mod export;
pub mod ffmpeg;
pub mod image_cache;

pub use decode_cache::{DecodeCache, DecodeConfig, DecodeStats};
pub use decoder::{
    DecodeCounters, DecodedFrame, FrameStream, MediaSource, SyntheticDecoder, VideoDecoder,
    VideoSource,
};
pub use export::{
    CapturedFrame, EncodeSettings, EncodingSink, ExportCancel, ExportFormat, ExportProgress,
    ExportQuality, FfmpegSink, MemorySink,
};
pub use ffmpeg::FfmpegDecoder;
pub use image_cache::{load_image, ImageCache};
