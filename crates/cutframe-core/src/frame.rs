//! Frame buffer types for rasters in CPU memory.
//!
//! Every surface the compositor draws into, every decoded video frame and
//! every rasterized glyph run is a [`FrameBuffer`]. Rows are padded to a
//! 64-byte stride.

use crate::color::Color;
use crate::error::{CutframeError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA, straight alpha (32 bits per pixel)
    #[default]
    Rgba8,
    /// 8-bit coverage / grayscale, used for glyph masks
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    bytes_per_pixel: usize,
}

impl FramePlane {
    /// Create a new zeroed plane with the given dimensions.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        // Align stride to 64 bytes for SIMD friendliness
        let min_stride = (width as usize) * bytes_per_pixel;
        let stride = (min_stride + 63) & !63;
        let data = vec![0u8; stride * height as usize];
        Self {
            data,
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Get a row of pixel data (without padding).
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel;
        &self.data[start..end]
    }

    /// Get a mutable row of pixel data (without padding).
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel;
        &mut self.data[start..end]
    }

    /// Mutable rows, top to bottom.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        let row_bytes = self.width as usize * self.bytes_per_pixel;
        self.data
            .chunks_exact_mut(self.stride.max(1))
            .map(move |row| &mut row[..row_bytes])
    }
}

/// A raster in CPU memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data
    pub plane: FramePlane,
}

impl FrameBuffer {
    /// Create a new zeroed (transparent black) frame buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            width,
            height,
            plane: FramePlane::new(width, height, format.bytes_per_pixel()),
        }
    }

    /// Build an RGBA8 frame from tightly packed pixel data.
    pub fn from_rgba8(width: u32, height: u32, data: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(CutframeError::InvalidParameter(format!(
                "RGBA buffer of {} bytes does not match {}x{} ({} bytes)",
                data.len(),
                width,
                height,
                expected
            )));
        }
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        let row_bytes = width as usize * 4;
        if row_bytes > 0 {
            for (y, src) in data.chunks_exact(row_bytes).enumerate() {
                frame.plane.row_mut(y as u32).copy_from_slice(src);
            }
        }
        Ok(frame)
    }

    /// Tightly packed copy of the pixel data (no row padding).
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            out.extend_from_slice(self.plane.row(y));
        }
        out
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.plane.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reset every pixel to zero (transparent black).
    pub fn clear(&mut self) {
        self.plane.data.fill(0);
    }

    /// Overwrite every pixel with `color` (no blending).
    pub fn fill(&mut self, color: Color) {
        let px = color.to_rgba8();
        let format = self.format;
        for row in self.plane.rows_mut() {
            match format {
                PixelFormat::Rgba8 => {
                    for chunk in row.chunks_exact_mut(4) {
                        chunk.copy_from_slice(&px);
                    }
                }
                PixelFormat::Gray8 => row.fill(px[3]),
            }
        }
    }

    /// Read one RGBA8 pixel. Gray8 frames report the coverage as alpha.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let row = self.plane.row(y);
        match self.format {
            PixelFormat::Rgba8 => {
                let i = x as usize * 4;
                [row[i], row[i + 1], row[i + 2], row[i + 3]]
            }
            PixelFormat::Gray8 => [255, 255, 255, row[x as usize]],
        }
    }

    /// Create a test pattern frame (color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        for y in 0..height {
            let row = frame.plane.row_mut(y);
            for x in 0..width {
                let i = (x * 4) as usize;
                let bar = (x * 8 / width.max(1)) as usize;
                row[i..i + 4].copy_from_slice(&BARS[bar.min(7)]);
            }
        }
        frame
    }
}

/// Arc-wrapped frame buffer for shared ownership.
pub type SharedFrameBuffer = Arc<FrameBuffer>;
