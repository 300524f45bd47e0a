//! Text measurement and rasterization.
//!
//! The compositor asks a [`TextRasterizer`] for a coverage mask of a single
//! line; [`FontBook`] does this with fontdue from registered font files.

use cutframe_core::{Color, CutframeError, FrameBuffer, PixelFormat, Result};
use cutframe_timeline::{FontStyle, FontWeight};
use fontdue::{Font, FontSettings};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Font selection for one text run, sized in surface pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub size_px: f32,
}

impl FontSpec {
    /// CSS-like shorthand, e.g. `italic bold 32px Inter`.
    pub fn css(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        if self.style == FontStyle::Italic {
            parts.push("italic".to_string());
        }
        if self.weight == FontWeight::Bold {
            parts.push("bold".to_string());
        }
        parts.push(format!("{}px", self.size_px));
        parts.push(self.family.clone());
        parts.join(" ")
    }
}

/// A rasterized line of text.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Gray8 coverage, `ceil(width)` by `ceil(ascent + descent)` pixels
    pub mask: FrameBuffer,
    /// Advance width of the whole line
    pub width: f32,
    /// Distance from the top of the mask to the baseline
    pub ascent: f32,
    /// Distance from the baseline to the bottom of the mask
    pub descent: f32,
}

impl TextRun {
    #[inline]
    pub fn height(&self) -> f32 {
        self.ascent + self.descent
    }
}

pub trait TextRasterizer: Send + Sync {
    /// Measure and rasterize `text` as a single line.
    fn rasterize(&self, text: &str, font: &FontSpec) -> Result<TextRun>;
}

// ── fontdue ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FaceKey {
    family: String,
    bold: bool,
    italic: bool,
}

impl FaceKey {
    fn new(family: &str, weight: FontWeight, style: FontStyle) -> Self {
        Self {
            family: family.trim().to_ascii_lowercase(),
            bold: weight == FontWeight::Bold,
            italic: style == FontStyle::Italic,
        }
    }
}

/// Registered font faces, looked up by family, weight and style.
///
/// Lookup falls back to any face of the same family, then to the first face
/// registered.
#[derive(Default)]
pub struct FontBook {
    faces: RwLock<Faces>,
}

#[derive(Default)]
struct Faces {
    by_key: HashMap<FaceKey, Arc<Font>>,
    order: Vec<FaceKey>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a face from font file bytes (TTF/OTF).
    pub fn register(
        &self,
        family: &str,
        weight: FontWeight,
        style: FontStyle,
        bytes: &[u8],
    ) -> Result<()> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| CutframeError::Parse(format!("Failed to load font '{family}': {e}")))?;
        let key = FaceKey::new(family, weight, style);
        let mut faces = self.faces.write();
        if faces.by_key.insert(key.clone(), Arc::new(font)).is_none() {
            faces.order.push(key);
        }
        tracing::debug!(family, ?weight, ?style, "Font registered");
        Ok(())
    }

    /// Register a face from a font file.
    pub fn register_file(
        &self,
        family: &str,
        weight: FontWeight,
        style: FontStyle,
        path: &Path,
    ) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.register(family, weight, style, &bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.faces.read().order.is_empty()
    }

    fn lookup(&self, spec: &FontSpec) -> Option<Arc<Font>> {
        let faces = self.faces.read();
        let key = FaceKey::new(&spec.family, spec.weight, spec.style);
        if let Some(font) = faces.by_key.get(&key) {
            return Some(Arc::clone(font));
        }
        let same_family = faces
            .order
            .iter()
            .find(|candidate| candidate.family == key.family);
        same_family
            .or(faces.order.first())
            .and_then(|candidate| faces.by_key.get(candidate))
            .cloned()
    }
}

impl TextRasterizer for FontBook {
    fn rasterize(&self, text: &str, spec: &FontSpec) -> Result<TextRun> {
        let font = self.lookup(spec).ok_or_else(|| {
            CutframeError::NotFound(format!("no font available for {}", spec.css()))
        })?;
        let px = spec.size_px;
        let line = font
            .horizontal_line_metrics(px)
            .ok_or_else(|| CutframeError::Render(format!("font for {} has no horizontal metrics", spec.css())))?;
        let ascent = line.ascent.ceil();
        let descent = (-line.descent).ceil().max(0.0);

        // Layout: pen positions per glyph, with kerning.
        let mut glyphs = Vec::new();
        let mut pen = 0.0f32;
        let mut previous = None;
        for ch in text.chars().map(|c| if c.is_control() { ' ' } else { c }) {
            if let Some(prev) = previous {
                pen += font.horizontal_kern(prev, ch, px).unwrap_or(0.0);
            }
            glyphs.push((ch, pen));
            pen += font.metrics(ch, px).advance_width;
            previous = Some(ch);
        }

        let width = pen.max(0.0);
        let mut mask = FrameBuffer::new(
            width.ceil() as u32,
            (ascent + descent) as u32,
            PixelFormat::Gray8,
        );
        for (ch, x) in glyphs {
            let (metrics, bitmap) = font.rasterize(ch, px);
            let left = x.round() as i32 + metrics.xmin;
            let top = ascent as i32 - (metrics.height as i32 + metrics.ymin);
            for gy in 0..metrics.height {
                let y = top + gy as i32;
                if y < 0 || y >= mask.height as i32 {
                    continue;
                }
                let row = mask.plane.row_mut(y as u32);
                for gx in 0..metrics.width {
                    let x = left + gx as i32;
                    if x < 0 || x >= row.len() as i32 {
                        continue;
                    }
                    let coverage = bitmap[gy * metrics.width + gx];
                    let slot = &mut row[x as usize];
                    *slot = (*slot).max(coverage);
                }
            }
        }

        Ok(TextRun {
            mask,
            width,
            ascent,
            descent,
        })
    }
}

// ── Block glyphs ────────────────────────────────────────────────

/// Draws every non-space character as a solid block.
///
/// Needs no font files; layout matches a monospace face whose advance is
/// `advance_ratio` of the font size.
#[derive(Debug, Clone, Copy)]
pub struct BlockRasterizer {
    pub advance_ratio: f32,
}

impl Default for BlockRasterizer {
    fn default() -> Self {
        Self { advance_ratio: 0.6 }
    }
}

impl TextRasterizer for BlockRasterizer {
    fn rasterize(&self, text: &str, spec: &FontSpec) -> Result<TextRun> {
        let advance = (spec.size_px * self.advance_ratio).round().max(1.0);
        let ascent = (spec.size_px * 0.8).round();
        let descent = (spec.size_px * 0.2).round();
        let chars: Vec<char> = text.chars().collect();
        let width = advance * chars.len() as f32;

        let mut mask = FrameBuffer::new(width as u32, (ascent + descent) as u32, PixelFormat::Gray8);
        let glyph = advance as usize;
        for y in 0..mask.height {
            let row = mask.plane.row_mut(y);
            for (i, ch) in chars.iter().enumerate() {
                if !ch.is_whitespace() {
                    row[i * glyph..(i + 1) * glyph].fill(255);
                }
            }
        }
        Ok(TextRun {
            mask,
            width,
            ascent,
            descent,
        })
    }
}

/// Parse an optional CSS color, treating `None` and `transparent` alike.
pub(crate) fn parse_optional_color(value: Option<&str>) -> Result<Option<Color>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(css) => {
            let color = Color::parse_css(css)?;
            Ok((!color.is_transparent()).then_some(color))
        }
    }
}
