//! Frame compositor: draws the scene as it looks at one timestamp.
//!
//! Per frame: clear, background (fill, gradient, or blurred backdrop), then
//! every active element from the bottom track up. An element that fails to
//! draw is logged and skipped; the rest of the frame still renders.

use cutframe_core::{
    Color, CutframeError, FitMode, FrameBuffer, PixelFormat, Rect, Result, SharedFrameBuffer, Size,
    Transform2D, Vec2,
};
use cutframe_media::{DecodeCache, ImageCache, MediaSource};
use cutframe_timeline::{
    ActiveElement, BackgroundMode, Element, ElementContent, MediaAsset, MediaKind, Scene,
    TextAlign, TextContent,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::blur::gaussian_blur;
use crate::canvas::{draw_image, draw_mask, fill_rect};
use crate::gradient::Fill;
use crate::text::{parse_optional_color, FontSpec, TextRasterizer};

/// Compositor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Padding around a text background box, in canvas pixels
    pub text_padding: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self { text_padding: 8.0 }
    }
}

/// Draws scenes into RGBA8 surfaces.
pub struct Compositor {
    decode_cache: Arc<DecodeCache>,
    images: ImageCache,
    text: Arc<dyn TextRasterizer>,
    config: CompositorConfig,
}

impl Compositor {
    pub fn new(decode_cache: Arc<DecodeCache>, text: Arc<dyn TextRasterizer>) -> Self {
        Self::with_config(decode_cache, text, CompositorConfig::default())
    }

    pub fn with_config(
        decode_cache: Arc<DecodeCache>,
        text: Arc<dyn TextRasterizer>,
        config: CompositorConfig,
    ) -> Self {
        Self {
            decode_cache,
            images: ImageCache::new(),
            text,
            config,
        }
    }

    pub fn decode_cache(&self) -> &Arc<DecodeCache> {
        &self.decode_cache
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn text_rasterizer(&self) -> Arc<dyn TextRasterizer> {
        Arc::clone(&self.text)
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Render the scene at `time` into `surface`, overwriting its contents.
    ///
    /// Only an unusable surface is an error; element failures are logged.
    pub fn render_frame(&self, time: f64, scene: &Scene, surface: &mut FrameBuffer) -> Result<()> {
        if surface.format != PixelFormat::Rgba8 {
            return Err(CutframeError::InvalidParameter(
                "compositor surfaces must be RGBA8".into(),
            ));
        }
        if surface.is_empty() {
            return Err(CutframeError::InvalidParameter(format!(
                "cannot render into a {}x{} surface",
                surface.width, surface.height
            )));
        }

        surface.clear();
        let active = scene.active_elements(time);
        let background = &scene.settings.background;

        match background.mode {
            BackgroundMode::Color => match Fill::parse(&background.color) {
                Ok(fill) => fill.paint(surface),
                Err(e) => tracing::warn!(color = %background.color, error = %e, "Invalid background"),
            },
            BackgroundMode::Blur => {
                if let Err(e) = self.draw_blurred_backdrop(time, scene, &active, surface) {
                    tracing::warn!(error = %e, "Blurred background failed");
                }
            }
        }

        // Topmost track last.
        for item in active.iter().rev() {
            if let Err(e) = self.draw_element(time, scene, item.element, surface) {
                tracing::warn!(
                    element = %item.element.id,
                    kind = item.element.type_name(),
                    track = item.track_index,
                    error = %e,
                    "Element skipped"
                );
            }
        }
        Ok(())
    }

    /// Render into a new surface of `size`.
    pub fn render(&self, time: f64, scene: &Scene, size: Size) -> Result<FrameBuffer> {
        let mut surface = FrameBuffer::new(size.width, size.height, PixelFormat::Rgba8);
        self.render_frame(time, scene, &mut surface)?;
        Ok(surface)
    }

    fn draw_blurred_backdrop(
        &self,
        time: f64,
        scene: &Scene,
        active: &[ActiveElement<'_>],
        surface: &mut FrameBuffer,
    ) -> Result<()> {
        let source = active.iter().find_map(|item| {
            let asset = scene.asset(item.element.media_id()?)?;
            asset.is_visual().then_some((item.element, asset))
        });
        let Some((element, asset)) = source else {
            return Ok(());
        };
        let Some(picture) = self.media_picture(time, element, asset)? else {
            return Ok(());
        };

        let target = Vec2::new(surface.width as f32, surface.height as f32);
        let natural = Vec2::new(picture.width as f32, picture.height as f32);
        let dest = FitMode::Cover.place(natural, target);
        let mut backdrop = FrameBuffer::new(surface.width, surface.height, PixelFormat::Rgba8);
        draw_image(&mut backdrop, &picture, Transform2D::rect_to_rect(natural, dest), 1.0);

        let sigma = scene.settings.background.blur_intensity * self.scale(scene, surface).y;
        gaussian_blur(&mut backdrop, sigma);
        draw_image(surface, &backdrop, Transform2D::IDENTITY, 1.0);
        Ok(())
    }

    fn draw_element(
        &self,
        time: f64,
        scene: &Scene,
        element: &Element,
        surface: &mut FrameBuffer,
    ) -> Result<()> {
        match &element.content {
            ElementContent::Media(media) => {
                let asset = scene.asset(media.media_id).ok_or_else(|| {
                    CutframeError::NotFound(format!("asset {} is not in the scene", media.media_id))
                })?;
                if !asset.is_visual() {
                    return Ok(());
                }
                let Some(picture) = self.media_picture(time, element, asset)? else {
                    tracing::debug!(element = %element.id, time, "No frame available");
                    return Ok(());
                };
                let target = Vec2::new(surface.width as f32, surface.height as f32);
                let natural = Vec2::new(picture.width as f32, picture.height as f32);
                let dest = FitMode::Contain.place(natural, target);
                draw_image(surface, &picture, Transform2D::rect_to_rect(natural, dest), 1.0);
                Ok(())
            }
            ElementContent::Text(text) => self.draw_text(scene, text, surface),
        }
    }

    /// The picture a visual media element shows at timeline `time`.
    fn media_picture(
        &self,
        time: f64,
        element: &Element,
        asset: &MediaAsset,
    ) -> Result<Option<SharedFrameBuffer>> {
        match asset.kind {
            MediaKind::Video => {
                let source = MediaSource {
                    path: asset.path.clone(),
                    size: asset.size(),
                    frame_rate: asset.frame_rate,
                    duration: asset.duration,
                };
                let frame = self
                    .decode_cache
                    .get_frame_at(asset.id, &source, element.source_time_at(time));
                Ok(frame.map(|frame| frame.buffer))
            }
            MediaKind::Image => self.images.get_or_load(asset.id, &asset.path).map(Some),
            MediaKind::Audio => Ok(None),
        }
    }

    fn draw_text(&self, scene: &Scene, text: &TextContent, surface: &mut FrameBuffer) -> Result<()> {
        if text.content.is_empty() {
            return Ok(());
        }
        let scale = self.scale(scene, surface);
        let opacity = text.opacity.clamp(0.0, 1.0);
        let color = Color::parse_css(&text.color)?.with_opacity(opacity);
        let background = parse_optional_color(text.background_color.as_deref())?;

        let font = FontSpec {
            family: text.font_family.clone(),
            weight: text.font_weight,
            style: text.font_style,
            size_px: text.font_size * scale.y,
        };
        let run = self.text.rasterize(&text.content, &font)?;

        let left = match text.text_align {
            TextAlign::Left => 0.0,
            TextAlign::Center => -run.width / 2.0,
            TextAlign::Right => -run.width,
        };
        let top = -run.height() / 2.0;

        let origin = Vec2::new(surface.width as f32, surface.height as f32) / 2.0
            + Vec2::new(text.x * scale.x, text.y * scale.y);
        let placement = Transform2D::translate(origin.x, origin.y)
            .then(Transform2D::rotate(text.rotation.to_radians()));

        if let Some(background) = background {
            let padding = self.config.text_padding * scale.y;
            let rect = Rect::new(left, top, run.width, run.height()).expand(padding);
            fill_rect(surface, rect, placement, background.with_opacity(opacity));
        }
        draw_mask(
            surface,
            &run.mask,
            placement.then(Transform2D::translate(left, top)),
            color,
        );
        Ok(())
    }

    /// Output pixels per canvas pixel, per axis.
    fn scale(&self, scene: &Scene, surface: &FrameBuffer) -> Vec2 {
        let canvas = scene.settings.canvas_size;
        if canvas.is_empty() {
            return Vec2::ONE;
        }
        Vec2::new(
            surface.width as f32 / canvas.width as f32,
            surface.height as f32 / canvas.height as f32,
        )
    }
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("decode_cache", &self.decode_cache)
            .field("config", &self.config)
            .finish()
    }
}
