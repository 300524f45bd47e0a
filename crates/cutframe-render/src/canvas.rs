//! CPU raster operations on RGBA8 surfaces.
//!
//! Everything the compositor draws goes through [`paint`]: for each surface
//! pixel inside the destination bounds, the pixel center is mapped back into
//! source space and the sampled color is blended source-over.

use bytemuck::cast_slice_mut;
use cutframe_core::{Color, FrameBuffer, PixelFormat, Rect, Transform2D, Vec2};
use rayon::prelude::*;

/// Surfaces smaller than this many pixels are painted on the calling thread.
const PARALLEL_THRESHOLD: usize = 64 * 64;

/// Source-over blend of a straight-alpha color onto a straight-alpha pixel.
#[inline]
pub fn blend_over(dst: &mut [u8; 4], src: [f32; 4]) {
    let sa = src[3].clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        *dst = [0, 0, 0, 0];
        return;
    }
    let keep = da * (1.0 - sa);
    for c in 0..3 {
        let value = (src[c] * sa + (dst[c] as f32 / 255.0) * keep) / out_a;
        dst[c] = (value * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Blend `sample(source_point)` over every surface pixel covered by `bounds`.
///
/// `to_surface` maps source space onto the surface; `sample` returns a
/// straight-alpha color in 0..1, or `None` where the source has no pixel.
pub fn paint<F>(surface: &mut FrameBuffer, bounds: Rect, to_surface: Transform2D, sample: F)
where
    F: Fn(Vec2) -> Option<[f32; 4]> + Sync,
{
    if surface.format != PixelFormat::Rgba8 || surface.is_empty() || to_surface.is_degenerate() {
        return;
    }
    let canvas = Rect::new(0.0, 0.0, surface.width as f32, surface.height as f32);
    let Some(clip) = bounds.transformed_bounds(to_surface).intersection(canvas) else {
        return;
    };

    let to_source = to_surface.inverse();
    let x0 = clip.x.floor().max(0.0) as usize;
    let x1 = (clip.x + clip.width).ceil().min(surface.width as f32) as usize;
    let y0 = clip.y.floor().max(0.0) as usize;
    let y1 = (clip.y + clip.height).ceil().min(surface.height as f32) as usize;
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let width = surface.width as usize;
    let stride = surface.plane.stride;
    let paint_row = |(y, row): (usize, &mut [u8])| {
        let pixels: &mut [[u8; 4]] = cast_slice_mut(&mut row[..width * 4]);
        for (x, px) in pixels.iter_mut().enumerate().take(x1).skip(x0) {
            let center = Vec2::new(x as f32 + 0.5, (y0 + y) as f32 + 0.5);
            if let Some(color) = sample(to_source.transform_point(center)) {
                blend_over(px, color);
            }
        }
    };

    let rows = &mut surface.plane.data[y0 * stride..y1 * stride];
    if (x1 - x0) * (y1 - y0) >= PARALLEL_THRESHOLD {
        rows.par_chunks_mut(stride).enumerate().for_each(paint_row);
    } else {
        rows.chunks_mut(stride).enumerate().for_each(paint_row);
    }
}

/// Bilinear sample of an RGBA8 image at a point in pixel space (pixel
/// centers at `n + 0.5`). Returns `None` outside the image.
#[inline]
pub fn sample_bilinear(image: &FrameBuffer, point: Vec2) -> Option<[f32; 4]> {
    let (w, h) = (image.width as f32, image.height as f32);
    if point.x < 0.0 || point.y < 0.0 || point.x >= w || point.y >= h {
        return None;
    }
    let fx = point.x - 0.5;
    let fy = point.y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;

    let max_x = image.width as i64 - 1;
    let max_y = image.height as i64 - 1;
    let xa = (x0 as i64).clamp(0, max_x) as u32;
    let xb = (x0 as i64 + 1).clamp(0, max_x) as u32;
    let ya = (y0 as i64).clamp(0, max_y) as u32;
    let yb = (y0 as i64 + 1).clamp(0, max_y) as u32;

    let taps = [
        (image.pixel(xa, ya), (1.0 - tx) * (1.0 - ty)),
        (image.pixel(xb, ya), tx * (1.0 - ty)),
        (image.pixel(xa, yb), (1.0 - tx) * ty),
        (image.pixel(xb, yb), tx * ty),
    ];

    // Interpolate premultiplied so transparent neighbours do not darken edges.
    let mut acc = [0.0f32; 4];
    for (px, weight) in taps {
        let a = px[3] as f32 / 255.0 * weight;
        acc[0] += px[0] as f32 / 255.0 * a;
        acc[1] += px[1] as f32 / 255.0 * a;
        acc[2] += px[2] as f32 / 255.0 * a;
        acc[3] += a;
    }
    if acc[3] <= 0.0 {
        return Some([0.0; 4]);
    }
    Some([acc[0] / acc[3], acc[1] / acc[3], acc[2] / acc[3], acc[3]])
}

/// Draw an RGBA8 image through `transform` (image pixels to surface pixels).
pub fn draw_image(surface: &mut FrameBuffer, image: &FrameBuffer, transform: Transform2D, opacity: f32) {
    if image.is_empty() || opacity <= 0.0 {
        return;
    }
    let bounds = Rect::new(0.0, 0.0, image.width as f32, image.height as f32);
    paint(surface, bounds, transform, |p| {
        sample_bilinear(image, p).map(|mut c| {
            c[3] *= opacity;
            c
        })
    });
}

/// Draw a coverage mask (Gray8) tinted with `color`.
pub fn draw_mask(surface: &mut FrameBuffer, mask: &FrameBuffer, transform: Transform2D, color: Color) {
    if mask.is_empty() || color.a <= 0.0 {
        return;
    }
    let bounds = Rect::new(0.0, 0.0, mask.width as f32, mask.height as f32);
    paint(surface, bounds, transform, |p| {
        let coverage = sample_bilinear(mask, p)?[3];
        (coverage > 0.0).then_some([color.r, color.g, color.b, color.a * coverage])
    });
}

/// Fill `rect` (in the space `transform` maps from) with `color`.
pub fn fill_rect(surface: &mut FrameBuffer, rect: Rect, transform: Transform2D, color: Color) {
    if color.a <= 0.0 {
        return;
    }
    let rgba = [color.r, color.g, color.b, color.a];
    paint(surface, rect, transform, |p| rect.contains(p).then_some(rgba));
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutframe_core::FitMode;

    fn solid(w: u32, h: u32, color: Color) -> FrameBuffer {
        let mut frame = FrameBuffer::new(w, h, PixelFormat::Rgba8);
        frame.fill(color);
        frame
    }

    #[test]
    fn test_blend_over_opaque_replaces() {
        let mut px = [10, 20, 30, 255];
        blend_over(&mut px, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(px, [255, 0, 0, 255]);
    }

    #[test]
    fn test_blend_over_half_alpha() {
        let mut px = [0, 0, 0, 255];
        blend_over(&mut px, [1.0, 1.0, 1.0, 0.5]);
        assert_eq!(px, [128, 128, 128, 255]);
    }

    #[test]
    fn test_blend_onto_transparent_keeps_color() {
        let mut px = [0, 0, 0, 0];
        blend_over(&mut px, [0.0, 0.0, 1.0, 0.5]);
        assert_eq!(px, [0, 0, 255, 128]);
    }

    #[test]
    fn test_identity_blit_is_exact() {
        let image = FrameBuffer::test_pattern(16, 8);
        let mut surface = FrameBuffer::new(16, 8, PixelFormat::Rgba8);
        draw_image(&mut surface, &image, Transform2D::IDENTITY, 1.0);
        assert_eq!(surface, image);
    }

    #[test]
    fn test_contain_fit_letterboxes() {
        let image = solid(4, 4, Color::RED);
        let mut surface = FrameBuffer::new(32, 16, PixelFormat::Rgba8);
        let dest = FitMode::Contain.place(Vec2::new(4.0, 4.0), Vec2::new(32.0, 16.0));
        draw_image(&mut surface, &image, Transform2D::rect_to_rect(Vec2::new(4.0, 4.0), dest), 1.0);
        assert_eq!(surface.pixel(16, 8), [255, 0, 0, 255]);
        assert_eq!(surface.pixel(2, 8), [0, 0, 0, 0]);
        assert_eq!(surface.pixel(29, 8), [0, 0, 0, 0]);
    }

    #[test]
    fn test_mask_is_tinted() {
        let mut mask = FrameBuffer::new(4, 4, PixelFormat::Gray8);
        mask.fill(Color::WHITE);
        let mut surface = solid(8, 8, Color::BLACK);
        draw_mask(&mut surface, &mask, Transform2D::translate(2.0, 2.0), Color::GREEN);
        assert_eq!(surface.pixel(3, 3), [0, 255, 0, 255]);
        assert_eq!(surface.pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn test_fill_rect_rotated_stays_inside_bounds() {
        let mut surface = FrameBuffer::new(20, 20, PixelFormat::Rgba8);
        let rect = Rect::new(-5.0, -5.0, 10.0, 10.0);
        let transform = Transform2D::translate(10.0, 10.0).then(Transform2D::rotate(0.3));
        fill_rect(&mut surface, rect, transform, Color::BLUE);
        assert_eq!(surface.pixel(10, 10), [0, 0, 255, 255]);
        assert_eq!(surface.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_large_paint_matches_small_path() {
        let image = FrameBuffer::test_pattern(64, 64);
        let mut surface = FrameBuffer::new(128, 128, PixelFormat::Rgba8);
        draw_image(&mut surface, &image, Transform2D::scale(2.0, 2.0), 1.0);
        let mut again = FrameBuffer::new(128, 128, PixelFormat::Rgba8);
        draw_image(&mut again, &image, Transform2D::scale(2.0, 2.0), 1.0);
        assert_eq!(surface, again);
        assert_eq!(surface.pixel(1, 1), image.pixel(0, 0));
    }
}
