//! Gaussian blur approximated by three box blurs.

use cutframe_core::{FrameBuffer, PixelFormat};
use rayon::prelude::*;

/// Box widths whose three successive passes approximate a Gaussian of `sigma`.
fn box_sizes(sigma: f32) -> [usize; 3] {
    const PASSES: f32 = 3.0;
    let ideal = (12.0 * sigma * sigma / PASSES + 1.0).sqrt();
    let mut lower = ideal.floor() as usize;
    if lower % 2 == 0 {
        lower = lower.saturating_sub(1);
    }
    let lower = lower.max(1);
    let upper = lower + 2;
    let lf = lower as f32;
    let m = ((12.0 * sigma * sigma - PASSES * lf * lf - 4.0 * PASSES * lf - 3.0 * PASSES)
        / (-4.0 * lf - 4.0))
        .round()
        .max(0.0) as usize;
    let mut sizes = [upper; 3];
    for size in sizes.iter_mut().take(m.min(3)) {
        *size = lower;
    }
    sizes
}

/// One horizontal box pass over every row; edges repeat the border pixel.
fn box_pass(src: &[[f32; 4]], dst: &mut [[f32; 4]], width: usize, radius: usize) {
    if radius == 0 {
        dst.copy_from_slice(src);
        return;
    }
    let window = (2 * radius + 1) as f32;
    dst.par_chunks_mut(width)
        .zip(src.par_chunks(width))
        .for_each(|(out, row)| {
            let last = width - 1;
            let at = |i: isize| row[i.clamp(0, last as isize) as usize];
            let mut acc = [0.0f32; 4];
            for i in -(radius as isize)..=(radius as isize) {
                let px = at(i);
                for c in 0..4 {
                    acc[c] += px[c];
                }
            }
            for (x, slot) in out.iter_mut().enumerate() {
                *slot = [
                    acc[0] / window,
                    acc[1] / window,
                    acc[2] / window,
                    acc[3] / window,
                ];
                let add = at(x as isize + radius as isize + 1);
                let remove = at(x as isize - radius as isize);
                for c in 0..4 {
                    acc[c] += add[c] - remove[c];
                }
            }
        });
}

fn transpose(src: &[[f32; 4]], dst: &mut [[f32; 4]], width: usize, height: usize) {
    dst.par_chunks_mut(height).enumerate().for_each(|(x, column)| {
        for (y, slot) in column.iter_mut().enumerate() {
            *slot = src[y * width + x];
        }
    });
}

/// Blur an RGBA8 frame in place with standard deviation `sigma` pixels.
///
/// Works on premultiplied color so transparent regions do not bleed black.
pub fn gaussian_blur(frame: &mut FrameBuffer, sigma: f32) {
    if frame.format != PixelFormat::Rgba8 || frame.is_empty() || sigma.is_nan() || sigma <= 0.0 {
        return;
    }
    let (width, height) = (frame.width as usize, frame.height as usize);

    let mut a: Vec<[f32; 4]> = Vec::with_capacity(width * height);
    for y in 0..frame.height {
        for px in frame.plane.row(y).chunks_exact(4) {
            let alpha = px[3] as f32 / 255.0;
            a.push([
                px[0] as f32 / 255.0 * alpha,
                px[1] as f32 / 255.0 * alpha,
                px[2] as f32 / 255.0 * alpha,
                alpha,
            ]);
        }
    }
    let mut b = vec![[0.0f32; 4]; width * height];

    for size in box_sizes(sigma) {
        let radius = (size - 1) / 2;
        box_pass(&a, &mut b, width, radius);
        transpose(&b, &mut a, width, height);
        box_pass(&a, &mut b, height, radius);
        transpose(&b, &mut a, height, width);
    }

    for y in 0..height {
        let row = frame.plane.row_mut(y as u32);
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let [r, g, b, alpha] = a[y * width + x];
            if alpha <= 0.0 {
                px.copy_from_slice(&[0, 0, 0, 0]);
                continue;
            }
            let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
            px.copy_from_slice(&[to_u8(r / alpha), to_u8(g / alpha), to_u8(b / alpha), to_u8(alpha)]);
        }
    }
}
