use crate::effects::pixel::PixelLayer;
use rayon::prelude::*;
use smallvec::SmallVec;

/// Normalized 1D Gaussian of `2 * size + 1` taps sampled at `i / rad`.
///
/// Kernels are usually small; they stay on the stack up to radius 16.
pub(crate) fn make_gaussian_kernel(rad: f32, size: usize) -> SmallVec<[f32; 33]> {
    let n = 2 * size + 1;
    let mut kernel = SmallVec::with_capacity(n);
    let fac = if rad > 0.0 { 1.0 / rad } else { 0.0 };

    let mut sum = 0.0f32;
    for i in -(size as i32)..=(size as i32) {
        let x = i as f32 * fac;
        let val = (-2.0 * x * x).exp();
        sum += val;
        kernel.push(val);
    }

    let inv_sum = 1.0 / sum;
    for v in &mut kernel {
        *v *= inv_sum;
    }
    kernel
}

/// Horizontal pass over rows `start_line..start_line+lines`.
///
/// Taps are clamped to the row and the accumulated weight renormalized, so
/// edge pixels do not darken.
pub(crate) fn gaussian_blur_x<T: PixelLayer>(
    kernel: &[f32],
    half_size: usize,
    width: usize,
    start_line: usize,
    lines: usize,
    src: &[T],
    dst: &mut [T],
) {
    let half = half_size as i64;
    for yi in 0..lines {
        let y = start_line + yi;
        for x in 0..width {
            let mut accum = [0f32; 4];
            let mut accum_weight = 0f32;

            let xmin = (x as i64 - half).max(0) as usize;
            let xmax = (x as i64 + half).min(width as i64 - 1) as usize;
            for nx in xmin..=xmax {
                let index = (nx as i64 - x as i64 + half) as usize;
                let weight = kernel[index];
                let o = (y * width + nx) * 4;
                for c in 0..4 {
                    accum[c] += src[o + c].to_unit() * weight;
                }
                accum_weight += weight;
            }

            let inv = 1.0 / accum_weight;
            let o = (yi * width + x) * 4;
            for c in 0..4 {
                dst[o + c] = T::from_unit(accum[c] * inv);
            }
        }
    }
}

/// Vertical pass; taps clamp against the full frame height.
pub(crate) fn gaussian_blur_y<T: PixelLayer>(
    kernel: &[f32],
    half_size: usize,
    width: usize,
    frame_height: usize,
    start_line: usize,
    lines: usize,
    src: &[T],
    dst: &mut [T],
) {
    let half = half_size as i64;
    for yi in 0..lines {
        let y = start_line + yi;
        for x in 0..width {
            let mut accum = [0f32; 4];
            let mut accum_weight = 0f32;

            let ymin = (y as i64 - half).max(0) as usize;
            let ymax = (y as i64 + half).min(frame_height as i64 - 1) as usize;
            for ny in ymin..=ymax {
                let index = (ny as i64 - y as i64 + half) as usize;
                let weight = kernel[index];
                let o = (ny * width + x) * 4;
                for c in 0..4 {
                    accum[c] += src[o + c].to_unit() * weight;
                }
                accum_weight += weight;
            }

            let inv = 1.0 / accum_weight;
            let o = (yi * width + x) * 4;
            for c in 0..4 {
                dst[o + c] = T::from_unit(accum[c] * inv);
            }
        }
    }
}

const BLUR_ROWS_PER_CHUNK: usize = 32;

/// Separable two-pass Gaussian blur with independent x/y radii.
///
/// The horizontal result is fully materialized before the vertical pass
/// starts; each pass runs parallel over row ranges.
pub(crate) fn gaussian_blur_frame<T: PixelLayer + Default>(
    size_x: f32,
    size_y: f32,
    width: usize,
    height: usize,
    src: &[T],
    dst: &mut [T],
) {
    let half_x = (size_x + 0.5) as usize;
    let half_y = (size_y + 0.5) as usize;
    let kernel_x = make_gaussian_kernel(size_x, half_x);
    let kernel_y = make_gaussian_kernel(size_y, half_y);

    let mut tmp = vec![T::default(); src.len()];
    let chunk = BLUR_ROWS_PER_CHUNK * width * 4;

    tmp.par_chunks_mut(chunk).enumerate().for_each(|(i, rows)| {
        let start = i * BLUR_ROWS_PER_CHUNK;
        let lines = rows.len() / (width * 4);
        gaussian_blur_x(&kernel_x, half_x, width, start, lines, src, rows);
    });

    dst.par_chunks_mut(chunk).enumerate().for_each(|(i, rows)| {
        let start = i * BLUR_ROWS_PER_CHUNK;
        let lines = rows.len() / (width * 4);
        gaussian_blur_y(&kernel_y, half_y, width, height, start, lines, &tmp, rows);
    });
}
