use crate::params::GlowParams;
use rayon::prelude::*;

/// Keep only pixels whose summed RGB intensity exceeds the threshold, scaled
/// by `boost` and clamped.
fn isolate_highlights(
    input: &[f32],
    out: &mut [f32],
    width: usize,
    threshold: f32,
    boost: f32,
    clamp: f32,
) {
    out.par_chunks_mut(64 * width * 4)
        .enumerate()
        .for_each(|(chunk_idx, rows)| {
            let base = chunk_idx * 64 * width * 4;
            for (i, px) in rows.chunks_exact_mut(4).enumerate() {
                let o = base + i * 4;
                let intensity = input[o] + input[o + 1] + input[o + 2] - threshold;
                if intensity > 0.0 {
                    let s = boost * intensity;
                    for c in 0..4 {
                        px[c] = (input[o + c] * s).min(clamp);
                    }
                } else {
                    px.copy_from_slice(&[0.0; 4]);
                }
            }
        });
}

/// Separable blur of the glow map with the quality-scaled kernel.
///
/// When `src` is given, the blurred glow is added onto it (clamped to 1)
/// during the vertical pass.
fn glow_blur(src: Option<&[f32]>, map: &mut [f32], width: usize, height: usize, blur: f32, quality: i32) {
    if blur <= 0.0 {
        return;
    }
    let half_width = ((quality + 1) as f32 * blur) as usize;
    if half_width == 0 {
        return;
    }

    let n = half_width * 2;
    let mut filter = vec![0f32; n];
    let k = -1.0 / (2.0 * std::f32::consts::PI * blur * blur);
    let mut weight = 0.0;
    for ix in 0..half_width {
        weight = (k * (ix * ix) as f32).exp();
        filter[half_width - ix] = weight;
        if half_width + ix < n {
            filter[half_width + ix] = weight;
        }
    }
    filter[0] = weight;
    let sum: f32 = filter.iter().sum();
    for v in &mut filter {
        *v /= sum;
    }

    let mut temp = vec![0f32; map.len()];

    // Blur the rows: read map, write temp.
    temp.par_chunks_mut(32 * width * 4)
        .enumerate()
        .for_each(|(chunk_idx, rows)| {
            let y_start = chunk_idx * 32;
            for (i, px) in rows.chunks_exact_mut(4).enumerate() {
                let y = y_start + i / width;
                let x = i % width;
                let xmin = x.saturating_sub(half_width);
                let xmax = (x + half_width).min(width);
                let mut cur = [0f32; 4];
                for nx in xmin..xmax {
                    let index = nx as i64 - x as i64 + half_width as i64;
                    let w = filter[index as usize];
                    let o = (y * width + nx) * 4;
                    for c in 0..4 {
                        cur[c] += map[o + c] * w;
                    }
                }
                px.copy_from_slice(&cur);
            }
        });

    // Blur the columns: read temp, write map (adding src back if present).
    map.par_chunks_mut(32 * width * 4)
        .enumerate()
        .for_each(|(chunk_idx, rows)| {
            let y_start = chunk_idx * 32;
            for (i, px) in rows.chunks_exact_mut(4).enumerate() {
                let y = y_start + i / width;
                let x = i % width;
                let ymin = y.saturating_sub(half_width);
                let ymax = (y + half_width).min(height);
                let mut cur = [0f32; 4];
                for ny in ymin..ymax {
                    let index = ny as i64 - y as i64 + half_width as i64;
                    let w = filter[index as usize];
                    let o = (ny * width + x) * 4;
                    for c in 0..4 {
                        cur[c] += temp[o + c] * w;
                    }
                }
                if let Some(src) = src {
                    let o = (y * width + x) * 4;
                    for c in 0..4 {
                        cur[c] = (src[o + c] + cur[c]).min(1.0);
                    }
                }
                px.copy_from_slice(&cur);
            }
        });
}

/// Full glow: isolate highlights, blur them, composite onto the input.
///
/// Operates on premultiplied float pixels; `render_scale` rescales the blur
/// distance for reduced-resolution preview renders.
pub(crate) fn glow_frame(
    params: &GlowParams,
    fac: f32,
    render_scale: f32,
    width: usize,
    height: usize,
    input: &[f32],
    out: &mut [f32],
) {
    isolate_highlights(
        input,
        out,
        width,
        params.threshold * 3.0,
        params.boost * fac,
        params.clamp,
    );
    glow_blur(
        if params.no_composite { None } else { Some(input) },
        out,
        width,
        height,
        params.blur_distance * render_scale,
        params.quality,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GlowParams {
        GlowParams::default()
    }

    #[test]
    fn dark_image_produces_no_glow() {
        let (w, h) = (8usize, 8usize);
        let input: Vec<f32> = vec![[0.05f32, 0.05, 0.05, 1.0]; w * h].concat();
        let mut out = vec![0f32; w * h * 4];
        let p = GlowParams {
            no_composite: true,
            ..params()
        };
        glow_frame(&p, 1.0, 1.0, w, h, &input, &mut out);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn bright_spot_glows_into_neighbours() {
        let (w, h) = (16usize, 16usize);
        let mut input = vec![0f32; w * h * 4];
        let center = ((h / 2) * w + w / 2) * 4;
        input[center..center + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        let mut out = vec![0f32; w * h * 4];
        let p = GlowParams {
            no_composite: true,
            ..params()
        };
        glow_frame(&p, 1.0, 1.0, w, h, &input, &mut out);

        let neighbor = ((h / 2) * w + w / 2 + 2) * 4;
        assert!(out[neighbor] > 0.0);
    }

    #[test]
    fn composite_keeps_input_visible() {
        let (w, h) = (8usize, 8usize);
        let input: Vec<f32> = vec![[0.4f32, 0.4, 0.4, 1.0]; w * h].concat();
        let mut out = vec![0f32; w * h * 4];
        glow_frame(&params(), 1.0, 1.0, w, h, &input, &mut out);
        // Every output pixel is at least the input (additive glow).
        for (o, i) in out.iter().zip(input.iter()) {
            assert!(o >= i);
        }
    }

    #[test]
    fn boost_zero_disables_isolation() {
        let (w, h) = (4usize, 4usize);
        let input: Vec<f32> = vec![[1.0f32, 1.0, 1.0, 1.0]; w * h].concat();
        let mut out = vec![0f32; w * h * 4];
        let p = GlowParams {
            boost: 1.0,
            ..params()
        };
        glow_frame(&p, 0.0, 1.0, w, h, &input, &mut out);
        // fac scales boost; with fac 0 nothing is isolated, composite returns input.
        for (o, i) in out.iter().zip(input.iter()) {
            assert!((o - i).abs() < 1e-5);
        }
    }
}
