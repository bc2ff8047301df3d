use crate::effects::BlendMode;
use crate::effects::pixel::PixelLayer;
use crate::foundation::math::{hsv_to_rgb, rgb_to_hsv};

/// Apply a named blend mode.
///
/// The factor reaches the blend only through src2's alpha, and the destination
/// alpha is forced to src1's: blend modes change color, never opacity.
pub(crate) fn apply_blend<T: PixelLayer>(
    mode: BlendMode,
    fac: f32,
    src1: &[T],
    src2: &[T],
    dst: &mut [T],
) {
    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        let t = (px2[3].to_unit() * fac).clamp(0.0, 1.0);
        let a = [px1[0].to_unit(), px1[1].to_unit(), px1[2].to_unit()];
        let b = [px2[0].to_unit(), px2[1].to_unit(), px2[2].to_unit()];
        let blended = blend_pixel(mode, a, b);
        for c in 0..3 {
            out[c] = T::from_unit((1.0 - t) * a[c] + t * blended[c]);
        }
        out[3] = px1[3];
    }
}

/// Per-channel (or per-triple for the HSV family) blend function.
pub(crate) fn blend_pixel(mode: BlendMode, a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    match mode {
        BlendMode::Add => per_channel(a, b, |a, b| (a + b).min(1.0)),
        BlendMode::Sub => per_channel(a, b, |a, b| (a - b).max(0.0)),
        BlendMode::Mul => per_channel(a, b, |a, b| a * b),
        BlendMode::Darken => per_channel(a, b, f32::min),
        BlendMode::Burn => per_channel(a, b, |a, b| {
            if b <= 0.0 {
                0.0
            } else {
                (1.0 - (1.0 - a) / b).clamp(0.0, 1.0)
            }
        }),
        BlendMode::LinearBurn => per_channel(a, b, |a, b| (a + b - 1.0).clamp(0.0, 1.0)),
        BlendMode::Screen => per_channel(a, b, |a, b| 1.0 - (1.0 - a) * (1.0 - b)),
        BlendMode::Lighten => per_channel(a, b, f32::max),
        BlendMode::Dodge => per_channel(a, b, |a, b| {
            if b >= 1.0 { 1.0 } else { (a / (1.0 - b)).min(1.0) }
        }),
        BlendMode::Overlay => per_channel(a, b, |a, b| {
            if a < 0.5 {
                2.0 * a * b
            } else {
                1.0 - 2.0 * (1.0 - a) * (1.0 - b)
            }
        }),
        BlendMode::SoftLight => per_channel(a, b, |a, b| {
            let screen = 1.0 - (1.0 - b) * (1.0 - a);
            ((1.0 - a) * b * a) + (a * screen)
        }),
        BlendMode::HardLight => per_channel(a, b, |a, b| {
            if b <= 0.5 {
                2.0 * a * b
            } else {
                1.0 - 2.0 * (1.0 - a) * (1.0 - b)
            }
        }),
        BlendMode::PinLight => per_channel(a, b, |a, b| {
            if b > 0.5 {
                a.max(2.0 * (b - 0.5))
            } else {
                a.min(2.0 * b)
            }
        }),
        BlendMode::LinearLight => per_channel(a, b, |a, b| {
            let v = if b > 0.5 {
                a + 2.0 * (b - 0.5)
            } else {
                a + 2.0 * b - 1.0
            };
            v.clamp(0.0, 1.0)
        }),
        BlendMode::VividLight => per_channel(a, b, |a, b| {
            if b > 0.5 {
                if b >= 1.0 {
                    1.0
                } else {
                    (a / (2.0 * (1.0 - b))).min(1.0)
                }
            } else if b <= 0.0 {
                0.0
            } else {
                (1.0 - (1.0 - a) / (2.0 * b)).clamp(0.0, 1.0)
            }
        }),
        BlendMode::Difference => per_channel(a, b, |a, b| (a - b).abs()),
        BlendMode::Exclusion => per_channel(a, b, |a, b| a + b - 2.0 * a * b),
        BlendMode::Hue => {
            let (_, s1, v1) = rgb_to_hsv(a[0], a[1], a[2]);
            let (h2, s2, _) = rgb_to_hsv(b[0], b[1], b[2]);
            if s2 <= 0.0 {
                return a;
            }
            let (r, g, bl) = hsv_to_rgb(h2, s1, v1);
            [r, g, bl]
        }
        BlendMode::Saturation => {
            let (h1, s1, v1) = rgb_to_hsv(a[0], a[1], a[2]);
            let (_, s2, _) = rgb_to_hsv(b[0], b[1], b[2]);
            let s = if s1 > 0.0 { s2 } else { s1 };
            let (r, g, bl) = hsv_to_rgb(h1, s, v1);
            [r, g, bl]
        }
        BlendMode::Value => {
            let (h1, s1, _) = rgb_to_hsv(a[0], a[1], a[2]);
            let (_, _, v2) = rgb_to_hsv(b[0], b[1], b[2]);
            let (r, g, bl) = hsv_to_rgb(h1, s1, v2);
            [r, g, bl]
        }
        BlendMode::BlendColor => {
            let (_, _, v1) = rgb_to_hsv(a[0], a[1], a[2]);
            let (h2, s2, _) = rgb_to_hsv(b[0], b[1], b[2]);
            let (r, g, bl) = hsv_to_rgb(h2, s2, v1);
            [r, g, bl]
        }
    }
}

fn per_channel(a: [f32; 3], b: [f32; 3], f: impl Fn(f32, f32) -> f32) -> [f32; 3] {
    [f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2])]
}
