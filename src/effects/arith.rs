use crate::effects::alpha::alpha_over;
use crate::effects::pixel::PixelLayer;

/// Additive mix, byte path in 16.16 fixed point.
///
/// src2's contribution is scaled by `fac` and by src2's own alpha; output
/// alpha stays src1's.
pub(crate) fn add_byte(fac: f32, src1: &[u8], src2: &[u8], dst: &mut [u8]) {
    let temp_fac = (256.0 * fac) as i32;

    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        let temp_fac2 = temp_fac * i32::from(px2[3]);
        for c in 0..3 {
            let add = (temp_fac2 * i32::from(px2[c])) >> 16;
            out[c] = (i32::from(px1[c]) + add).min(255) as u8;
        }
        out[3] = px1[3];
    }
}

pub(crate) fn add_float(fac: f32, src1: &[f32], src2: &[f32], dst: &mut [f32]) {
    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        let temp_fac = (1.0 - (px1[3] * (1.0 - fac))) * px2[3];
        for c in 0..3 {
            out[c] = px1[c] + temp_fac * px2[c];
        }
        out[3] = px1[3];
    }
}

pub(crate) fn sub_byte(fac: f32, src1: &[u8], src2: &[u8], dst: &mut [u8]) {
    let temp_fac = (256.0 * fac) as i32;

    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        let temp_fac2 = temp_fac * i32::from(px2[3]);
        for c in 0..3 {
            let sub = (temp_fac2 * i32::from(px2[c])) >> 16;
            out[c] = (i32::from(px1[c]) - sub).max(0) as u8;
        }
        out[3] = px1[3];
    }
}

pub(crate) fn sub_float(fac: f32, src1: &[f32], src2: &[f32], dst: &mut [f32]) {
    let mfac = 1.0 - fac;
    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        let temp_fac = (1.0 - (px1[3] * mfac)) * px2[3];
        for c in 0..3 {
            out[c] = (px1[c] - temp_fac * px2[c]).max(0.0);
        }
        out[3] = px1[3];
    }
}

/* Multiply: `fac * (a * b) + (1 - fac) * a  =>  a + fac * a * (b - 1)`,
 * applied to all four channels. */

pub(crate) fn mul_byte(fac: f32, src1: &[u8], src2: &[u8], dst: &mut [u8]) {
    let temp_fac = (256.0 * fac) as i32;

    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        for c in 0..4 {
            let v = i32::from(px1[c])
                + ((temp_fac * i32::from(px1[c]) * (i32::from(px2[c]) - 255)) >> 16);
            out[c] = v.clamp(0, 255) as u8;
        }
    }
}

pub(crate) fn mul_float(fac: f32, src1: &[f32], src2: &[f32], dst: &mut [f32]) {
    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        for c in 0..4 {
            out[c] = px1[c] + fac * px1[c] * (px2[c] - 1.0);
        }
    }
}

/// Fixed pixel shift of the drop shadow, toward the lower right.
const DROP_SHIFT: usize = 8;

/// Darken `src2` by the shifted alpha of `src1`, writing the base layer of a
/// drop shadow for the rows `start_line..start_line + lines`.
///
/// `src1` and `src2` are full frames; the shift crosses row-range borders, so
/// slices read their neighbours' rows but write only their own.
pub(crate) fn drop_shadow_rows<T: PixelLayer>(
    fac: f32,
    width: usize,
    start_line: usize,
    src1: &[T],
    src2: &[T],
    dst: &mut [T],
) {
    let xoff = DROP_SHIFT.min(width);
    let yoff = DROP_SHIFT;
    let temp_fac = 70.0 / 255.0 * fac;
    let lines = dst.len() / (width * 4);

    for yi in 0..lines {
        let y = start_line + yi;
        let row = y * width * 4;
        let out_row = yi * width * 4;
        if y < yoff {
            dst[out_row..out_row + width * 4].copy_from_slice(&src2[row..row + width * 4]);
            continue;
        }
        let src_row = (y - yoff) * width * 4;
        dst[out_row..out_row + xoff * 4].copy_from_slice(&src2[row..row + xoff * 4]);
        for x in xoff..width {
            let o = row + x * 4;
            let shadow_a = T::load_premul(&src1[src_row + (x - xoff) * 4..])[3];
            let darken = temp_fac * shadow_a;
            let col = T::load_premul(&src2[o..]);
            let darkened = [
                (col[0] - darken).max(0.0),
                (col[1] - darken).max(0.0),
                (col[2] - darken).max(0.0),
                (col[3] - darken).max(0.0),
            ];
            T::store_premul(darkened, &mut dst[out_row + x * 4..out_row + x * 4 + 4]);
        }
    }
}

/// Full-frame drop shadow.
pub(crate) fn drop_shadow<T: PixelLayer>(
    fac: f32,
    width: usize,
    _height: usize,
    src1: &[T],
    src2: &[T],
    dst: &mut [T],
) {
    drop_shadow_rows(fac, width, 0, src1, src2, dst);
}

/// Drop shadow followed by a regular alpha-over of `src1` onto the darkened
/// background, for one row range.
pub(crate) fn over_drop_rows<T: PixelLayer>(
    fac: f32,
    width: usize,
    start_line: usize,
    src1: &[T],
    src2: &[T],
    dst: &mut [T],
) {
    let mut shadowed = vec![T::OPAQUE_BLACK[0]; dst.len()];
    drop_shadow_rows(fac, width, start_line, src1, src2, &mut shadowed);
    let row_off = start_line * width * 4;
    alpha_over(fac, &src1[row_off..row_off + dst.len()], &shadowed, dst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_clamps_and_keeps_src1_alpha() {
        let red = [255u8, 0, 0, 255];
        let blue = [0u8, 0, 255, 255];
        let mut out = [0u8; 4];
        add_byte(1.0, &red, &blue, &mut out);
        assert_eq!(out, [255, 0, 254, 255]);

        let mut outf = [0f32; 4];
        add_float(1.0, &[1.0, 0.0, 0.0, 1.0], &[0.0, 0.0, 1.0, 1.0], &mut outf);
        assert_eq!(outf, [1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn add_fac_zero_returns_src1() {
        let a = [10u8, 20, 30, 200];
        let b = [100u8, 100, 100, 255];
        let mut out = [0u8; 4];
        add_byte(0.0, &a, &b, &mut out);
        assert_eq!(out, a);
    }

    #[test]
    fn sub_floors_at_zero() {
        let a = [10u8, 200, 0, 255];
        let b = [255u8, 100, 255, 255];
        let mut out = [0u8; 4];
        sub_byte(1.0, &a, &b, &mut out);
        assert_eq!(out[0], 0);
        assert!(out[1] > 0);
        assert_eq!(out[3], 255);
    }

    #[test]
    fn mul_full_fac_is_product() {
        let mut outf = [0f32; 4];
        mul_float(1.0, &[0.5, 1.0, 0.0, 1.0], &[0.5, 0.5, 0.5, 1.0], &mut outf);
        assert!((outf[0] - 0.25).abs() < 1e-6);
        assert!((outf[1] - 0.5).abs() < 1e-6);
        assert_eq!(outf[2], 0.0);
        assert_eq!(outf[3], 1.0);
    }

    #[test]
    fn add_byte_float_paths_agree_for_opaque() {
        let a = [100u8, 150, 200, 255];
        let b = [60u8, 70, 80, 255];
        let mut out_b = [0u8; 4];
        add_byte(0.5, &a, &b, &mut out_b);

        let to_f = |px: [u8; 4]| {
            [
                f32::from(px[0]) / 255.0,
                f32::from(px[1]) / 255.0,
                f32::from(px[2]) / 255.0,
                f32::from(px[3]) / 255.0,
            ]
        };
        let mut out_f = [0f32; 4];
        add_float(0.5, &to_f(a), &to_f(b), &mut out_f);
        for c in 0..4 {
            let f_byte = (out_f[c] * 255.0 + 0.5) as i32;
            assert!((i32::from(out_b[c]) - f_byte).abs() <= 1, "channel {c}");
        }
    }

    #[test]
    fn drop_shadow_darkens_shifted_region() {
        let (w, h) = (12usize, 12usize);
        // Opaque white background, foreground with one opaque pixel at (1, 1).
        let bg = vec![1.0f32; w * h * 4];
        let mut fg = vec![0.0f32; w * h * 4];
        let i = (w + 1) * 4;
        fg[i..i + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        let mut out = vec![0.0f32; w * h * 4];
        drop_shadow(1.0, w, h, &fg, &bg, &mut out);

        // Shadow lands 8 pixels down-right of the foreground pixel.
        let s = ((1 + 8) * w + (1 + 8)) * 4;
        assert!(out[s] < 1.0);
        // Far corner is untouched.
        let far = ((h - 1) * w + w - 1) * 4;
        assert_eq!(out[far], 1.0);
    }
}
