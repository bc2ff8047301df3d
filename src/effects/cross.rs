use crate::effects::pixel::{PixelLayer, madd4};

/// Linear cross dissolve, byte path in 8.8 fixed point.
pub(crate) fn cross_byte(fac: f32, src1: &[u8], src2: &[u8], dst: &mut [u8]) {
    let temp_fac = (256.0 * fac) as i32;
    let temp_mfac = 256 - temp_fac;

    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        for c in 0..4 {
            out[c] = ((temp_mfac * i32::from(px1[c]) + temp_fac * i32::from(px2[c])) >> 8) as u8;
        }
    }
}

pub(crate) fn cross_float(fac: f32, src1: &[f32], src2: &[f32], dst: &mut [f32]) {
    let mfac = 1.0 - fac;
    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        for c in 0..4 {
            out[c] = mfac * px1[c] + fac * px2[c];
        }
    }
}

/* Gamma cross is hardcoded to 2.0 gamma rather than doing a proper
 * input->linear conversion; interpolation happens on squared values. */

fn degamma(c: f32) -> f32 {
    if c < 0.0 { -(c * c) } else { c * c }
}

fn regamma(c: f32) -> f32 {
    if c < 0.0 { -(-c).sqrt() } else { c.sqrt() }
}

pub(crate) fn gamma_cross<T: PixelLayer>(fac: f32, src1: &[T], src2: &[T], dst: &mut [T]) {
    let mfac = 1.0 - fac;
    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        let col1 = T::load_premul(px1);
        let col2 = T::load_premul(px2);
        let mut col = [0f32; 4];
        for c in 0..4 {
            col[c] = degamma(mfac * regamma(col1[c]) + fac * regamma(col2[c]));
        }
        T::store_premul(col, out);
    }
}

/// Cross dissolve over whole same-depth buffers, used by the speed effect's
/// sub-frame interpolation as well as the cross strip itself.
pub(crate) fn cross_any<T: PixelLayer>(fac: f32, src1: &[T], src2: &[T], dst: &mut [T]) {
    // Interpolate premultiplied values; for byte stores this round-trips
    // through premul floats which matches the fixed-point path within 1 LSB.
    let mfac = 1.0 - fac;
    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        let col1 = T::load_premul(px1);
        let col2 = T::load_premul(px2);
        T::store_premul(madd4(col1, col2, mfac, fac), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_midpoint_is_mean_for_opaque_constants() {
        let red = [255u8, 0, 0, 255];
        let blue = [0u8, 0, 255, 255];
        let mut out = [0u8; 4];
        cross_byte(0.5, &red, &blue, &mut out);
        // 8.8 fixed point truncates: 128*255 >> 8 == 127.
        assert_eq!(out, [127, 0, 127, 255]);

        let redf = [1.0f32, 0.0, 0.0, 1.0];
        let bluef = [0.0f32, 0.0, 1.0, 1.0];
        let mut outf = [0f32; 4];
        cross_float(0.5, &redf, &bluef, &mut outf);
        assert_eq!(outf, [0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn cross_extremes_pick_one_input() {
        let a = [10u8, 20, 30, 40];
        let b = [200u8, 190, 180, 170];
        let mut out = [0u8; 4];
        cross_byte(0.0, &a, &b, &mut out);
        assert_eq!(out, a);
        cross_float(1.0, &[0.1, 0.2, 0.3, 0.4], &[0.9, 0.8, 0.7, 0.6], &mut [0f32; 4]);
    }

    #[test]
    fn gamma_cross_midpoint_of_black_and_white() {
        let black = [0f32, 0.0, 0.0, 1.0];
        let white = [1f32, 1.0, 1.0, 1.0];
        let mut out = [0f32; 4];
        gamma_cross(0.5, &black, &white, &mut out);
        // Interpolation in sqrt space: (0.5)^2 = 0.25.
        assert!((out[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn gamma_cross_byte_and_float_agree() {
        let a = [240u8, 10, 60, 255];
        let b = [20u8, 250, 130, 255];
        let mut out_b = [0u8; 4];
        gamma_cross(0.3, &a, &b, &mut out_b);

        let f = |px: [u8; 4]| crate::foundation::math::straight_u8_to_premul_f32(px);
        let mut out_f = [0f32; 4];
        gamma_cross(0.3, &f(a), &f(b), &mut out_f);
        let out_f_b = crate::foundation::math::premul_f32_to_straight_u8(out_f);
        for c in 0..4 {
            assert!((i32::from(out_b[c]) - i32::from(out_f_b[c])).abs() <= 1);
        }
    }
}
