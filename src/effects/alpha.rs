use crate::effects::pixel::{PixelLayer, madd4};

/// `dst = fac*src1 over src2`, alpha taken from src1.
pub(crate) fn alpha_over<T: PixelLayer>(fac: f32, src1: &[T], src2: &[T], dst: &mut [T]) {
    if fac <= 0.0 {
        dst.copy_from_slice(src2);
        return;
    }

    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        if T::is_transparent(px1[3]) {
            // Premultiplied: zero alpha contributes no color either.
            out.copy_from_slice(px2);
        } else if fac >= 1.0 && T::is_opaque(px1[3]) {
            out.copy_from_slice(px1);
        } else {
            let col1 = T::load_premul(px1);
            let col2 = T::load_premul(px2);
            let mfac = 1.0 - fac * col1[3];
            T::store_premul(madd4(col1, col2, fac, mfac), out);
        }
    }
}

/// `dst = src1 under src2`, alpha taken from src2.
pub(crate) fn alpha_under<T: PixelLayer>(fac: f32, src1: &[T], src2: &[T], dst: &mut [T]) {
    if fac <= 0.0 {
        dst.copy_from_slice(src2);
        return;
    }

    for ((px1, px2), out) in src1
        .chunks_exact(4)
        .zip(src2.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        if T::is_transparent(px2[3]) && fac >= 1.0 {
            out.copy_from_slice(px1);
        } else if T::is_opaque(px2[3]) {
            out.copy_from_slice(px2);
        } else {
            let col2 = T::load_premul(px2);
            let col1 = T::load_premul(px1);
            let mfac = fac * (1.0 - col2[3]);
            T::store_premul(madd4(col1, col2, mfac, 1.0), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_fac_zero_copies_src2() {
        let src1 = [255u8, 0, 0, 255];
        let src2 = [0u8, 0, 255, 255];
        let mut dst = [0u8; 4];
        alpha_over(0.0, &src1, &src2, &mut dst);
        assert_eq!(dst, src2);
    }

    #[test]
    fn over_opaque_src1_at_full_fac_copies_src1() {
        let src1 = [255u8, 0, 0, 255];
        let src2 = [0u8, 0, 255, 255];
        let mut dst = [0u8; 4];
        alpha_over(1.0, &src1, &src2, &mut dst);
        assert_eq!(dst, src1);
    }

    #[test]
    fn over_transparent_src1_copies_src2() {
        let src1 = [255u8, 255, 255, 0];
        let src2 = [10u8, 20, 30, 200];
        let mut dst = [0u8; 4];
        alpha_over(1.0, &src1, &src2, &mut dst);
        assert_eq!(dst, src2);
    }

    #[test]
    fn over_half_transparent_float_blends() {
        let src1 = [0.5f32, 0.0, 0.0, 0.5];
        let src2 = [0.0f32, 0.0, 1.0, 1.0];
        let mut dst = [0f32; 4];
        alpha_over(1.0, &src1, &src2, &mut dst);
        assert!((dst[0] - 0.5).abs() < 1e-6);
        assert!((dst[2] - 0.5).abs() < 1e-6);
        assert!((dst[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn under_opaque_src2_copies_src2() {
        let src1 = [255u8, 0, 0, 255];
        let src2 = [0u8, 0, 255, 255];
        let mut dst = [0u8; 4];
        alpha_under(1.0, &src1, &src2, &mut dst);
        assert_eq!(dst, src2);
    }

    #[test]
    fn under_transparent_src2_copies_src1() {
        let src1 = [255u8, 0, 0, 255];
        let src2 = [0u8, 0, 0, 0];
        let mut dst = [0u8; 4];
        alpha_under(1.0, &src1, &src2, &mut dst);
        assert_eq!(dst, src1);
    }

    #[test]
    fn byte_and_float_paths_agree() {
        let src1_b = [200u8, 40, 90, 180];
        let src2_b = [30u8, 200, 60, 120];
        let mut dst_b = [0u8; 4];
        alpha_over(0.6, &src1_b, &src2_b, &mut dst_b);

        let f = |px: [u8; 4]| crate::foundation::math::straight_u8_to_premul_f32(px);
        let mut dst_f = [0f32; 4];
        alpha_over(0.6, &f(src1_b), &f(src2_b), &mut dst_f);
        let dst_f_b = crate::foundation::math::premul_f32_to_straight_u8(dst_f);
        for c in 0..4 {
            assert!(
                (i32::from(dst_b[c]) - i32::from(dst_f_b[c])).abs() <= 1,
                "channel {c}: {} vs {}",
                dst_b[c],
                dst_f_b[c]
            );
        }
    }
}
