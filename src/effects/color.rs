use crate::frame::Frame;
use crate::params::SolidColorParams;
use rayon::prelude::*;

/// Fill a frame with the strip's solid color at full alpha.
pub(crate) fn solid_color_frame(params: &SolidColorParams, out: &mut Frame) {
    let width = out.width() as usize;
    if let Some(bytes) = out.bytes_mut() {
        let color = [
            (params.color[0] * 255.0 + 0.5).clamp(0.0, 255.0) as u8,
            (params.color[1] * 255.0 + 0.5).clamp(0.0, 255.0) as u8,
            (params.color[2] * 255.0 + 0.5).clamp(0.0, 255.0) as u8,
            255,
        ];
        bytes
            .par_chunks_mut(64 * width * 4)
            .for_each(|rows| {
                for px in rows.chunks_exact_mut(4) {
                    px.copy_from_slice(&color);
                }
            });
    } else if let Some(floats) = out.floats_mut() {
        let color = [params.color[0], params.color[1], params.color[2], 1.0];
        floats
            .par_chunks_mut(64 * width * 4)
            .for_each(|rows| {
                for px in rows.chunks_exact_mut(4) {
                    px.copy_from_slice(&color);
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_is_opaque_and_uniform() {
        let mut out = Frame::new_byte(4, 3);
        solid_color_frame(
            &SolidColorParams {
                color: [1.0, 0.5, 0.0],
            },
            &mut out,
        );
        for px in out.bytes().unwrap().chunks_exact(4) {
            assert_eq!(px, [255, 128, 0, 255]);
        }
    }

    #[test]
    fn float_fill_keeps_exact_values() {
        let mut out = Frame::new_float(2, 2);
        solid_color_frame(
            &SolidColorParams {
                color: [0.25, 0.5, 0.75],
            },
            &mut out,
        );
        for px in out.floats().unwrap().chunks_exact(4) {
            assert_eq!(px, [0.25, 0.5, 0.75, 1.0]);
        }
    }
}
