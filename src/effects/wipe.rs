use crate::effects::pixel::{PixelLayer, madd4};
use crate::params::{WipeParams, WipeType};
use rayon::prelude::*;

/// Precomputed per-render wipe geometry.
struct WipeZone {
    angle: f32,
    flip: bool,
    xo: f32,
    yo: f32,
    /// Pixel width of the blurred edge band.
    width: f32,
    /// `1 / hypot(angle, 1)`, for point-to-line distances.
    pythangle: f32,
    /// Clock wipe band width in radians.
    clock_width: f32,
    wipe_type: WipeType,
    forward: bool,
}

fn precalc_wipe_zone(wipe: &WipeParams, xo: usize, yo: usize) -> WipeZone {
    let angle = wipe.angle.abs().tan();
    WipeZone {
        angle,
        flip: wipe.angle < 0.0,
        xo: xo as f32,
        yo: yo as f32,
        width: (wipe.edge_width * ((xo + yo) as f32 / 2.0)).floor(),
        pythangle: 1.0 / (angle * angle + 1.0).sqrt(),
        clock_width: wipe.edge_width * std::f32::consts::PI,
        wipe_type: wipe.wipe_type,
        forward: wipe.forward,
    }
}

/// Linear ramp across the blurred edge band.
fn in_band(width: f32, dist: f32, side: i32) -> f32 {
    if width == 0.0 || width < dist {
        return side as f32;
    }
    if side == 1 {
        (dist + 0.5 * width) / width
    } else {
        (0.5 * width - dist) / width
    }
}

/// Fraction of `src1` visible at a pixel, 0..1.
fn check_zone(zone: &WipeZone, x: usize, y: usize, fac: f32) -> f32 {
    let mut x = x as f32;
    let y = y as f32;
    let xo = zone.xo;
    let yo = zone.yo;
    let halfx = xo * 0.5;
    let halfy = yo * 0.5;

    if zone.flip {
        x = xo - x;
    }
    let angle = zone.angle;

    let (posx, posy) = if zone.forward {
        (fac * xo, fac * yo)
    } else {
        (xo - fac * xo, yo - fac * yo)
    };

    let mut output;
    match zone.wipe_type {
        WipeType::Single => {
            let width = zone.width.min(fac * yo).min(yo - fac * yo);

            let (b1, b2, hyp);
            if angle == 0.0 {
                b1 = posy;
                b2 = y;
                hyp = (y - posy).abs();
            } else {
                b1 = posy - (-angle) * posx;
                b2 = y - (-angle) * x;
                hyp = (angle * x + y + (-posy - angle * posx)).abs() * zone.pythangle;
            }

            let reveal = b1 < b2;
            output = if zone.forward == reveal {
                in_band(width, hyp, 1)
            } else {
                in_band(width, hyp, 0)
            };
        }
        WipeType::Double => {
            let fac = if zone.forward { fac } else { 1.0 - fac };
            let (posx, posy) = (fac * xo, fac * yo);

            let mut hwidth = zone.width * 0.5;
            let (b1, b2, b3, hyp, hyp2);
            if angle == 0.0 {
                b1 = posy * 0.5;
                b3 = yo - posy * 0.5;
                b2 = y;
                hyp = (y - posy * 0.5).abs();
                hyp2 = (y - (yo - posy * 0.5)).abs();
            } else {
                b1 = posy * 0.5 - (-angle) * posx * 0.5;
                b3 = (yo - posy * 0.5) - (-angle) * (xo - posx * 0.5);
                b2 = y - (-angle) * x;
                hyp = (angle * x + y + (-posy * 0.5 - angle * posx * 0.5)).abs() * zone.pythangle;
                hyp2 = (angle * x + y + (-(yo - posy * 0.5) - angle * (xo - posx * 0.5))).abs()
                    * zone.pythangle;
            }

            hwidth = hwidth.min((b3 - b1).abs() / 2.0);

            if b2 < b1 && b2 < b3 {
                output = in_band(hwidth, hyp, 0);
            } else if b2 > b1 && b2 > b3 {
                output = in_band(hwidth, hyp2, 0);
            } else if hyp < hwidth && hyp2 > hwidth {
                output = in_band(hwidth, hyp, 1);
            } else if hyp > hwidth && hyp2 < hwidth {
                output = in_band(hwidth, hyp2, 1);
            } else {
                output = in_band(hwidth, hyp2, 1) * in_band(hwidth, hyp, 1);
            }
            if !zone.forward {
                output = 1.0 - output;
            }
        }
        WipeType::Clock => {
            let widthf = zone.clock_width;
            let mut sweep = 2.0 * std::f32::consts::PI * fac;
            if zone.forward {
                sweep = 2.0 * std::f32::consts::PI - sweep;
            }

            let xc = x - halfx;
            let yc = y - halfy;

            let mut point_angle = yc.atan2(xc);
            if point_angle < 0.0 {
                point_angle += 2.0 * std::f32::consts::PI;
            }

            let (lo, hi) = if zone.forward {
                (sweep - widthf * fac, sweep + widthf * (1.0 - fac))
            } else {
                (sweep - widthf * (1.0 - fac), sweep + widthf * fac)
            };
            let lo = lo.max(0.0);
            let hi = hi.min(2.0 * std::f32::consts::PI);

            output = if point_angle < lo {
                0.0
            } else if point_angle > hi {
                1.0
            } else {
                (point_angle - lo) / (hi - lo)
            };
            if xc == 0.0 && yc == 0.0 {
                output = 1.0;
            }
            if output.is_nan() {
                output = 1.0;
            }
            if zone.forward {
                output = 1.0 - output;
            }
        }
        WipeType::Iris => {
            let fac = if zone.forward { fac } else { 1.0 - fac };

            let hwidth = zone.width * 0.5;
            let edge = halfx - halfx * fac;
            let pointdist = edge.hypot(edge);

            let dist = (halfx - x).hypot(halfy - y);
            output = if dist > pointdist {
                in_band(hwidth, (dist - pointdist).abs(), 0)
            } else {
                in_band(hwidth, (dist - pointdist).abs(), 1)
            };

            if !zone.forward {
                output = 1.0 - output;
            }
        }
    }

    output.clamp(0.0, 1.0)
}

const WIPE_ROWS_PER_CHUNK: usize = 64;

/// Run a wipe over a whole frame, parallel over row ranges.
pub(crate) fn wipe_frame<T: PixelLayer>(
    wipe: &WipeParams,
    fac: f32,
    width: usize,
    src1: &[T],
    src2: &[T],
    dst: &mut [T],
) {
    let height = dst.len() / (width * 4);
    let zone = precalc_wipe_zone(wipe, width, height);
    let chunk = WIPE_ROWS_PER_CHUNK * width * 4;

    dst.par_chunks_mut(chunk)
        .enumerate()
        .for_each(|(i, rows)| {
            let y_start = i * WIPE_ROWS_PER_CHUNK;
            let offset = y_start * width * 4;
            for (px_idx, out) in rows.chunks_exact_mut(4).enumerate() {
                let y = y_start + px_idx / width;
                let x = px_idx % width;
                let check = check_zone(&zone, x, y, fac);
                let o = offset + px_idx * 4;
                if check > 0.0 {
                    let col1 = T::load_premul(&src1[o..]);
                    let col2 = T::load_premul(&src2[o..]);
                    T::store_premul(madd4(col1, col2, check, 1.0 - check), out);
                } else {
                    out.copy_from_slice(&src2[o..o + 4]);
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_wipe() -> WipeParams {
        WipeParams {
            wipe_type: WipeType::Single,
            edge_width: 0.0,
            angle: 0.0,
            forward: true,
        }
    }

    #[test]
    fn check_zone_stays_in_unit_range() {
        for wipe_type in [WipeType::Single, WipeType::Double, WipeType::Clock, WipeType::Iris] {
            let wipe = WipeParams {
                wipe_type,
                edge_width: 0.2,
                angle: 0.4,
                forward: true,
            };
            let zone = precalc_wipe_zone(&wipe, 32, 24);
            for y in 0..24 {
                for x in 0..32 {
                    let v = check_zone(&zone, x, y, 0.37);
                    assert!((0.0..=1.0).contains(&v), "{wipe_type:?} at ({x},{y}): {v}");
                }
            }
        }
    }

    #[test]
    fn hard_single_wipe_splits_frame() {
        let (w, h) = (8usize, 8usize);
        let red = vec![[1.0f32, 0.0, 0.0, 1.0]; w * h].concat();
        let blue = vec![[0.0f32, 0.0, 1.0, 1.0]; w * h].concat();
        let mut out = vec![0f32; w * h * 4];
        wipe_frame(&single_wipe(), 0.5, w, &red, &blue, &mut out);

        // Rows past the wipe line show src1, rows before it still src2.
        let top = &out[..4];
        let bottom = &out[(w * (h - 1)) * 4..][..4];
        assert_eq!(top[2], 1.0);
        assert_eq!(bottom[0], 1.0);
    }

    #[test]
    fn soft_edge_produces_intermediate_values() {
        let wipe = WipeParams {
            edge_width: 0.5,
            ..single_wipe()
        };
        let zone = precalc_wipe_zone(&wipe, 64, 64);
        let mut mid_values = 0;
        for y in 0..64 {
            let v = check_zone(&zone, 32, y, 0.5);
            if v > 0.05 && v < 0.95 {
                mid_values += 1;
            }
        }
        assert!(mid_values > 2);
    }

    #[test]
    fn iris_center_shows_src1_early() {
        let wipe = WipeParams {
            wipe_type: WipeType::Iris,
            edge_width: 0.0,
            angle: 0.0,
            forward: true,
        };
        let zone = precalc_wipe_zone(&wipe, 16, 16);
        // Near the end of the transition the center is inside the iris.
        assert_eq!(check_zone(&zone, 8, 8, 0.9), 1.0);
        // At the very start the far corner is outside.
        assert_eq!(check_zone(&zone, 0, 0, 0.05), 0.0);
    }
}
