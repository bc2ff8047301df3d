//! Text strip rendering: glyph rasterization, JFA outline, shadow, box.

use crate::foundation::error::{StripfxError, StripfxResult};
use crate::foundation::math::{
    power_of_two_max, premul_f32_to_straight_u8, straight_u8_to_premul_f32,
};
use crate::frame::Frame;
use crate::params::{FontSpec, TextParams};
use crate::render::context::RenderContext;
use crate::strip::Strip;
use crate::text::fonts::FontId;
use crate::text::layout::{self, GlyphMetrics, Recti, TextRuntime};
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use rayon::prelude::*;
use std::sync::Arc;

struct AbMetrics<'a> {
    font: &'a FontArc,
    scale: PxScale,
}

impl GlyphMetrics for AbMetrics<'_> {
    fn advance(&self, ch: char) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        scaled.h_advance(self.font.glyph_id(ch))
    }

    fn ascent(&self) -> f32 {
        self.font.as_scaled(self.scale).ascent()
    }

    fn descent(&self) -> f32 {
        self.font.as_scaled(self.scale).descent()
    }

    fn line_gap(&self) -> f32 {
        self.font.as_scaled(self.scale).line_gap()
    }
}

/// Premultiplied source blended over one straight-alpha byte pixel.
fn blend_over_px(dst: &mut [u8], src: [f32; 4]) {
    let pix = straight_u8_to_premul_f32([dst[0], dst[1], dst[2], dst[3]]);
    let mfac = 1.0 - src[3];
    let col = [
        src[0] + mfac * pix[0],
        src[1] + mfac * pix[1],
        src[2] + mfac * pix[2],
        src[3] + mfac * pix[3],
    ];
    dst.copy_from_slice(&premul_f32_to_straight_u8(col));
}

/// Rasterize the laid-out glyphs with the given straight color.
fn draw_text(
    runtime: &TextRuntime,
    font: &FontArc,
    scale: PxScale,
    color: [f32; 4],
    buf: &mut [u8],
    width: usize,
    height: usize,
) {
    let base = [
        color[0] * color[3],
        color[1] * color[3],
        color[2] * color[3],
        color[3],
    ];
    for_each_glyph_coverage(runtime, font, scale, width, height, |index, coverage| {
        let src = [
            base[0] * coverage,
            base[1] * coverage,
            base[2] * coverage,
            base[3] * coverage,
        ];
        blend_over_px(&mut buf[index * 4..index * 4 + 4], src);
    });
}

/// Rasterize glyph coverage into a single-channel mask.
fn draw_text_mask(
    runtime: &TextRuntime,
    font: &FontArc,
    scale: PxScale,
    mask: &mut [u8],
    width: usize,
    height: usize,
) {
    for_each_glyph_coverage(runtime, font, scale, width, height, |index, coverage| {
        let value = (coverage * 255.0 + 0.5) as u8;
        mask[index] = mask[index].max(value);
    });
}

fn for_each_glyph_coverage(
    runtime: &TextRuntime,
    font: &FontArc,
    scale: PxScale,
    width: usize,
    height: usize,
    mut apply: impl FnMut(usize, f32),
) {
    for line in &runtime.lines {
        for c in &line.characters {
            if c.ch == '\n' {
                continue;
            }
            let glyph = font
                .glyph_id(c.ch)
                .with_scale_and_position(scale, ab_glyph::point(c.position[0], c.position[1]));
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i64 + gx as i64;
                let y = bounds.min.y as i64 + gy as i64;
                if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                    return;
                }
                let coverage = coverage.clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    return;
                }
                apply(y as usize * width + x as usize, coverage);
            });
        }
    }
}

/* Text outline calculation is done by the Jump Flooding Algorithm (JFA):
 * repeated passes sampling neighbours at halving step sizes, each pass
 * propagating the closest known boundary coordinate. */

const JFA_INVALID: u16 = u16::MAX;

#[derive(Clone, Copy)]
struct JfaCoord {
    x: u16,
    y: u16,
}

const INVALID_COORD: JfaCoord = JfaCoord {
    x: JFA_INVALID,
    y: JFA_INVALID,
};

fn jump_flooding_pass(
    input: &[JfaCoord],
    output: &mut [JfaCoord],
    width: usize,
    height: usize,
    rect: Recti,
    step_size: i64,
) {
    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            if y < rect.ymin as i64 || y > rect.ymax as i64 {
                return;
            }
            for x in rect.xmin as i64..=rect.xmax as i64 {
                // Sample 9 texels at +/- step size, keep the closest seed.
                let mut closest = INVALID_COORD;
                let mut minimum = f32::MAX;
                for dy in [-step_size, 0, step_size] {
                    let yy = y + dy;
                    if yy < 0 || yy >= height as i64 {
                        continue;
                    }
                    for dx in [-step_size, 0, step_size] {
                        let xx = x + dx;
                        if xx < 0 || xx >= width as i64 {
                            continue;
                        }
                        let val = input[yy as usize * width + xx as usize];
                        if val.x == JFA_INVALID {
                            continue;
                        }
                        let ddx = f32::from(val.x) - x as f32;
                        let ddy = f32::from(val.y) - y as f32;
                        let squared = ddx * ddx + ddy * ddy;
                        if squared < minimum {
                            minimum = squared;
                            closest = val;
                        }
                    }
                }
                row[x as usize] = closest;
            }
        });
}

/// Composite an antialiased outline of the glyph mask into the output.
///
/// `text_color_alpha` modulates the inner edge so the outline never shows
/// through fully opaque text.
pub(crate) fn composite_outline_from_mask(
    mask: &[u8],
    width: usize,
    height: usize,
    outline_width: i32,
    outline_color: [f32; 4],
    text_color_alpha: f32,
    rect: Recti,
    buf: &mut [u8],
) {
    let pixel_count = width * height;

    // Seed opaque pixels with their own coordinate.
    let mut boundary = vec![INVALID_COORD; pixel_count];
    boundary
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                if mask[y * width + x] >= 128 {
                    *out = JfaCoord {
                        x: x as u16,
                        y: y as u16,
                    };
                }
            }
        });

    let mut flood_a = vec![INVALID_COORD; pixel_count];
    jump_flooding_pass(&boundary, &mut flood_a, width, height, rect, 1);

    let mut flood_b = vec![INVALID_COORD; pixel_count];
    let mut result = &mut flood_a;
    let mut scratch = &mut flood_b;
    let mut step_size = power_of_two_max(outline_width) / 2;
    while step_size != 0 {
        jump_flooding_pass(result, scratch, width, height, rect, step_size as i64);
        std::mem::swap(&mut result, &mut scratch);
        step_size /= 2;
    }
    let result: &[JfaCoord] = result;

    let color = [
        outline_color[0] * outline_color[3],
        outline_color[1] * outline_color[3],
        outline_color[2] * outline_color[3],
        outline_color[3],
    ];

    let row_range = rect.ymin as usize..=rect.ymax as usize;
    buf.par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            if !row_range.contains(&y) {
                return;
            }
            for x in rect.xmin as usize..=rect.xmax as usize {
                let index = y * width + x;
                let closest = result[index];
                if closest.x == JFA_INVALID {
                    // Outside the outline entirely.
                    continue;
                }

                let dx = f32::from(closest.x) - x as f32;
                let dy = f32::from(closest.y) - y as f32;
                let distance = (dx * dx + dy * dy).sqrt();
                // Fade the outline out over one pixel at its outer distance.
                let mut alpha = (outline_width as f32 - distance + 1.0).clamp(0.0, 1.0);

                /* Do not put outline inside the text shape: where the text is
                 * fully opaque the outline must vanish, and where the text
                 * color is transparent the outline anti-aliases against the
                 * inverse of the glyph alpha. Interpolate between the two by
                 * the text color's alpha. */
                let text_alpha = f32::from(mask[index]) * (1.0 / 255.0);
                let mul_opaque_text = if text_alpha >= 1.0 { 0.0 } else { 1.0 };
                let mul_transparent_text = 1.0 - text_alpha;
                let mul = mul_transparent_text
                    + (mul_opaque_text - mul_transparent_text) * text_color_alpha;
                alpha *= mul;

                let src = [
                    color[0] * alpha,
                    color[1] * alpha,
                    color[2] * alpha,
                    color[3] * alpha,
                ];
                blend_over_px(&mut row[x * 4..x * 4 + 4], src);
            }
        });
}

fn draw_text_outline(
    params: &TextParams,
    runtime: &TextRuntime,
    font: &FontArc,
    scale: PxScale,
    buf: &mut [u8],
    width: usize,
    height: usize,
) -> Recti {
    // Outline width of 1.0 maps to half of the text line height.
    let outline_width = (runtime.line_height * 0.5 * params.outline_width) as i32;
    if outline_width < 1 || params.outline_color[3] <= 0.0 || !params.use_outline {
        return runtime.boundbox;
    }

    let mut mask = vec![0u8; width * height];
    draw_text_mask(runtime, font, scale, &mut mask, width, height);

    let mut rect = runtime.boundbox;
    rect.pad(outline_width + 1, outline_width + 1);
    rect.clamp_to(width as i32, height as i32);

    composite_outline_from_mask(
        &mask,
        width,
        height,
        outline_width,
        params.outline_color,
        params.color[3],
        rect,
        buf,
    );
    rect
}

/* Shadow: a mask of the existing text/outline alpha shifted by the shadow
 * offset, optionally blurred, then blended underneath. */

fn mask_blur_x(
    kernel: &[f32],
    half_size: i64,
    width: usize,
    rect: Recti,
    src: &[u8],
    dst: &mut [u8],
) {
    for y in rect.ymin as usize..=rect.ymax as usize {
        for x in 0..width {
            let mut accum = 0.0f32;
            if x >= rect.xmin as usize && x <= rect.xmax as usize {
                let mut accum_weight = 0.0f32;
                let xmin = (x as i64 - half_size).max(rect.xmin as i64);
                let xmax = (x as i64 + half_size).min(rect.xmax as i64);
                for nx in xmin..=xmax {
                    let weight = kernel[(nx - x as i64 + half_size) as usize];
                    accum += f32::from(src[y * width + nx as usize]) * weight;
                    accum_weight += weight;
                }
                accum /= accum_weight;
            }
            dst[y * width + x] = (accum + 0.5) as u8;
        }
    }
}

fn mask_blur_y(
    kernel: &[f32],
    half_size: i64,
    width: usize,
    rect: Recti,
    src: &[u8],
    dst: &mut [u8],
) {
    for y in rect.ymin as usize..=rect.ymax as usize {
        for x in 0..width {
            let mut accum = 0.0f32;
            if x >= rect.xmin as usize && x <= rect.xmax as usize {
                let mut accum_weight = 0.0f32;
                let ymin = (y as i64 - half_size).max(rect.ymin as i64);
                let ymax = (y as i64 + half_size).min(rect.ymax as i64);
                for ny in ymin..=ymax {
                    let weight = kernel[(ny - y as i64 + half_size) as usize];
                    accum += f32::from(src[ny as usize * width + x]) * weight;
                    accum_weight += weight;
                }
                accum /= accum_weight;
            }
            dst[y * width + x] = (accum + 0.5) as u8;
        }
    }
}

pub(crate) fn draw_text_shadow(
    params: &TextParams,
    line_height: f32,
    rect: Recti,
    buf: &mut [u8],
    width: usize,
    height: usize,
) {
    // Blur of 1.0 applies a kernel of half the text line height.
    let blur_amount = line_height * 0.5 * params.shadow_blur;
    let do_blur = blur_amount >= 1.0;

    let offset_x = (params.shadow_angle.cos() * line_height * params.shadow_offset) as i32;
    let offset_y = (params.shadow_angle.sin() * line_height * params.shadow_offset) as i32;

    let mut shadow_rect = rect;
    shadow_rect.translate(offset_x, offset_y);
    shadow_rect.pad(1, 1);
    shadow_rect.clamp_to(width as i32, height as i32);

    // Initialize the shadow from the existing text/outline alpha.
    let mut shadow_mask = vec![0u8; width * height];
    for y in shadow_rect.ymin..=shadow_rect.ymax {
        let src_y = (y - offset_y).clamp(0, height as i32 - 1) as usize;
        for x in shadow_rect.xmin..=shadow_rect.xmax {
            let src_x = (x - offset_x).clamp(0, width as i32 - 1) as usize;
            shadow_mask[y as usize * width + x as usize] = buf[(src_y * width + src_x) * 4 + 3];
        }
    }

    if do_blur {
        let half_size = (blur_amount + 0.5) as usize;
        let kernel = crate::effects::make_gaussian_kernel(blur_amount, half_size);

        shadow_rect.pad(half_size as i32 + 1, half_size as i32 + 1);
        shadow_rect.clamp_to(width as i32, height as i32);

        let mut blur_buffer = vec![0u8; width * height];
        mask_blur_x(
            &kernel,
            half_size as i64,
            width,
            shadow_rect,
            &shadow_mask,
            &mut blur_buffer,
        );
        mask_blur_y(
            &kernel,
            half_size as i64,
            width,
            shadow_rect,
            &blur_buffer,
            &mut shadow_mask,
        );
    }

    let color = [
        params.shadow_color[0] * params.shadow_color[3],
        params.shadow_color[1] * params.shadow_color[3],
        params.shadow_color[2] * params.shadow_color[3],
        params.shadow_color[3],
    ];

    for y in shadow_rect.ymin as usize..=shadow_rect.ymax as usize {
        for x in shadow_rect.xmin as usize..=shadow_rect.xmax as usize {
            let a = shadow_mask[y * width + x];
            if a == 0 {
                continue;
            }
            let s = f32::from(a) * (1.0 / 255.0);
            let dst = &mut buf[(y * width + x) * 4..(y * width + x) * 4 + 4];
            let col1 = straight_u8_to_premul_f32([dst[0], dst[1], dst[2], dst[3]]);
            // Blend under the existing pixel.
            let fac = 1.0 - col1[3];
            let col = [
                col1[0] + fac * color[0] * s,
                col1[1] + fac * color[1] * s,
                col1[2] + fac * color[2] * s,
                col1[3] + fac * color[3] * s,
            ];
            dst.copy_from_slice(&premul_f32_to_straight_u8(col));
        }
    }
}

/// Fill a rectangle underneath the existing image: the new color only fills
/// the transparent remainder of each pixel's alpha. Rounded corners fall off
/// along a superellipse.
pub(crate) fn fill_rect_alpha_under(
    buf: &mut [u8],
    width: usize,
    height: usize,
    color: [f32; 4],
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    corner_radius: f32,
) {
    let x1 = x1.clamp(0, width as i32);
    let x2 = x2.clamp(0, width as i32);
    let y1 = y1.clamp(0, height as i32);
    let y2 = y2.clamp(0, height as i32);
    let (x1, x2) = if x1 > x2 { (x2, x1) } else { (x1, x2) };
    let (y1, y2) = if y1 > y2 { (y2, y1) } else { (y1, y2) };
    if x1 == x2 || y1 == y2 {
        return;
    }

    let corner_radius = corner_radius.clamp(0.0, ((x2 - x1).min(y2 - y1)) as f32 / 2.0);
    let base = [
        color[0] * color[3],
        color[1] * color[3],
        color[2] * color[3],
        color[3],
    ];

    let rows = &mut buf[(y1 as usize * width) * 4..(y2 as usize * width) * 4];
    rows.par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(row_idx, row)| {
            let y = y1 + row_idx as i32;
            for x in x1..x2 {
                let dst = &mut row[x as usize * 4..x as usize * 4 + 4];
                let pix = straight_u8_to_premul_f32([dst[0], dst[1], dst[2], dst[3]]);
                let fac = 1.0 - pix[3];

                let mut premul_col = base;
                let r1 = x1 as f32 + corner_radius - 1.0;
                let r2 = x2 as f32 - corner_radius;
                let r3 = y1 as f32 + corner_radius - 1.0;
                let r4 = y2 as f32 - corner_radius;
                let (fx, fy) = (x as f32, y as f32);
                let origin = if fx < x1 as f32 + corner_radius && fy < y1 as f32 + corner_radius {
                    Some((r1, r3))
                } else if fx >= r2 && fy < y1 as f32 + corner_radius {
                    Some((r2, r3))
                } else if fx < x1 as f32 + corner_radius && fy >= r4 {
                    Some((r1, r4))
                } else if fx >= r2 && fy >= r4 {
                    Some((r2, r4))
                } else {
                    None
                };
                if let Some((ox, oy)) = origin {
                    /* Inside a rounded corner, modulate with a superellipse
                     * falloff; the curvature between flat and rounded reads
                     * better than a plain circle. */
                    const CURVE_POW: f32 = 2.1;
                    let r = ((fx - ox).abs().powf(CURVE_POW) + (fy - oy).abs().powf(CURVE_POW))
                        .powf(1.0 / CURVE_POW);
                    let alpha = (corner_radius - r).clamp(0.0, 1.0);
                    for c in &mut premul_col {
                        *c *= alpha;
                    }
                }

                let col = [
                    fac * premul_col[0] + pix[0],
                    fac * premul_col[1] + pix[1],
                    fac * premul_col[2] + pix[2],
                    fac * premul_col[3] + pix[3],
                ];
                dst.copy_from_slice(&premul_f32_to_straight_u8(col));
            }
        });
}

/// Render a text strip into a fresh byte frame.
///
/// All layout and rasterization happens under the font cache lock; nested
/// font loads (fallback resolution) are legal because the lock is recursive.
pub(crate) fn text_effect_frame(
    ctx: &RenderContext<'_>,
    strip: &mut Strip,
) -> StripfxResult<Frame> {
    let width = ctx.width as usize;
    let height = ctx.height as usize;
    let mut out = Frame::new_byte(ctx.width, ctx.height);

    let fonts = Arc::clone(&ctx.fonts);
    let preview_scale = ctx.preview_scale;
    let params = strip.params.as_text_mut()?;

    ctx.fonts.with_lock(|cache| -> StripfxResult<()> {
        // In case the font got unloaded behind our backs, reload it.
        if let Some(handle) = &params.font_handle
            && !cache.is_loaded(handle.id())
        {
            params.font_handle = None;
        }
        if params.font_handle.is_none() {
            params.font_handle = fonts.load_handle(&params.font);
            if params.font_handle.is_none() && params.font != FontSpec::Builtin {
                tracing::warn!("text font failed to load, falling back to the built-in font");
                params.font_handle = fonts.load_handle(&FontSpec::Builtin);
            }
        }

        let font_id = params
            .font_handle
            .as_ref()
            .map_or(FontId::BUILTIN, |handle| handle.id());
        let Some(font) = cache.font(font_id).or_else(|| cache.font(FontId::BUILTIN)) else {
            tracing::warn!("no usable font, skipping text strip");
            return Ok(());
        };

        let size_px = (params.size * preview_scale).max(1.0);
        let scale = PxScale::from(size_px);
        let metrics = AbMetrics {
            font: &font,
            scale,
        };
        let runtime = layout::compute_runtime(params, &metrics, ctx.width, ctx.height);

        let buf = out
            .bytes_mut()
            .ok_or_else(|| StripfxError::render("text output must be a byte frame"))?;

        let outline_rect = draw_text_outline(params, &runtime, &font, scale, buf, width, height);
        draw_text(&runtime, &font, scale, params.color, buf, width, height);

        if params.use_shadow {
            draw_text_shadow(params, runtime.line_height, outline_rect, buf, width, height);
        }

        if params.use_box {
            let margin = (params.box_margin * ctx.width as f32) as i32;
            let bb = runtime.boundbox;
            let (minx, maxx) = (bb.xmin - margin, bb.xmax + margin);
            let (miny, maxy) = (bb.ymin - margin, bb.ymax + margin);
            let corner_radius = params.box_roundness * (maxy - miny) as f32 / 2.0;
            fill_rect_alpha_under(
                buf,
                width,
                height,
                params.box_color,
                minx,
                miny,
                maxx,
                maxy,
                corner_radius,
            );
        }

        params.runtime = Some(runtime);
        Ok(())
    })?;

    Ok(out)
}
