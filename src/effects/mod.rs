//! Effect kinds, their dispatch table, and the pixel kernels behind them.

mod alpha;
mod arith;
mod blend;
mod blur;
mod channel;
mod color;
mod cross;
mod glow;
mod pixel;
pub mod speed;
mod transform;
mod wipe;

pub use speed::{speed_interpolation_ratio, speed_rebuild_map, speed_target_frame};

pub(crate) use blur::make_gaussian_kernel;

use crate::foundation::error::{StripfxError, StripfxResult};
use crate::frame::Frame;
use crate::params::EffectParams;
use crate::render::context::RenderContext;
use crate::render::slices::par_row_slices;
use crate::strip::{Strip, StripBlend};

/// Named blend mode applied per channel (or per RGB triple for the HSV
/// family).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BlendMode {
    Add,
    Sub,
    Mul,
    Darken,
    Burn,
    LinearBurn,
    Screen,
    Lighten,
    Dodge,
    Overlay,
    SoftLight,
    HardLight,
    PinLight,
    LinearLight,
    VividLight,
    BlendColor,
    Hue,
    Saturation,
    Value,
    Difference,
    Exclusion,
}

/// Closed set of strip effect kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EffectKind {
    Cross,
    GammaCross,
    Add,
    Sub,
    Mul,
    AlphaOver,
    AlphaUnder,
    OverDrop,
    Blend(BlendMode),
    ColorMix,
    Wipe,
    Transform,
    Glow,
    Speed,
    SolidColor,
    Multicam,
    Adjustment,
    GaussianBlur,
    Text,
}

impl EffectKind {
    /// Dispatch handle for this kind.
    pub fn handle(self) -> EffectHandle {
        EffectHandle { kind: self }
    }
}

/// Decision taken before any pixel work happens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EarlyOut {
    /// Output is a plain copy of input 1.
    UseInput1,
    /// Output is a plain copy of input 2.
    UseInput2,
    /// The effect synthesizes its output from strip state alone.
    NoInput,
    /// The compositor has to run.
    DoEffect,
}

/// Value-typed dispatch for one effect kind.
///
/// Stateless and freely copyable; per-kind behavior is a type switch rather
/// than a registry of function pointers.
#[derive(Clone, Copy, Debug)]
pub struct EffectHandle {
    pub kind: EffectKind,
}

/// Per-row-range compositor selected ahead of the parallel fan-out.
#[derive(Clone, Copy)]
enum SliceOp {
    Cross,
    GammaCross,
    Add,
    Sub,
    Mul,
    AlphaOver,
    AlphaUnder,
    OverDrop,
    Blend(BlendMode),
}

impl EffectHandle {
    /// Handle for a strip's secondary blend mode, if it runs a compositor.
    pub fn for_blend_mode(strip: &Strip) -> Option<EffectHandle> {
        match strip.blend {
            StripBlend::Replace => None,
            StripBlend::Kind(kind) => Some(kind.handle()),
        }
    }

    /// Number of input strips this kind consumes.
    pub fn num_inputs(&self) -> usize {
        match self.kind {
            EffectKind::Transform
            | EffectKind::Glow
            | EffectKind::Speed
            | EffectKind::GaussianBlur => 1,
            EffectKind::SolidColor
            | EffectKind::Multicam
            | EffectKind::Adjustment
            | EffectKind::Text => 0,
            _ => 2,
        }
    }

    /// Whether `execute` fans the frame out over the slice scheduler.
    pub fn multithreaded(&self) -> bool {
        matches!(
            self.kind,
            EffectKind::Cross
                | EffectKind::GammaCross
                | EffectKind::Add
                | EffectKind::Sub
                | EffectKind::Mul
                | EffectKind::AlphaOver
                | EffectKind::AlphaUnder
                | EffectKind::OverDrop
                | EffectKind::Blend(_)
                | EffectKind::ColorMix
                | EffectKind::Transform
        )
    }

    /// Whether the surrounding pipeline may apply a mask to this effect.
    pub fn supports_mask(&self) -> bool {
        matches!(self.kind, EffectKind::Adjustment)
    }

    /// Set up a freshly created strip of this kind.
    pub fn init(&self, strip: &mut Strip) {
        strip.params = EffectParams::default_for(self.kind);
        if matches!(self.kind, EffectKind::AlphaOver | EffectKind::AlphaUnder) {
            strip.swap_inputs();
        }
    }

    /// Reset derived state after a strip was loaded from storage.
    pub fn load(&self, strip: &mut Strip) {
        match &mut strip.params {
            EffectParams::Speed(p) => p.frame_map = None,
            EffectParams::Text(p) => {
                p.runtime = None;
                p.font_handle = None;
            }
            _ => {}
        }
    }

    /// Decide whether pixel work can be skipped, before any allocation.
    pub fn early_out(&self, strip: &Strip, fac: f32) -> EarlyOut {
        match self.kind {
            EffectKind::Cross | EffectKind::GammaCross | EffectKind::Wipe => {
                if fac == 0.0 {
                    EarlyOut::UseInput1
                } else if fac == 1.0 {
                    EarlyOut::UseInput2
                } else {
                    EarlyOut::DoEffect
                }
            }
            EffectKind::Add
            | EffectKind::Sub
            | EffectKind::Mul
            | EffectKind::Blend(_)
            | EffectKind::ColorMix => {
                if fac == 0.0 {
                    EarlyOut::UseInput1
                } else {
                    EarlyOut::DoEffect
                }
            }
            EffectKind::AlphaOver => {
                if fac == 0.0 {
                    EarlyOut::UseInput2
                } else {
                    EarlyOut::DoEffect
                }
            }
            EffectKind::GaussianBlur => match strip.params.as_gaussian_blur() {
                Ok(p) if p.size_x == 0.0 && p.size_y == 0.0 => EarlyOut::UseInput1,
                _ => EarlyOut::DoEffect,
            },
            EffectKind::Text => match strip.params.as_text() {
                Ok(p) if !p.is_renderable() => EarlyOut::UseInput1,
                _ => EarlyOut::NoInput,
            },
            EffectKind::SolidColor | EffectKind::Multicam | EffectKind::Adjustment => {
                EarlyOut::NoInput
            }
            _ => EarlyOut::DoEffect,
        }
    }

    /// Implicit blend factor when the user has not driven it explicitly.
    ///
    /// Fade transitions interpolate linearly across the strip's active span.
    pub fn default_factor(&self, strip: &Strip, timeline_frame: f32) -> f32 {
        match self.kind {
            EffectKind::Cross | EffectKind::GammaCross | EffectKind::Wipe => {
                let length = strip.strip_length();
                if length <= 0 {
                    return 1.0;
                }
                ((timeline_frame - strip.left_handle as f32) / length as f32).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    /// Run the effect, producing a freshly allocated output frame.
    ///
    /// Multithreading-capable kinds fan the output rows out over the slice
    /// scheduler internally; single-shot kinds run as one call (and may
    /// parallelize by their own row ranges). `None` means "nothing to
    /// composite" and only occurs for multicam/adjustment.
    pub fn execute(
        &self,
        ctx: &RenderContext<'_>,
        strip: &mut Strip,
        timeline_frame: f32,
        fac: f32,
        in1: Option<&Frame>,
        in2: Option<&Frame>,
    ) -> StripfxResult<Option<Frame>> {
        let needed = self.num_inputs();
        if needed >= 1 && in1.is_none() {
            return Err(StripfxError::validation(format!(
                "{:?} effect requires input 1",
                self.kind
            )));
        }
        if needed >= 2 && in2.is_none() {
            return Err(StripfxError::validation(format!(
                "{:?} effect requires input 2",
                self.kind
            )));
        }

        match self.kind {
            EffectKind::Wipe => self.execute_wipe(ctx, strip, fac, in1.unwrap(), in2.unwrap()),
            EffectKind::Glow => self.execute_glow(ctx, strip, fac, in1.unwrap()),
            EffectKind::GaussianBlur => self.execute_gaussian_blur(ctx, strip, in1.unwrap()),
            EffectKind::SolidColor => {
                let mut out = Frame::effect_output(ctx.width, ctx.height, in1, in2);
                color::solid_color_frame(strip.params.as_solid_color()?, &mut out);
                Ok(Some(out))
            }
            EffectKind::Speed => self.execute_speed(ctx, strip, timeline_frame, fac, in1, in2),
            EffectKind::Multicam => Ok(channel::multicam_frame(ctx, strip, timeline_frame)),
            EffectKind::Adjustment => Ok(channel::adjustment_frame(ctx, strip, timeline_frame)),
            EffectKind::Text => crate::text::render::text_effect_frame(ctx, strip).map(Some),
            EffectKind::Transform => self.execute_transform(ctx, strip, in1.unwrap()),
            _ => self.execute_sliced(ctx, strip, fac, in1.unwrap(), in2.unwrap()),
        }
    }

    fn slice_op(&self, strip: &Strip) -> StripfxResult<(SliceOp, Option<f32>)> {
        Ok(match self.kind {
            EffectKind::Cross => (SliceOp::Cross, None),
            EffectKind::GammaCross => (SliceOp::GammaCross, None),
            EffectKind::Add => (SliceOp::Add, None),
            EffectKind::Sub => (SliceOp::Sub, None),
            EffectKind::Mul => (SliceOp::Mul, None),
            EffectKind::AlphaOver => (SliceOp::AlphaOver, None),
            EffectKind::AlphaUnder => (SliceOp::AlphaUnder, None),
            EffectKind::OverDrop => (SliceOp::OverDrop, None),
            EffectKind::Blend(mode) => (SliceOp::Blend(mode), None),
            EffectKind::ColorMix => {
                let p = strip.params.as_color_mix()?;
                (SliceOp::Blend(p.blend_mode), Some(p.factor))
            }
            _ => {
                return Err(StripfxError::render(format!(
                    "{:?} has no slice compositor",
                    self.kind
                )));
            }
        })
    }

    fn execute_sliced(
        &self,
        ctx: &RenderContext<'_>,
        strip: &Strip,
        fac: f32,
        in1: &Frame,
        in2: &Frame,
    ) -> StripfxResult<Option<Frame>> {
        let (op, fac_override) = self.slice_op(strip)?;
        let fac = fac_override.unwrap_or(fac);

        let mut out = Frame::effect_output(ctx.width, ctx.height, Some(in1), Some(in2));
        let width = ctx.width as usize;
        let float_out = out.is_float();
        let a = in1.match_depth(float_out);
        let b = in2.match_depth(float_out);

        if let Some(rows) = out.bytes_mut() {
            let src1 = a.bytes().ok_or_else(depth_mismatch)?;
            let src2 = b.bytes().ok_or_else(depth_mismatch)?;
            check_input_len(src1.len(), rows.len())?;
            check_input_len(src2.len(), rows.len())?;
            par_row_slices(rows, width, |start, rows| {
                run_rows_bytes(op, fac, width, start, src1, src2, rows);
            });
        } else if let Some(rows) = out.floats_mut() {
            let src1 = a.floats().ok_or_else(depth_mismatch)?;
            let src2 = b.floats().ok_or_else(depth_mismatch)?;
            check_input_len(src1.len(), rows.len())?;
            check_input_len(src2.len(), rows.len())?;
            par_row_slices(rows, width, |start, rows| {
                run_rows_floats(op, fac, width, start, src1, src2, rows);
            });
        }
        Ok(Some(out))
    }

    fn execute_transform(
        &self,
        ctx: &RenderContext<'_>,
        strip: &Strip,
        in1: &Frame,
    ) -> StripfxResult<Option<Frame>> {
        let params = strip.params.as_transform()?;
        let width = ctx.width as usize;
        let height = ctx.height as usize;
        let resolved = transform::ResolvedTransform::new(params, width, height, ctx.preview_scale);

        let mut out = Frame::effect_output(ctx.width, ctx.height, Some(in1), None);
        if let Some(rows) = out.bytes_mut() {
            let src = in1.bytes().ok_or_else(depth_mismatch)?;
            check_input_len(src.len(), rows.len())?;
            par_row_slices(rows, width, |start, rows| {
                let lines = rows.len() / (width * 4);
                transform::transform_slice(&resolved, width, height, src, start, lines, rows);
            });
        } else if let Some(rows) = out.floats_mut() {
            let src = in1.floats().ok_or_else(depth_mismatch)?;
            check_input_len(src.len(), rows.len())?;
            par_row_slices(rows, width, |start, rows| {
                let lines = rows.len() / (width * 4);
                transform::transform_slice(&resolved, width, height, src, start, lines, rows);
            });
        }
        Ok(Some(out))
    }

    fn execute_wipe(
        &self,
        ctx: &RenderContext<'_>,
        strip: &Strip,
        fac: f32,
        in1: &Frame,
        in2: &Frame,
    ) -> StripfxResult<Option<Frame>> {
        let params = strip.params.as_wipe()?;
        let mut out = Frame::effect_output(ctx.width, ctx.height, Some(in1), Some(in2));
        let width = ctx.width as usize;
        let float_out = out.is_float();
        let a = in1.match_depth(float_out);
        let b = in2.match_depth(float_out);

        if let Some(dst) = out.bytes_mut() {
            let src1 = a.bytes().ok_or_else(depth_mismatch)?;
            let src2 = b.bytes().ok_or_else(depth_mismatch)?;
            check_input_len(src1.len(), dst.len())?;
            check_input_len(src2.len(), dst.len())?;
            wipe::wipe_frame(params, fac, width, src1, src2, dst);
        } else if let Some(dst) = out.floats_mut() {
            let src1 = a.floats().ok_or_else(depth_mismatch)?;
            let src2 = b.floats().ok_or_else(depth_mismatch)?;
            check_input_len(src1.len(), dst.len())?;
            check_input_len(src2.len(), dst.len())?;
            wipe::wipe_frame(params, fac, width, src1, src2, dst);
        }
        Ok(Some(out))
    }

    fn execute_glow(
        &self,
        ctx: &RenderContext<'_>,
        strip: &Strip,
        fac: f32,
        in1: &Frame,
    ) -> StripfxResult<Option<Frame>> {
        let params = strip.params.as_glow()?;
        let width = ctx.width as usize;
        let height = ctx.height as usize;
        let render_scale = ctx.render_scale();

        let mut out = Frame::effect_output(ctx.width, ctx.height, Some(in1), None);
        if out.is_float() {
            let input = in1.floats().ok_or_else(depth_mismatch)?;
            let dst = out.floats_mut().ok_or_else(depth_mismatch)?;
            check_input_len(input.len(), width * height * 4)?;
            glow::glow_frame(params, fac, render_scale, width, height, input, dst);
        } else {
            // The glow core works in float; byte frames convert around it.
            let input = in1.promote_to_float();
            check_input_len(
                input.floats().map_or(0, <[f32]>::len),
                width * height * 4,
            )?;
            let mut work = vec![0f32; width * height * 4];
            glow::glow_frame(
                params,
                fac,
                render_scale,
                width,
                height,
                input.floats().unwrap(),
                &mut work,
            );
            let dst = out.bytes_mut().unwrap();
            for (px, col) in dst.chunks_exact_mut(4).zip(work.chunks_exact(4)) {
                let straight = crate::foundation::math::premul_f32_to_straight_u8([
                    col[0], col[1], col[2], col[3],
                ]);
                px.copy_from_slice(&straight);
            }
        }
        Ok(Some(out))
    }

    fn execute_gaussian_blur(
        &self,
        ctx: &RenderContext<'_>,
        strip: &Strip,
        in1: &Frame,
    ) -> StripfxResult<Option<Frame>> {
        let params = strip.params.as_gaussian_blur()?;
        let width = ctx.width as usize;
        let height = ctx.height as usize;

        let mut out = Frame::effect_output(ctx.width, ctx.height, Some(in1), None);
        if let Some(dst) = out.bytes_mut() {
            let src = in1.bytes().ok_or_else(depth_mismatch)?;
            check_input_len(src.len(), dst.len())?;
            blur::gaussian_blur_frame(params.size_x, params.size_y, width, height, src, dst);
        } else if let Some(dst) = out.floats_mut() {
            let src = in1.floats().ok_or_else(depth_mismatch)?;
            check_input_len(src.len(), dst.len())?;
            blur::gaussian_blur_frame(params.size_x, params.size_y, width, height, src, dst);
        }
        Ok(Some(out))
    }

    fn execute_speed(
        &self,
        ctx: &RenderContext<'_>,
        strip: &mut Strip,
        timeline_frame: f32,
        fac: f32,
        in1: Option<&Frame>,
        in2: Option<&Frame>,
    ) -> StripfxResult<Option<Frame>> {
        let use_interpolation = strip.params.as_speed()?.use_interpolation;
        let Some(in1) = in1 else {
            return Err(StripfxError::validation("speed effect requires input 1"));
        };

        if use_interpolation && let Some(in2) = in2 {
            // Input 1 holds the floor frame, input 2 the ceiling frame; blend
            // them with the cross compositor at the fractional position.
            let source = ctx
                .sources
                .and_then(|s| strip.input1.and_then(|id| s.strip(id)));
            let ratio = match source {
                Some(source) => speed_interpolation_ratio(strip, &source, timeline_frame)?,
                None => fac,
            };
            return EffectKind::Cross.handle().execute(
                ctx,
                strip,
                timeline_frame,
                ratio,
                Some(in1),
                Some(in2),
            );
        }

        Ok(Some(in1.duplicate()))
    }
}

fn depth_mismatch() -> StripfxError {
    StripfxError::render("input frame depth does not match output depth")
}

fn check_input_len(input: usize, output: usize) -> StripfxResult<()> {
    if input != output {
        return Err(StripfxError::render(
            "effect input buffers must match the output size",
        ));
    }
    Ok(())
}

fn run_rows_bytes(
    op: SliceOp,
    fac: f32,
    width: usize,
    start_line: usize,
    src1: &[u8],
    src2: &[u8],
    rows: &mut [u8],
) {
    let off = start_line * width * 4;
    let a = &src1[off..off + rows.len()];
    let b = &src2[off..off + rows.len()];
    match op {
        SliceOp::Cross => cross::cross_byte(fac, a, b, rows),
        SliceOp::GammaCross => cross::gamma_cross(fac, a, b, rows),
        SliceOp::Add => arith::add_byte(fac, a, b, rows),
        SliceOp::Sub => arith::sub_byte(fac, a, b, rows),
        SliceOp::Mul => arith::mul_byte(fac, a, b, rows),
        SliceOp::AlphaOver => alpha::alpha_over(fac, a, b, rows),
        SliceOp::AlphaUnder => alpha::alpha_under(fac, a, b, rows),
        SliceOp::OverDrop => arith::over_drop_rows(fac, width, start_line, src1, src2, rows),
        SliceOp::Blend(mode) => blend::apply_blend(mode, fac, a, b, rows),
    }
}

fn run_rows_floats(
    op: SliceOp,
    fac: f32,
    width: usize,
    start_line: usize,
    src1: &[f32],
    src2: &[f32],
    rows: &mut [f32],
) {
    let off = start_line * width * 4;
    let a = &src1[off..off + rows.len()];
    let b = &src2[off..off + rows.len()];
    match op {
        SliceOp::Cross => cross::cross_float(fac, a, b, rows),
        SliceOp::GammaCross => cross::gamma_cross(fac, a, b, rows),
        SliceOp::Add => arith::add_float(fac, a, b, rows),
        SliceOp::Sub => arith::sub_float(fac, a, b, rows),
        SliceOp::Mul => arith::mul_float(fac, a, b, rows),
        SliceOp::AlphaOver => alpha::alpha_over(fac, a, b, rows),
        SliceOp::AlphaUnder => alpha::alpha_under(fac, a, b, rows),
        SliceOp::OverDrop => arith::over_drop_rows(fac, width, start_line, src1, src2, rows),
        SliceOp::Blend(mode) => blend::apply_blend(mode, fac, a, b, rows),
    }
}
