use crate::effects::EarlyOut;
use crate::foundation::error::StripfxResult;
use crate::frame::Frame;
use crate::render::context::RenderContext;
use crate::strip::Strip;

/// Render one strip effect for a timeline frame.
///
/// `fac` overrides the blend factor; when `None` the kind's implicit factor
/// for the frame is used. `early_out` runs before any pixel work: a
/// "use input" decision duplicates that input without running a compositor,
/// and `Ok(None)` means there is nothing to composite (the caller skips the
/// strip rather than failing the render).
pub fn render_effect(
    ctx: &RenderContext<'_>,
    strip: &mut Strip,
    timeline_frame: f32,
    fac: Option<f32>,
    in1: Option<&Frame>,
    in2: Option<&Frame>,
) -> StripfxResult<Option<Frame>> {
    let handle = strip.kind.handle();
    let fac = fac.unwrap_or_else(|| handle.default_factor(strip, timeline_frame));

    match handle.early_out(strip, fac) {
        EarlyOut::UseInput1 => Ok(in1.map(Frame::duplicate)),
        EarlyOut::UseInput2 => Ok(in2.map(Frame::duplicate)),
        EarlyOut::NoInput | EarlyOut::DoEffect => {
            handle.execute(ctx, strip, timeline_frame, fac, in1, in2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectKind;

    fn constant_byte_frame(w: u32, h: u32, px: [u8; 4]) -> Frame {
        let data = px.repeat((w * h) as usize);
        Frame::from_bytes(w, h, data).unwrap()
    }

    #[test]
    fn cross_at_zero_is_a_copy_of_input1() {
        let ctx = RenderContext::new(2, 2);
        let mut strip = Strip::new(EffectKind::Cross);
        let a = constant_byte_frame(2, 2, [255, 0, 0, 255]);
        let b = constant_byte_frame(2, 2, [0, 0, 255, 255]);
        let out = render_effect(&ctx, &mut strip, 0.0, Some(0.0), Some(&a), Some(&b))
            .unwrap()
            .unwrap();
        assert_eq!(out.bytes().unwrap(), a.bytes().unwrap());
    }

    #[test]
    fn default_factor_comes_from_the_timeline_position() {
        let ctx = RenderContext::new(2, 2);
        let mut strip = Strip::new(EffectKind::Cross);
        strip.left_handle = 0;
        strip.right_handle = 10;
        let a = constant_byte_frame(2, 2, [200, 0, 0, 255]);
        let b = constant_byte_frame(2, 2, [0, 0, 200, 255]);
        // Frame 0 sits at fac 0: early-out to input 1.
        let out = render_effect(&ctx, &mut strip, 0.0, None, Some(&a), Some(&b))
            .unwrap()
            .unwrap();
        assert_eq!(out.bytes().unwrap(), a.bytes().unwrap());
    }

    #[test]
    fn missing_inputs_for_a_compositor_error_out() {
        let ctx = RenderContext::new(2, 2);
        let mut strip = Strip::new(EffectKind::Cross);
        let err = render_effect(&ctx, &mut strip, 0.0, Some(0.5), None, None);
        assert!(err.is_err());
    }

    #[test]
    fn multicam_without_sources_is_nothing_to_composite() {
        let ctx = RenderContext::new(2, 2);
        let mut strip = Strip::new(EffectKind::Multicam);
        strip.channel = 2;
        strip.multicam_source = 1;
        let out = render_effect(&ctx, &mut strip, 0.0, None, None, None).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn solid_color_needs_no_inputs() {
        let ctx = RenderContext::new(3, 2);
        let mut strip = Strip::new(EffectKind::SolidColor);
        let out = render_effect(&ctx, &mut strip, 0.0, None, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(out.width(), 3);
        assert_eq!(out.bytes().unwrap()[3], 255);
    }
}
