use crate::frame::Frame;
use crate::render::context::RenderContext;
use crate::strip::Strip;

/// Fetch another channel's already-rendered frame for the multicam effect.
///
/// A missing or invalid source channel yields `None`, which the caller treats
/// as "nothing to composite".
pub(crate) fn multicam_frame(
    ctx: &RenderContext<'_>,
    strip: &Strip,
    timeline_frame: f32,
) -> Option<Frame> {
    if strip.multicam_source == 0 || strip.multicam_source >= strip.channel {
        return None;
    }
    let Some(sources) = ctx.sources else {
        tracing::warn!("multicam strip rendered without a source provider");
        return None;
    };
    sources.render_channel(ctx, strip.multicam_source, timeline_frame)
}

/// Render everything below the adjustment strip's channel, walking up the
/// meta-strip chain when the stack below is empty.
pub(crate) fn adjustment_frame(
    ctx: &RenderContext<'_>,
    strip: &Strip,
    timeline_frame: f32,
) -> Option<Frame> {
    let Some(sources) = ctx.sources else {
        tracing::warn!("adjustment strip rendered without a source provider");
        return None;
    };
    adjustment_impl(ctx, sources, strip, timeline_frame)
}

fn adjustment_impl(
    ctx: &RenderContext<'_>,
    sources: &dyn crate::render::context::SourceProvider,
    strip: &Strip,
    timeline_frame: f32,
) -> Option<Frame> {
    /* Clamp to the strip range so it behaves as if it had a "still frame"
     * offset; transition effects that don't overlap can't fail rendering
     * outside of the strip range. */
    let timeline_frame = timeline_frame
        .max(strip.left_handle as f32)
        .min((strip.right_handle - 1) as f32);

    let mut result = None;
    if strip.channel > 1 {
        result = sources.render_channel(ctx, strip.channel - 1, timeline_frame);
    }

    if result.is_none()
        && let Some(meta) = sources.meta_parent(strip)
    {
        result = adjustment_impl(ctx, sources, &meta, timeline_frame);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectKind;
    use crate::render::context::{RenderContext, SourceProvider};

    struct StackProvider {
        /// Channels that have content, paired with the parent they belong to.
        channels: Vec<i32>,
        meta: Option<Strip>,
    }

    impl SourceProvider for StackProvider {
        fn render_channel(
            &self,
            _ctx: &RenderContext<'_>,
            channel: i32,
            _timeline_frame: f32,
        ) -> Option<Frame> {
            self.channels
                .contains(&channel)
                .then(|| Frame::new_byte(2, 2))
        }

        fn meta_parent(&self, _strip: &Strip) -> Option<Strip> {
            self.meta.clone()
        }
    }

    fn adjustment_strip(channel: i32) -> Strip {
        let mut strip = Strip::new(EffectKind::Adjustment);
        strip.channel = channel;
        strip.left_handle = 0;
        strip.right_handle = 10;
        strip
    }

    #[test]
    fn multicam_rejects_own_or_higher_channel() {
        let provider = StackProvider {
            channels: vec![1, 2, 3],
            meta: None,
        };
        let ctx = RenderContext::new(2, 2).with_sources(&provider);

        let mut strip = Strip::new(EffectKind::Multicam);
        strip.channel = 3;
        strip.multicam_source = 3;
        assert!(multicam_frame(&ctx, &strip, 0.0).is_none());
        strip.multicam_source = 0;
        assert!(multicam_frame(&ctx, &strip, 0.0).is_none());
        strip.multicam_source = 2;
        assert!(multicam_frame(&ctx, &strip, 0.0).is_some());
    }

    #[test]
    fn adjustment_renders_channel_below() {
        let provider = StackProvider {
            channels: vec![2],
            meta: None,
        };
        let ctx = RenderContext::new(2, 2).with_sources(&provider);
        let strip = adjustment_strip(3);
        assert!(adjustment_frame(&ctx, &strip, 5.0).is_some());
    }

    #[test]
    fn adjustment_walks_meta_chain_when_stack_is_empty() {
        let meta = adjustment_strip(5);
        let provider = StackProvider {
            channels: vec![4],
            meta: Some(meta),
        };
        let ctx = RenderContext::new(2, 2).with_sources(&provider);
        // Nothing below channel 1; the meta parent sits at channel 5 with
        // channel 4 below it.
        let strip = adjustment_strip(1);
        assert!(adjustment_frame(&ctx, &strip, 5.0).is_some());
    }

    #[test]
    fn adjustment_without_provider_degrades_to_none() {
        let ctx = RenderContext::new(2, 2);
        let strip = adjustment_strip(3);
        assert!(adjustment_frame(&ctx, &strip, 5.0).is_none());
    }
}
