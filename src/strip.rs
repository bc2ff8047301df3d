use crate::effects::EffectKind;
use crate::params::EffectParams;

/// Opaque reference to another strip, resolved by the surrounding pipeline.
pub type StripId = u32;

/// Secondary blend applied while compositing a strip onto the stack below it.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StripBlend {
    /// Opaque replace, no blend kernel runs.
    Replace,
    /// Blend using the given effect kind's compositor.
    Kind(EffectKind),
}

/// A timeline strip as seen by the effect engine.
///
/// Track CRUD and handle editing are external; this record exposes the effect
/// kind, its parameter record, timing, and up to two input-strip references.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Strip {
    pub kind: EffectKind,
    pub blend: StripBlend,
    /// Channel (track) number, 1-based from the bottom of the stack.
    pub channel: i32,
    /// Timeline frame where the strip content starts.
    pub start: f32,
    /// Left trim handle, in timeline frames.
    pub left_handle: i32,
    /// Right trim handle, in timeline frames (exclusive).
    pub right_handle: i32,
    /// Frames trimmed off the start of the source content.
    pub offset_start: i32,
    /// Untrimmed source content length in frames.
    pub content_length: i32,
    pub input1: Option<StripId>,
    pub input2: Option<StripId>,
    /// Source channel for the multicam effect.
    pub multicam_source: i32,
    pub params: EffectParams,
}

impl Strip {
    /// Create a strip of the given kind with that kind's default parameters.
    pub fn new(kind: EffectKind) -> Self {
        let mut strip = Self {
            kind,
            blend: StripBlend::Replace,
            channel: 1,
            start: 0.0,
            left_handle: 0,
            right_handle: 0,
            offset_start: 0,
            content_length: 0,
            input1: None,
            input2: None,
            multicam_source: 0,
            params: EffectParams::default_for(kind),
        };
        kind.handle().init(&mut strip);
        strip
    }

    /// Active span length in frames, from the trim handles.
    pub fn strip_length(&self) -> i32 {
        self.right_handle - self.left_handle
    }

    /// 0-based frame index within the strip for a timeline frame.
    pub fn frame_index(&self, timeline_frame: f32) -> f32 {
        timeline_frame - self.left_handle as f32
    }

    /// Number of non-null input references.
    pub fn input_count(&self) -> usize {
        usize::from(self.input1.is_some()) + usize::from(self.input2.is_some())
    }

    pub(crate) fn swap_inputs(&mut self) {
        std::mem::swap(&mut self.input1, &mut self.input2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_strip_gets_matching_params() {
        let strip = Strip::new(EffectKind::Wipe);
        assert!(matches!(strip.params, EffectParams::Wipe(_)));
        let strip = Strip::new(EffectKind::Cross);
        assert!(matches!(strip.params, EffectParams::None));
    }

    #[test]
    fn alpha_over_init_swaps_inputs() {
        let mut strip = Strip::new(EffectKind::AlphaOver);
        strip.input1 = Some(1);
        strip.input2 = None;
        // Re-run init the way the registry would on load.
        EffectKind::AlphaOver.handle().init(&mut strip);
        assert_eq!(strip.input1, None);
        assert_eq!(strip.input2, Some(1));
    }

    #[test]
    fn frame_index_is_relative_to_left_handle() {
        let mut strip = Strip::new(EffectKind::Speed);
        strip.left_handle = 10;
        strip.right_handle = 20;
        assert_eq!(strip.frame_index(10.0), 0.0);
        assert_eq!(strip.strip_length(), 10);
    }
}
