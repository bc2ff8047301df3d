use crate::effects::{BlendMode, EffectKind};
use crate::foundation::error::{StripfxError, StripfxResult};
use crate::text::fonts::FontHandle;
use crate::text::layout::TextRuntime;

/// Per-effect parameter record, owned exclusively by its strip.
///
/// The variant must always match the strip's [`EffectKind`]; the typed
/// accessors below turn a mismatch into a validation error instead of an
/// unchecked cast.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum EffectParams {
    None,
    Wipe(WipeParams),
    Glow(GlowParams),
    Transform(TransformParams),
    Speed(SpeedParams),
    ColorMix(ColorMixParams),
    SolidColor(SolidColorParams),
    GaussianBlur(GaussianBlurParams),
    Text(TextParams),
}

impl EffectParams {
    /// Default parameter record for an effect kind.
    pub fn default_for(kind: EffectKind) -> Self {
        match kind {
            EffectKind::Wipe => Self::Wipe(WipeParams::default()),
            EffectKind::Glow => Self::Glow(GlowParams::default()),
            EffectKind::Transform => Self::Transform(TransformParams::default()),
            EffectKind::Speed => Self::Speed(SpeedParams::default()),
            EffectKind::ColorMix => Self::ColorMix(ColorMixParams::default()),
            EffectKind::SolidColor => Self::SolidColor(SolidColorParams::default()),
            EffectKind::GaussianBlur => Self::GaussianBlur(GaussianBlurParams::default()),
            EffectKind::Text => Self::Text(TextParams::default()),
            _ => Self::None,
        }
    }

    pub fn as_wipe(&self) -> StripfxResult<&WipeParams> {
        match self {
            Self::Wipe(p) => Ok(p),
            _ => Err(mismatch("wipe")),
        }
    }

    pub fn as_glow(&self) -> StripfxResult<&GlowParams> {
        match self {
            Self::Glow(p) => Ok(p),
            _ => Err(mismatch("glow")),
        }
    }

    pub fn as_transform(&self) -> StripfxResult<&TransformParams> {
        match self {
            Self::Transform(p) => Ok(p),
            _ => Err(mismatch("transform")),
        }
    }

    pub fn as_speed(&self) -> StripfxResult<&SpeedParams> {
        match self {
            Self::Speed(p) => Ok(p),
            _ => Err(mismatch("speed")),
        }
    }

    pub fn as_speed_mut(&mut self) -> StripfxResult<&mut SpeedParams> {
        match self {
            Self::Speed(p) => Ok(p),
            _ => Err(mismatch("speed")),
        }
    }

    pub fn as_color_mix(&self) -> StripfxResult<&ColorMixParams> {
        match self {
            Self::ColorMix(p) => Ok(p),
            _ => Err(mismatch("color mix")),
        }
    }

    pub fn as_solid_color(&self) -> StripfxResult<&SolidColorParams> {
        match self {
            Self::SolidColor(p) => Ok(p),
            _ => Err(mismatch("solid color")),
        }
    }

    pub fn as_gaussian_blur(&self) -> StripfxResult<&GaussianBlurParams> {
        match self {
            Self::GaussianBlur(p) => Ok(p),
            _ => Err(mismatch("gaussian blur")),
        }
    }

    pub fn as_text(&self) -> StripfxResult<&TextParams> {
        match self {
            Self::Text(p) => Ok(p),
            _ => Err(mismatch("text")),
        }
    }

    pub fn as_text_mut(&mut self) -> StripfxResult<&mut TextParams> {
        match self {
            Self::Text(p) => Ok(p),
            _ => Err(mismatch("text")),
        }
    }
}

fn mismatch(expected: &str) -> StripfxError {
    StripfxError::validation(format!("strip parameters are not {expected} parameters"))
}

/// Wipe transition sub-type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WipeType {
    #[default]
    Single,
    Double,
    Clock,
    Iris,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct WipeParams {
    pub wipe_type: WipeType,
    /// Width of the blurred edge band as a fraction of the frame.
    pub edge_width: f32,
    /// Wipe line angle in radians; negative angles flip horizontally.
    pub angle: f32,
    /// Reversed sweep direction.
    pub forward: bool,
}

impl Default for WipeParams {
    fn default() -> Self {
        Self {
            wipe_type: WipeType::Single,
            edge_width: 0.0,
            angle: 0.0,
            forward: true,
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct GlowParams {
    /// Luminance threshold for highlight isolation, scaled by 3 in the kernel.
    pub threshold: f32,
    /// Upper clamp for isolated highlight intensity.
    pub clamp: f32,
    /// Intensity multiplier applied to isolated highlights.
    pub boost: f32,
    /// Blur distance in pixels at full render size.
    pub blur_distance: f32,
    /// Blur quality step; the kernel half-width is `(quality + 1) * distance`.
    pub quality: i32,
    /// Output only the blurred glow instead of adding it onto the input.
    pub no_composite: bool,
}

impl Default for GlowParams {
    fn default() -> Self {
        Self {
            threshold: 0.25,
            clamp: 1.0,
            boost: 0.5,
            blur_distance: 3.0,
            quality: 3,
            no_composite: false,
        }
    }
}

/// Sampling quality for the transform effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransformInterpolation {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
}

/// Units of the transform translation values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TranslationUnits {
    /// Percent of the output frame size.
    #[default]
    Percent,
    /// Pixels at full render size, rescaled by the preview scale factor.
    Pixels,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct TransformParams {
    pub scale_x: f32,
    pub scale_y: f32,
    pub uniform_scale: bool,
    pub translate_x: f32,
    pub translate_y: f32,
    pub rotation_deg: f32,
    pub interpolation: TransformInterpolation,
    pub units: TranslationUnits,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            uniform_scale: false,
            translate_x: 0.0,
            translate_y: 0.0,
            rotation_deg: 0.0,
            interpolation: TransformInterpolation::Bilinear,
            units: TranslationUnits::Percent,
        }
    }
}

/// Keyframed speed-factor curve, linearly interpolated between keys.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FactorCurve {
    /// `(frame, value)` pairs sorted by frame.
    keys: Vec<(f32, f32)>,
}

impl FactorCurve {
    pub fn new(mut keys: Vec<(f32, f32)>) -> Self {
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sample the curve at a frame, holding the end values outside the range.
    pub fn evaluate(&self, frame: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        if frame <= first.0 {
            return first.1;
        }
        let last = self.keys[self.keys.len() - 1];
        if frame >= last.0 {
            return last.1;
        }
        for pair in self.keys.windows(2) {
            let (f0, v0) = pair[0];
            let (f1, v1) = pair[1];
            if frame <= f1 {
                let span = f1 - f0;
                if span <= 0.0 {
                    return v1;
                }
                let t = (frame - f0) / span;
                return v0 + (v1 - v0) * t;
            }
        }
        last.1
    }
}

/// How the speed effect maps output frames to source frames.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SpeedMode {
    /// Linear ratio of the effect span to the source content, driven by the
    /// right trim handle only.
    Stretch,
    /// Constant multiplier, or an integrated per-frame curve when animated.
    Multiply {
        factor: f32,
        curve: Option<FactorCurve>,
    },
    /// Fixed total playback length as a percentage of the source length.
    Length { percent: f32 },
    /// Explicit absolute source frame.
    FrameNumber { frame: f32 },
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct SpeedParams {
    pub mode: SpeedMode,
    /// Blend between neighbouring source frames at fractional positions.
    pub use_interpolation: bool,
    /// Lazily built per-output-frame source positions for animated multiply.
    #[serde(skip)]
    pub(crate) frame_map: Option<Vec<f32>>,
}

impl Default for SpeedParams {
    fn default() -> Self {
        Self {
            mode: SpeedMode::Stretch,
            use_interpolation: false,
            frame_map: None,
        }
    }
}

impl Clone for SpeedParams {
    fn clone(&self) -> Self {
        // The frame map is derived state; a copy starts without it.
        Self {
            mode: self.mode.clone(),
            use_interpolation: self.use_interpolation,
            frame_map: None,
        }
    }
}

impl SpeedParams {
    /// Drop the cached frame map so the next render rebuilds it.
    pub fn invalidate(&mut self) {
        self.frame_map = None;
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ColorMixParams {
    pub blend_mode: BlendMode,
    pub factor: f32,
}

impl Default for ColorMixParams {
    fn default() -> Self {
        Self {
            blend_mode: BlendMode::Overlay,
            factor: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct SolidColorParams {
    pub color: [f32; 3],
}

impl Default for SolidColorParams {
    fn default() -> Self {
        Self {
            color: [0.5, 0.5, 0.5],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct GaussianBlurParams {
    pub size_x: f32,
    pub size_y: f32,
}

/// Where the font for a text strip comes from.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FontSpec {
    /// Built-in fallback font of the loader.
    #[default]
    Builtin,
    /// Font file on disk.
    Path(std::path::PathBuf),
    /// In-memory font block keyed by a content-derived name.
    Memory { name: String, data: Vec<u8> },
}

/// Horizontal alignment / anchoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TextAlignX {
    Left,
    #[default]
    Center,
    Right,
}

/// Vertical anchoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TextAlignY {
    Top,
    #[default]
    Center,
    Bottom,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct TextParams {
    pub text: String,
    pub font: FontSpec,
    /// Cache-owned handle for the loaded font; taken out on clone so every
    /// copy re-references the cache itself.
    #[serde(skip)]
    pub(crate) font_handle: Option<FontHandle>,
    /// Text size in pixels at full render size.
    pub size: f32,
    pub color: [f32; 4],

    pub use_shadow: bool,
    pub shadow_color: [f32; 4],
    /// Shadow direction in radians.
    pub shadow_angle: f32,
    /// Shadow offset as a fraction of the line height.
    pub shadow_offset: f32,
    /// Shadow blur; 1.0 blurs with half the line height.
    pub shadow_blur: f32,

    pub use_outline: bool,
    pub outline_color: [f32; 4],
    /// Outline width; 1.0 maps to half the line height.
    pub outline_width: f32,

    pub use_box: bool,
    pub box_color: [f32; 4],
    /// Box margin as a fraction of the frame width.
    pub box_margin: f32,
    /// Corner roundness; 1.0 rounds with half the box height.
    pub box_roundness: f32,

    /// Text origin as a fraction of the frame size.
    pub location: [f32; 2],
    pub anchor_x: TextAlignX,
    pub anchor_y: TextAlignY,
    pub align_x: TextAlignX,
    /// Wrap width as a fraction of the frame width; 0 disables wrapping.
    pub wrap_width: f32,

    /// Style flags. Face selection for bold/italic is up to the font the
    /// embedder loads; the engine does not synthesize styles.
    pub bold: bool,
    pub italic: bool,

    #[serde(skip)]
    pub(crate) runtime: Option<TextRuntime>,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            text: "Text".to_owned(),
            font: FontSpec::Builtin,
            font_handle: None,
            size: 60.0,
            color: [1.0, 1.0, 1.0, 1.0],
            use_shadow: false,
            shadow_color: [0.0, 0.0, 0.0, 0.7],
            shadow_angle: 65f32.to_radians(),
            shadow_offset: 0.04,
            shadow_blur: 0.0,
            use_outline: false,
            outline_color: [0.0, 0.0, 0.0, 0.7],
            outline_width: 0.05,
            use_box: false,
            box_color: [0.2, 0.2, 0.2, 0.7],
            box_margin: 0.01,
            box_roundness: 0.0,
            location: [0.5, 0.5],
            anchor_x: TextAlignX::Center,
            anchor_y: TextAlignY::Center,
            align_x: TextAlignX::Center,
            wrap_width: 1.0,
            bold: false,
            italic: false,
            runtime: None,
        }
    }
}

impl Clone for TextParams {
    fn clone(&self) -> Self {
        Self {
            text: self.text.clone(),
            font: self.font.clone(),
            // FontHandle::clone adds a cache reference for the copy.
            font_handle: self.font_handle.clone(),
            size: self.size,
            color: self.color,
            use_shadow: self.use_shadow,
            shadow_color: self.shadow_color,
            shadow_angle: self.shadow_angle,
            shadow_offset: self.shadow_offset,
            shadow_blur: self.shadow_blur,
            use_outline: self.use_outline,
            outline_color: self.outline_color,
            outline_width: self.outline_width,
            use_box: self.use_box,
            box_color: self.box_color,
            box_margin: self.box_margin,
            box_roundness: self.box_roundness,
            location: self.location,
            anchor_x: self.anchor_x,
            anchor_y: self.anchor_y,
            align_x: self.align_x,
            wrap_width: self.wrap_width,
            bold: self.bold,
            italic: self.italic,
            // Laid-out geometry is derived state; copies recompute it.
            runtime: None,
        }
    }
}

impl TextParams {
    /// Whether this strip can produce any visible pixels at all.
    pub fn is_renderable(&self) -> bool {
        if self.size < 1.0 {
            return false;
        }
        let shadow_visible = self.use_shadow && self.shadow_color[3] > 0.0;
        let outline_visible =
            self.use_outline && self.outline_color[3] > 0.0 && self.outline_width > 0.0;
        self.color[3] > 0.0 || shadow_visible || outline_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_clone_resets_frame_map() {
        let mut params = SpeedParams::default();
        params.frame_map = Some(vec![0.0, 1.0]);
        let copy = params.clone();
        assert!(copy.frame_map.is_none());
        assert!(params.frame_map.is_some());
    }

    #[test]
    fn text_clone_resets_runtime() {
        let params = TextParams::default();
        let copy = params.clone();
        assert!(copy.runtime.is_none());
    }

    #[test]
    fn factor_curve_interpolates_and_holds_ends() {
        let curve = FactorCurve::new(vec![(10.0, 1.0), (20.0, 3.0)]);
        assert_eq!(curve.evaluate(0.0), 1.0);
        assert_eq!(curve.evaluate(15.0), 2.0);
        assert_eq!(curve.evaluate(25.0), 3.0);
    }

    #[test]
    fn inert_text_is_not_renderable() {
        let mut params = TextParams::default();
        params.color[3] = 0.0;
        assert!(!params.is_renderable());
        params.use_outline = true;
        assert!(params.is_renderable());
    }

    #[test]
    fn params_round_trip_through_json() {
        let params = EffectParams::Glow(GlowParams::default());
        let text = serde_json::to_string(&params).unwrap();
        let back: EffectParams = serde_json::from_str(&text).unwrap();
        assert!(matches!(back, EffectParams::Glow(_)));
    }
}
