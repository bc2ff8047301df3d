use crate::foundation::error::StripfxResult;
use crate::params::SpeedMode;
use crate::strip::Strip;

/// Rebuild the speed effect's frame map by integrating the speed curve over
/// the strip's active span, clamping to the source content length.
pub fn speed_rebuild_map(strip: &mut Strip, source: &Strip) -> StripfxResult<()> {
    let effect_length = strip.strip_length();
    if effect_length < 1 {
        return Ok(());
    }
    let left_handle = strip.left_handle;
    let source_max = source.content_length as f32;

    let params = strip.params.as_speed_mut()?;
    let SpeedMode::Multiply { curve: Some(curve), .. } = &params.mode else {
        return Ok(());
    };

    let mut map = Vec::with_capacity(effect_length as usize);
    map.push(0.0);
    let mut target = 0.0f32;
    for frame_index in 1..effect_length {
        target += curve.evaluate((left_handle + frame_index) as f32);
        target = target.clamp(0.0, source_max);
        map.push(target);
    }

    tracing::debug!(frames = map.len(), "rebuilt speed frame map");
    params.frame_map = Some(map);
    Ok(())
}

fn speed_frame_map_ensure(strip: &mut Strip, source: &Strip) -> StripfxResult<()> {
    let params = strip.params.as_speed()?;
    if params.frame_map.is_some() {
        return Ok(());
    }
    speed_rebuild_map(strip, source)
}

/// Source frame for an output timeline frame.
///
/// `input` selects between the two interpolation taps: 0 is the floor frame,
/// 1 the ceiling frame; without interpolation both return the same value.
pub fn speed_target_frame(
    strip: &mut Strip,
    source: &Strip,
    timeline_frame: f32,
    input: usize,
) -> StripfxResult<f32> {
    let frame_index = strip.frame_index(timeline_frame).round() as i32;

    speed_frame_map_ensure(strip, source)?;
    let params = strip.params.as_speed()?;

    let mut target = match &params.mode {
        SpeedMode::Stretch => {
            // Only the right handle controls the effect speed.
            let target_content_length = (source.content_length - source.offset_start) as f32;
            let effect_length = strip.strip_length() as f32;
            if effect_length <= 0.0 {
                0.0
            } else {
                target_content_length * (frame_index as f32 / effect_length)
            }
        }
        SpeedMode::Multiply { factor, curve } => {
            if curve.is_some() {
                let map = params.frame_map.as_deref().unwrap_or(&[]);
                let index = (frame_index.max(0) as usize).min(map.len().saturating_sub(1));
                map.get(index).copied().unwrap_or(0.0)
            } else {
                frame_index as f32 * factor
            }
        }
        SpeedMode::Length { percent } => source.content_length as f32 * (percent / 100.0),
        SpeedMode::FrameNumber { frame } => *frame,
    };

    target = target.clamp(0.0, source.content_length as f32);
    target += strip.start;

    if !params.use_interpolation {
        return Ok(target);
    }

    Ok(if input == 0 { target } else { target.ceil() })
}

/// Cross-dissolve factor between the two interpolation taps.
pub fn speed_interpolation_ratio(
    strip: &mut Strip,
    source: &Strip,
    timeline_frame: f32,
) -> StripfxResult<f32> {
    let target = speed_target_frame(strip, source, timeline_frame, 0)?;
    Ok(target - target.floor())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectKind;
    use crate::params::{FactorCurve, SpeedMode};

    fn speed_strip(len: i32) -> Strip {
        let mut strip = Strip::new(EffectKind::Speed);
        strip.left_handle = 0;
        strip.right_handle = len;
        strip
    }

    fn source_strip(content: i32) -> Strip {
        let mut source = Strip::new(EffectKind::SolidColor);
        source.content_length = content;
        source
    }

    #[test]
    fn stretch_maps_span_ends_to_source_ends() {
        let mut strip = speed_strip(10);
        let source = source_strip(50);

        let first = speed_target_frame(&mut strip, &source, 0.0, 0).unwrap();
        assert_eq!(first, 0.0);

        let last = speed_target_frame(&mut strip, &source, 10.0, 0).unwrap();
        assert_eq!(last, 50.0);
    }

    #[test]
    fn stretch_scales_with_right_handle() {
        let mut strip = speed_strip(100);
        let source = source_strip(50);
        // Twice as long as the source: half speed.
        let mid = speed_target_frame(&mut strip, &source, 50.0, 0).unwrap();
        assert_eq!(mid, 25.0);
    }

    #[test]
    fn multiply_constant_factor() {
        let mut strip = speed_strip(100);
        strip.params = crate::params::EffectParams::Speed(crate::params::SpeedParams {
            mode: SpeedMode::Multiply {
                factor: 2.0,
                curve: None,
            },
            use_interpolation: false,
            frame_map: None,
        });
        let source = source_strip(1000);
        assert_eq!(speed_target_frame(&mut strip, &source, 7.0, 0).unwrap(), 14.0);
    }

    #[test]
    fn multiply_curve_builds_monotonic_clamped_map() {
        let mut strip = speed_strip(10);
        strip.params = crate::params::EffectParams::Speed(crate::params::SpeedParams {
            mode: SpeedMode::Multiply {
                factor: 1.0,
                curve: Some(FactorCurve::new(vec![(0.0, 2.0)])),
            },
            use_interpolation: false,
            frame_map: None,
        });
        let source = source_strip(6);

        let early = speed_target_frame(&mut strip, &source, 1.0, 0).unwrap();
        assert_eq!(early, 2.0);
        // Integrated speed exceeds the source; clamped to its length.
        let late = speed_target_frame(&mut strip, &source, 9.0, 0).unwrap();
        assert_eq!(late, 6.0);

        let map = strip.params.as_speed().unwrap().frame_map.as_ref().unwrap();
        assert!(map.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn interpolation_returns_floor_and_ceil_taps() {
        let mut strip = speed_strip(10);
        strip.params = crate::params::EffectParams::Speed(crate::params::SpeedParams {
            mode: SpeedMode::Multiply {
                factor: 0.25,
                curve: None,
            },
            use_interpolation: true,
            frame_map: None,
        });
        let source = source_strip(100);

        let a = speed_target_frame(&mut strip, &source, 3.0, 0).unwrap();
        let b = speed_target_frame(&mut strip, &source, 3.0, 1).unwrap();
        assert_eq!(a, 0.75);
        assert_eq!(b, 1.0);
        let ratio = speed_interpolation_ratio(&mut strip, &source, 3.0).unwrap();
        assert!((ratio - 0.75).abs() < 1e-6);
    }

    #[test]
    fn frame_number_is_absolute() {
        let mut strip = speed_strip(10);
        strip.params = crate::params::EffectParams::Speed(crate::params::SpeedParams {
            mode: SpeedMode::FrameNumber { frame: 42.0 },
            use_interpolation: false,
            frame_map: None,
        });
        let source = source_strip(100);
        assert_eq!(speed_target_frame(&mut strip, &source, 3.0, 0).unwrap(), 42.0);
    }
}
