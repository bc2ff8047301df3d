//! Stripfx is the strip effect rendering engine of a timeline compositor.
//!
//! Given one or two already rendered input frames, a [`Strip`] record carrying
//! an effect kind and its parameters, and a blend factor, it produces an output
//! [`Frame`]. The engine covers transitions (cross, gamma cross, wipes),
//! arithmetic and named blend modes, geometric transform, Gaussian blur, glow,
//! speed remapping with sub-frame interpolation, and a text layout/outline/
//! shadow renderer backed by a shared thread-safe font cache.
//!
//! - Resolve an [`EffectHandle`] for a strip's kind
//! - Check [`EffectHandle::early_out`] before any pixel work
//! - Run [`render_effect`] to get the output frame
#![forbid(unsafe_code)]

pub mod effects;
pub mod foundation;
pub mod frame;
pub mod params;
pub mod render;
pub mod strip;
pub mod text;

pub use crate::foundation::error::{StripfxError, StripfxResult};

pub use crate::effects::{BlendMode, EarlyOut, EffectHandle, EffectKind};
pub use crate::frame::{AlphaMode, Colorspace, Frame, PixelData};
pub use crate::params::EffectParams;
pub use crate::render::context::{RenderContext, SourceProvider};
pub use crate::render::pipeline::render_effect;
pub use crate::strip::{Strip, StripBlend};
pub use crate::text::fonts::{FontCache, FontHandle, FontId, FontLoader};
