use crate::frame::Frame;
use crate::strip::Strip;
use crate::text::fonts::FontCache;
use std::sync::Arc;

/// Re-entry interface into the surrounding render pipeline, used by the
/// multicam and adjustment effects to fetch other channels' frames.
pub trait SourceProvider: Sync {
    /// Render the composited stack at `channel` and below for a frame, or
    /// `None` when there is nothing to show.
    fn render_channel(
        &self,
        ctx: &RenderContext<'_>,
        channel: i32,
        timeline_frame: f32,
    ) -> Option<Frame>;

    /// The meta-strip containing `strip`, if any.
    fn meta_parent(&self, strip: &Strip) -> Option<Strip>;

    /// Resolve a strip reference to its record.
    ///
    /// The speed effect uses this to reach its source strip's timing; the
    /// default implementation resolves nothing.
    fn strip(&self, _id: crate::strip::StripId) -> Option<Strip> {
        None
    }
}

/// Per-render state handed to every effect.
#[derive(Clone)]
pub struct RenderContext<'a> {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Full-resolution render width the scene is set up for.
    pub scene_width: u32,
    /// Full-resolution render height the scene is set up for.
    pub scene_height: u32,
    /// Scale factor for pixel-space parameters at preview resolutions.
    pub preview_scale: f32,
    /// Shared font cache for text strips.
    pub fonts: Arc<FontCache>,
    /// Channel re-entry for multicam/adjustment strips.
    pub sources: Option<&'a dyn SourceProvider>,
}

impl<'a> RenderContext<'a> {
    /// Context rendering at full scene resolution with a default font cache.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scene_width: width,
            scene_height: height,
            preview_scale: 1.0,
            fonts: Arc::new(FontCache::with_default_loader()),
            sources: None,
        }
    }

    /// Use a shared font cache instead of a private one.
    pub fn with_fonts(mut self, fonts: Arc<FontCache>) -> Self {
        self.fonts = fonts;
        self
    }

    /// Attach a source provider for channel re-entry effects.
    pub fn with_sources(mut self, sources: &'a dyn SourceProvider) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Mark this render as a reduced-resolution preview of a larger scene.
    pub fn with_scene_size(mut self, scene_width: u32, scene_height: u32) -> Self {
        self.scene_width = scene_width.max(1);
        self.scene_height = scene_height.max(1);
        self.preview_scale = self.width as f32 / self.scene_width as f32;
        self
    }

    /// Ratio of the render width to the full scene width.
    pub fn render_scale(&self) -> f32 {
        self.width as f32 / self.scene_width.max(1) as f32
    }
}
