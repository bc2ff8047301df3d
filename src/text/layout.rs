//! Text layout: character metrics, word wrapping, alignment, anchoring.

use crate::params::{TextAlignX, TextAlignY, TextParams};

/// Scaled font metrics the layout consumes.
///
/// Rasterization backends implement this; tests use fixed-advance doubles.
pub trait GlyphMetrics {
    fn advance(&self, ch: char) -> f32;
    fn ascent(&self) -> f32;
    fn descent(&self) -> f32;
    fn line_gap(&self) -> f32;
}

/// One laid-out character.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharInfo {
    pub ch: char,
    pub advance: f32,
    /// Baseline origin in output pixels after alignment.
    pub position: [f32; 2],
    pub(crate) do_wrap: bool,
}

/// One logical line, terminated by wrap, newline, or end of text.
#[derive(Clone, Debug, Default)]
pub struct LineInfo {
    pub characters: Vec<CharInfo>,
    pub width: f32,
}

/// Integer pixel rectangle, `min` inclusive / `max` inclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Recti {
    pub xmin: i32,
    pub xmax: i32,
    pub ymin: i32,
    pub ymax: i32,
}

impl Recti {
    pub(crate) fn pad(&mut self, x: i32, y: i32) {
        self.xmin -= x;
        self.xmax += x;
        self.ymin -= y;
        self.ymax += y;
    }

    pub(crate) fn translate(&mut self, x: i32, y: i32) {
        self.xmin += x;
        self.xmax += x;
        self.ymin += y;
        self.ymax += y;
    }

    pub(crate) fn clamp_to(&mut self, width: i32, height: i32) {
        self.xmin = self.xmin.clamp(0, width - 1);
        self.xmax = self.xmax.clamp(0, width - 1);
        self.ymin = self.ymin.clamp(0, height - 1);
        self.ymax = self.ymax.clamp(0, height - 1);
    }
}

/// Laid-out line/character geometry, derived from the text parameters and
/// invalidated whenever they change materially.
#[derive(Clone, Debug, Default)]
pub struct TextRuntime {
    pub lines: Vec<LineInfo>,
    pub line_height: f32,
    pub ascent: f32,
    pub descent: f32,
    /// Text block bounds before any box margin.
    pub boundbox: Recti,
}

fn wrap_width_px(params: &TextParams, image_width: u32) -> f32 {
    if params.wrap_width == 0.0 {
        return f32::MAX;
    }
    params.wrap_width * image_width as f32
}

fn build_character_info(params: &TextParams, metrics: &dyn GlyphMetrics) -> Vec<CharInfo> {
    params
        .text
        .chars()
        .map(|ch| CharInfo {
            ch,
            advance: metrics.advance(ch),
            position: [0.0, 0.0],
            do_wrap: false,
        })
        .collect()
}

/// First pass: find the characters where a line has to be broken.
fn apply_word_wrapping(characters: &mut [CharInfo], wrap_width: f32) {
    let mut pos_x = 0.0f32;
    let mut last_space: Option<usize> = None;

    for i in 0..characters.len() {
        let ch = characters[i].ch;
        if ch == ' ' {
            characters[i].position = [pos_x, 0.0];
            last_space = Some(i);
        }
        if ch == '\n' {
            pos_x = 0.0;
            last_space = None;
        }
        if pos_x > wrap_width
            && let Some(space) = last_space.take()
        {
            characters[space].do_wrap = true;
            pos_x -= characters[space].position[0] + characters[space].advance;
        }
        pos_x += characters[i].advance;
    }
}

/// Second pass: fill lines with characters at line-local positions.
fn fill_lines(characters: &[CharInfo]) -> Vec<LineInfo> {
    let mut lines = Vec::new();
    let mut current = LineInfo::default();
    let mut pos_x = 0.0f32;

    for &c in characters {
        let mut c = c;
        c.position = [pos_x, 0.0];
        pos_x += c.advance;

        if c.ch != '\n' {
            current.width = pos_x;
        }
        let wraps = c.do_wrap || c.ch == '\n';
        current.characters.push(c);

        if wraps {
            lines.push(std::mem::take(&mut current));
            pos_x = 0.0;
        }
    }

    lines.push(current);
    lines
}

fn max_line_width(lines: &[LineInfo]) -> f32 {
    lines.iter().fold(0.0, |acc, line| acc.max(line.width))
}

fn anchor_offset(params: &TextParams, width_max: f32, text_height: f32) -> [f32; 2] {
    let x = match params.anchor_x {
        TextAlignX::Left => 0.0,
        TextAlignX::Center => -width_max / 2.0,
        TextAlignX::Right => -width_max,
    };
    let y = match params.anchor_y {
        TextAlignY::Top => 0.0,
        TextAlignY::Center => -text_height / 2.0,
        TextAlignY::Bottom => -text_height,
    };
    [x, y]
}

fn align_line_x(params: &TextParams, line_width: f32, width_max: f32) -> f32 {
    match params.align_x {
        TextAlignX::Left => 0.0,
        TextAlignX::Center => (width_max - line_width) / 2.0,
        TextAlignX::Right => width_max - line_width,
    }
}

/// Build the full layout runtime for a text strip.
///
/// Positions are baseline origins in output pixels, rows growing downward.
pub fn compute_runtime(
    params: &TextParams,
    metrics: &dyn GlyphMetrics,
    image_width: u32,
    image_height: u32,
) -> TextRuntime {
    let ascent = metrics.ascent();
    let descent = metrics.descent();
    let line_height = ascent - descent + metrics.line_gap();

    let mut characters = build_character_info(params, metrics);
    apply_word_wrapping(&mut characters, wrap_width_px(params, image_width));
    let mut lines = fill_lines(&characters);

    let width_max = max_line_width(&lines);
    let text_height = lines.len() as f32 * line_height;
    // Empty text still gets a selectable/drawable box.
    let box_width = if width_max == 0.0 {
        text_height * 2.0
    } else {
        width_max
    };

    let center = [
        params.location[0] * image_width as f32,
        params.location[1] * image_height as f32,
    ];
    let anchor = anchor_offset(params, box_width, text_height);

    for (i, line) in lines.iter_mut().enumerate() {
        let align_x = align_line_x(params, line.width, width_max);
        let baseline_y = (center[1] + anchor[1] + i as f32 * line_height + ascent).round();
        for c in &mut line.characters {
            c.position = [
                (c.position[0] + center[0] + anchor[0] + align_x).round(),
                baseline_y,
            ];
        }
    }

    let boundbox = Recti {
        xmin: (center[0] + anchor[0]).floor() as i32,
        xmax: (center[0] + anchor[0] + box_width).ceil() as i32,
        ymin: (center[1] + anchor[1]).floor() as i32,
        ymax: (center[1] + anchor[1] + text_height).ceil() as i32,
    };

    TextRuntime {
        lines,
        line_height,
        ascent,
        descent,
        boundbox,
    }
}
