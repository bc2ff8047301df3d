use crate::foundation::error::{StripfxError, StripfxResult};
use crate::foundation::math::straight_u8_to_premul_f32;

/// Alpha convention of a pixel store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AlphaMode {
    /// Color channels are independent of alpha.
    Straight,
    /// Color channels are pre-scaled by alpha.
    Premultiplied,
}

/// Colorspace tag carried by a frame.
///
/// Color management policy itself is external; the engine only tracks which
/// space a buffer is in so the caller can convert consistently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Colorspace {
    /// Display-referred space used by byte frames.
    Display,
    /// Working space used by float frames.
    Scene,
}

/// Interleaved RGBA pixel storage, one of the two supported depths.
#[derive(Clone, Debug)]
pub enum PixelData {
    /// 8-bit channels, straight alpha.
    Byte(Vec<u8>),
    /// 32-bit float channels, premultiplied alpha.
    Float(Vec<f32>),
}

/// A 2D RGBA surface with known alpha convention and colorspace.
#[derive(Clone, Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    alpha: AlphaMode,
    colorspace: Colorspace,
    data: PixelData,
}

impl Frame {
    /// Allocate a zeroed byte frame (straight alpha, display space).
    pub fn new_byte(width: u32, height: u32) -> Self {
        let len = pixel_len(width, height);
        Self {
            width,
            height,
            alpha: AlphaMode::Straight,
            colorspace: Colorspace::Display,
            data: PixelData::Byte(vec![0u8; len]),
        }
    }

    /// Allocate a zeroed float frame (premultiplied alpha, working space).
    pub fn new_float(width: u32, height: u32) -> Self {
        let len = pixel_len(width, height);
        Self {
            width,
            height,
            alpha: AlphaMode::Premultiplied,
            colorspace: Colorspace::Scene,
            data: PixelData::Float(vec![0f32; len]),
        }
    }

    /// Wrap existing straight-alpha byte pixels, validating the length.
    pub fn from_bytes(width: u32, height: u32, data: Vec<u8>) -> StripfxResult<Self> {
        if data.len() != pixel_len(width, height) {
            return Err(StripfxError::validation(
                "byte frame data must be width*height*4 bytes",
            ));
        }
        Ok(Self {
            width,
            height,
            alpha: AlphaMode::Straight,
            colorspace: Colorspace::Display,
            data: PixelData::Byte(data),
        })
    }

    /// Wrap existing premultiplied float pixels, validating the length.
    pub fn from_floats(width: u32, height: u32, data: Vec<f32>) -> StripfxResult<Self> {
        if data.len() != pixel_len(width, height) {
            return Err(StripfxError::validation(
                "float frame data must be width*height*4 values",
            ));
        }
        Ok(Self {
            width,
            height,
            alpha: AlphaMode::Premultiplied,
            colorspace: Colorspace::Scene,
            data: PixelData::Float(data),
        })
    }

    /// Allocate the output frame for an effect over the given inputs.
    ///
    /// Output is float iff any present input is float; with no inputs a byte
    /// frame is allocated.
    pub fn effect_output(width: u32, height: u32, in1: Option<&Frame>, in2: Option<&Frame>) -> Self {
        let any_float = in1.is_some_and(Frame::is_float) || in2.is_some_and(Frame::is_float);
        if any_float {
            Self::new_float(width, height)
        } else {
            Self::new_byte(width, height)
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn alpha_mode(&self) -> AlphaMode {
        self.alpha
    }

    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    pub fn is_float(&self) -> bool {
        matches!(self.data, PixelData::Float(_))
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.data {
            PixelData::Byte(v) => Some(v),
            PixelData::Float(_) => None,
        }
    }

    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.data {
            PixelData::Byte(v) => Some(v),
            PixelData::Float(_) => None,
        }
    }

    pub fn floats(&self) -> Option<&[f32]> {
        match &self.data {
            PixelData::Float(v) => Some(v),
            PixelData::Byte(_) => None,
        }
    }

    pub fn floats_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.data {
            PixelData::Float(v) => Some(v),
            PixelData::Byte(_) => None,
        }
    }

    /// Deep copy of this frame.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Convert a byte frame into the premultiplied float representation.
    ///
    /// Float frames are returned as a plain copy.
    pub fn promote_to_float(&self) -> Self {
        match &self.data {
            PixelData::Float(_) => self.clone(),
            PixelData::Byte(v) => {
                let mut out = Vec::with_capacity(v.len());
                for px in v.chunks_exact(4) {
                    let col = straight_u8_to_premul_f32([px[0], px[1], px[2], px[3]]);
                    out.extend_from_slice(&col);
                }
                Self {
                    width: self.width,
                    height: self.height,
                    alpha: AlphaMode::Premultiplied,
                    colorspace: Colorspace::Scene,
                    data: PixelData::Float(out),
                }
            }
        }
    }

    /// Match this frame's depth to `other`, promoting byte to float if needed.
    pub(crate) fn match_depth(&self, float_out: bool) -> std::borrow::Cow<'_, Frame> {
        if float_out && !self.is_float() {
            std::borrow::Cow::Owned(self.promote_to_float())
        } else {
            std::borrow::Cow::Borrowed(self)
        }
    }
}

fn pixel_len(width: u32, height: u32) -> usize {
    (width as usize) * (height as usize) * 4
}
