//! Float-to-byte pixel conversion.
//!
//! Each channel is scaled by 255 and truncated toward zero, not rounded, then
//! clamped to `0..=255`. Non-finite results become 0. Alpha follows the same
//! rule as color.

use crate::{
    error::{RandomartError, RandomartResult},
    readback::HostFloatBuffer,
};

/// Interleaved RGBA8 bytes, row-major, stride `width * 4`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rgba8Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl Rgba8Frame {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[inline]
pub fn channel_to_u8(value: f32) -> u8 {
    let scaled = value * 255.0;
    if !scaled.is_finite() {
        return 0;
    }
    scaled.trunc().clamp(0.0, 255.0) as u8
}

#[tracing::instrument(skip_all, fields(width = src.width, height = src.height))]
pub fn to_rgba8(src: HostFloatBuffer) -> RandomartResult<Rgba8Frame> {
    let expected = crate::readback::float_len(src.width, src.height)?;
    if src.data.len() != expected {
        return Err(RandomartError::validation(
            "to_rgba8 expects width*height*4 floats",
        ));
    }

    let data = src.data.iter().copied().map(channel_to_u8).collect();
    Ok(Rgba8Frame {
        width: src.width,
        height: src.height,
        data,
        premultiplied: true,
    })
}
