use crate::foundation::error::{FxError, FxResult};

/// An RGBA8 pixel surface, straight alpha, tightly packed and row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a fully transparent buffer.
    pub fn new(width: u32, height: u32) -> FxResult<Self> {
        let len = byte_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0; len],
        })
    }

    /// Wrap existing RGBA8 bytes, checking the length against the dimensions.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> FxResult<Self> {
        let len = byte_len(width, height)?;
        if data.len() != len {
            return Err(FxError::validation(format!(
                "rgba8 buffer for {width}x{height} must be {len} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Fill every pixel with the same RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> FxResult<Self> {
        let len = byte_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: rgba.repeat(len / 4),
        })
    }

    /// Number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.data.len() / 4
    }

    /// RGBA value at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Change dimensions in place, reusing the allocation, and clear to transparent.
    pub(crate) fn reset(&mut self, width: u32, height: u32) -> FxResult<()> {
        let len = byte_len(width, height)?;
        self.data.clear();
        self.data.resize(len, 0);
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Clear to transparent without touching dimensions.
    pub(crate) fn clear(&mut self) {
        self.data.fill(0);
    }
}

pub(crate) fn byte_len(width: u32, height: u32) -> FxResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| FxError::validation("pixel buffer size overflow"))
}
