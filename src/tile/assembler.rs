//! Assembly of partial tile updates into one buffer.

use crate::pixel::PixelFormat;

/// Collects sub-region updates into a full pixel-interleaved tile buffer.
#[derive(Debug, Clone)]
pub struct TileAssembler {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl TileAssembler {
    /// Create a zero-filled `width` x `height` tile.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0u8; format.transfer_size(width, height)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Copy a `width` x `height` block at (`x`, `y`) into the tile.
    ///
    /// A block covering the whole tile is copied verbatim, whatever its
    /// interleave. Other blocks are treated as pixel interleaved and clipped
    /// to the tile. Returns `false` if `data` is too short for the block.
    pub fn blit(&mut self, x: u32, y: u32, width: u32, height: u32, data: &[u8]) -> bool {
        let needed = self.format.transfer_size(width, height);
        if data.len() < needed {
            return false;
        }

        if x == 0 && y == 0 && width == self.width && height == self.height {
            self.data.copy_from_slice(&data[..needed]);
            return true;
        }

        let pixel = self.format.pixel_size();
        let src_stride = width as usize * pixel;
        let dst_stride = self.width as usize * pixel;
        let copy_width = width.min(self.width.saturating_sub(x)) as usize * pixel;
        let copy_height = height.min(self.height.saturating_sub(y)) as usize;

        for row in 0..copy_height {
            let src = row * src_stride;
            let dst = (y as usize + row) * dst_stride + x as usize * pixel;
            self.data[dst..dst + copy_width].copy_from_slice(&data[src..src + copy_width]);
        }
        true
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
