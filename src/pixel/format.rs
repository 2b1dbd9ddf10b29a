//! Pixel formats and interleave strategies.

use serde::{Deserialize, Serialize};

/// Pixel format of data returned by tile reads.
///
/// Formats are intended for visualization; every channel is one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Monochrome,
    MonochromeAlpha,
    Rgb,
    Rgba,
    Argb,
}

impl PixelFormat {
    /// Size of one pixel in bytes.
    pub const fn pixel_size(self) -> usize {
        match self {
            PixelFormat::Monochrome => 1,
            PixelFormat::MonochromeAlpha => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba | PixelFormat::Argb => 4,
        }
    }

    /// Number of bytes needed for a `width` x `height` buffer.
    pub fn transfer_size(self, width: u32, height: u32) -> usize {
        self.pixel_size() * width as usize * height as usize
    }

    /// Whether the format carries an alpha channel.
    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            PixelFormat::MonochromeAlpha | PixelFormat::Rgba | PixelFormat::Argb
        )
    }
}

/// Memory layout of multi-band pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interleave {
    /// Band sequential: each band is a contiguous plane
    Bsq,
    /// Pixel interleaved
    Bip,
    /// Line interleaved
    Bil,
}

/// Byte spacing between adjacent pixels, lines and bands in an output buffer.
///
/// A spacing of zero in every field denotes band-sequential output, where the
/// decoder lays bands out as contiguous planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandSpacing {
    pub pixel: usize,
    pub line: usize,
    pub band: usize,
}

impl BandSpacing {
    /// Compute spacings for an output `width` pixels wide.
    pub fn new(
        interleave: Interleave,
        width: usize,
        bytes_per_sample: usize,
        num_components: usize,
    ) -> Self {
        match interleave {
            Interleave::Bip => Self {
                pixel: bytes_per_sample * num_components,
                line: width * bytes_per_sample * num_components,
                band: bytes_per_sample,
            },
            Interleave::Bil => Self {
                pixel: bytes_per_sample,
                line: width * bytes_per_sample * num_components,
                band: width * bytes_per_sample,
            },
            Interleave::Bsq => Self {
                pixel: 0,
                line: 0,
                band: 0,
            },
        }
    }

    /// Whether bands are stored as contiguous planes.
    pub fn is_planar(&self) -> bool {
        self.pixel == 0 && self.line == 0 && self.band == 0
    }

    /// Byte offset of sample `band` of pixel (`x`, `y`).
    ///
    /// Planar layouts need the output dimensions to locate the plane.
    pub fn offset(
        &self,
        x: usize,
        y: usize,
        band: usize,
        width: usize,
        height: usize,
        bytes_per_sample: usize,
    ) -> usize {
        if self.is_planar() {
            (band * width * height + y * width + x) * bytes_per_sample
        } else {
            y * self.line + x * self.pixel + band * self.band
        }
    }
}
