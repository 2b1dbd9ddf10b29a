//! Tile export encoder.
//!
//! This module turns decoded tile buffers into PNG or JPEG images, for
//! writing tiles to disk or handing them to image viewers.
//!
//! # Design Decisions
//!
//! - **PNG by default**: PNG keeps every output format lossless, including
//!   the alpha formats.
//!
//! - **JPEG drops alpha**: JPEG has no alpha channel, so alpha formats are
//!   flattened to gray or RGB before encoding.
//!
//! - **Pixel interleaved only**: multi-band buffers must be pixel
//!   interleaved; single-band buffers are accepted with any interleave.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::error::ExportError;
use crate::pixel::{Interleave, PixelFormat};

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Output image encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileEncoding {
    Png,
    Jpeg { quality: u8 },
}

impl TileEncoding {
    /// Pick an encoding from a file extension, defaulting to PNG.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => TileEncoding::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            },
            _ => TileEncoding::Png,
        }
    }
}

// =============================================================================
// Tile Encoder
// =============================================================================

/// Encoder for decoded tile buffers.
///
/// # Example
///
/// ```ignore
/// use tilecore::pixel::{Interleave, PixelFormat};
/// use tilecore::tile::{TileEncoder, TileEncoding};
///
/// let encoder = TileEncoder::new();
/// let png = encoder.encode(&pixels, 256, 256, PixelFormat::Rgb, Interleave::Bip, TileEncoding::Png)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TileEncoder {}

impl TileEncoder {
    /// Create a new tile encoder.
    pub fn new() -> Self {
        Self {}
    }

    /// Encode a `width` x `height` buffer of `format` pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `pixels` does not hold exactly one tile
    /// - A multi-band buffer is not pixel interleaved
    /// - Encoding fails
    pub fn encode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
        interleave: Interleave,
        encoding: TileEncoding,
    ) -> Result<Bytes, ExportError> {
        let expected = format.transfer_size(width, height);
        if pixels.len() != expected {
            return Err(ExportError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        if format.pixel_size() > 1 && interleave != Interleave::Bip {
            return Err(ExportError::UnsupportedInterleave(format!("{interleave:?}")));
        }

        let mut output = Vec::new();
        let result = match encoding {
            TileEncoding::Png => {
                let (data, color) = png_layout(pixels, format);
                PngEncoder::new(&mut output).write_image(&data, width, height, color)
            }
            TileEncoding::Jpeg { quality } => {
                let (data, color) = jpeg_layout(pixels, format);
                JpegEncoder::new_with_quality(&mut output, clamp_quality(quality))
                    .write_image(&data, width, height, color)
            }
        };

        result.map_err(|e| ExportError::EncodeError {
            message: e.to_string(),
        })?;
        Ok(Bytes::from(output))
    }

    /// Encode as PNG.
    pub fn encode_png(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Bytes, ExportError> {
        self.encode(pixels, width, height, format, Interleave::Bip, TileEncoding::Png)
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Reorder pixels into a layout PNG supports.
fn png_layout(pixels: &[u8], format: PixelFormat) -> (std::borrow::Cow<'_, [u8]>, ExtendedColorType) {
    use std::borrow::Cow;

    match format {
        PixelFormat::Monochrome => (Cow::Borrowed(pixels), ExtendedColorType::L8),
        PixelFormat::MonochromeAlpha => (Cow::Borrowed(pixels), ExtendedColorType::La8),
        PixelFormat::Rgb => (Cow::Borrowed(pixels), ExtendedColorType::Rgb8),
        PixelFormat::Rgba => (Cow::Borrowed(pixels), ExtendedColorType::Rgba8),
        PixelFormat::Argb => {
            let rgba = pixels
                .chunks_exact(4)
                .flat_map(|p| [p[1], p[2], p[3], p[0]])
                .collect();
            (Cow::Owned(rgba), ExtendedColorType::Rgba8)
        }
    }
}

/// Drop alpha for JPEG.
fn jpeg_layout(pixels: &[u8], format: PixelFormat) -> (std::borrow::Cow<'_, [u8]>, ExtendedColorType) {
    use std::borrow::Cow;

    match format {
        PixelFormat::Monochrome => (Cow::Borrowed(pixels), ExtendedColorType::L8),
        PixelFormat::Rgb => (Cow::Borrowed(pixels), ExtendedColorType::Rgb8),
        PixelFormat::MonochromeAlpha => (
            Cow::Owned(pixels.chunks_exact(2).map(|p| p[0]).collect()),
            ExtendedColorType::L8,
        ),
        PixelFormat::Rgba => (
            Cow::Owned(pixels.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect()),
            ExtendedColorType::Rgb8,
        ),
        PixelFormat::Argb => (
            Cow::Owned(pixels.chunks_exact(4).flat_map(|p| [p[1], p[2], p[3]]).collect()),
            ExtendedColorType::Rgb8,
        ),
    }
}

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
