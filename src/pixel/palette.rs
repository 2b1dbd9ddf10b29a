//! Indexed palette (color table) classification and expansion.
//!
//! A palette of up to 256 ARGB entries is classified once when a decoder is
//! opened. The classification picks the cheapest output format able to
//! represent the palette and decides whether a single transparent index can
//! stand in for a full alpha lookup.

use super::format::PixelFormat;

/// Outcome of palette classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteClass {
    /// Gray entries whose value equals their index; no expansion needed
    IdentityMonochrome,
    /// Gray entries without alpha
    Monochrome,
    /// Gray entries with alpha
    MonochromeAlpha,
    /// Color entries without alpha
    Color,
    /// Color entries with alpha
    ColorAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MaskState {
    Unset,
    Index(u8),
    Unusable,
}

/// A classified color lookup table.
#[derive(Debug, Clone)]
pub struct ColorTable {
    lut: [u32; 256],
    class: PaletteClass,
    format: PixelFormat,
    identity: bool,
    transparent_pixel: Option<u8>,
}

#[inline]
fn channels(entry: u32) -> (u32, u32, u32, u32) {
    (
        (entry >> 24) & 0xFF,
        (entry >> 16) & 0xFF,
        (entry >> 8) & 0xFF,
        entry & 0xFF,
    )
}

impl ColorTable {
    /// Classify `entries` (ARGB, at most 256 are used).
    ///
    /// `color_alpha_format` selects the output format for color palettes with
    /// alpha and should be [`PixelFormat::Rgba`] or [`PixelFormat::Argb`].
    pub fn new(entries: &[u32], color_alpha_format: PixelFormat) -> Self {
        let mut lut = [0u32; 256];
        let n = entries.len().min(256);
        lut[..n].copy_from_slice(&entries[..n]);

        let mut identity = true;
        let mut alpha = false;
        let mut color = false;
        let mut mask = MaskState::Unset;

        for (i, &entry) in entries.iter().take(256).enumerate() {
            let (a, r, g, b) = channels(entry);

            identity &= r == i as u32;
            alpha |= a != 0xFF;

            if r != g || g != b {
                color = true;
                // a transparent index only works when R, G and B agree
                if a != 0xFF {
                    mask = MaskState::Unusable;
                }
            } else if a == 0 {
                mask = match mask {
                    MaskState::Unset => MaskState::Index(r as u8),
                    MaskState::Index(v) if v == r as u8 => MaskState::Index(v),
                    _ => MaskState::Unusable,
                };
            } else if a != 0xFF {
                mask = MaskState::Unusable;
            }
        }

        let (class, format) = match (color, alpha) {
            (true, true) => (PaletteClass::ColorAlpha, color_alpha_format),
            (true, false) => (PaletteClass::Color, PixelFormat::Rgb),
            (false, true) => (PaletteClass::MonochromeAlpha, PixelFormat::MonochromeAlpha),
            (false, false) if identity => {
                (PaletteClass::IdentityMonochrome, PixelFormat::Monochrome)
            }
            (false, false) => (PaletteClass::Monochrome, PixelFormat::Monochrome),
        };

        let transparent_pixel = match mask {
            MaskState::Index(v) => Some(v),
            _ => None,
        };

        Self {
            lut,
            class,
            format,
            identity,
            transparent_pixel,
        }
    }

    pub fn class(&self) -> PaletteClass {
        self.class
    }

    /// Output format able to represent every palette entry.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Whether every entry's red channel equals its index.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Gray value shared by every fully transparent entry, when a binary
    /// mask is usable.
    pub fn transparent_pixel(&self) -> Option<u8> {
        self.transparent_pixel
    }

    pub fn entry(&self, index: u8) -> u32 {
        self.lut[index as usize]
    }

    /// Whether decoded indices must be passed through [`Self::expand`] for
    /// output in `format`.
    pub fn needs_expansion(&self, format: PixelFormat) -> bool {
        !(self.identity && format == PixelFormat::Monochrome)
    }

    /// Expand `count` palette indices stored at the front of `data` into
    /// `format` pixels, in place.
    ///
    /// `data` must hold `count * format.pixel_size()` bytes. Expansion runs
    /// back to front so indices are consumed before they are overwritten.
    pub fn expand(&self, data: &mut [u8], count: usize, format: PixelFormat) {
        if !self.needs_expansion(format) {
            return;
        }

        match format {
            PixelFormat::Monochrome => {
                for i in (0..count).rev() {
                    data[i] = (self.lut[data[i] as usize] & 0xFF) as u8;
                }
            }
            PixelFormat::MonochromeAlpha if self.transparent_pixel.is_some() => {
                let tp = self.transparent_pixel.unwrap_or_default();
                for i in (0..count).rev() {
                    let p = (self.lut[data[i] as usize] & 0xFF) as u8;
                    data[i * 2] = p;
                    data[i * 2 + 1] = if p == tp { 0x00 } else { 0xFF };
                }
            }
            _ => {
                // shifts in output byte order
                let shifts: &[u32] = match format {
                    PixelFormat::Rgba => &[16, 8, 0, 24],
                    PixelFormat::Argb => &[24, 16, 8, 0],
                    PixelFormat::MonochromeAlpha => &[0, 24],
                    PixelFormat::Rgb => &[16, 8, 0],
                    PixelFormat::Monochrome => &[0],
                };
                let size = shifts.len();
                for i in (0..count).rev() {
                    let p = self.lut[data[i] as usize];
                    for (j, shift) in shifts.iter().enumerate() {
                        data[i * size + j] = ((p >> shift) & 0xFF) as u8;
                    }
                }
            }
        }
    }
}
