//! Decoder for uncompressed raster sample files.
//!
//! Samples are stored little-endian in one of the three interleaves. Each
//! read resamples the requested source rectangle with nearest-neighbour
//! selection and converts samples to 8 bits through a [`SampleLayout`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::ReadError;
use crate::pixel::{BandSpacing, ColorTable, Interleave, PixelFormat, SampleLayout};

use super::decoder::{AbortHook, TileDecoder};
use super::request::ReadRegion;

/// Description of a raw raster file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLayout {
    pub width: u64,
    pub height: u64,
    pub bands: usize,
    pub sample: SampleLayout,
    /// Layout of the samples in the file
    pub interleave: Interleave,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl RawLayout {
    /// Expected file size in bytes.
    pub fn byte_len(&self) -> u64 {
        self.width * self.height * self.bands as u64 * self.sample.bytes_per_sample() as u64
    }
}

/// [`TileDecoder`] over an in-memory raw raster.
pub struct RawRasterDecoder {
    data: Bytes,
    layout: RawLayout,
    source_spacing: BandSpacing,
    format: PixelFormat,
    output_interleave: Interleave,
    palette: Option<ColorTable>,
    abort: Arc<AtomicBool>,
    version: u64,
}

impl RawRasterDecoder {
    pub fn new(data: Bytes, layout: RawLayout) -> Result<Self, ReadError> {
        if layout.bands == 0 {
            return Err(ReadError::Decode("raster has no bands".to_string()));
        }
        if (data.len() as u64) < layout.byte_len() {
            return Err(ReadError::Decode(format!(
                "raster data is {} bytes, layout needs {}",
                data.len(),
                layout.byte_len()
            )));
        }

        let format = match layout.bands {
            1 => PixelFormat::Monochrome,
            2 => PixelFormat::MonochromeAlpha,
            3 => PixelFormat::Rgb,
            _ => PixelFormat::Rgba,
        };
        let source_spacing = BandSpacing::new(
            layout.interleave,
            layout.width as usize,
            layout.sample.bytes_per_sample(),
            layout.bands,
        );

        Ok(Self {
            data,
            layout,
            source_spacing,
            format,
            output_interleave: Interleave::Bip,
            palette: None,
            abort: Arc::new(AtomicBool::new(false)),
            version: 0,
        })
    }

    /// Read the whole file at `path` into memory.
    pub fn open(path: impl AsRef<Path>, layout: RawLayout) -> Result<Self, ReadError> {
        let data = std::fs::read(path)?;
        Self::new(Bytes::from(data), layout)
    }

    /// Write multi-band output with `interleave` instead of pixel interleaved.
    ///
    /// Ignored for palette output, which is always pixel interleaved.
    pub fn with_output_interleave(mut self, interleave: Interleave) -> Self {
        self.output_interleave = interleave;
        self
    }

    /// Treat single-band samples as indices into `palette`.
    pub fn with_palette(mut self, palette: ColorTable) -> Self {
        self.format = palette.format();
        self.output_interleave = Interleave::Bip;
        self.palette = Some(palette);
        self
    }

    /// Content version reported for every tile.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn layout(&self) -> &RawLayout {
        &self.layout
    }

    fn sample(&self, x: u64, y: u64, band: usize) -> &[u8] {
        let bps = self.layout.sample.bytes_per_sample();
        let offset = self.source_spacing.offset(
            x as usize,
            y as usize,
            band,
            self.layout.width as usize,
            self.layout.height as usize,
            bps,
        );
        &self.data[offset..offset + bps]
    }

    fn aborted(&self) -> bool {
        self.abort.swap(false, Ordering::AcqRel)
    }
}

impl TileDecoder for RawRasterDecoder {
    fn width(&self) -> u64 {
        self.layout.width
    }

    fn height(&self) -> u64 {
        self.layout.height
    }

    fn tile_width(&self) -> u32 {
        self.layout.tile_width
    }

    fn tile_height(&self) -> u32 {
        self.layout.tile_height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn interleave(&self) -> Interleave {
        self.output_interleave
    }

    fn read(&mut self, region: &ReadRegion, buf: &mut [u8]) -> Result<(), ReadError> {
        region.check_bounds(self.layout.width, self.layout.height)?;
        // nothing to sample; a zero-size source may sit on the far edge
        if region.is_empty() {
            return Ok(());
        }
        self.abort.store(false, Ordering::Release);

        let dst_w = region.dst_width as usize;
        let dst_h = region.dst_height as usize;
        let required = self.format.transfer_size(region.dst_width, region.dst_height);
        if buf.len() < required {
            return Err(ReadError::BufferTooSmall {
                required,
                actual: buf.len(),
            });
        }

        let sample_layout = self.layout.sample;

        if let Some(palette) = &self.palette {
            for dy in 0..dst_h {
                let sy = region.src_y + (dy as u64 * region.src_height) / dst_h as u64;
                for dx in 0..dst_w {
                    let sx = region.src_x + (dx as u64 * region.src_width) / dst_w as u64;
                    buf[dy * dst_w + dx] = self.sample(sx, sy, 0)[0];
                }
            }
            palette.expand(buf, dst_w * dst_h, self.format);
            return Ok(());
        }

        let channels = self.format.pixel_size();
        let spacing = BandSpacing::new(self.output_interleave, dst_w, 1, channels);

        for dy in 0..dst_h {
            if self.aborted() {
                return Err(ReadError::Canceled);
            }
            let sy = region.src_y + (dy as u64 * region.src_height) / dst_h as u64;
            for dx in 0..dst_w {
                let sx = region.src_x + (dx as u64 * region.src_width) / dst_w as u64;
                for band in 0..channels {
                    let out = spacing.offset(dx, dy, band, dst_w, dst_h, 1);
                    buf[out] = sample_layout.to_u8(self.sample(sx, sy, band));
                }
            }
        }
        Ok(())
    }

    fn abort_hook(&self) -> Option<AbortHook> {
        let abort = Arc::clone(&self.abort);
        Some(Arc::new(move || abort.store(true, Ordering::Release)))
    }

    fn tile_version(&self, _level: u32, _tile_column: u64, _tile_row: u64) -> u64 {
        self.version
    }
}
