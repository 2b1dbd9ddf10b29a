//! Tile cache adapter contract.
//!
//! A reader consults its [`TileCache`] for tile reads at cache-eligible
//! levels. The cache either replays a stored tile or decodes it through the
//! [`TileSource`] it is handed, delivering pixels to a [`CacheReadCallback`]
//! as they become available. Any error returned from a cache permanently
//! disables caching for the owning reader.

use std::sync::Arc;

use crate::error::{CacheError, ReadError};
use crate::pixel::{Interleave, PixelFormat};
use crate::reader::{ReadRegion, TileGeometry};

use super::assembler::TileAssembler;

// =============================================================================
// Tile Key
// =============================================================================

/// Identifies one tile of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Resolution level (0 = native)
    pub level: u32,

    /// Tile column
    pub column: u64,

    /// Tile row
    pub row: u64,
}

impl TileKey {
    pub fn new(level: u32, column: u64, row: u64) -> Self {
        Self { level, column, row }
    }

    /// Destination size of this tile.
    pub fn size(&self, geometry: &TileGeometry) -> (u32, u32) {
        (
            geometry.tile_width_at(self.level, self.column),
            geometry.tile_height_at(self.level, self.row),
        )
    }

    /// Scaled read covering this tile.
    pub fn region(&self, geometry: &TileGeometry) -> ReadRegion {
        let (dst_width, dst_height) = self.size(geometry);
        ReadRegion::new(
            geometry.tile_source_x(self.level, self.column),
            geometry.tile_source_y(self.level, self.row),
            geometry.tile_source_width(self.level, self.column),
            geometry.tile_source_height(self.level, self.row),
            dst_width,
            dst_height,
        )
    }
}

// =============================================================================
// Adapter Traits
// =============================================================================

/// Receives tile pixels from a cache lookup.
pub trait CacheReadCallback {
    /// Whether the lookup should stop early.
    fn canceled(&self) -> bool;

    /// A `width` x `height` block of the tile at (`x`, `y`) is available.
    fn update(&mut self, x: u32, y: u32, width: u32, height: u32, data: &[u8]);
}

/// Decoder access handed to a cache for filling misses.
pub trait TileSource {
    fn geometry(&self) -> &TileGeometry;

    fn format(&self) -> PixelFormat;

    fn interleave(&self) -> Interleave;

    /// Content version of a tile; cached copies of other versions are stale.
    fn tile_version(&self, key: TileKey) -> u64;

    /// Decode `region` into `buf`.
    fn read(&mut self, region: &ReadRegion, buf: &mut [u8]) -> Result<(), ReadError>;
}

/// A tile store bound to one reader.
pub trait TileCache: Send {
    /// Deliver tile `key` to `callback`, decoding it through `source` on a
    /// miss.
    ///
    /// Returns `Ok(true)` once the whole tile has been delivered and
    /// `Ok(false)` if the callback reported cancellation first.
    fn get_tile(
        &mut self,
        key: TileKey,
        source: &mut dyn TileSource,
        callback: &mut dyn CacheReadCallback,
    ) -> Result<bool, CacheError>;

    /// Flush and release the store.
    fn close(&mut self) {}
}

/// Opens a cache for a reader from its cache URI.
pub type TileCacheOpener =
    Arc<dyn Fn(&str, &TileGeometry) -> Result<Box<dyn TileCache>, CacheError> + Send + Sync>;

// =============================================================================
// Miss Handling
// =============================================================================

/// Decode tile `key` through `source`, delivering partial updates.
///
/// Pixel-interleaved tiles of at least 2x2 pixels are decoded in four
/// quadrants, each delivered as soon as it is ready. Returns the assembled
/// tile, or `None` if the callback reported cancellation.
pub fn read_tile_parts(
    key: TileKey,
    source: &mut dyn TileSource,
    callback: &mut dyn CacheReadCallback,
) -> Result<Option<Vec<u8>>, ReadError> {
    let geometry = *source.geometry();
    let format = source.format();
    let region = key.region(&geometry);

    if source.interleave() != Interleave::Bip || region.dst_width < 2 || region.dst_height < 2 {
        let mut buf = vec![0u8; format.transfer_size(region.dst_width, region.dst_height)];
        source.read(&region, &mut buf)?;
        if callback.canceled() {
            return Ok(None);
        }
        callback.update(0, 0, region.dst_width, region.dst_height, &buf);
        return Ok(Some(buf));
    }

    let mut assembler = TileAssembler::new(region.dst_width, region.dst_height, format);
    for part in quadrants(&region) {
        if callback.canceled() {
            return Ok(None);
        }
        let mut buf = vec![0u8; format.transfer_size(part.dst.dst_width, part.dst.dst_height)];
        source.read(&part.dst, &mut buf)?;
        callback.update(
            part.x,
            part.y,
            part.dst.dst_width,
            part.dst.dst_height,
            &buf,
        );
        assembler.blit(
            part.x,
            part.y,
            part.dst.dst_width,
            part.dst.dst_height,
            &buf,
        );
    }

    if callback.canceled() {
        return Ok(None);
    }
    Ok(Some(assembler.into_bytes()))
}

struct Part {
    x: u32,
    y: u32,
    dst: ReadRegion,
}

/// Split `region` into four non-overlapping quadrants in destination space,
/// each mapped back onto the source rectangle.
fn quadrants(region: &ReadRegion) -> Vec<Part> {
    let xs = [0, region.dst_width / 2, region.dst_width];
    let ys = [0, region.dst_height / 2, region.dst_height];

    let src_x = |dx: u32| {
        region.src_x + (dx as u64 * region.src_width) / region.dst_width.max(1) as u64
    };
    let src_y = |dy: u32| {
        region.src_y + (dy as u64 * region.src_height) / region.dst_height.max(1) as u64
    };

    let mut parts = Vec::with_capacity(4);
    for j in 0..2 {
        for i in 0..2 {
            let (x0, x1) = (xs[i], xs[i + 1]);
            let (y0, y1) = (ys[j], ys[j + 1]);
            parts.push(Part {
                x: x0,
                y: y0,
                dst: ReadRegion::new(
                    src_x(x0),
                    src_y(y0),
                    (src_x(x1) - src_x(x0)).max(1),
                    (src_y(y1) - src_y(y0)).max(1),
                    x1 - x0,
                    y1 - y0,
                ),
            });
        }
    }
    parts
}
