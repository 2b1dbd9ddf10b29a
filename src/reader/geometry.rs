//! Tile and resolution-level coordinate math.
//!
//! Level 0 is the native resolution; each level halves both dimensions with
//! a one pixel floor. Tiles have a nominal size at every level, and the last
//! tile in each dimension carries the remainder.

use serde::Serialize;

use crate::error::GeometryError;

/// Dimensions of a tiled image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileGeometry {
    width: u64,
    height: u64,
    tile_width: u32,
    tile_height: u32,
}

/// Per-level summary, as reported by [`TileGeometry::levels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub level: u32,
    pub width: u64,
    pub height: u64,
    pub tiles_x: u64,
    pub tiles_y: u64,
}

impl TileGeometry {
    /// Create a geometry for a `width` x `height` image split into
    /// `tile_width` x `tile_height` tiles.
    pub fn new(
        width: u64,
        height: u64,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, GeometryError> {
        if tile_width == 0 || tile_height == 0 {
            return Err(GeometryError::InvalidTileSize {
                width: tile_width as u64,
                height: tile_height as u64,
            });
        }
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
        })
    }

    /// Native (level 0) width.
    pub fn native_width(&self) -> u64 {
        self.width
    }

    /// Native (level 0) height.
    pub fn native_height(&self) -> u64 {
        self.height
    }

    /// Nominal tile width.
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// Nominal tile height.
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Width of the image at `level`, never less than one pixel.
    pub fn width(&self, level: u32) -> u64 {
        shr(self.width, level).max(1)
    }

    /// Height of the image at `level`, never less than one pixel.
    pub fn height(&self, level: u32) -> u64 {
        shr(self.height, level).max(1)
    }

    /// Width of the tile in `tile_column` at `level`.
    pub fn tile_width_at(&self, level: u32, tile_column: u64) -> u32 {
        edge_size(self.width(level), self.tile_width as u64, tile_column) as u32
    }

    /// Height of the tile in `tile_row` at `level`.
    pub fn tile_height_at(&self, level: u32, tile_row: u64) -> u32 {
        edge_size(self.height(level), self.tile_height as u64, tile_row) as u32
    }

    /// Number of tile columns at `level`.
    pub fn num_tiles_x(&self, level: u32) -> u64 {
        self.width(level).div_ceil(self.tile_width as u64)
    }

    /// Number of tile rows at `level`.
    pub fn num_tiles_y(&self, level: u32) -> u64 {
        self.height(level).div_ceil(self.tile_height as u64)
    }

    /// Native x-coordinate of the tile in `tile_column` at `level`.
    pub fn tile_source_x(&self, level: u32, tile_column: u64) -> u64 {
        tile_column.saturating_mul(shl(self.tile_width as u64, level))
    }

    /// Native y-coordinate of the tile in `tile_row` at `level`.
    pub fn tile_source_y(&self, level: u32, tile_row: u64) -> u64 {
        tile_row.saturating_mul(shl(self.tile_height as u64, level))
    }

    /// Native width covered by the tile in `tile_column` at `level`.
    pub fn tile_source_width(&self, level: u32, tile_column: u64) -> u64 {
        edge_size(self.width, shl(self.tile_width as u64, level), tile_column)
    }

    /// Native height covered by the tile in `tile_row` at `level`.
    pub fn tile_source_height(&self, level: u32, tile_row: u64) -> u64 {
        edge_size(self.height, shl(self.tile_height as u64, level), tile_row)
    }

    /// Tile column containing native x-coordinate `src_x` at `level`.
    pub fn tile_column(&self, level: u32, src_x: u64) -> u64 {
        src_x / shl(self.tile_width as u64, level).max(1)
    }

    /// Tile row containing native y-coordinate `src_y` at `level`.
    pub fn tile_row(&self, level: u32, src_y: u64) -> u64 {
        src_y / shl(self.tile_height as u64, level).max(1)
    }

    /// Maximum number of resolution levels for this image.
    pub fn max_num_resolution_levels(&self) -> u32 {
        count_levels(self.width, self.height, self.tile_width as u64, self.tile_height as u64)
    }

    /// Summaries for every resolution level.
    pub fn levels(&self) -> Vec<LevelInfo> {
        (0..self.max_num_resolution_levels())
            .map(|level| LevelInfo {
                level,
                width: self.width(level),
                height: self.height(level),
                tiles_x: self.num_tiles_x(level),
                tiles_y: self.num_tiles_y(level),
            })
            .collect()
    }
}

/// Number of resolution levels possible for the given image and tile size.
///
/// Levels are added while both tile counts exceed one.
pub fn num_resolution_levels(
    width: u64,
    height: u64,
    tile_width: u64,
    tile_height: u64,
) -> Result<u32, GeometryError> {
    if tile_width == 0 || tile_height == 0 {
        return Err(GeometryError::InvalidTileSize {
            width: tile_width,
            height: tile_height,
        });
    }
    Ok(count_levels(width, height, tile_width, tile_height))
}

fn count_levels(mut width: u64, mut height: u64, tile_width: u64, tile_height: u64) -> u32 {
    let mut tiles_x = width.div_ceil(tile_width);
    let mut tiles_y = height.div_ceil(tile_height);

    let mut levels = 1;
    while tiles_x > 1 && tiles_y > 1 {
        width = (width >> 1).max(1);
        height = (height >> 1).max(1);
        tiles_x = width.div_ceil(tile_width);
        tiles_y = height.div_ceil(tile_height);
        levels += 1;
    }
    levels
}

/// Size of cell `index` when `extent` is cut into cells of `nominal` size.
fn edge_size(extent: u64, nominal: u64, index: u64) -> u64 {
    if nominal.saturating_mul(index + 1) > extent {
        extent.saturating_sub(nominal.saturating_mul(index))
    } else {
        nominal
    }
}

#[inline]
fn shr(value: u64, level: u32) -> u64 {
    value.checked_shr(level).unwrap_or(0)
}

#[inline]
fn shl(value: u64, level: u32) -> u64 {
    if level >= 64 || value.leading_zeros() < level {
        u64::MAX
    } else {
        value << level
    }
}
