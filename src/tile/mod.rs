//! Tile caching and export.
//!
//! # Architecture
//!
//! A [`TileReader`](crate::reader::TileReader) routes tile reads at
//! cache-eligible levels through a [`TileCache`]:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               TileReader                │
//! │        fill_cache() / fill_direct()     │
//! └────────────────────┬────────────────────┘
//!                      │ get_tile(key, source, callback)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                TileCache                │
//! │  ┌───────────────┐  ┌────────────────┐  │
//! │  │ DiskTileCache │  │MemoryTileCache │  │
//! │  └───────────────┘  └────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ miss: read_tile_parts()
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        TileSource (the decoder)         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCache`]: adapter contract; errors disable caching for a reader
//! - [`TileKey`]: (level, column, row) tile identity
//! - [`DiskTileCache`]: versioned directory store
//! - [`MemoryTileCache`]: LRU store bounded by bytes
//! - [`TileAssembler`]: merges partial updates into one buffer
//! - [`TileEncoder`]: PNG / JPEG export of decoded tiles

mod adapter;
mod assembler;
mod cache;
mod disk_cache;
mod encoder;

pub use adapter::{
    read_tile_parts, CacheReadCallback, TileCache, TileCacheOpener, TileKey, TileSource,
};
pub use assembler::TileAssembler;
pub use cache::{MemoryTileCache, DEFAULT_MEMORY_CACHE_CAPACITY};
pub use disk_cache::{DiskTileCache, CACHE_LAYOUT_VERSION};
pub use encoder::{
    clamp_quality, is_valid_quality, TileEncoder, TileEncoding, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
