//! # tilecore
//!
//! A format-agnostic, multi-resolution tile reading engine.
//!
//! This library turns any decoder that can fill a scaled source rectangle
//! into a pyramid of tiles. Reads run synchronously on the caller's thread or
//! through a shared single-threaded scheduler that bounds decode pressure
//! across many open sources.
//!
//! ## Features
//!
//! - **Pyramid geometry**: level, tile and source-rectangle math with edge clipping
//! - **Shared I/O scheduler**: per-reader priority queues, oldest-first fairness
//!   across readers, cooperative cancellation and idle shutdown
//! - **Tile caching**: on-disk and in-memory caches with a permanent fallback
//!   to direct decoding when a cache fails
//! - **Pixel conversion**: sample narrowing, interleave layouts and palette expansion
//! - **Mosaic catalog**: spatial and resolution queries over frame descriptors
//!
//! ## Architecture
//!
//! - [`reader`] - Tile geometry, read requests and the [`TileReader`]
//! - [`io`] - The [`AsyncIo`] scheduler and its request queues
//! - [`tile`] - Tile cache adapters, tile assembly and PNG/JPEG export
//! - [`pixel`] - Pixel formats, sample scaling and color tables
//! - [`mosaic`] - Frame catalog and query cursor
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use tilecore::io::AsyncIo;
//! use tilecore::reader::{RawLayout, RawRasterDecoder, TileReader};
//! use tilecore::pixel::{Interleave, SampleLayout, SampleType};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = RawLayout {
//!     width: 4096,
//!     height: 4096,
//!     bands: 3,
//!     sample: SampleLayout::new(SampleType::U8, None),
//!     interleave: Interleave::Bip,
//!     tile_width: 256,
//!     tile_height: 256,
//! };
//! let decoder = RawRasterDecoder::open("image.raw", layout)?;
//!
//! let reader = TileReader::builder(Box::new(decoder))
//!     .io(AsyncIo::shared())
//!     .build()?;
//!
//! let pixels = reader.read_tile_async(2, 0, 0).await?;
//! reader.dispose();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod mosaic;
pub mod pixel;
pub mod reader;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, InfoConfig, QueryConfig, ReadConfig};
pub use error::{CacheError, CatalogError, ExportError, GeometryError, ReadError};
pub use io::{AsyncIo, ReadPrioritizer};
pub use mosaic::{
    Coverage, Envelope, Frame, GeoPoint, Geometry, GsdCompare, MosaicBuilder, MosaicCursor,
    MosaicDatabase, Order, QueryParameters,
};
pub use pixel::{BandSpacing, ColorTable, Interleave, PaletteClass, PixelFormat, SampleLayout};
pub use reader::{
    num_resolution_levels, RawLayout, RawRasterDecoder, ReadRegion, ReadRequest,
    ReadRequestListener, ReadResult, TileDecoder, TileGeometry, TileReader, TileReaderBuilder,
};
pub use tile::{
    DiskTileCache, MemoryTileCache, TileCache, TileEncoder, TileEncoding, TileKey,
};
