//! Tiled image readers.
//!
//! A [`TileReader`] wraps a format [`TileDecoder`] and exposes a uniform,
//! pyramid-shaped view of the image. Reads may be issued synchronously on
//! the caller's thread, or asynchronously through the shared I/O scheduler
//! ([`AsyncIo`](crate::io::AsyncIo)) with progress reported to a
//! [`ReadRequestListener`].
//!
//! # Pyramid levels
//!
//! Level 0 is full resolution. Each level halves the previous one (rounding
//! up), and tile `(c, r)` at level `L` covers source pixels
//! `[c * tw << L, (c + 1) * tw << L)` clipped to the native image:
//!
//! ```text
//! level 0   ┌───┬───┬───┬─┐
//!           │   │   │   │ │   1000 x 1000, 256px tiles
//!           ├───┼───┼───┼─┤
//!           │   │   │   │ │
//!           └───┴───┴───┴─┘
//! level 1   ┌───┬─┐
//!           │   │ │           500 x 500
//!           └───┴─┘
//! level 2   ┌─┐
//!           └─┘               250 x 250, a single tile
//! ```

mod decoder;
mod geometry;
mod raw;
mod request;
mod tile_reader;

pub use decoder::{AbortHook, TileDecoder};
pub use geometry::{num_resolution_levels, LevelInfo, TileGeometry};
pub use raw::{RawLayout, RawRasterDecoder};
pub use request::{ReadRegion, ReadRequest, ReadRequestListener, ReadResult};
pub use tile_reader::{TileReader, TileReaderBuilder, NO_CACHE_LEVEL};

pub(crate) use tile_reader::ReaderCore;
