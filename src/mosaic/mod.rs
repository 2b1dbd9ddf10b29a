//! Mosaic frame catalog.
//!
//! Maps spatial and resolution queries to the frames (individual datasets)
//! that cover them, without decoding any pixels. A client typically queries
//! the catalog for a region and GSD range, then opens a
//! [`TileReader`](crate::reader::TileReader) on the frames it selects.
//!
//! ```text
//! QueryParameters ──► MosaicDatabase::query()
//!                           │  filter each selected type store
//!                           │  sort each by Order
//!                           ▼
//!                     MosaicCursor (merges the sorted stores)
//!                           │
//!                           ▼
//!                         Frame ...
//! ```

mod cursor;
mod database;
mod frame;
mod geometry;
mod query;

pub use cursor::MosaicCursor;
pub use database::{Coverage, MosaicBuilder, MosaicDatabase, AGGREGATE_COVERAGE_TYPE};
pub use frame::{Frame, GeoPoint};
pub use geometry::{Envelope, Geometry};
pub use query::{GsdCompare, Order, QueryParameters};
