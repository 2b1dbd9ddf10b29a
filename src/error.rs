use thiserror::Error;

use crate::reader::ReadResult;

/// Errors produced while filling a read request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReadError {
    /// The request was canceled cooperatively
    #[error("Read canceled")]
    Canceled,

    /// The reader has been disposed
    #[error("Reader has been disposed")]
    Disposed,

    /// The output buffer cannot hold the requested region
    #[error("Output buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    /// The source region does not lie within the native image bounds
    #[error("Region out of bounds: ({x}, {y}, {width}x{height}) exceeds {image_width}x{image_height}")]
    RegionOutOfBounds {
        x: u64,
        y: u64,
        width: u64,
        height: u64,
        image_width: u64,
        image_height: u64,
    },

    /// The format decoder could not produce the requested pixels
    #[error("Decode error: {0}")]
    Decode(String),

    /// I/O failure while accessing the source
    #[error("I/O error: {0}")]
    Io(String),
}

impl ReadError {
    /// Returns `true` if this error represents cancellation rather than failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ReadError::Canceled)
    }

    /// Map the error onto the three-valued read outcome.
    pub fn result(&self) -> ReadResult {
        if self.is_canceled() {
            ReadResult::Canceled
        } else {
            ReadResult::Error
        }
    }
}

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> Self {
        ReadError::Io(err.to_string())
    }
}

/// Errors raised by a tile cache adapter.
///
/// Any of these permanently disables caching for the owning reader.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The cache could not be opened or created
    #[error("Failed to open tile cache {uri}: {reason}")]
    Open { uri: String, reason: String },

    /// I/O error reading or writing cached tiles
    #[error("Tile cache I/O error: {0}")]
    Io(String),

    /// A cached entry could not be decoded
    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    /// The reader cannot be cached
    #[error("Caching not supported: {0}")]
    Unsupported(String),

    /// The source read underneath the cache failed
    #[error("Source read failed: {0}")]
    Source(#[from] ReadError),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err.to_string())
    }
}

/// Errors from the mosaic frame catalog.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// I/O error while reading catalog stores
    #[error("Catalog I/O error: {0}")]
    Io(String),

    /// A catalog store could not be parsed
    #[error("Catalog parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// The catalog has been closed
    #[error("Catalog is closed")]
    Closed,
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err.to_string())
    }
}

/// Errors from tile geometry computations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// Tile dimensions must be strictly positive
    #[error("Invalid tile size {width}x{height}: tile dimensions must be > 0")]
    InvalidTileSize { width: u64, height: u64 },
}

/// Errors that can occur when exporting a decoded tile.
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    /// Only pixel-interleaved buffers can be exported
    #[error("Unsupported interleave for export: {0}")]
    UnsupportedInterleave(String),

    /// Buffer length does not match the tile dimensions
    #[error("Tile buffer has {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    /// Encoding the image failed
    #[error("Failed to encode tile: {message}")]
    EncodeError { message: String },
}
