//! Format plugin boundary.
//!
//! Format-specific code implements [`TileDecoder`]; everything else in a
//! [`TileReader`](super::TileReader) (scheduling, caching, disposal) is
//! format agnostic.

use std::sync::Arc;

use crate::error::ReadError;
use crate::pixel::{Interleave, PixelFormat};

use super::request::ReadRegion;

/// Best-effort interruption of a blocking [`TileDecoder::read`].
///
/// Called from an arbitrary thread without the reader's read lock held.
pub type AbortHook = Arc<dyn Fn() + Send + Sync>;

/// A tiled raster source.
///
/// Calls to [`read`](Self::read) are serialized by the owning reader, so
/// implementations need no internal locking.
pub trait TileDecoder: Send {
    /// Native width in pixels.
    fn width(&self) -> u64;

    /// Native height in pixels.
    fn height(&self) -> u64;

    /// Nominal tile width.
    fn tile_width(&self) -> u32;

    /// Nominal tile height.
    fn tile_height(&self) -> u32;

    /// Pixel format written by [`read`](Self::read).
    fn format(&self) -> PixelFormat;

    /// Layout of multi-band output.
    fn interleave(&self) -> Interleave {
        Interleave::Bip
    }

    /// Decode `region` into `buf`, resampling to the destination size.
    ///
    /// `buf` holds exactly `dst_width * dst_height * pixel_size` bytes and must
    /// not be retained after the call returns. Return
    /// [`ReadError::Canceled`] when interrupted through the abort hook.
    fn read(&mut self, region: &ReadRegion, buf: &mut [u8]) -> Result<(), ReadError>;

    /// Hook used to interrupt an in-flight [`read`](Self::read).
    fn abort_hook(&self) -> Option<AbortHook> {
        None
    }

    /// Whether the source stores real reduced-resolution levels.
    fn is_multi_resolution(&self) -> bool {
        false
    }

    /// Hint that a burst of reads is about to begin.
    fn start(&mut self) {}

    /// Hint that the current burst of reads has ended.
    fn stop(&mut self) {}

    /// Version of a tile's content, for cache invalidation.
    fn tile_version(&self, _level: u32, _tile_column: u64, _tile_row: u64) -> u64 {
        0
    }

    /// Release source resources. Called once when the reader is disposed.
    fn close(&mut self) {}
}
