//! Read requests and the listener interface used to report their progress.
//!
//! A [`ReadRequest`] is created by a [`TileReader`](super::TileReader) for
//! every asynchronous read. It moves through
//! created -> queued -> servicing -> terminal, and exactly one terminal
//! callback (`request_completed`, `request_canceled` or `request_error`) is
//! delivered for it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::error::ReadError;

use super::tile_reader::ReaderCore;

// =============================================================================
// Read Result
// =============================================================================

/// Outcome of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    Success,
    Error,
    Canceled,
}

impl From<&Result<(), ReadError>> for ReadResult {
    fn from(result: &Result<(), ReadError>) -> Self {
        match result {
            Ok(()) => ReadResult::Success,
            Err(e) => e.result(),
        }
    }
}

// =============================================================================
// Read Region
// =============================================================================

/// A scaled read: a native-resolution source rectangle resampled to a
/// destination size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadRegion {
    /// Source x-coordinate at native resolution
    pub src_x: u64,

    /// Source y-coordinate at native resolution
    pub src_y: u64,

    /// Source width at native resolution
    pub src_width: u64,

    /// Source height at native resolution
    pub src_height: u64,

    /// Output width in pixels
    pub dst_width: u32,

    /// Output height in pixels
    pub dst_height: u32,
}

impl ReadRegion {
    pub fn new(
        src_x: u64,
        src_y: u64,
        src_width: u64,
        src_height: u64,
        dst_width: u32,
        dst_height: u32,
    ) -> Self {
        Self {
            src_x,
            src_y,
            src_width,
            src_height,
            dst_width,
            dst_height,
        }
    }

    /// Whether either the source or the destination has no pixels.
    pub fn is_empty(&self) -> bool {
        self.src_width == 0 || self.src_height == 0 || self.dst_width == 0 || self.dst_height == 0
    }

    /// Check that the source rectangle lies within a `width` x `height` image.
    pub fn check_bounds(&self, width: u64, height: u64) -> Result<(), ReadError> {
        let fits_x = self
            .src_x
            .checked_add(self.src_width)
            .is_some_and(|end| end <= width);
        let fits_y = self
            .src_y
            .checked_add(self.src_height)
            .is_some_and(|end| end <= height);

        if fits_x && fits_y {
            Ok(())
        } else {
            Err(ReadError::RegionOutOfBounds {
                x: self.src_x,
                y: self.src_y,
                width: self.src_width,
                height: self.src_height,
                image_width: width,
                image_height: height,
            })
        }
    }
}

// =============================================================================
// Listener
// =============================================================================

/// Receives progress callbacks for asynchronous reads.
///
/// `request_created` fires on the caller's thread; every other callback fires
/// on a scheduler thread without the reader's read lock held, so a listener
/// may call back into its reader. All methods default to no-ops.
pub trait ReadRequestListener: Send + Sync {
    /// The request was allocated and is about to be queued.
    fn request_created(&self, _request: &Arc<ReadRequest>) {}

    /// The scheduler began servicing the request.
    fn request_started(&self, _id: u32) {}

    /// Pixels for a sub-region of the destination are available.
    ///
    /// `data` holds `dst_width * dst_height` pixels in the reader's format and
    /// is only valid for the duration of the call.
    fn request_update(
        &self,
        _id: u32,
        _data: &[u8],
        _dst_x: u32,
        _dst_y: u32,
        _dst_width: u32,
        _dst_height: u32,
    ) {
    }

    fn request_completed(&self, _id: u32) {}

    fn request_canceled(&self, _id: u32) {}

    fn request_error(&self, _id: u32, _error: &ReadError) {}
}

// =============================================================================
// Read Request
// =============================================================================

/// One asynchronous read.
///
/// Everything except the cancellation and servicing flags is fixed at
/// construction.
pub struct ReadRequest {
    id: u32,
    region: ReadRegion,
    level: Option<u32>,
    tile_column: u64,
    tile_row: u64,
    canceled: AtomicBool,
    servicing: AtomicBool,
    finished: AtomicBool,
    listener: Arc<dyn ReadRequestListener>,
    reader: Weak<ReaderCore>,
}

impl ReadRequest {
    pub(crate) fn new(
        id: u32,
        region: ReadRegion,
        tile: Option<(u32, u64, u64)>,
        listener: Arc<dyn ReadRequestListener>,
        reader: Weak<ReaderCore>,
    ) -> Self {
        let (level, tile_column, tile_row) = match tile {
            Some((level, column, row)) => (Some(level), column, row),
            None => (None, 0, 0),
        };
        Self {
            id,
            region,
            level,
            tile_column,
            tile_row,
            canceled: AtomicBool::new(false),
            servicing: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            listener,
            reader,
        }
    }

    /// Per-reader request id, increasing with submission order.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn region(&self) -> &ReadRegion {
        &self.region
    }

    /// Resolution level for tile reads, `None` for arbitrary region reads.
    pub fn level(&self) -> Option<u32> {
        self.level
    }

    pub fn tile_column(&self) -> u64 {
        self.tile_column
    }

    pub fn tile_row(&self) -> u64 {
        self.tile_row
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Whether the request is currently being decoded.
    pub fn is_servicing(&self) -> bool {
        self.servicing.load(Ordering::SeqCst)
    }

    /// Whether a terminal callback has been delivered.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Request cancellation. Safe from any thread.
    ///
    /// A request that is being decoded additionally triggers the reader's
    /// abort hook so a blocking decode can return early.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        if self.is_servicing() {
            if let Some(reader) = self.reader.upgrade() {
                reader.abort_decode();
            }
        }
    }

    pub(crate) fn listener(&self) -> &Arc<dyn ReadRequestListener> {
        &self.listener
    }

    pub(crate) fn reader_id(&self) -> Option<u64> {
        self.reader.upgrade().map(|reader| reader.id())
    }

    /// Run the fill pipeline of the owning reader.
    pub(crate) fn service(&self, scratch: &mut Vec<u8>) -> Result<(), ReadError> {
        match self.reader.upgrade() {
            Some(reader) => reader.fill(self, scratch),
            None => Err(ReadError::Canceled),
        }
    }

    pub(crate) fn set_servicing(&self, servicing: bool) {
        self.servicing.store(servicing, Ordering::SeqCst);
    }

    /// Mark the request started. Returns `false` if it was canceled first.
    ///
    /// The servicing flag is raised before the cancellation flag is read,
    /// pairing with the reverse order in [`Self::cancel`]: a concurrent
    /// cancel either sees the request servicing and fires the abort hook,
    /// or is seen here and the request never starts.
    pub(crate) fn start(&self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.set_servicing(true);
        if self.is_canceled() {
            self.set_servicing(false);
            return false;
        }
        self.listener.request_started(self.id);
        true
    }

    /// Deliver the terminal callback for `result`.
    ///
    /// Only the first call has any effect. A success observed after
    /// cancellation is reported as canceled.
    pub(crate) fn finish(&self, result: Result<(), ReadError>) -> ReadResult {
        self.set_servicing(false);
        let outcome = match &result {
            Ok(()) if self.is_canceled() => ReadResult::Canceled,
            other => ReadResult::from(other),
        };

        if self.finished.swap(true, Ordering::AcqRel) {
            return outcome;
        }
        if let Some(reader) = self.reader.upgrade() {
            reader.forget_request(self.id);
        }

        match result {
            Err(ref e) if !e.is_canceled() => self.listener.request_error(self.id, e),
            _ if outcome == ReadResult::Canceled => self.listener.request_canceled(self.id),
            _ => self.listener.request_completed(self.id),
        }
        outcome
    }
}

impl fmt::Debug for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadRequest")
            .field("id", &self.id)
            .field("region", &self.region)
            .field("level", &self.level)
            .field("tile_column", &self.tile_column)
            .field("tile_row", &self.tile_row)
            .field("canceled", &self.is_canceled())
            .field("servicing", &self.is_servicing())
            .finish()
    }
}
