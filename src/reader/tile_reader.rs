//! Format-agnostic tiled reader.
//!
//! A [`TileReader`] wraps one [`TileDecoder`] and provides:
//! - Synchronous tile and region reads on the caller's thread
//! - Asynchronous reads serviced by an [`AsyncIo`] scheduler, with progress
//!   reported to a [`ReadRequestListener`]
//! - Optional tile caching at or above a minimum resolution level, with a
//!   permanent fallback to direct decoding when the cache fails
//! - Asynchronous disposal that cancels every outstanding request
//!
//! # Locking
//!
//! The read lock guards the decoder, the cache binding and the dispatch
//! decision, so at most one decode runs per reader at a time. The request
//! map and the abort hook live outside it so cancellation never waits on a
//! decode in progress. Listener callbacks never run under it.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{CacheError, GeometryError, ReadError};
use crate::io::{AsyncIo, ReadPrioritizer};
use crate::pixel::{Interleave, PixelFormat};
use crate::tile::{CacheReadCallback, TileAssembler, TileCache, TileCacheOpener, TileKey, TileSource};

use super::decoder::{AbortHook, TileDecoder};
use super::geometry::TileGeometry;
use super::request::{ReadRegion, ReadRequest, ReadRequestListener};

/// Minimum cache level meaning "never cache".
pub const NO_CACHE_LEVEL: u32 = u32::MAX;

static NEXT_READER_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Reader Core
// =============================================================================

enum CacheBinding {
    /// Not opened yet
    Detached,
    Attached(Box<dyn TileCache>),
    /// Failed or released; never reopened
    Disabled,
}

/// State guarded by the read lock.
struct ReaderState {
    decoder: Box<dyn TileDecoder>,
    cache: CacheBinding,
}

pub(crate) struct ReaderCore {
    id: u64,
    geometry: TileGeometry,
    format: PixelFormat,
    interleave: Interleave,
    multi_resolution: bool,
    io: AsyncIo,
    owns_io: bool,
    cache_uri: Option<String>,
    cache_opener: Option<TileCacheOpener>,
    abort_hook: Option<AbortHook>,
    next_request_id: AtomicU32,
    /// Written only with the read lock held
    valid: AtomicBool,
    /// Written only with the read lock held
    min_cache_level: AtomicU32,
    requests: Mutex<HashMap<u32, Arc<ReadRequest>>>,
    state: Mutex<ReaderState>,
}

impl ReaderCore {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Invoke the decoder's abort hook, if any.
    pub(crate) fn abort_decode(&self) {
        if let Some(hook) = &self.abort_hook {
            hook();
        }
    }

    pub(crate) fn forget_request(&self, id: u32) {
        self.requests.lock().remove(&id);
    }

    /// Fill `request` on the scheduler thread.
    ///
    /// Decoding happens under the read lock; updates are delivered after it
    /// is released, so listeners may call back into the reader.
    pub(crate) fn fill(&self, request: &ReadRequest, scratch: &mut Vec<u8>) -> Result<(), ReadError> {
        let delivery = self.decode(request, scratch)?;
        if request.is_canceled() {
            return Err(ReadError::Canceled);
        }

        let listener = request.listener();
        match delivery {
            Delivery::Empty => {}
            Delivery::Scratch(len) => {
                let region = request.region();
                listener.request_update(
                    request.id(),
                    &scratch[..len],
                    0,
                    0,
                    region.dst_width,
                    region.dst_height,
                );
            }
            Delivery::Parts(parts) => {
                for part in &parts {
                    if request.is_canceled() {
                        return Err(ReadError::Canceled);
                    }
                    listener.request_update(
                        request.id(),
                        &part.data,
                        part.x,
                        part.y,
                        part.width,
                        part.height,
                    );
                }
            }
        }
        Ok(())
    }

    fn decode(&self, request: &ReadRequest, scratch: &mut Vec<u8>) -> Result<Delivery, ReadError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !self.is_valid() || request.is_canceled() {
            return Err(ReadError::Canceled);
        }

        let region = request.region();
        region.check_bounds(self.geometry.native_width(), self.geometry.native_height())?;
        if region.is_empty() {
            return Ok(Delivery::Empty);
        }

        match request.level() {
            Some(level) if level >= self.min_cache_level.load(Ordering::Acquire) => {
                self.fill_cache(state, request, level, scratch)
            }
            _ => self.fill_direct(state, request, scratch),
        }
    }

    /// Decode straight into the scheduler's scratch buffer.
    fn fill_direct(
        &self,
        state: &mut ReaderState,
        request: &ReadRequest,
        scratch: &mut Vec<u8>,
    ) -> Result<Delivery, ReadError> {
        let region = request.region();
        let len = self.format.transfer_size(region.dst_width, region.dst_height);
        if scratch.len() < len {
            scratch.resize(len, 0);
        }

        state.decoder.read(region, &mut scratch[..len])?;
        Ok(Delivery::Scratch(len))
    }

    /// Serve a tile read through the cache, opening it on first use.
    fn fill_cache(
        &self,
        state: &mut ReaderState,
        request: &ReadRequest,
        level: u32,
        scratch: &mut Vec<u8>,
    ) -> Result<Delivery, ReadError> {
        if matches!(state.cache, CacheBinding::Detached) {
            state.cache = self.open_cache();
        }

        let mut callback = RequestCallback {
            request,
            parts: Vec::new(),
        };
        let outcome = match &mut state.cache {
            CacheBinding::Attached(cache) => {
                let key = TileKey::new(level, request.tile_column(), request.tile_row());
                let mut source = DecoderSource {
                    decoder: &mut state.decoder,
                    geometry: &self.geometry,
                    format: self.format,
                    interleave: self.interleave,
                };
                Some(cache.get_tile(key, &mut source, &mut callback))
            }
            _ => None,
        };

        match outcome {
            None => self.fill_direct(state, request, scratch),
            Some(Ok(true)) => Ok(Delivery::Parts(callback.parts)),
            Some(Ok(false)) | Some(Err(CacheError::Source(ReadError::Canceled))) => {
                Err(ReadError::Canceled)
            }
            Some(Err(e)) => {
                warn!(
                    reader = self.id,
                    error = %e,
                    "Tile cache failed, falling back to direct reads"
                );
                self.disable_cache(state);
                self.fill_direct(state, request, scratch)
            }
        }
    }

    fn open_cache(&self) -> CacheBinding {
        let (Some(uri), Some(opener)) = (&self.cache_uri, &self.cache_opener) else {
            self.min_cache_level.store(NO_CACHE_LEVEL, Ordering::Release);
            return CacheBinding::Disabled;
        };

        match opener(uri, &self.geometry) {
            Ok(cache) => {
                debug!(reader = self.id, uri = %uri, "Attached tile cache");
                CacheBinding::Attached(cache)
            }
            Err(e) => {
                warn!(
                    reader = self.id,
                    uri = %uri,
                    error = %e,
                    "Failed to open tile cache, caching disabled"
                );
                self.min_cache_level.store(NO_CACHE_LEVEL, Ordering::Release);
                CacheBinding::Disabled
            }
        }
    }

    fn disable_cache(&self, state: &mut ReaderState) {
        if let CacheBinding::Attached(mut cache) =
            std::mem::replace(&mut state.cache, CacheBinding::Disabled)
        {
            cache.close();
        }
        self.min_cache_level.store(NO_CACHE_LEVEL, Ordering::Release);
    }

    /// Cancel every live request of this reader.
    fn abort_all(&self) {
        let requests: Vec<Arc<ReadRequest>> =
            self.requests.lock().drain().map(|(_, r)| r).collect();
        for request in &requests {
            request.cancel();
        }
        self.io.abort_requests(self.id);
    }

    /// Mark the reader invalid and release the cache and decoder.
    ///
    /// Waits for an in-flight decode to finish.
    fn invalidate(&self) {
        let mut guard = self.state.lock();
        if !self.valid.swap(false, Ordering::AcqRel) {
            return;
        }
        let state = &mut *guard;
        if let CacheBinding::Attached(mut cache) =
            std::mem::replace(&mut state.cache, CacheBinding::Disabled)
        {
            cache.close();
        }
        state.decoder.close();
    }

    /// Body of the disposal thread.
    fn dispose(&self, release_hook: Box<dyn FnOnce() + Send + 'static>) {
        debug!(reader = self.id, "Disposing reader");

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| {
            self.abort_all();
            self.invalidate();
        })) {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            warn!(reader = self.id, panic = %message, "Error while disposing reader");
            self.valid.store(false, Ordering::Release);
        }

        self.io.run_later(self.id, release_hook);
        if self.owns_io {
            let io = self.io.clone();
            self.io.run_later(self.id, move || io.release());
        }
    }
}

/// Decoder view handed to a tile cache.
struct DecoderSource<'a> {
    decoder: &'a mut Box<dyn TileDecoder>,
    geometry: &'a TileGeometry,
    format: PixelFormat,
    interleave: Interleave,
}

impl TileSource for DecoderSource<'_> {
    fn geometry(&self) -> &TileGeometry {
        self.geometry
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn interleave(&self) -> Interleave {
        self.interleave
    }

    fn tile_version(&self, key: TileKey) -> u64 {
        self.decoder.tile_version(key.level, key.column, key.row)
    }

    fn read(&mut self, region: &ReadRegion, buf: &mut [u8]) -> Result<(), ReadError> {
        self.decoder.read(region, buf)
    }
}

/// Pixels decoded under the read lock, awaiting delivery.
enum Delivery {
    Empty,
    /// The whole destination, in the first `len` bytes of the scratch buffer
    Scratch(usize),
    /// Blocks handed over by the cache, in delivery order
    Parts(Vec<TilePart>),
}

struct TilePart {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Collects cache deliveries for a request.
struct RequestCallback<'a> {
    request: &'a ReadRequest,
    parts: Vec<TilePart>,
}

impl CacheReadCallback for RequestCallback<'_> {
    fn canceled(&self) -> bool {
        self.request.is_canceled()
    }

    fn update(&mut self, x: u32, y: u32, width: u32, height: u32, data: &[u8]) {
        self.parts.push(TilePart {
            x,
            y,
            width,
            height,
            data: data.to_vec(),
        });
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Configures a [`TileReader`].
pub struct TileReaderBuilder {
    decoder: Box<dyn TileDecoder>,
    io: Option<AsyncIo>,
    cache_uri: Option<String>,
    cache_opener: Option<TileCacheOpener>,
    min_cache_level: u32,
}

impl TileReaderBuilder {
    /// Service asynchronous reads on `io` instead of a private scheduler.
    pub fn io(mut self, io: AsyncIo) -> Self {
        self.io = Some(io);
        self
    }

    /// Cache tiles at `uri` through `opener`.
    pub fn cache(mut self, uri: impl Into<String>, opener: TileCacheOpener) -> Self {
        self.cache_uri = Some(uri.into());
        self.cache_opener = Some(opener);
        self
    }

    /// Lowest resolution level (numerically) served through the cache.
    ///
    /// Levels below this are always decoded directly. Defaults to 0.
    pub fn min_cache_level(mut self, level: u32) -> Self {
        self.min_cache_level = level;
        self
    }

    pub fn build(self) -> Result<TileReader, GeometryError> {
        let decoder = self.decoder;
        let geometry = TileGeometry::new(
            decoder.width(),
            decoder.height(),
            decoder.tile_width(),
            decoder.tile_height(),
        )?;

        let (io, owns_io) = match self.io {
            Some(io) => (io, false),
            None => (AsyncIo::new(), true),
        };
        let min_cache_level = if self.cache_opener.is_some() {
            self.min_cache_level
        } else {
            NO_CACHE_LEVEL
        };

        let core = ReaderCore {
            id: NEXT_READER_ID.fetch_add(1, Ordering::Relaxed),
            geometry,
            format: decoder.format(),
            interleave: decoder.interleave(),
            multi_resolution: decoder.is_multi_resolution(),
            io,
            owns_io,
            cache_uri: self.cache_uri,
            cache_opener: self.cache_opener,
            abort_hook: decoder.abort_hook(),
            next_request_id: AtomicU32::new(0),
            valid: AtomicBool::new(true),
            min_cache_level: AtomicU32::new(min_cache_level),
            requests: Mutex::new(HashMap::new()),
            state: Mutex::new(ReaderState {
                decoder,
                cache: CacheBinding::Detached,
            }),
        };

        debug!(
            reader = core.id,
            width = geometry.native_width(),
            height = geometry.native_height(),
            format = ?core.format,
            "Opened tile reader"
        );
        Ok(TileReader {
            core: Arc::new(core),
        })
    }
}

// =============================================================================
// Tile Reader
// =============================================================================

/// A tiled raster source with synchronous and asynchronous reads.
///
/// Cloning yields another handle to the same reader.
///
/// # Example
///
/// ```ignore
/// use tilecore::io::AsyncIo;
/// use tilecore::reader::TileReader;
///
/// let io = AsyncIo::shared();
/// let reader = TileReader::builder(Box::new(decoder)).io(io).build()?;
///
/// let pixels = reader.read_tile(0, 1, 2)?;
/// let request = reader.async_read_tile(0, 1, 3, listener);
/// ```
#[derive(Clone)]
pub struct TileReader {
    core: Arc<ReaderCore>,
}

impl TileReader {
    pub fn builder(decoder: Box<dyn TileDecoder>) -> TileReaderBuilder {
        TileReaderBuilder {
            decoder,
            io: None,
            cache_uri: None,
            cache_opener: None,
            min_cache_level: 0,
        }
    }

    /// Open a reader with a private scheduler and no cache.
    pub fn new(decoder: Box<dyn TileDecoder>) -> Result<Self, GeometryError> {
        Self::builder(decoder).build()
    }

    /// Process-unique reader id, also the key of its scheduler queue.
    pub fn id(&self) -> u64 {
        self.core.id
    }

    pub fn geometry(&self) -> &TileGeometry {
        &self.core.geometry
    }

    pub fn format(&self) -> PixelFormat {
        self.core.format
    }

    pub fn interleave(&self) -> Interleave {
        self.core.interleave
    }

    pub fn is_multi_resolution(&self) -> bool {
        self.core.multi_resolution
    }

    /// The scheduler servicing asynchronous reads.
    pub fn io(&self) -> &AsyncIo {
        &self.core.io
    }

    /// `false` once disposal has invalidated the reader.
    pub fn is_valid(&self) -> bool {
        self.core.is_valid()
    }

    /// Current minimum cache level; [`NO_CACHE_LEVEL`] when caching is off.
    pub fn min_cache_level(&self) -> u32 {
        self.core.min_cache_level.load(Ordering::Acquire)
    }

    /// Number of asynchronous requests not yet finished.
    pub fn pending_requests(&self) -> usize {
        self.core.requests.lock().len()
    }

    pub fn width(&self, level: u32) -> u64 {
        self.core.geometry.width(level)
    }

    pub fn height(&self, level: u32) -> u64 {
        self.core.geometry.height(level)
    }

    pub fn num_tiles_x(&self, level: u32) -> u64 {
        self.core.geometry.num_tiles_x(level)
    }

    pub fn num_tiles_y(&self, level: u32) -> u64 {
        self.core.geometry.num_tiles_y(level)
    }

    /// Tile column containing native x-coordinate `src_x` at `level`.
    pub fn tile_column(&self, level: u32, src_x: u64) -> u64 {
        self.core.geometry.tile_column(level, src_x)
    }

    /// Tile row containing native y-coordinate `src_y` at `level`.
    pub fn tile_row(&self, level: u32, src_y: u64) -> u64 {
        self.core.geometry.tile_row(level, src_y)
    }

    pub fn max_num_resolution_levels(&self) -> u32 {
        self.core.geometry.max_num_resolution_levels()
    }

    pub fn tile_version(&self, level: u32, tile_column: u64, tile_row: u64) -> u64 {
        self.core
            .state
            .lock()
            .decoder
            .tile_version(level, tile_column, tile_row)
    }

    /// Tell the decoder a burst of reads is starting.
    pub fn start(&self) {
        self.core.state.lock().decoder.start();
    }

    /// Tell the decoder the current burst of reads has ended.
    pub fn stop(&self) {
        self.core.state.lock().decoder.stop();
    }

    // -------------------------------------------------------------------------
    // Synchronous reads
    // -------------------------------------------------------------------------

    /// Read one tile, blocking for the duration of the decode.
    pub fn read_tile(&self, level: u32, tile_column: u64, tile_row: u64) -> Result<Vec<u8>, ReadError> {
        let region = TileKey::new(level, tile_column, tile_row).region(&self.core.geometry);
        self.read_region(&region)
    }

    /// Read a scaled region into a new buffer.
    pub fn read_region(&self, region: &ReadRegion) -> Result<Vec<u8>, ReadError> {
        let mut buf = vec![0u8; self.core.format.transfer_size(region.dst_width, region.dst_height)];
        self.read_region_into(region, &mut buf)?;
        Ok(buf)
    }

    /// Read a scaled region into `buf`.
    ///
    /// `buf` must hold at least `dst_width * dst_height * pixel_size` bytes.
    pub fn read_region_into(&self, region: &ReadRegion, buf: &mut [u8]) -> Result<(), ReadError> {
        let mut state = self.core.state.lock();
        if !self.core.is_valid() {
            return Err(ReadError::Disposed);
        }

        let required = self.core.format.transfer_size(region.dst_width, region.dst_height);
        if buf.len() < required {
            return Err(ReadError::BufferTooSmall {
                required,
                actual: buf.len(),
            });
        }
        region.check_bounds(
            self.core.geometry.native_width(),
            self.core.geometry.native_height(),
        )?;
        if region.is_empty() {
            return Ok(());
        }

        state.decoder.read(region, &mut buf[..required])
    }

    // -------------------------------------------------------------------------
    // Asynchronous reads
    // -------------------------------------------------------------------------

    /// Queue a tile read. Never blocks.
    ///
    /// `listener.request_created` fires before this returns; everything else
    /// fires on the scheduler thread.
    pub fn async_read_tile(
        &self,
        level: u32,
        tile_column: u64,
        tile_row: u64,
        listener: Arc<dyn ReadRequestListener>,
    ) -> Arc<ReadRequest> {
        let region = TileKey::new(level, tile_column, tile_row).region(&self.core.geometry);
        self.submit(region, Some((level, tile_column, tile_row)), listener)
    }

    /// Queue a scaled region read. Never blocks.
    ///
    /// Region reads bypass the tile cache.
    pub fn async_read_region(
        &self,
        region: ReadRegion,
        listener: Arc<dyn ReadRequestListener>,
    ) -> Arc<ReadRequest> {
        self.submit(region, None, listener)
    }

    fn submit(
        &self,
        region: ReadRegion,
        tile: Option<(u32, u64, u64)>,
        listener: Arc<dyn ReadRequestListener>,
    ) -> Arc<ReadRequest> {
        let id = self.core.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = Arc::new(ReadRequest::new(
            id,
            region,
            tile,
            listener,
            Arc::downgrade(&self.core),
        ));

        self.core.requests.lock().insert(id, Arc::clone(&request));
        request.listener().request_created(&request);
        self.core.io.submit(self.core.id, Arc::clone(&request));
        request
    }

    /// Read one tile through the scheduler and await the pixels.
    ///
    /// Dropping the future cancels the request.
    pub async fn read_tile_async(
        &self,
        level: u32,
        tile_column: u64,
        tile_row: u64,
    ) -> Result<Vec<u8>, ReadError> {
        let (width, height) = TileKey::new(level, tile_column, tile_row).size(&self.core.geometry);
        let (listener, rx) = Completion::channel(width, height, self.core.format);
        let request = self.async_read_tile(level, tile_column, tile_row, listener);
        await_completion(request, rx).await
    }

    /// Read a scaled region through the scheduler and await the pixels.
    pub async fn read_region_async(&self, region: ReadRegion) -> Result<Vec<u8>, ReadError> {
        let (listener, rx) = Completion::channel(region.dst_width, region.dst_height, self.core.format);
        let request = self.async_read_region(region, listener);
        await_completion(request, rx).await
    }

    /// Run `action` on the scheduler thread after this reader's queued reads.
    pub fn async_run<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.core.io.run_later(self.core.id, action);
    }

    /// Install or clear an application-specific ordering for queued reads.
    pub fn set_read_prioritizer(&self, prioritizer: Option<ReadPrioritizer>) {
        self.core.io.set_read_prioritizer(self.core.id, prioritizer);
    }

    /// Cancel every outstanding asynchronous request.
    pub fn abort_requests(&self) {
        self.core.abort_all();
    }

    // -------------------------------------------------------------------------
    // Disposal
    // -------------------------------------------------------------------------

    /// Dispose the reader asynchronously.
    pub fn dispose(&self) {
        self.dispose_with(|| {});
    }

    /// Dispose the reader asynchronously, then run `release_hook` on the
    /// scheduler thread.
    ///
    /// A dedicated thread cancels every outstanding request, waits for an
    /// in-flight decode, marks the reader invalid and releases the cache and
    /// decoder. The hook runs after that, so it always observes an invalid
    /// reader. A private scheduler is released last.
    pub fn dispose_with<F>(&self, release_hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let core = Arc::clone(&self.core);
        let spawned = thread::Builder::new()
            .name("tilereader-dispose".to_string())
            .spawn(move || core.dispose(Box::new(release_hook)));

        if let Err(e) = spawned {
            warn!(reader = self.core.id, error = %e, "Failed to spawn dispose thread, disposing inline");
            self.core.abort_all();
            self.core.invalidate();
        }
    }
}

impl fmt::Debug for TileReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileReader")
            .field("id", &self.core.id)
            .field("geometry", &self.core.geometry)
            .field("format", &self.core.format)
            .field("interleave", &self.core.interleave)
            .field("valid", &self.core.is_valid())
            .finish()
    }
}

// =============================================================================
// Tokio Bridge
// =============================================================================

type CompletionResult = Result<Vec<u8>, ReadError>;

/// Listener assembling updates and completing a oneshot channel.
struct Completion {
    tile: Mutex<Option<TileAssembler>>,
    sender: Mutex<Option<oneshot::Sender<CompletionResult>>>,
}

impl Completion {
    fn channel(
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> (Arc<Self>, oneshot::Receiver<CompletionResult>) {
        let (tx, rx) = oneshot::channel();
        let listener = Arc::new(Self {
            tile: Mutex::new(Some(TileAssembler::new(width, height, format))),
            sender: Mutex::new(Some(tx)),
        });
        (listener, rx)
    }

    fn send(&self, result: CompletionResult) {
        if let Some(tx) = self.sender.lock().take() {
            // receiver may already be gone
            let _ = tx.send(result);
        }
    }
}

impl ReadRequestListener for Completion {
    fn request_update(&self, _id: u32, data: &[u8], x: u32, y: u32, width: u32, height: u32) {
        if let Some(tile) = self.tile.lock().as_mut() {
            tile.blit(x, y, width, height, data);
        }
    }

    fn request_completed(&self, _id: u32) {
        let pixels = self
            .tile
            .lock()
            .take()
            .map(TileAssembler::into_bytes)
            .unwrap_or_default();
        self.send(Ok(pixels));
    }

    fn request_canceled(&self, _id: u32) {
        self.send(Err(ReadError::Canceled));
    }

    fn request_error(&self, _id: u32, error: &ReadError) {
        self.send(Err(error.clone()));
    }
}

/// Cancels the request if the awaiting future is dropped early.
struct CancelOnDrop(Option<Arc<ReadRequest>>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(request) = self.0.take() {
            request.cancel();
        }
    }
}

async fn await_completion(
    request: Arc<ReadRequest>,
    rx: oneshot::Receiver<CompletionResult>,
) -> CompletionResult {
    let mut guard = CancelOnDrop(Some(request));
    let result = rx.await.unwrap_or(Err(ReadError::Canceled));
    guard.0 = None;
    result
}
