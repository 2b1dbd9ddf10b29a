//! Tile reader tests: geometry, synchronous reads, the tokio bridge and
//! disposal.

use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;

use tilecore::error::ReadError;
use tilecore::io::AsyncIo;
use tilecore::pixel::{Interleave, PixelFormat, SampleLayout, SampleType};
use tilecore::reader::{
    RawLayout, RawRasterDecoder, ReadRegion, ReadRequestListener, TileReader,
};
use tilecore::tile::{MemoryTileCache, TileEncoder, TileEncoding};

use super::test_utils::{gradient, Event, Gate, MockDecoder, Recorder, WAIT};

fn reader(width: u64, height: u64, tile_size: u32) -> TileReader {
    TileReader::new(MockDecoder::new(width, height, tile_size).boxed()).unwrap()
}

// =============================================================================
// Geometry
// =============================================================================

#[test]
fn test_tile_grid_with_partial_edge() {
    let reader = reader(1000, 1000, 256);

    assert_eq!(reader.num_tiles_x(0), 4);
    assert_eq!(reader.num_tiles_y(0), 4);
    assert_eq!(reader.geometry().tile_width_at(0, 3), 1000 - 256 * 3);
    assert_eq!(reader.geometry().tile_width_at(0, 0), 256);
    assert_eq!(reader.max_num_resolution_levels(), 3);
    assert_eq!(reader.tile_column(0, 999), 3);

    let edge = reader.read_tile(0, 3, 0).unwrap();
    assert_eq!(edge.len(), 232 * 256);
    reader.dispose();
}

#[test]
fn test_reduced_level_dimensions() {
    let reader = reader(1000, 600, 256);

    assert_eq!(reader.width(1), 500);
    assert_eq!(reader.height(1), 300);
    assert_eq!(reader.num_tiles_x(2), 1);
    assert_eq!(reader.num_tiles_y(2), 1);

    let top = reader.max_num_resolution_levels() - 1;
    assert!(reader.width(top) <= 256 && reader.height(top) <= 256);
    reader.dispose();
}

// =============================================================================
// Synchronous Reads
// =============================================================================

#[test]
fn test_read_tile_matches_native_pixels() {
    let reader = reader(512, 512, 256);

    let tile = reader.read_tile(0, 1, 1).unwrap();
    assert_eq!(tile.len(), 256 * 256);
    assert_eq!(tile[0], gradient(256, 256));
    assert_eq!(tile[255], gradient(511, 256));
    assert_eq!(tile[256 * 255], gradient(256, 511));
    reader.dispose();
}

#[test]
fn test_read_tile_at_reduced_level_samples_source() {
    let reader = reader(512, 512, 256);

    let tile = reader.read_tile(1, 0, 0).unwrap();
    assert_eq!(tile.len(), 256 * 256);
    // every other native pixel
    assert_eq!(tile[1], gradient(2, 0));
    assert_eq!(tile[256 + 1], gradient(2, 2));
    reader.dispose();
}

#[test]
fn test_decoder_format_sets_pixel_size() {
    let decoder = MockDecoder::new(512, 512, 256).with_format(PixelFormat::Rgba);
    let reader = TileReader::new(decoder.boxed()).unwrap();

    assert_eq!(reader.format(), PixelFormat::Rgba);
    let tile = reader.read_tile(0, 1, 0).unwrap();
    assert_eq!(tile.len(), 256 * 256 * 4);
    assert_eq!(&tile[4..8], &[gradient(257, 0); 4]);
    reader.dispose();
}

#[test]
fn test_read_region_into_small_buffer() {
    let reader = reader(512, 512, 256);
    let region = ReadRegion::new(0, 0, 64, 64, 32, 32);

    let mut buf = vec![0u8; 32 * 32 - 1];
    let err = reader.read_region_into(&region, &mut buf).unwrap_err();
    assert_eq!(
        err,
        ReadError::BufferTooSmall {
            required: 32 * 32,
            actual: 32 * 32 - 1
        }
    );

    let mut buf = vec![0u8; 32 * 32 + 16];
    reader.read_region_into(&region, &mut buf).unwrap();
    assert_eq!(buf[33], gradient(2, 2));
    reader.dispose();
}

#[test]
fn test_read_region_out_of_bounds() {
    let reader = reader(512, 512, 256);

    let err = reader
        .read_region(&ReadRegion::new(500, 0, 64, 64, 64, 64))
        .unwrap_err();
    assert!(matches!(err, ReadError::RegionOutOfBounds { x: 500, .. }));
    reader.dispose();
}

#[test]
fn test_empty_region_is_noop() {
    let reader = reader(512, 512, 256);
    let pixels = reader.read_region(&ReadRegion::new(0, 0, 64, 64, 0, 16)).unwrap();
    assert!(pixels.is_empty());
    reader.dispose();
}

#[test]
fn test_empty_source_region_skips_decoder() {
    let decoder = MockDecoder::new(512, 512, 256);
    let reads = decoder.reads();
    let reader = TileReader::new(decoder.boxed()).unwrap();

    // zero-size sources on the far edges
    let pixels = reader.read_region(&ReadRegion::new(512, 0, 0, 16, 8, 8)).unwrap();
    assert_eq!(pixels, vec![0u8; 64]);
    let pixels = reader.read_region(&ReadRegion::new(0, 512, 16, 0, 8, 8)).unwrap();
    assert_eq!(pixels, vec![0u8; 64]);

    let recorder = Recorder::new();
    let request = reader.async_read_region(ReadRegion::new(512, 511, 0, 1, 1, 1), recorder.clone());
    assert!(recorder.wait_terminal(1));
    assert_eq!(recorder.terminal(request.id()), Some(Event::Completed(request.id())));
    assert!(!recorder.events().contains(&Event::Update(request.id())));

    assert!(reads.lock().is_empty());
    reader.dispose();
}

#[test]
fn test_zero_width_image_reads_nothing() {
    let decoder = MockDecoder::new(0, 64, 16);
    let reads = decoder.reads();
    let reader = TileReader::new(decoder.boxed()).unwrap();

    assert_eq!(reader.num_tiles_x(0), 1);
    assert_eq!(reader.max_num_resolution_levels(), 1);
    // level widths floor at one pixel
    assert_eq!(reader.read_tile(0, 0, 1).unwrap(), vec![0u8; 16]);

    let recorder = Recorder::new();
    let request = reader.async_read_tile(0, 0, 2, recorder.clone());
    assert!(recorder.wait_terminal(1));
    assert_eq!(recorder.terminal(request.id()), Some(Event::Completed(request.id())));
    assert!(!recorder.events().contains(&Event::Update(request.id())));

    assert!(reads.lock().is_empty());
    reader.dispose();
}

#[test]
fn test_raw_raster_empty_source_at_edge() {
    let layout = RawLayout {
        width: 4,
        height: 4,
        bands: 1,
        sample: SampleLayout::new(SampleType::U8, None),
        interleave: Interleave::Bip,
        tile_width: 4,
        tile_height: 4,
    };
    let data: Vec<u8> = (0..16).collect();
    let decoder = RawRasterDecoder::new(data.into(), layout).unwrap();
    let reader = TileReader::new(Box::new(decoder)).unwrap();

    assert_eq!(reader.read_region(&ReadRegion::new(4, 3, 0, 1, 1, 1)).unwrap(), vec![0]);
    assert_eq!(reader.read_region(&ReadRegion::new(3, 3, 1, 1, 1, 1)).unwrap(), vec![15]);
    reader.dispose();
}

#[test]
fn test_decoder_error_propagates() {
    let reader = TileReader::new(MockDecoder::new(512, 512, 256).failing().boxed()).unwrap();
    let err = reader.read_tile(0, 0, 0).unwrap_err();
    assert!(matches!(err, ReadError::Decode(_)));
    reader.dispose();
}

// =============================================================================
// Asynchronous Reads
// =============================================================================

#[test]
fn test_async_read_delivers_update_then_completion() {
    let reader = reader(512, 512, 256);
    let recorder = Recorder::new();

    let request = reader.async_read_tile(0, 0, 1, recorder.clone());
    assert_eq!(recorder.events()[0], Event::Created(request.id()));
    assert!(recorder.wait_terminal(1));

    let events = recorder.events();
    let id = request.id();
    assert_eq!(events.first(), Some(&Event::Created(id)));
    assert_eq!(events.get(1), Some(&Event::Started(id)));
    assert!(events.contains(&Event::Update(id)));
    assert_eq!(events.last(), Some(&Event::Completed(id)));
    assert!(request.is_finished());
    assert_eq!(reader.pending_requests(), 0);
    reader.dispose();
}

#[test]
fn test_async_decode_error_reaches_listener() {
    let reader = TileReader::new(MockDecoder::new(512, 512, 256).failing().boxed()).unwrap();
    let recorder = Recorder::new();

    let request = reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(recorder.wait_terminal(1));
    assert_eq!(recorder.terminal(request.id()), Some(Event::Error(request.id())));
    reader.dispose();
}

#[test]
fn test_request_ids_increase() {
    let reader = reader(512, 512, 256);
    let recorder = Recorder::new();

    let first = reader.async_read_tile(0, 0, 0, recorder.clone());
    let second = reader.async_read_tile(0, 1, 0, recorder.clone());
    assert!(second.id() > first.id());
    assert!(recorder.wait_terminal(2));
    reader.dispose();
}

/// Calls back into its own reader from every update.
struct Reentrant {
    reader: TileReader,
    updates: Mutex<usize>,
    done: Mutex<mpsc::Sender<usize>>,
}

impl Reentrant {
    fn new(reader: &TileReader) -> (Arc<Self>, mpsc::Receiver<usize>) {
        let (tx, rx) = mpsc::channel();
        let listener = Arc::new(Self {
            reader: reader.clone(),
            updates: Mutex::new(0),
            done: Mutex::new(tx),
        });
        (listener, rx)
    }
}

impl ReadRequestListener for Reentrant {
    fn request_update(&self, _id: u32, _data: &[u8], _x: u32, _y: u32, _w: u32, _h: u32) {
        self.reader.start();
        let version = self.reader.tile_version(0, 0, 0);
        if self.reader.read_tile(0, 0, 0).is_ok() && version == 0 {
            *self.updates.lock() += 1;
        }
        self.reader.stop();
    }

    fn request_completed(&self, _id: u32) {
        let _ = self.done.lock().send(*self.updates.lock());
    }
}

#[test]
fn test_listener_may_call_back_into_reader() {
    let reader = reader(512, 512, 256);

    let (listener, rx) = Reentrant::new(&reader);
    reader.async_read_tile(0, 1, 0, listener);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 1);

    let (listener, rx) = Reentrant::new(&reader);
    reader.async_read_region(ReadRegion::new(0, 0, 512, 512, 64, 64), listener);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 1);
    reader.dispose();
}

#[test]
fn test_listener_may_call_back_into_cached_reader() {
    let reader = TileReader::builder(MockDecoder::new(512, 512, 256).boxed())
        .cache("memory", MemoryTileCache::opener(1 << 20))
        .build()
        .unwrap();

    // a miss delivers four quadrants, a hit the whole tile at once
    let (listener, rx) = Reentrant::new(&reader);
    reader.async_read_tile(0, 0, 0, listener);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 4);

    let (listener, rx) = Reentrant::new(&reader);
    reader.async_read_tile(0, 0, 0, listener);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 1);
    assert_eq!(reader.min_cache_level(), 0);
    reader.dispose();
}

#[tokio::test]
async fn test_tokio_bridge_matches_sync_read() {
    let reader = TileReader::builder(MockDecoder::new(1000, 1000, 256).boxed())
        .io(AsyncIo::new())
        .build()
        .unwrap();

    let expected = reader.read_tile(0, 3, 2).unwrap();
    let actual = reader.read_tile_async(0, 3, 2).await.unwrap();
    assert_eq!(actual, expected);

    let region = ReadRegion::new(100, 100, 400, 200, 100, 50);
    let expected = reader.read_region(&region).unwrap();
    let actual = reader.read_region_async(region).await.unwrap();
    assert_eq!(actual, expected);
    reader.dispose();
}

#[tokio::test]
async fn test_tokio_bridge_reports_errors() {
    let reader = TileReader::new(MockDecoder::new(512, 512, 256).failing().boxed()).unwrap();
    let err = reader.read_tile_async(0, 0, 0).await.unwrap_err();
    assert!(matches!(err, ReadError::Decode(_)));
    reader.dispose();
}

// =============================================================================
// Disposal
// =============================================================================

#[test]
fn test_dispose_cancels_queued_and_in_flight() {
    let gate = Gate::new();
    let decoder = MockDecoder::new(1024, 1024, 256).with_gate(Arc::clone(&gate));
    let reader = TileReader::new(decoder.boxed()).unwrap();
    let recorder = Recorder::new();

    reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(gate.wait_entered(1));
    for column in 1..4 {
        reader.async_read_tile(0, column, 0, recorder.clone());
    }

    let (tx, rx) = mpsc::channel();
    let observer = reader.clone();
    reader.dispose_with(move || {
        tx.send(observer.is_valid()).unwrap();
    });

    assert!(!rx.recv_timeout(WAIT).unwrap());
    assert!(recorder.wait_terminal(4));
    assert_eq!(recorder.terminal_count(), 4);

    let canceled = recorder
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Canceled(_)))
        .count();
    assert!(canceled >= 3);

    assert!(!reader.is_valid());
    assert_eq!(reader.read_tile(0, 0, 0).unwrap_err(), ReadError::Disposed);
}

#[test]
fn test_dispose_releases_private_scheduler() {
    let reader = reader(512, 512, 256);
    let recorder = Recorder::new();
    reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(recorder.wait_terminal(1));

    let (tx, rx) = mpsc::channel();
    reader.dispose_with(move || tx.send(()).unwrap());
    assert!(rx.recv_timeout(WAIT).is_ok());

    let io = reader.io().clone();
    let deadline = std::time::Instant::now() + WAIT;
    while io.is_running() && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    assert!(!io.is_running());
}

#[test]
fn test_dispose_leaves_shared_scheduler_running() {
    let io = AsyncIo::new();
    let reader = TileReader::builder(MockDecoder::new(512, 512, 256).boxed())
        .io(io.clone())
        .build()
        .unwrap();

    let (tx, rx) = mpsc::channel();
    reader.dispose_with(move || tx.send(()).unwrap());
    assert!(rx.recv_timeout(WAIT).is_ok());

    let (tx, rx) = mpsc::channel();
    io.run_later(99, move || tx.send(()).unwrap());
    assert!(rx.recv_timeout(WAIT).is_ok());
    assert!(io.is_running());
    io.release();
}

#[test]
fn test_async_read_after_dispose_is_canceled() {
    let reader = reader(512, 512, 256);
    let (tx, rx) = mpsc::channel();
    reader.dispose_with(move || tx.send(()).unwrap());
    assert!(rx.recv_timeout(WAIT).is_ok());

    let recorder = Recorder::new();
    let request = reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(recorder.wait_terminal(1));
    assert_eq!(recorder.terminal(request.id()), Some(Event::Canceled(request.id())));
    reader.io().release();
}

// =============================================================================
// Raw Rasters and Export
// =============================================================================

#[tokio::test]
async fn test_raw_raster_to_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.raw");

    let (width, height) = (300u64, 200u64);
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[x as u8, y as u8, 7]);
        }
    }
    std::fs::write(&path, &data).unwrap();

    let layout = RawLayout {
        width,
        height,
        bands: 3,
        sample: SampleLayout::new(SampleType::U8, None),
        interleave: Interleave::Bip,
        tile_width: 128,
        tile_height: 128,
    };
    let decoder = RawRasterDecoder::open(&path, layout).unwrap();
    let reader = TileReader::new(Box::new(decoder)).unwrap();
    assert_eq!(reader.format(), PixelFormat::Rgb);

    let pixels = reader.read_tile_async(0, 2, 1).await.unwrap();
    // edge tile: 300 - 256 = 44 wide, 200 - 128 = 72 tall
    assert_eq!(pixels.len(), 44 * 72 * 3);
    assert_eq!(&pixels[..3], &[0u8, 128, 7]);

    let png = TileEncoder::new()
        .encode(&pixels, 44, 72, PixelFormat::Rgb, Interleave::Bip, TileEncoding::Png)
        .unwrap();
    assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    reader.dispose();
}
