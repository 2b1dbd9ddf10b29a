//! Scheduler ordering, cancellation and lifecycle tests.

use std::cmp::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use tilecore::io::{AsyncIo, ReadPrioritizer};
use tilecore::reader::{ReadRegion, ReadRequest, ReadRequestListener, TileReader};

use super::test_utils::{Event, Gate, MockDecoder, Recorder, WAIT};

/// A reader on `io` whose decodes wait at the returned gate.
fn gated_reader(io: &AsyncIo) -> (TileReader, Arc<Gate>) {
    let gate = Gate::new();
    let decoder = MockDecoder::new(1024, 1024, 256).with_gate(Arc::clone(&gate));
    let reader = TileReader::builder(decoder.boxed())
        .io(io.clone())
        .build()
        .unwrap();
    (reader, gate)
}

/// Records the order in which requests of several readers start.
struct Tagged {
    tag: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl ReadRequestListener for Tagged {
    fn request_started(&self, _id: u32) {
        self.log.lock().push(self.tag);
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_lower_levels_then_newest_first() {
    let io = AsyncIo::new();
    let (reader, gate) = gated_reader(&io);
    let recorder = Recorder::new();

    let blocker = reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(gate.wait_entered(1));

    let a = reader.async_read_tile(2, 0, 0, recorder.clone());
    let b = reader.async_read_tile(0, 1, 0, recorder.clone());
    let c = reader.async_read_tile(0, 2, 0, recorder.clone());
    gate.open();

    assert!(recorder.wait_terminal(4));
    assert_eq!(
        recorder.started_order(),
        vec![blocker.id(), c.id(), b.id(), a.id()]
    );
    for id in [blocker.id(), a.id(), b.id(), c.id()] {
        assert_eq!(recorder.terminal(id), Some(Event::Completed(id)));
    }
    io.release();
}

#[test]
fn test_region_reads_rank_above_tiles() {
    let io = AsyncIo::new();
    let (reader, gate) = gated_reader(&io);
    let recorder = Recorder::new();

    let blocker = reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(gate.wait_entered(1));

    let tile = reader.async_read_tile(0, 3, 3, recorder.clone());
    let region = reader.async_read_region(
        ReadRegion::new(0, 0, 512, 512, 64, 64),
        recorder.clone(),
    );
    let newer_tile = reader.async_read_tile(0, 1, 1, recorder.clone());
    gate.open();

    assert!(recorder.wait_terminal(4));
    assert_eq!(
        recorder.started_order(),
        vec![blocker.id(), region.id(), newer_tile.id(), tile.id()]
    );
    io.release();
}

#[test]
fn test_prioritizer_overrides_default_order() {
    let io = AsyncIo::new();
    let (reader, gate) = gated_reader(&io);
    let recorder = Recorder::new();

    // lowest column first
    let prioritizer: ReadPrioritizer = Arc::new(|a: &ReadRequest, b: &ReadRequest| {
        b.tile_column().cmp(&a.tile_column())
    });
    reader.set_read_prioritizer(Some(prioritizer));

    let blocker = reader.async_read_tile(0, 3, 0, recorder.clone());
    assert!(gate.wait_entered(1));

    let col0 = reader.async_read_tile(0, 0, 0, recorder.clone());
    let col2 = reader.async_read_tile(0, 2, 0, recorder.clone());
    let col1 = reader.async_read_tile(0, 1, 0, recorder.clone());
    gate.open();

    assert!(recorder.wait_terminal(4));
    assert_eq!(
        recorder.started_order(),
        vec![blocker.id(), col0.id(), col1.id(), col2.id()]
    );
    io.release();
}

#[test]
fn test_prioritizer_equal_falls_back_to_default() {
    let io = AsyncIo::new();
    let (reader, gate) = gated_reader(&io);
    let recorder = Recorder::new();

    let prioritizer: ReadPrioritizer = Arc::new(|_: &ReadRequest, _: &ReadRequest| Ordering::Equal);
    reader.set_read_prioritizer(Some(prioritizer));

    let blocker = reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(gate.wait_entered(1));
    let older = reader.async_read_tile(0, 1, 0, recorder.clone());
    let newer = reader.async_read_tile(0, 2, 0, recorder.clone());
    gate.open();

    assert!(recorder.wait_terminal(3));
    assert_eq!(
        recorder.started_order(),
        vec![blocker.id(), newer.id(), older.id()]
    );
    io.release();
}

#[test]
fn test_oldest_head_first_across_readers() {
    let io = AsyncIo::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let listener = |tag| {
        Arc::new(Tagged {
            tag,
            log: Arc::clone(&log),
        })
    };

    let (first, gate) = gated_reader(&io);
    let second = TileReader::builder(MockDecoder::new(512, 512, 256).boxed())
        .io(io.clone())
        .build()
        .unwrap();

    first.async_read_tile(0, 0, 0, listener("blocker"));
    assert!(gate.wait_entered(1));

    second.async_read_tile(0, 0, 0, listener("second"));
    first.async_read_tile(0, 1, 0, listener("first"));
    gate.open();

    assert!(wait_until(|| log.lock().len() == 3));
    assert_eq!(*log.lock(), vec!["blocker", "second", "first"]);
    io.release();
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_canceled_before_dequeue_never_starts() {
    let io = AsyncIo::new();
    let (reader, gate) = gated_reader(&io);
    let recorder = Recorder::new();

    let blocker = reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(gate.wait_entered(1));

    let doomed = reader.async_read_tile(0, 1, 0, recorder.clone());
    doomed.cancel();
    assert!(doomed.is_canceled());
    gate.open();

    assert!(recorder.wait_terminal(2));
    assert_eq!(recorder.terminal(doomed.id()), Some(Event::Canceled(doomed.id())));
    assert_eq!(recorder.started_order(), vec![blocker.id()]);
    assert!(doomed.is_finished());
    io.release();
}

#[test]
fn test_canceled_request_pruned_on_next_submit() {
    let io = AsyncIo::new();
    let (reader, gate) = gated_reader(&io);
    let recorder = Recorder::new();

    reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(gate.wait_entered(1));

    let doomed = reader.async_read_tile(0, 1, 0, recorder.clone());
    doomed.cancel();
    reader.async_read_tile(0, 2, 0, recorder.clone());

    // pruned while the blocker is still in flight
    assert!(recorder.wait_terminal(1));
    assert_eq!(recorder.terminal(doomed.id()), Some(Event::Canceled(doomed.id())));
    assert_eq!(io.queued(reader.id()), 1);

    gate.open();
    assert!(recorder.wait_terminal(3));
    io.release();
}

#[test]
fn test_cancel_in_flight_invokes_abort_hook() {
    let io = AsyncIo::new();
    let (reader, gate) = gated_reader(&io);
    let recorder = Recorder::new();

    let request = reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(gate.wait_entered(1));
    assert!(request.is_servicing());

    request.cancel();
    assert!(recorder.wait_terminal(1));
    assert_eq!(recorder.terminal(request.id()), Some(Event::Canceled(request.id())));
    assert!(!recorder.events().contains(&Event::Update(request.id())));
    io.release();
}

#[test]
fn test_cancel_racing_dispatch_always_terminates() {
    let io = AsyncIo::new();
    // the gate never opens: a decode that misses its abort blocks forever
    let (reader, _gate) = gated_reader(&io);
    let recorder = Recorder::new();

    for round in 0..100 {
        let request = reader.async_read_tile(0, round % 4, 0, recorder.clone());
        request.cancel();
        assert!(recorder.wait_terminal(round as usize + 1));
        assert_eq!(
            recorder.terminal(request.id()),
            Some(Event::Canceled(request.id()))
        );
    }
    io.release();
}

#[test]
fn test_abort_requests_cancels_queue() {
    let io = AsyncIo::new();
    let (reader, gate) = gated_reader(&io);
    let recorder = Recorder::new();

    reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(gate.wait_entered(1));
    for column in 1..4 {
        reader.async_read_tile(0, column, 0, recorder.clone());
    }
    assert_eq!(reader.pending_requests(), 4);

    reader.abort_requests();
    assert!(recorder.wait_terminal(4));
    let canceled = recorder
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Canceled(_)))
        .count();
    assert_eq!(canceled, 4);
    assert_eq!(reader.pending_requests(), 0);
    assert_eq!(io.queued(reader.id()), 0);
    io.release();
}

// =============================================================================
// Actions and Lifecycle
// =============================================================================

#[test]
fn test_action_runs_after_queued_reads() {
    let io = AsyncIo::new();
    let (reader, gate) = gated_reader(&io);
    let recorder = Recorder::new();

    reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(gate.wait_entered(1));

    let (tx, rx) = mpsc::channel();
    let observer = Arc::clone(&recorder);
    reader.async_read_tile(0, 1, 0, recorder.clone());
    reader.async_run(move || {
        tx.send(observer.terminal_count()).unwrap();
    });
    reader.async_read_tile(0, 2, 0, recorder.clone());
    gate.open();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 3);
    io.release();
}

#[test]
fn test_actions_run_in_submission_order() {
    let io = AsyncIo::new();
    let (tx, rx) = mpsc::channel();
    for i in 0..5 {
        let tx = tx.clone();
        io.run_later(7, move || tx.send(i).unwrap());
    }

    let order: Vec<i32> = (0..5).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    io.release();
}

#[test]
fn test_panicking_action_keeps_worker_alive() {
    let io = AsyncIo::new();
    let (tx, rx) = mpsc::channel();

    io.run_later(1, || panic!("housekeeping failed"));
    io.run_later(1, move || tx.send(()).unwrap());

    assert!(rx.recv_timeout(WAIT).is_ok());
    assert!(io.is_running());
    io.release();
}

#[test]
fn test_idle_worker_exits_and_restarts() {
    let io = AsyncIo::with_idle_timeout(Duration::from_millis(50));
    let (tx, rx) = mpsc::channel();

    let first = tx.clone();
    io.run_later(1, move || first.send(1).unwrap());
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 1);
    assert!(wait_until(|| !io.is_running()));

    io.run_later(1, move || tx.send(2).unwrap());
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 2);
    io.release();
}

#[test]
fn test_release_cancels_everything_and_stays_usable() {
    let io = AsyncIo::new();
    let (reader, gate) = gated_reader(&io);
    let recorder = Recorder::new();

    let in_flight = reader.async_read_tile(0, 0, 0, recorder.clone());
    assert!(gate.wait_entered(1));
    let queued = reader.async_read_tile(0, 1, 0, recorder.clone());

    io.release();
    assert!(recorder.wait_terminal(1));
    assert_eq!(recorder.terminal(queued.id()), Some(Event::Canceled(queued.id())));

    gate.open();
    assert!(recorder.wait_terminal(2));
    assert!(recorder.terminal(in_flight.id()).is_some());
    assert!(wait_until(|| !io.is_running()));

    let (tx, rx) = mpsc::channel();
    io.run_later(1, move || tx.send(()).unwrap());
    assert!(rx.recv_timeout(WAIT).is_ok());
    io.release();
}

/// Reports the worker's fill buffer size from an action queued on completion.
struct BufferReporter {
    io: AsyncIo,
    sizes: Mutex<mpsc::Sender<usize>>,
}

impl ReadRequestListener for BufferReporter {
    fn request_completed(&self, _id: u32) {
        let io = self.io.clone();
        let tx = self.sizes.lock().clone();
        self.io.run_later(0, move || {
            let _ = tx.send(io.scratch_bytes());
        });
    }
}

#[test]
fn test_fill_buffer_freed_when_worker_idles() {
    let io = AsyncIo::new();
    let reader = TileReader::builder(MockDecoder::new(512, 512, 256).boxed())
        .io(io.clone())
        .build()
        .unwrap();
    assert_eq!(io.scratch_bytes(), 0);

    let (tx, rx) = mpsc::channel();
    reader.async_read_tile(
        0,
        0,
        0,
        Arc::new(BufferReporter {
            io: io.clone(),
            sizes: Mutex::new(tx),
        }),
    );

    // still held while work is queued
    assert!(rx.recv_timeout(WAIT).unwrap() >= 256 * 256);
    // released once the queue drains, even without an idle timeout
    assert!(wait_until(|| io.scratch_bytes() == 0));
    assert!(io.is_running());
    io.release();
}

#[test]
fn test_shared_scheduler_is_one_instance() {
    assert!(AsyncIo::shared().same_as(&AsyncIo::shared()));
    assert!(!AsyncIo::new().same_as(&AsyncIo::new()));
}
