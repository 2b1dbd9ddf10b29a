//! Dedicated worker thread draining per-reader request queues.
//!
//! # Dispatch
//!
//! Every reader owns one queue inside the scheduler, keyed by its reader id.
//! Each dispatch cycle picks, among all queue heads, the task with the
//! smallest global sequence number, so a busy reader cannot starve another
//! reader whose request arrived earlier. Within a queue, the order is given
//! by the rules in [`queue`](super::queue).
//!
//! # Lifecycle
//!
//! ```text
//!   stopped ──run_later──▶ running ──idle timeout / release──▶ stopped
//! ```
//!
//! The thread is spawned lazily by the first task. With a positive idle
//! timeout it exits once the queues stay empty for that long and is
//! respawned by the next task; with a zero timeout it parks indefinitely.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use crate::error::ReadError;
use crate::reader::ReadRequest;

use super::queue::{QueuedTask, ReadPrioritizer, RequestQueue, Task};

/// Default name of scheduler worker threads.
pub const DEFAULT_THREAD_NAME: &str = "tilecore-io";

// =============================================================================
// Scheduler State
// =============================================================================

#[derive(Default)]
struct SchedulerState {
    queues: HashMap<u64, RequestQueue>,
    prioritizers: HashMap<u64, ReadPrioritizer>,
    /// A worker thread is alive (or about to be)
    started: bool,
    /// The worker should exit at its next check
    shutdown: bool,
}

impl SchedulerState {
    fn is_idle(&self) -> bool {
        self.queues.values().all(RequestQueue::is_empty)
    }

    /// Pop the head task whose sequence number is globally smallest.
    fn take_next(&mut self) -> Option<QueuedTask> {
        let (_, key) = self
            .queues
            .iter()
            .filter_map(|(key, queue)| queue.head_seq().map(|seq| (seq, *key)))
            .min()?;

        let queue = self.queues.get_mut(&key)?;
        let task = queue.pop();
        if queue.is_empty() {
            self.queues.remove(&key);
        }
        task
    }

    fn drain_all(&mut self) -> Vec<QueuedTask> {
        self.queues
            .drain()
            .flat_map(|(_, mut queue)| queue.drain())
            .collect()
    }
}

struct Inner {
    thread_name: String,
    max_idle: Duration,
    next_seq: AtomicU64,
    /// Capacity of the worker's fill buffer, refreshed after every task
    scratch_bytes: AtomicUsize,
    state: Mutex<SchedulerState>,
    wakeup: Condvar,
}

// =============================================================================
// AsyncIo
// =============================================================================

/// A single-threaded request scheduler shared by any number of readers.
///
/// All decoding submitted through one `AsyncIo` happens on its one worker
/// thread, which bounds decode concurrency and peak memory no matter how
/// many readers use it. Cloning yields another handle to the same scheduler.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use tilecore::io::AsyncIo;
///
/// let io = AsyncIo::with_idle_timeout(Duration::from_secs(30));
/// io.run_later(0, || println!("runs on the worker thread"));
/// ```
#[derive(Clone)]
pub struct AsyncIo {
    inner: Arc<Inner>,
}

impl AsyncIo {
    /// Create a scheduler whose thread parks indefinitely when idle.
    pub fn new() -> Self {
        Self::with_idle_timeout(Duration::ZERO)
    }

    /// Create a scheduler whose thread exits after `max_idle` without work.
    ///
    /// A zero duration disables idle shutdown.
    pub fn with_idle_timeout(max_idle: Duration) -> Self {
        Self::with_name(DEFAULT_THREAD_NAME, max_idle)
    }

    /// Create a scheduler with a custom worker thread name.
    pub fn with_name(thread_name: impl Into<String>, max_idle: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                thread_name: thread_name.into(),
                max_idle,
                next_seq: AtomicU64::new(0),
                scratch_bytes: AtomicUsize::new(0),
                state: Mutex::new(SchedulerState::default()),
                wakeup: Condvar::new(),
            }),
        }
    }

    /// The process-wide default scheduler.
    ///
    /// Created on first use. Readers only use it when it is passed to them
    /// explicitly.
    pub fn shared() -> AsyncIo {
        static SHARED: OnceLock<AsyncIo> = OnceLock::new();
        SHARED.get_or_init(AsyncIo::new).clone()
    }

    /// Idle timeout after which the worker thread exits.
    pub fn max_idle(&self) -> Duration {
        self.inner.max_idle
    }

    /// Whether a worker thread is currently alive.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().started
    }

    /// Number of tasks waiting in `reader_id`'s queue.
    pub fn queued(&self, reader_id: u64) -> usize {
        self.inner
            .state
            .lock()
            .queues
            .get(&reader_id)
            .map_or(0, RequestQueue::len)
    }

    /// Bytes held by the worker's fill buffer.
    ///
    /// The buffer grows to the largest direct fill and is freed whenever
    /// the worker runs out of work.
    pub fn scratch_bytes(&self) -> usize {
        self.inner.scratch_bytes.load(Ordering::Relaxed)
    }

    /// Whether two handles refer to the same scheduler.
    pub fn same_as(&self, other: &AsyncIo) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Schedule a housekeeping action in `reader_id`'s queue.
    ///
    /// Actions run after the queue's live read requests, in submission order
    /// among themselves. Starts the worker thread if needed.
    pub fn run_later<F>(&self, reader_id: u64, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(reader_id, Task::Action(Box::new(action)));
    }

    /// Queue a read request for its reader.
    pub(crate) fn submit(&self, reader_id: u64, request: Arc<ReadRequest>) {
        self.enqueue(reader_id, Task::Read(request));
    }

    /// Install or clear the external comparator for `reader_id`'s reads.
    pub fn set_read_prioritizer(&self, reader_id: u64, prioritizer: Option<ReadPrioritizer>) {
        let mut state = self.inner.state.lock();
        match &prioritizer {
            Some(p) => {
                state.prioritizers.insert(reader_id, Arc::clone(p));
            }
            None => {
                state.prioritizers.remove(&reader_id);
            }
        }
        if let Some(queue) = state.queues.get_mut(&reader_id) {
            queue.set_prioritizer(prioritizer);
        }
    }

    /// Cancel and remove every queued task of `reader_id`.
    ///
    /// Queued reads receive `request_canceled`; queued actions are dropped
    /// without running. A request that is already executing is not touched
    /// here; cancel it through the request itself.
    pub fn abort_requests(&self, reader_id: u64) {
        let tasks = {
            let mut state = self.inner.state.lock();
            state.prioritizers.remove(&reader_id);
            state
                .queues
                .remove(&reader_id)
                .map(|mut queue| queue.drain())
                .unwrap_or_default()
        };

        if !tasks.is_empty() {
            debug!(reader_id, count = tasks.len(), "Aborting queued tasks");
        }
        cancel_tasks(tasks);
    }

    /// Abort every outstanding task and stop the worker thread.
    ///
    /// The scheduler stays usable: the next task spawns a new thread.
    pub fn release(&self) {
        let tasks = {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
            state.drain_all()
        };
        self.inner.wakeup.notify_all();

        debug!(
            thread = %self.inner.thread_name,
            aborted = tasks.len(),
            "Releasing scheduler"
        );
        cancel_tasks(tasks);
    }

    fn enqueue(&self, reader_id: u64, task: Task) {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);

        let (pruned, spawn) = {
            let mut state = self.inner.state.lock();
            let prioritizer = state.prioritizers.get(&reader_id).cloned();
            let queue = state.queues.entry(reader_id).or_insert_with(|| {
                let mut queue = RequestQueue::default();
                queue.set_prioritizer(prioritizer);
                queue
            });

            let pruned = queue.push(QueuedTask::new(seq, task));
            if queue.is_empty() {
                state.queues.remove(&reader_id);
            }

            state.shutdown = false;
            let spawn = !state.started;
            state.started = true;
            (pruned, spawn)
        };

        if spawn {
            self.spawn_worker();
        } else {
            self.inner.wakeup.notify_one();
        }

        for request in pruned {
            request.finish(Err(ReadError::Canceled));
        }
    }

    fn spawn_worker(&self) {
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(self.inner.thread_name.clone())
            .spawn(move || worker_loop(inner));

        if let Err(e) = spawned {
            error!(thread = %self.inner.thread_name, error = %e, "Failed to spawn scheduler thread");
            self.inner.state.lock().started = false;
        }
    }
}

impl Default for AsyncIo {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AsyncIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncIo")
            .field("thread_name", &self.inner.thread_name)
            .field("max_idle", &self.inner.max_idle)
            .finish()
    }
}

// =============================================================================
// Worker
// =============================================================================

fn worker_loop(inner: Arc<Inner>) {
    debug!(thread = %inner.thread_name, "Scheduler thread started");

    // sized to the largest direct fill since the worker last went idle
    let mut scratch: Vec<u8> = Vec::new();

    loop {
        let task = {
            let mut state = inner.state.lock();
            loop {
                if state.shutdown {
                    state.shutdown = false;
                    state.started = false;
                    inner.scratch_bytes.store(0, Ordering::Relaxed);
                    debug!(thread = %inner.thread_name, "Scheduler thread released");
                    return;
                }
                if let Some(task) = state.take_next() {
                    break task;
                }
                if scratch.capacity() > 0 {
                    scratch = Vec::new();
                    inner.scratch_bytes.store(0, Ordering::Relaxed);
                }
                if inner.max_idle.is_zero() {
                    inner.wakeup.wait(&mut state);
                } else if inner.wakeup.wait_for(&mut state, inner.max_idle).timed_out()
                    && state.is_idle()
                    && !state.shutdown
                {
                    state.started = false;
                    debug!(thread = %inner.thread_name, "Scheduler thread idle, exiting");
                    return;
                }
            }
        };

        trace!(?task, "Running task");
        run_task(task, &mut scratch);
        inner.scratch_bytes.store(scratch.capacity(), Ordering::Relaxed);
    }
}

fn run_task(task: QueuedTask, scratch: &mut Vec<u8>) {
    match task.task {
        Task::Action(action) => {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(action)) {
                error!(panic = %panic_message(panic.as_ref()), "Scheduled action panicked");
            }
        }
        Task::Read(request) => {
            let serviced = catch_unwind(AssertUnwindSafe(|| {
                if !request.start() {
                    return Err(ReadError::Canceled);
                }
                request.service(scratch)
            }));

            let result = serviced.unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!(request = request.id(), panic = %message, "Read request panicked");
                Err(ReadError::Decode(format!("read panicked: {message}")))
            });

            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| request.finish(result))) {
                error!(
                    request = request.id(),
                    panic = %panic_message(panic.as_ref()),
                    "Read listener panicked"
                );
            }
        }
    }
}

/// Deliver `request_canceled` to every read among `tasks`.
fn cancel_tasks(tasks: Vec<QueuedTask>) {
    for task in tasks {
        if let Task::Read(request) = task.task {
            request.cancel();
            request.finish(Err(ReadError::Canceled));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
