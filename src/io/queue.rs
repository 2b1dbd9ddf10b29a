//! Per-reader task queues and their priority rules.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::reader::ReadRequest;

/// Application-specific ordering of two live read requests of one reader.
///
/// Return [`Ordering::Greater`] when `a` should be serviced before `b`, and
/// [`Ordering::Equal`] to fall back to the built-in level and recency rules.
pub type ReadPrioritizer = Arc<dyn Fn(&ReadRequest, &ReadRequest) -> Ordering + Send + Sync>;

/// Work scheduled on an [`AsyncIo`](super::AsyncIo) worker.
pub(crate) enum Task {
    /// Decode a read request through its reader
    Read(Arc<ReadRequest>),
    /// Housekeeping action
    Action(Box<dyn FnOnce() + Send + 'static>),
}

pub(crate) struct QueuedTask {
    /// Global sequence number, shared by every queue of one scheduler
    pub(crate) seq: u64,
    pub(crate) task: Task,
    /// Cancellation snapshot taken before each sort
    canceled: bool,
}

impl QueuedTask {
    pub(crate) fn new(seq: u64, task: Task) -> Self {
        Self {
            seq,
            task,
            canceled: false,
        }
    }

    fn canceled_read(&self) -> bool {
        matches!(&self.task, Task::Read(request) if request.is_canceled())
    }
}

impl fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.task {
            Task::Read(request) => write!(f, "#{} read {}", self.seq, request.id()),
            Task::Action(_) => write!(f, "#{} action", self.seq),
        }
    }
}

/// Compare two tasks; [`Ordering::Greater`] means `a` runs first.
fn priority(a: &QueuedTask, b: &QueuedTask, prioritizer: Option<&ReadPrioritizer>) -> Ordering {
    match (&a.task, &b.task) {
        (Task::Read(ra), Task::Read(rb)) => {
            match (a.canceled, b.canceled) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => {}
            }
            if let Some(prioritizer) = prioritizer {
                let order = prioritizer(ra, rb);
                if order != Ordering::Equal {
                    return order;
                }
            }
            // arbitrary region reads rank above every tile level
            let level_a = ra.level().map_or(-1, i64::from);
            let level_b = rb.level().map_or(-1, i64::from);
            level_b
                .cmp(&level_a)
                .then_with(|| ra.id().cmp(&rb.id()))
                .then_with(|| a.seq.cmp(&b.seq))
        }
        (Task::Read(_), Task::Action(_)) => {
            if a.canceled {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (Task::Action(_), Task::Read(_)) => {
            if b.canceled {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (Task::Action(_), Task::Action(_)) => b.seq.cmp(&a.seq),
    }
}

/// Tasks of one reader, kept sorted so the next task to run is last.
#[derive(Default)]
pub(crate) struct RequestQueue {
    tasks: Vec<QueuedTask>,
    prioritizer: Option<ReadPrioritizer>,
}

impl RequestQueue {
    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn set_prioritizer(&mut self, prioritizer: Option<ReadPrioritizer>) {
        self.prioritizer = prioritizer;
        self.sort();
    }

    /// Insert a task, re-sort, and prune canceled reads.
    ///
    /// Pruned requests are returned so the caller can deliver their
    /// terminal callbacks outside the scheduler lock.
    pub(crate) fn push(&mut self, task: QueuedTask) -> Vec<Arc<ReadRequest>> {
        self.tasks.push(task);
        self.sort();
        self.prune()
    }

    /// Sequence number of the next task to run.
    pub(crate) fn head_seq(&self) -> Option<u64> {
        self.tasks.last().map(|t| t.seq)
    }

    pub(crate) fn pop(&mut self) -> Option<QueuedTask> {
        self.tasks.pop()
    }

    /// Remove every task.
    pub(crate) fn drain(&mut self) -> Vec<QueuedTask> {
        std::mem::take(&mut self.tasks)
    }

    fn sort(&mut self) {
        // flags can flip on other threads; the comparator must see a fixed view
        for task in &mut self.tasks {
            task.canceled = task.canceled_read();
        }
        let prioritizer = self.prioritizer.as_ref();
        self.tasks.sort_by(|a, b| priority(a, b, prioritizer));
    }

    fn prune(&mut self) -> Vec<Arc<ReadRequest>> {
        let keep_from = self
            .tasks
            .iter()
            .position(|t| !t.canceled)
            .unwrap_or(self.tasks.len());

        self.tasks
            .drain(..keep_from)
            .filter_map(|t| match t.task {
                Task::Read(request) => Some(request),
                Task::Action(_) => None,
            })
            .collect()
    }
}
