//! Asynchronous read scheduling.
//!
//! This module provides [`AsyncIo`], the single-threaded scheduler that
//! services read requests for any number of readers:
//!
//! - One dedicated worker thread per scheduler instance
//! - One priority queue per reader, see [`ReadPrioritizer`] for overrides
//! - Oldest-head-first dispatch across queues to avoid starvation
//! - Cooperative cancellation and panic isolation
//! - Lazy start and optional idle shutdown

mod queue;
mod scheduler;

pub use queue::ReadPrioritizer;
pub use scheduler::{AsyncIo, DEFAULT_THREAD_NAME};
