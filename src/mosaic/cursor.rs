//! Forward-only cursor over catalog query results.

use std::iter::Peekable;
use std::vec::IntoIter;

use tracing::trace;

use super::frame::Frame;
use super::query::Order;

/// Merges several individually ordered frame streams into one.
///
/// Each source is already sorted by `order`; every step yields the smallest
/// head across all sources. The cursor is closed when dropped.
pub struct MosaicCursor {
    sources: Vec<Peekable<IntoIter<Frame>>>,
    order: Order,
    closed: bool,
}

impl MosaicCursor {
    pub(crate) fn new(sources: Vec<Vec<Frame>>, order: Order) -> Self {
        Self {
            sources: sources
                .into_iter()
                .map(|s| s.into_iter().peekable())
                .collect(),
            order,
            closed: false,
        }
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the underlying result sets. Further calls to `next` yield
    /// nothing.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.sources.clear();
            trace!("Mosaic cursor closed");
        }
    }
}

impl Iterator for MosaicCursor {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.closed {
            return None;
        }

        let order = self.order;
        let mut best: Option<(usize, &Frame)> = None;
        for (i, source) in self.sources.iter_mut().enumerate() {
            let Some(candidate) = source.peek() else {
                continue;
            };
            if best.map_or(true, |(_, current)| order.compare(candidate, current).is_lt()) {
                best = Some((i, candidate));
            }
        }

        let index = best.map(|(i, _)| i)?;
        self.sources[index].next()
    }
}

impl Drop for MosaicCursor {
    fn drop(&mut self) {
        self.close();
    }
}
