//! Shared work cursor.

use std::sync::atomic::{AtomicUsize, Ordering};

/// A slice of work items claimed one at a time by concurrent lanes.
///
/// Each index is handed out by a single `fetch_add`, so every item is claimed
/// exactly once no matter how lanes interleave.
#[derive(Debug)]
pub struct WorkQueue<'a, T> {
    items: &'a [T],
    cursor: AtomicUsize,
}

impl<'a, T> WorkQueue<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next unclaimed item, or `None` once the queue is exhausted.
    pub fn claim(&self) -> Option<&'a T> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items not yet claimed.
    pub fn remaining(&self) -> usize {
        self.items
            .len()
            .saturating_sub(self.cursor.load(Ordering::Relaxed))
    }
}
