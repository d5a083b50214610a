//! Pending synthetic items. Producers append, only the scheduler pops.

use parking_lot::Mutex;
use std::collections::VecDeque;

use super::SimItem;

/// Strict FIFO of simulated items
#[derive(Debug, Default)]
pub struct SimulationQueue {
    items: Mutex<VecDeque<SimItem>>,
}

impl SimulationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a generated sequence, preserving its order. Returns the new length.
    pub fn extend(&self, items: Vec<SimItem>) -> usize {
        let mut queue = self.items.lock();
        queue.extend(items);
        queue.len()
    }

    pub(crate) fn pop(&self) -> Option<SimItem> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
