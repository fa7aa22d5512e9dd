//! Round-robin selection of cluster hosts and PoET endpoints.

use parking_lot::Mutex;

use crate::deploy::{NodeSelector, PlacementHint};

/// Thread-safe round-robin cursor over a fixed set of items.
///
/// The cursor itself is never exposed; `next` advances it atomically.
#[derive(Debug)]
pub struct RoundRobin<T> {
    items: Vec<T>,
    cursor: Mutex<usize>,
}

impl<T: Clone> RoundRobin<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: Mutex::new(0),
        }
    }

    /// Next item in rotation, `None` when there is nothing to rotate over
    pub fn next(&self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let mut cursor = self.cursor.lock();
        let item = self.items[*cursor % self.items.len()].clone();
        *cursor = (*cursor + 1) % self.items.len();
        Some(item)
    }
}

impl NodeSelector for RoundRobin<PlacementHint> {
    fn next(&self) -> Option<PlacementHint> {
        RoundRobin::next(self)
    }
}

/// Assignment of PoET endpoints to miners.
///
/// Miner `k` is served by PoET `((k - 1) mod P) + 1`, the same rotation a
/// cursor would produce when miners are dispatched in ordinal order, but
/// computed from the ordinal alone so it needs no shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoetAssignment {
    endpoints: Vec<String>,
}

impl PoetAssignment {
    /// `endpoints` must be ordered by PoET ordinal
    pub fn new(endpoints: Vec<String>) -> Self {
        Self { endpoints }
    }

    pub fn endpoint_for(&self, miner_ordinal: u32) -> Option<&str> {
        if self.endpoints.is_empty() {
            return None;
        }
        let index = (miner_ordinal.saturating_sub(1) as usize) % self.endpoints.len();
        Some(self.endpoints[index].as_str())
    }
}
