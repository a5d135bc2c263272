//! PortAllocator: hands out RPC ports from a bounded cyclic range, tracking
//! which ports are currently held so a long-lived Controller's port is never
//! handed to a second, concurrently-live one as the cursor wraps around.
//! Single-consumer: only the Pool's supervisor task calls it.

use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct PortAllocator {
    lo: u16,
    hi: u16,
    cursor: u16,
    in_use: HashSet<u16>,
}

impl PortAllocator {
    /// `range` is the half-open `[lo, hi)` interval ports are drawn from.
    pub fn new(range: std::ops::Range<u16>) -> Self {
        assert!(range.start < range.end, "rpc port range must be non-empty");
        Self {
            lo: range.start,
            hi: range.end,
            cursor: range.start,
            in_use: HashSet::new(),
        }
    }

    pub fn range_size(&self) -> u16 {
        self.hi - self.lo
    }

    /// Returns the next port in `[lo, hi)` not currently held by a live
    /// Controller, advancing the cursor past it. `None` only if every port
    /// in range is in use — the Pool sizes `max_concurrent` to the range
    /// size so this should not happen in practice.
    pub fn acquire(&mut self) -> Option<u16> {
        for _ in 0..self.range_size() {
            let port = self.cursor;
            self.cursor = if self.cursor + 1 >= self.hi { self.lo } else { self.cursor + 1 };
            if self.in_use.insert(port) {
                return Some(port);
            }
        }
        None
    }

    /// Returns `port` to the free pool. Called once a Controller holding it
    /// reaches CLOSED or FAILED.
    pub fn release(&mut self, port: u16) {
        self.in_use.remove(&port);
    }
}
