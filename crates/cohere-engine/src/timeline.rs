//! Logical time for edge insertions.
//!
//! Every edge insertion gets a fresh [`Stamp`]. Backtracking to a watermark
//! invalidates every stamp issued after it; nothing is removed from the
//! edge stores, liveness is decided by looking the stamp up here. Stamps
//! are never reused, so an edge re-derived after backtracking always gets a
//! stamp larger than anything it was derived from.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Stamp(u64);

impl Stamp {
    /// Issued before anything else; always live.
    pub const ZERO: Stamp = Stamp(0);

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Timeline {
    last: u64,
    /// Sorted, disjoint, inclusive ranges of dead stamps.
    invalid: Vec<(u64, u64)>,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            last: 0,
            invalid: Vec::new(),
        }
    }

    pub fn tick(&mut self) -> Stamp {
        self.last += 1;
        Stamp(self.last)
    }

    /// The most recently issued stamp.
    pub fn watermark(&self) -> Stamp {
        Stamp(self.last)
    }

    /// Kills every stamp issued after `watermark`.
    pub fn backtrack_to(&mut self, watermark: Stamp) {
        let lo = watermark.0 + 1;
        let hi = self.last;
        if lo > hi {
            return;
        }
        while self.invalid.last().is_some_and(|&(start, _)| start >= lo) {
            self.invalid.pop();
        }
        match self.invalid.last_mut() {
            Some((_, end)) if *end + 1 >= lo => *end = hi,
            _ => self.invalid.push((lo, hi)),
        }
    }

    pub fn is_live(&self, stamp: Stamp) -> bool {
        if stamp.0 > self.last {
            return false;
        }
        let idx = self.invalid.partition_point(|&(start, _)| start <= stamp.0);
        idx == 0 || self.invalid[idx - 1].1 < stamp.0
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}
