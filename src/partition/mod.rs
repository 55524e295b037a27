//! Index range partitioning
//!
//! Divides the logical index range `[0, V-1]` of the vector across the workers of
//! a group. Every worker computes its own range independently from the vector
//! size, the group size and its rank; no communication is involved.
//!
//! # Remainder policy
//!
//! Each worker gets `floor(V / n)` contiguous indices. When `V` is not a multiple
//! of `n`, the leftover `V mod n` indices are all appended to the last worker.
//! This is not load-balanced: the last worker may do up to `n - 1` more
//! multiplications than the others.
//!
//! # Example
//!
//! ```
//! use geomean::partition::partition;
//!
//! // 5 elements over 2 workers: worker 1 absorbs the remainder
//! assert_eq!(partition(5, 2, 0).bounds(), Some((0, 1)));
//! assert_eq!(partition(5, 2, 1).bounds(), Some((2, 4)));
//! ```

use crate::group::Rank;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Contiguous index range owned by one worker
///
/// Stored half-open so that empty ranges (only possible when the vector is
/// smaller than the group) need no sentinel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Rank that owns this range
    pub rank: Rank,
    /// First owned index
    pub start: u64,
    /// One past the last owned index
    pub end: u64,
}

impl Partition {
    /// Number of indices in this partition
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// First owned index, if any
    pub fn lo(&self) -> Option<u64> {
        (!self.is_empty()).then_some(self.start)
    }

    /// Last owned index, if any
    pub fn hi(&self) -> Option<u64> {
        (!self.is_empty()).then(|| self.end - 1)
    }

    /// Closed bounds `(lo, hi)`, or `None` for an empty partition
    pub fn bounds(&self) -> Option<(u64, u64)> {
        self.lo().zip(self.hi())
    }

    /// Owned indices in increasing order
    pub fn indices(&self) -> Range<u64> {
        self.start..self.end
    }

    pub fn contains(&self, index: u64) -> bool {
        self.indices().contains(&index)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds() {
            Some((lo, hi)) => write!(f, "[{},{}]", lo, hi),
            None => write!(f, "[]"),
        }
    }
}

/// Compute the partition of worker `rank` in a group of `workers`
///
/// # Panics
///
/// Panics if `workers` is zero or `rank >= workers`. Both are programmer
/// errors: ranks always come from the group itself.
pub fn partition(size: u64, workers: usize, rank: Rank) -> Partition {
    assert!(workers > 0, "group must have at least one worker");
    assert!(rank < workers, "rank {} out of range for {} workers", rank, workers);

    let n = workers as u64;
    let i = rank as u64;
    let factor = size / n;

    let start = factor * i;
    let mut end = start + factor;
    if rank + 1 == workers {
        end += size % n;
    }

    Partition { rank, start, end }
}

/// Partitions of every rank, in rank order
pub fn partition_all(size: u64, workers: usize) -> Vec<Partition> {
    (0..workers).map(|rank| partition(size, workers, rank)).collect()
}
