//! Scheduled resumptions.
//!
//! An [`Event`] says "resume process `target` at `due`". Events carry a
//! sequence number assigned at insertion so that two events due at the same
//! tick always pop in the order they were scheduled.

use std::cmp::Ordering;

use super::process::ProcessId;
use super::time::VirtualTime;

/// One entry in the scheduler's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// When the target should resume.
    pub due: VirtualTime,
    /// Insertion order, used as the tie-break for equal `due` times.
    pub seq: u64,
    /// The process to resume.
    pub target: ProcessId,
}

impl Event {
    #[must_use]
    pub const fn new(due: VirtualTime, seq: u64, target: ProcessId) -> Self {
        Self { due, seq, target }
    }
}

// `BinaryHeap` is a max-heap; reverse the ordering so the earliest
// `(due, seq)` pair sits on top.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
