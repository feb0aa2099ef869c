//! The virtual clock and its ordered event queue.

use std::collections::BinaryHeap;

use super::event::Event;
use super::process::ProcessId;
use super::time::VirtualTime;

/// Virtual clock plus a min-heap of pending resumptions.
///
/// # Invariants
///
/// - `now` never decreases.
/// - Every queued event has `due >= now`.
/// - Sequence numbers are strictly increasing, so events due at the same
///   tick pop in insertion order.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: VirtualTime,
    queue: BinaryHeap<Event>,
    next_seq: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current virtual time.
    #[must_use]
    pub const fn now(&self) -> VirtualTime {
        self.now
    }

    /// Enqueue a resumption of `target` at `now + delay`.
    ///
    /// Returns the sequence number of the new event. Callers keep it to tell
    /// a live event apart from one that has since been superseded.
    pub fn schedule_after(&mut self, delay: u64, target: ProcessId) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue
            .push(Event::new(self.now.after(delay), seq, target));
        seq
    }

    /// Pop the earliest event and advance `now` to its due time.
    ///
    /// With a deadline, an event due after it stays queued and `None` is
    /// returned; events due exactly at the deadline are still popped.
    pub fn pop_due(&mut self, deadline: Option<VirtualTime>) -> Option<Event> {
        let next = self.queue.peek()?;
        if deadline.is_some_and(|limit| next.due > limit) {
            return None;
        }
        let event = self.queue.pop()?;
        debug_assert!(event.due >= self.now, "event scheduled in the past");
        self.now = event.due;
        Some(event)
    }

    /// Move the clock forward to `to` without dispatching anything.
    ///
    /// Used when a bounded run stops at its deadline. Never moves the clock
    /// past the next queued event, and never backwards.
    pub fn advance_to(&mut self, to: VirtualTime) {
        let limit = self.queue.peek().map_or(to, |next| next.due.min(to));
        if limit > self.now {
            self.now = limit;
        }
    }

    /// The earliest queued event, without touching the clock.
    #[must_use]
    pub fn peek(&self) -> Option<&Event> {
        self.queue.peek()
    }

    /// Drop the earliest queued event without advancing the clock.
    ///
    /// Used for superseded events, which must not move time forward.
    pub fn discard_next(&mut self) -> Option<Event> {
        self.queue.pop()
    }

    /// Due time of the earliest queued event.
    #[must_use]
    pub fn next_due(&self) -> Option<VirtualTime> {
        self.queue.peek().map(|e| e.due)
    }

    /// Number of queued events, including superseded ones not yet popped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
