//! Virtual time for the simulation kernel.
//!
//! Time is a plain tick counter. It only moves when the scheduler pops an
//! event, never by observing the wall clock, which keeps every run
//! reproducible.

use std::fmt;

use serde::Serialize;

/// A point on the simulation timeline, measured in ticks.
///
/// # Invariants
///
/// - The kernel's current time never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The start of every simulation.
    pub const ZERO: Self = Self(0);

    /// Create a time from a raw tick value.
    #[must_use]
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Get the raw tick value.
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// The time `delay` ticks after `self`.
    ///
    /// Saturates at `u64::MAX` rather than wrapping.
    #[must_use]
    pub const fn after(self, delay: u64) -> Self {
        Self(self.0.saturating_add(delay))
    }

    /// Ticks elapsed between `earlier` and `self`, or zero if `earlier` is later.
    #[must_use]
    pub const fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

impl From<u64> for VirtualTime {
    fn from(ticks: u64) -> Self {
        Self(ticks)
    }
}
