//! Process identity and lifecycle bookkeeping.
//!
//! The body of a process is a future owned by the [`Simulation`]; the kernel
//! only keeps a [`ProcessRecord`] describing where that future is parked and
//! what it will observe when it resumes.
//!
//! [`Simulation`]: super::Simulation

use std::fmt;

/// Identifies a process for the lifetime of a simulation.
///
/// IDs are handed out in spawn order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(u64);

impl ProcessId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P#{}", self.0)
    }
}

/// What a suspended process is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// A timer armed with [`Context::timeout`](super::Context::timeout).
    Timeout,
    /// A place in a [`Resource`](super::Resource) wait queue.
    ResourceWait,
    /// A place in a channel's pending-put queue.
    ChannelPut,
    /// A place in a channel's pending-get queue.
    ChannelGet,
    /// A future that is not a kernel primitive returned `Pending`. Nothing in
    /// the kernel will ever resume it.
    Foreign,
}

impl fmt::Display for SuspendReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::ResourceWait => "resource wait",
            Self::ChannelPut => "channel put",
            Self::ChannelGet => "channel get",
            Self::Foreign => "foreign future",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a live process.
///
/// Terminated processes are dropped from the process table, so
/// `Terminated` is what lookups report for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// An event is queued to resume it.
    Runnable,
    /// It is the one process currently executing.
    Running,
    /// Parked at a suspension point.
    Suspended(SuspendReason),
    /// Pulled out of a suspension point by an interrupt; resumes at the
    /// current tick and observes [`SimError::Interrupted`](super::SimError::Interrupted).
    Interrupted,
    /// Finished, normally or not.
    Terminated,
}

/// What a resumed process finds when it re-enters its suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wakeup {
    /// Its timer ran out.
    Elapsed,
    /// A resource grant was handed to it.
    Granted,
    /// Its pending value was moved into the channel.
    Deposited,
    /// A channel value was handed to it.
    Delivered,
    /// It was interrupted instead.
    Interrupted,
}

/// The kernel's view of one live process.
#[derive(Debug)]
pub(crate) struct ProcessRecord {
    pub name: String,
    pub state: ProcessState,
    /// Daemons are service loops that are expected to sit blocked forever
    /// once the work dries up; they never count toward deadlock.
    pub daemon: bool,
    /// Sequence number of the one event allowed to resume this process.
    /// Any other queued event targeting it is stale and gets skipped.
    pub armed_event: Option<u64>,
    pub wakeup: Option<Wakeup>,
    /// Set when an interrupt arrives while the process is not parked; the
    /// next suspension point consumes it.
    pub interrupt_pending: bool,
}

impl ProcessRecord {
    pub(crate) const fn new(name: String, daemon: bool) -> Self {
        Self {
            name,
            state: ProcessState::Runnable,
            daemon,
            armed_event: None,
            wakeup: None,
            interrupt_pending: false,
        }
    }
}

/// A non-daemon process found parked when the event queue ran dry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedProcess {
    pub pid: ProcessId,
    pub name: String,
    pub reason: SuspendReason,
}

impl fmt::Display for BlockedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({})", self.pid, self.name, self.reason)
    }
}
