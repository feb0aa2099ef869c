//! Shared handle to the kernel state.
//!
//! Every component that needs the clock, needs to spawn processes, or needs
//! to park the current process holds a cheap clone of [`Context`]. The
//! handle wraps the kernel in `Rc<RefCell<..>>`; borrows are always scoped
//! to a single method so that process bodies never observe an outstanding
//! borrow while they run.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll};

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use super::error::SimError;
use super::process::{
    BlockedProcess, ProcessId, ProcessRecord, ProcessState, SuspendReason, Wakeup,
};
use super::scheduler::Scheduler;
use super::time::VirtualTime;

/// The future that makes up a process.
pub(crate) type ProcessBody = LocalBoxFuture<'static, Result<(), SimError>>;

/// Kernel state shared by every [`Context`] clone.
pub(crate) struct Kernel {
    pub scheduler: Scheduler,
    pub processes: BTreeMap<ProcessId, ProcessRecord>,
    /// The process being polled right now, if any.
    pub current: Option<ProcessId>,
    /// Bodies spawned since the run loop last collected them.
    pub spawned: Vec<(ProcessId, ProcessBody)>,
    next_pid: u64,
}

impl Kernel {
    fn new() -> Self {
        Self {
            scheduler: Scheduler::new(),
            processes: BTreeMap::new(),
            current: None,
            spawned: Vec::new(),
            next_pid: 0,
        }
    }
}

/// Cloneable handle onto the simulation kernel.
#[derive(Clone)]
pub struct Context {
    pub(crate) kernel: Rc<RefCell<Kernel>>,
}

impl Context {
    pub(crate) fn new() -> Self {
        Self {
            kernel: Rc::new(RefCell::new(Kernel::new())),
        }
    }

    /// The current virtual time.
    #[must_use]
    pub fn now(&self) -> VirtualTime {
        self.kernel.borrow().scheduler.now()
    }

    /// The process currently executing, or `None` when called from outside
    /// the run loop.
    #[must_use]
    pub fn current(&self) -> Option<ProcessId> {
        self.kernel.borrow().current
    }

    /// Start a new process. It first runs at the current tick, after every
    /// event already queued for this tick.
    pub fn spawn<F>(&self, name: impl Into<String>, body: F) -> ProcessId
    where
        F: Future<Output = Result<(), SimError>> + 'static,
    {
        self.spawn_inner(name.into(), false, body.boxed_local())
    }

    /// Start a service loop that may stay parked forever once its input
    /// dries up. Daemons are excluded from deadlock detection.
    pub fn spawn_daemon<F>(&self, name: impl Into<String>, body: F) -> ProcessId
    where
        F: Future<Output = Result<(), SimError>> + 'static,
    {
        self.spawn_inner(name.into(), true, body.boxed_local())
    }

    fn spawn_inner(&self, name: String, daemon: bool, body: ProcessBody) -> ProcessId {
        let mut kernel = self.kernel.borrow_mut();
        let pid = ProcessId::new(kernel.next_pid);
        kernel.next_pid += 1;

        let seq = kernel.scheduler.schedule_after(0, pid);
        let mut record = ProcessRecord::new(name, daemon);
        record.armed_event = Some(seq);

        tracing::debug!(%pid, name = %record.name, daemon, now = %kernel.scheduler.now(), "spawned process");
        kernel.processes.insert(pid, record);
        kernel.spawned.push((pid, body));
        pid
    }

    /// Suspend the current process for `delay` ticks.
    pub fn timeout(&self, delay: u64) -> Timeout {
        Timeout {
            ctx: self.clone(),
            delay,
            pid: None,
        }
    }

    /// Interrupt `pid`.
    ///
    /// A parked process is pulled out of its wait queue or timer and resumes
    /// at the current tick with [`SimError::Interrupted`]. A process that is
    /// runnable or running keeps going and observes the interrupt at its next
    /// suspension point or [`checkpoint`](Self::checkpoint).
    ///
    /// Returns `false` if the process no longer exists.
    pub fn interrupt(&self, pid: ProcessId) -> bool {
        let mut kernel = self.kernel.borrow_mut();
        let kernel = &mut *kernel;
        let Some(record) = kernel.processes.get_mut(&pid) else {
            return false;
        };

        match record.state {
            ProcessState::Suspended(reason) => {
                record.state = ProcessState::Interrupted;
                record.wakeup = Some(Wakeup::Interrupted);
                record.armed_event = Some(kernel.scheduler.schedule_after(0, pid));
                tracing::debug!(%pid, name = %record.name, %reason, now = %kernel.scheduler.now(), "interrupted parked process");
            }
            ProcessState::Runnable | ProcessState::Running => {
                record.interrupt_pending = true;
                tracing::debug!(%pid, name = %record.name, now = %kernel.scheduler.now(), "interrupt pending");
            }
            ProcessState::Interrupted | ProcessState::Terminated => {}
        }
        true
    }

    /// Consume a pending interrupt of the current process.
    ///
    /// Lets a process observe an interrupt that arrived after its last
    /// suspension point resolved, before it acts on that result.
    pub fn checkpoint(&self) -> Result<(), SimError> {
        let mut kernel = self.kernel.borrow_mut();
        let kernel = &mut *kernel;
        let pid = kernel.current.ok_or(SimError::OutsideProcess)?;
        match kernel.processes.get_mut(&pid) {
            Some(record) if record.interrupt_pending => {
                record.interrupt_pending = false;
                Err(SimError::Interrupted)
            }
            _ => Ok(()),
        }
    }

    /// Lifecycle state of `pid`. Unknown or finished processes report
    /// [`ProcessState::Terminated`].
    #[must_use]
    pub fn state(&self, pid: ProcessId) -> ProcessState {
        self.kernel
            .borrow()
            .processes
            .get(&pid)
            .map_or(ProcessState::Terminated, |record| record.state)
    }

    /// First live process registered under `name`.
    #[must_use]
    pub fn find_process(&self, name: &str) -> Option<ProcessId> {
        self.kernel
            .borrow()
            .processes
            .iter()
            .find(|(_, record)| record.name == name)
            .map(|(pid, _)| *pid)
    }

    /// Non-daemon processes parked at a suspension point.
    #[must_use]
    pub fn blocked_processes(&self) -> Vec<BlockedProcess> {
        self.kernel
            .borrow()
            .processes
            .iter()
            .filter(|(_, record)| !record.daemon)
            .filter_map(|(pid, record)| match record.state {
                ProcessState::Suspended(reason) => Some(BlockedProcess {
                    pid: *pid,
                    name: record.name.clone(),
                    reason,
                }),
                _ => None,
            })
            .collect()
    }

    /// Number of processes that have not terminated yet.
    #[must_use]
    pub fn live_processes(&self) -> usize {
        self.kernel.borrow().processes.len()
    }

    /// Identify the current process at the start of a suspension point.
    ///
    /// Consumes a pending interrupt, in which case the caller must not park.
    pub(crate) fn enter_suspension(&self) -> Result<ProcessId, SimError> {
        self.checkpoint()?;
        self.current().ok_or(SimError::OutsideProcess)
    }

    /// Mark `pid` as parked. The caller has already placed it in some wait
    /// queue that will later call [`wake`](Self::wake).
    pub(crate) fn park(&self, pid: ProcessId, reason: SuspendReason) {
        if let Some(record) = self.kernel.borrow_mut().processes.get_mut(&pid) {
            record.state = ProcessState::Suspended(reason);
            record.wakeup = None;
        }
    }

    fn arm_timer(&self, pid: ProcessId, delay: u64) {
        let mut kernel = self.kernel.borrow_mut();
        let kernel = &mut *kernel;
        if let Some(record) = kernel.processes.get_mut(&pid) {
            record.state = ProcessState::Suspended(SuspendReason::Timeout);
            record.wakeup = Some(Wakeup::Elapsed);
            record.armed_event = Some(kernel.scheduler.schedule_after(delay, pid));
        }
    }

    /// Make a parked process runnable at the current tick.
    ///
    /// Returns `false`, leaving everything untouched, if `pid` is not parked
    /// any more (it was interrupted or has terminated). Wait queues use this
    /// to skip stale entries.
    pub(crate) fn wake(&self, pid: ProcessId, wakeup: Wakeup) -> bool {
        let mut kernel = self.kernel.borrow_mut();
        let kernel = &mut *kernel;
        let Some(record) = kernel.processes.get_mut(&pid) else {
            return false;
        };
        if !matches!(record.state, ProcessState::Suspended(_)) {
            return false;
        }
        record.state = ProcessState::Runnable;
        record.wakeup = Some(wakeup);
        record.armed_event = Some(kernel.scheduler.schedule_after(0, pid));
        tracing::trace!(%pid, ?wakeup, now = %kernel.scheduler.now(), "woke process");
        true
    }

    /// What the resumed process `pid` should observe.
    pub(crate) fn take_wakeup(&self, pid: ProcessId) -> Option<Wakeup> {
        self.kernel
            .borrow_mut()
            .processes
            .get_mut(&pid)
            .and_then(|record| record.wakeup.take())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kernel = self.kernel.borrow();
        f.debug_struct("Context")
            .field("now", &kernel.scheduler.now())
            .field("processes", &kernel.processes.len())
            .field("pending_events", &kernel.scheduler.len())
            .finish_non_exhaustive()
    }
}

/// Future returned by [`Context::timeout`].
#[must_use = "futures do nothing unless you `.await` them"]
pub struct Timeout {
    ctx: Context,
    delay: u64,
    pid: Option<ProcessId>,
}

impl Future for Timeout {
    type Output = Result<(), SimError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let Some(pid) = this.pid else {
            let pid = this.ctx.enter_suspension()?;
            this.ctx.arm_timer(pid, this.delay);
            this.pid = Some(pid);
            return Poll::Pending;
        };

        match this.ctx.take_wakeup(pid) {
            Some(Wakeup::Interrupted) => Poll::Ready(Err(SimError::Interrupted)),
            Some(_) => Poll::Ready(Ok(())),
            None => Poll::Pending,
        }
    }
}
