//! The run loop.
//!
//! [`Simulation`] owns every process body and drives them one at a time:
//! pop the earliest event, advance the clock, poll the target until it
//! parks or finishes, repeat. Bodies are polled with a no-op waker; the
//! kernel primitives schedule resumptions explicitly instead of relying on
//! wakers.

use std::collections::BTreeMap;
use std::future::Future;
use std::task::{Context as TaskContext, Poll};

use futures::task::noop_waker_ref;

use super::context::{Context, ProcessBody};
use super::error::SimError;
use super::event::Event;
use super::process::{ProcessId, ProcessState, SuspendReason};
use super::time::VirtualTime;

/// Why a run returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The event queue is empty and nothing is blocked except daemons.
    Exhausted,
    /// The next event is due after the requested deadline.
    Deadline,
}

/// Summary of a completed `run` or `run_until` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Virtual time when the run returned.
    pub now: VirtualTime,
    /// Events that resumed a process during the whole simulation so far.
    pub dispatched: u64,
    pub stop: StopReason,
}

/// A single-threaded discrete-event simulation.
///
/// # Example
///
/// ```
/// use toyssd::kernel::{Simulation, VirtualTime};
///
/// let mut sim = Simulation::new();
/// let ctx = sim.context();
/// sim.spawn("sleeper", async move {
///     ctx.timeout(5).await?;
///     Ok(())
/// });
///
/// let report = sim.run().unwrap();
/// assert_eq!(report.now, VirtualTime::new(5));
/// ```
pub struct Simulation {
    ctx: Context,
    bodies: BTreeMap<ProcessId, ProcessBody>,
    dispatched: u64,
    halted: bool,
}

impl Simulation {
    /// Create an empty simulation at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ctx: Context::new(),
            bodies: BTreeMap::new(),
            dispatched: 0,
            halted: false,
        }
    }

    /// A handle for components and process bodies.
    #[must_use]
    pub fn context(&self) -> Context {
        self.ctx.clone()
    }

    #[must_use]
    pub fn now(&self) -> VirtualTime {
        self.ctx.now()
    }

    /// See [`Context::spawn`].
    pub fn spawn<F>(&self, name: impl Into<String>, body: F) -> ProcessId
    where
        F: Future<Output = Result<(), SimError>> + 'static,
    {
        self.ctx.spawn(name, body)
    }

    /// See [`Context::spawn_daemon`].
    pub fn spawn_daemon<F>(&self, name: impl Into<String>, body: F) -> ProcessId
    where
        F: Future<Output = Result<(), SimError>> + 'static,
    {
        self.ctx.spawn_daemon(name, body)
    }

    /// See [`Context::interrupt`].
    pub fn interrupt(&self, pid: ProcessId) -> bool {
        self.ctx.interrupt(pid)
    }

    /// Interrupt `pid` once virtual time reaches `at`.
    ///
    /// The trigger is itself a process. If `at` is already in the past the
    /// interrupt fires at the current tick. Returns the trigger's id.
    pub fn schedule_interrupt(&self, pid: ProcessId, at: VirtualTime) -> ProcessId {
        let ctx = self.context();
        let delay = at.since(self.now());
        self.ctx.spawn(format!("interrupt-{}", pid.raw()), async move {
            ctx.timeout(delay).await?;
            if !ctx.interrupt(pid) {
                tracing::warn!(%pid, now = %ctx.now(), "interrupt target no longer exists");
            }
            Ok(())
        })
    }

    #[must_use]
    pub fn state(&self, pid: ProcessId) -> ProcessState {
        self.ctx.state(pid)
    }

    /// See [`Context::find_process`].
    #[must_use]
    pub fn find_process(&self, name: &str) -> Option<ProcessId> {
        self.ctx.find_process(name)
    }

    /// Queued events, including superseded ones that will be skipped.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.ctx.kernel.borrow().scheduler.len()
    }

    /// Run until the event queue is empty.
    ///
    /// # Errors
    ///
    /// - [`SimError::ProcessFailed`] if a process body returned a fatal error;
    ///   the simulation is halted afterwards.
    /// - [`SimError::Deadlock`] if non-daemon processes are still parked when
    ///   the queue runs dry.
    /// - [`SimError::Halted`] if an earlier run already failed.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        self.run_inner(None)
    }

    /// Run until the queue is empty or the next event is due after
    /// `deadline`. Events due exactly at the deadline are dispatched.
    ///
    /// When stopped by the deadline the clock is moved forward to it; it
    /// never passes it. Can be called repeatedly to step through a run.
    pub fn run_until(&mut self, deadline: VirtualTime) -> Result<RunReport, SimError> {
        self.run_inner(Some(deadline))
    }

    /// Dispatch a single event. Returns `false` when the queue is empty.
    pub fn step(&mut self) -> Result<bool, SimError> {
        if self.halted {
            return Err(SimError::Halted);
        }
        self.adopt_spawned();
        match self.next_event(None) {
            Some(event) => {
                self.dispatch(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn run_inner(&mut self, deadline: Option<VirtualTime>) -> Result<RunReport, SimError> {
        if self.halted {
            return Err(SimError::Halted);
        }

        loop {
            self.adopt_spawned();
            let Some(event) = self.next_event(deadline) else {
                break;
            };
            self.dispatch(event)?;
        }

        let queue_empty = self.ctx.kernel.borrow().scheduler.is_empty();
        if let (Some(deadline), false) = (deadline, queue_empty) {
            self.ctx.kernel.borrow_mut().scheduler.advance_to(deadline);
            return Ok(self.report(StopReason::Deadline));
        }

        let blocked = self.ctx.blocked_processes();
        if !blocked.is_empty() {
            let now = self.now();
            tracing::error!(%now, blocked = blocked.len(), "event queue exhausted with blocked processes");
            return Err(SimError::Deadlock { now, blocked });
        }

        Ok(self.report(StopReason::Exhausted))
    }

    fn report(&self, stop: StopReason) -> RunReport {
        RunReport {
            now: self.now(),
            dispatched: self.dispatched,
            stop,
        }
    }

    /// Pop the next live event due by `deadline`.
    ///
    /// Superseded events are dropped on the way without advancing the clock,
    /// so a cancelled timer never moves time forward.
    fn next_event(&self, deadline: Option<VirtualTime>) -> Option<Event> {
        let mut kernel = self.ctx.kernel.borrow_mut();
        let kernel = &mut *kernel;
        loop {
            let next = *kernel.scheduler.peek()?;
            let live = kernel
                .processes
                .get(&next.target)
                .is_some_and(|record| record.armed_event == Some(next.seq));
            if live {
                return kernel.scheduler.pop_due(deadline);
            }
            tracing::trace!(pid = %next.target, seq = next.seq, "dropping superseded event");
            kernel.scheduler.discard_next();
        }
    }

    /// Move bodies spawned since the last dispatch into the body table.
    fn adopt_spawned(&mut self) {
        let spawned = std::mem::take(&mut self.ctx.kernel.borrow_mut().spawned);
        self.bodies.extend(spawned);
    }

    fn dispatch(&mut self, event: Event) -> Result<(), SimError> {
        let pid = event.target;
        {
            let mut kernel = self.ctx.kernel.borrow_mut();
            let Some(record) = kernel.processes.get_mut(&pid) else {
                return Ok(());
            };
            if record.armed_event != Some(event.seq) {
                return Ok(());
            }
            record.armed_event = None;
            record.state = ProcessState::Running;
            kernel.current = Some(pid);
        }

        // Every record has a body: bodies are adopted before any event is
        // popped, and removed only together with their record.
        let Some(mut body) = self.bodies.remove(&pid) else {
            self.ctx.kernel.borrow_mut().current = None;
            return Ok(());
        };

        self.dispatched += 1;
        tracing::trace!(%pid, now = %event.due, "resuming process");
        let poll = body
            .as_mut()
            .poll(&mut TaskContext::from_waker(noop_waker_ref()));

        let finished = {
            let mut kernel = self.ctx.kernel.borrow_mut();
            kernel.current = None;
            match poll {
                Poll::Pending => {
                    if let Some(record) = kernel.processes.get_mut(&pid) {
                        if record.state == ProcessState::Running {
                            tracing::warn!(%pid, name = %record.name, "process parked on a foreign future");
                            record.state = ProcessState::Suspended(SuspendReason::Foreign);
                        }
                    }
                    None
                }
                Poll::Ready(result) => {
                    let name = kernel
                        .processes
                        .remove(&pid)
                        .map(|record| record.name)
                        .unwrap_or_default();
                    Some((name, result))
                }
            }
        };

        let Some((name, result)) = finished else {
            self.bodies.insert(pid, body);
            return Ok(());
        };
        drop(body);

        match result {
            Ok(()) => {
                tracing::debug!(%pid, %name, now = %self.now(), "process terminated");
                Ok(())
            }
            Err(SimError::Interrupted) => {
                tracing::warn!(%pid, %name, now = %self.now(), "process terminated by an unhandled interrupt");
                Ok(())
            }
            Err(error) => {
                tracing::error!(%pid, %name, now = %self.now(), %error, "process failed, halting simulation");
                self.halted = true;
                Err(SimError::ProcessFailed {
                    pid,
                    name,
                    source: Box::new(error),
                })
            }
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        // Bodies hold `Context` clones, so they must go before the kernel can.
        let spawned = std::mem::take(&mut self.ctx.kernel.borrow_mut().spawned);
        drop(spawned);
        self.bodies.clear();
    }
}
