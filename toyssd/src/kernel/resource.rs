//! Bounded-capacity gate with a FIFO wait queue.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll};

use crate::config::ConfigError;

use super::context::Context;
use super::error::SimError;
use super::process::{ProcessId, SuspendReason, Wakeup};

struct ResourceState {
    name: String,
    capacity: usize,
    holders: usize,
    peak_holders: usize,
    waiters: VecDeque<ProcessId>,
    /// Processes that were handed a slot on release but have not resumed to
    /// claim it yet. The slot already counts in `holders`.
    granted: BTreeSet<ProcessId>,
}

/// A counting semaphore over virtual time.
///
/// # Invariants
///
/// - `holders <= capacity` at every instant.
/// - Waiters are granted strictly in arrival order. A grant is handed to the
///   head of the queue at the moment of release, so a later arrival can
///   never overtake it.
/// - Every grant is returned exactly once, by dropping its [`ResourceGuard`]
///   or, if the grant was never claimed, by dropping the [`Request`].
#[derive(Clone)]
pub struct Resource {
    ctx: Context,
    state: Rc<RefCell<ResourceState>>,
}

impl Resource {
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] when `capacity` is zero; such a
    /// resource could never be granted.
    pub fn new(ctx: &Context, name: impl Into<String>, capacity: usize) -> Result<Self, ConfigError> {
        let name = name.into();
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity { resource: name });
        }
        Ok(Self {
            ctx: ctx.clone(),
            state: Rc::new(RefCell::new(ResourceState {
                name,
                capacity,
                holders: 0,
                peak_holders: 0,
                waiters: VecDeque::new(),
                granted: BTreeSet::new(),
            })),
        })
    }

    /// Acquire one unit, suspending the current process until it is granted.
    ///
    /// Resolves to [`SimError::Interrupted`] if the process is interrupted
    /// while queued; it is removed from the queue without being granted.
    pub fn request(&self) -> Request {
        Request {
            resource: self.clone(),
            pid: None,
            done: false,
        }
    }

    /// Acquire one unit only if it is free and nobody is queued.
    #[must_use]
    pub fn try_request(&self) -> Option<ResourceGuard> {
        let mut state = self.state.borrow_mut();
        if state.holders < state.capacity && state.waiters.is_empty() {
            Self::admit(&mut state);
            drop(state);
            Some(ResourceGuard {
                resource: self.clone(),
            })
        } else {
            None
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    /// Units currently held, including grants not yet claimed.
    #[must_use]
    pub fn holders(&self) -> usize {
        self.state.borrow().holders
    }

    /// Highest number of simultaneous holders seen so far.
    #[must_use]
    pub fn peak_holders(&self) -> usize {
        self.state.borrow().peak_holders
    }

    /// Processes waiting for a grant. May include interrupted processes
    /// that have not resumed to leave the queue yet.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.state.borrow().waiters.len()
    }

    fn admit(state: &mut ResourceState) {
        state.holders += 1;
        state.peak_holders = state.peak_holders.max(state.holders);
        assert!(
            state.holders <= state.capacity,
            "resource '{}' over capacity",
            state.name
        );
    }

    /// Return one unit: hand it to the longest-waiting live process, or free
    /// it if nobody can take it.
    fn release(&self) {
        let mut state = self.state.borrow_mut();
        while let Some(pid) = state.waiters.pop_front() {
            if self.ctx.wake(pid, Wakeup::Granted) {
                tracing::trace!(resource = %state.name, %pid, now = %self.ctx.now(), "handed over grant");
                state.granted.insert(pid);
                return;
            }
        }
        state.holders -= 1;
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Resource")
            .field("name", &state.name)
            .field("capacity", &state.capacity)
            .field("holders", &state.holders)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

/// Future returned by [`Resource::request`].
#[must_use = "futures do nothing unless you `.await` them"]
pub struct Request {
    resource: Resource,
    pid: Option<ProcessId>,
    done: bool,
}

impl Future for Request {
    type Output = Result<ResourceGuard, SimError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let ctx = this.resource.ctx.clone();

        let Some(pid) = this.pid else {
            let pid = ctx.enter_suspension()?;
            if let Some(guard) = this.resource.try_request() {
                this.done = true;
                return Poll::Ready(Ok(guard));
            }
            this.resource.state.borrow_mut().waiters.push_back(pid);
            ctx.park(pid, SuspendReason::ResourceWait);
            this.pid = Some(pid);
            return Poll::Pending;
        };

        match ctx.take_wakeup(pid) {
            Some(Wakeup::Interrupted) => {
                this.resource
                    .state
                    .borrow_mut()
                    .waiters
                    .retain(|waiter| *waiter != pid);
                this.done = true;
                Poll::Ready(Err(SimError::Interrupted))
            }
            Some(_) => {
                this.resource.state.borrow_mut().granted.remove(&pid);
                this.done = true;
                Poll::Ready(Ok(ResourceGuard {
                    resource: this.resource.clone(),
                }))
            }
            None => Poll::Pending,
        }
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        let Some(pid) = self.pid else { return };
        if self.done {
            return;
        }
        let unclaimed = {
            let mut state = self.resource.state.borrow_mut();
            state.waiters.retain(|waiter| *waiter != pid);
            state.granted.remove(&pid)
        };
        if unclaimed {
            self.resource.release();
        }
    }
}

/// One granted unit of a [`Resource`]. Dropping it releases the unit, on
/// every exit path including an interrupt unwinding through `?`.
#[must_use = "dropping the guard releases the resource immediately"]
pub struct ResourceGuard {
    resource: Resource,
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.resource.release();
    }
}

impl fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourceGuard")
            .field(&self.resource.state.borrow().name)
            .finish()
    }
}
