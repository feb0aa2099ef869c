//! Single-slot blocking hand-off between processes.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll};

use super::context::Context;
use super::error::SimError;
use super::process::{ProcessId, SuspendReason, Wakeup};

struct ChannelState<T> {
    name: String,
    slot: Option<T>,
    /// Putters waiting for the slot, each with the value it will deposit.
    putters: VecDeque<(ProcessId, T)>,
    getters: VecDeque<ProcessId>,
    /// Values handed straight to a woken getter that has not resumed yet.
    handoffs: BTreeMap<ProcessId, T>,
}

impl<T> ChannelState<T> {
    /// Place `value`: directly into the longest-waiting live getter if
    /// there is one, otherwise into the slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot is occupied and no getter takes the value.
    fn deposit(&mut self, ctx: &Context, value: T) {
        while let Some(getter) = self.getters.pop_front() {
            if ctx.wake(getter, Wakeup::Delivered) {
                tracing::trace!(channel = %self.name, pid = %getter, "handed value to waiting getter");
                self.handoffs.insert(getter, value);
                return;
            }
        }
        assert!(self.slot.is_none(), "channel '{}' slot overwritten", self.name);
        self.slot = Some(value);
    }

    /// The slot just emptied: admit the longest-waiting live putter.
    fn refill(&mut self, ctx: &Context) {
        while let Some((putter, value)) = self.putters.pop_front() {
            if ctx.wake(putter, Wakeup::Deposited) {
                self.deposit(ctx, value);
                return;
            }
        }
    }

    fn is_free(&self) -> bool {
        self.slot.is_none() && self.putters.is_empty()
    }
}

/// A single-slot channel with FIFO put and get queues.
///
/// # Invariants
///
/// - At most one value is resident in the slot.
/// - Putters are admitted and getters served in arrival order.
/// - A queued putter implies an occupied slot; a queued getter implies an
///   empty slot. Both queues are never non-empty at once.
///
/// Hand-offs take no virtual time. Latency comes from whatever the putter
/// does before calling [`put`](Self::put), such as a bus transfer.
pub struct Channel<T> {
    ctx: Context,
    state: Rc<RefCell<ChannelState<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: 'static> Channel<T> {
    #[must_use]
    pub fn new(ctx: &Context, name: impl Into<String>) -> Self {
        Self {
            ctx: ctx.clone(),
            state: Rc::new(RefCell::new(ChannelState {
                name: name.into(),
                slot: None,
                putters: VecDeque::new(),
                getters: VecDeque::new(),
                handoffs: BTreeMap::new(),
            })),
        }
    }

    /// Deposit `value`, suspending while the slot is occupied.
    ///
    /// An interrupted putter leaves the queue and its value is dropped.
    pub fn put(&self, value: T) -> Put<T> {
        Put {
            channel: self.clone(),
            value: Some(value),
            pid: None,
        }
    }

    /// Take the next value, suspending while the channel is empty.
    pub fn get(&self) -> Get<T> {
        Get {
            channel: self.clone(),
            pid: None,
            done: false,
        }
    }

    /// Deposit without waiting. Gives the value back if the slot is taken
    /// or other putters are queued ahead.
    ///
    /// # Errors
    ///
    /// Returns `Err(value)` when the value could not be deposited.
    pub fn try_put(&self, value: T) -> Result<(), T> {
        let mut state = self.state.borrow_mut();
        if !state.is_free() {
            return Err(value);
        }
        state.deposit(&self.ctx, value);
        Ok(())
    }

    /// Take the resident value without waiting.
    #[must_use]
    pub fn try_get(&self) -> Option<T> {
        let mut state = self.state.borrow_mut();
        let value = state.slot.take()?;
        state.refill(&self.ctx);
        Some(value)
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    /// Values resident or waiting to be deposited.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.borrow();
        usize::from(state.slot.is_some()) + state.putters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Processes parked waiting for a value.
    #[must_use]
    pub fn waiting_getters(&self) -> usize {
        self.state.borrow().getters.len()
    }
}

impl<T: Clone + 'static> Channel<T> {
    /// Snapshot of the resident value followed by pending puts, in the order
    /// they will be delivered.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        let state = self.state.borrow();
        state
            .slot
            .iter()
            .chain(state.putters.iter().map(|(_, value)| value))
            .cloned()
            .collect()
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Channel")
            .field("name", &state.name)
            .field("occupied", &state.slot.is_some())
            .field("putters", &state.putters.len())
            .field("getters", &state.getters.len())
            .finish()
    }
}

/// Future returned by [`Channel::put`].
#[must_use = "futures do nothing unless you `.await` them"]
pub struct Put<T> {
    channel: Channel<T>,
    value: Option<T>,
    pid: Option<ProcessId>,
}

impl<T> Unpin for Put<T> {}

impl<T: 'static> Future for Put<T> {
    type Output = Result<(), SimError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let ctx = this.channel.ctx.clone();

        let Some(pid) = this.pid else {
            let pid = ctx.enter_suspension()?;
            let Some(value) = this.value.take() else {
                return Poll::Ready(Ok(()));
            };
            let mut state = this.channel.state.borrow_mut();
            if state.is_free() {
                state.deposit(&ctx, value);
                return Poll::Ready(Ok(()));
            }
            state.putters.push_back((pid, value));
            drop(state);
            ctx.park(pid, SuspendReason::ChannelPut);
            this.pid = Some(pid);
            return Poll::Pending;
        };

        match ctx.take_wakeup(pid) {
            Some(Wakeup::Interrupted) => {
                this.channel
                    .state
                    .borrow_mut()
                    .putters
                    .retain(|(putter, _)| *putter != pid);
                this.pid = None;
                Poll::Ready(Err(SimError::Interrupted))
            }
            Some(_) => {
                this.pid = None;
                Poll::Ready(Ok(()))
            }
            None => Poll::Pending,
        }
    }
}

impl<T> Drop for Put<T> {
    fn drop(&mut self) {
        if let Some(pid) = self.pid {
            if let Ok(mut state) = self.channel.state.try_borrow_mut() {
                state.putters.retain(|(putter, _)| *putter != pid);
            }
        }
    }
}

/// Future returned by [`Channel::get`].
#[must_use = "futures do nothing unless you `.await` them"]
pub struct Get<T> {
    channel: Channel<T>,
    pid: Option<ProcessId>,
    done: bool,
}

impl<T> Unpin for Get<T> {}

impl<T: 'static> Future for Get<T> {
    type Output = Result<T, SimError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let ctx = this.channel.ctx.clone();

        let Some(pid) = this.pid else {
            let pid = ctx.enter_suspension()?;
            let mut state = this.channel.state.borrow_mut();
            if let Some(value) = state.slot.take() {
                state.refill(&ctx);
                this.done = true;
                return Poll::Ready(Ok(value));
            }
            state.getters.push_back(pid);
            drop(state);
            ctx.park(pid, SuspendReason::ChannelGet);
            this.pid = Some(pid);
            return Poll::Pending;
        };

        let mut state = this.channel.state.borrow_mut();
        match ctx.take_wakeup(pid) {
            Some(Wakeup::Interrupted) => {
                state.getters.retain(|getter| *getter != pid);
                this.done = true;
                Poll::Ready(Err(SimError::Interrupted))
            }
            Some(_) => match state.handoffs.remove(&pid) {
                Some(value) => {
                    this.done = true;
                    Poll::Ready(Ok(value))
                }
                None => Poll::Pending,
            },
            None => Poll::Pending,
        }
    }
}

impl<T> Drop for Get<T> {
    fn drop(&mut self) {
        let Some(pid) = self.pid else { return };
        if self.done {
            return;
        }
        if let Ok(mut state) = self.channel.state.try_borrow_mut() {
            state.getters.retain(|getter| *getter != pid);
            if state.handoffs.remove(&pid).is_some() {
                tracing::warn!(channel = %state.name, %pid, "value handed to a getter that never claimed it");
            }
        }
    }
}
