//! Hosts issue read and write commands to storage.
//!
//! A host runs inside some process (usually a workload driver) and performs
//! one operation at a time: send the request, then wait for the completion
//! that carries the same transaction id. Completions of earlier, aborted
//! operations that arrive in the meantime are discarded.
//!
//! # Cancellation
//!
//! Interrupting the host's process aborts only the operation in flight.
//! The operation reports [`OperationOutcome::Aborted`] and the process keeps
//! running. Depending on where the interrupt lands:
//!
//! - while the request is still crossing the bus, it is dropped and storage
//!   never sees it;
//! - once storage has it, the device still evaluates it completely, but the
//!   host ignores the completion, so a read never hands back its value.
//!
//! Either way the store holds whole values only.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;

use crate::kernel::{Context, SimError, VirtualTime};
use crate::link::StorageLink;
use crate::storage::{Address, Completion, Data, Payload, TransactionId};

/// Result of one host operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome<T> {
    Completed(T),
    /// The operation was interrupted and abandoned.
    Aborted,
}

impl<T> OperationOutcome<T> {
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// The completed value, `None` if aborted.
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Aborted => None,
        }
    }
}

/// Per-host operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostStats {
    pub issued: u64,
    pub completed: u64,
    pub aborted: u64,
    /// Completions of aborted operations thrown away on arrival.
    pub stale_discarded: u64,
    /// Sum of issue-to-completion ticks over completed operations.
    pub total_latency: u64,
    pub max_latency: u64,
}

impl HostStats {
    /// Mean issue-to-completion ticks, `None` before the first completion.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_latency(&self) -> Option<f64> {
        (self.completed > 0).then(|| self.total_latency as f64 / self.completed as f64)
    }
}

/// One host attached to storage through its own [`StorageLink`].
#[derive(Clone, Debug)]
pub struct Host {
    ctx: Context,
    name: String,
    link: StorageLink,
    next_id: Rc<Cell<u64>>,
    stats: Rc<RefCell<HostStats>>,
}

impl Host {
    #[must_use]
    pub fn new(ctx: &Context, name: impl Into<String>, link: StorageLink) -> Self {
        Self {
            ctx: ctx.clone(),
            name: name.into(),
            link,
            next_id: Rc::new(Cell::new(0)),
            stats: Rc::new(RefCell::new(HostStats::default())),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn link(&self) -> &StorageLink {
        &self.link
    }

    #[must_use]
    pub fn stats(&self) -> HostStats {
        *self.stats.borrow()
    }

    /// Write `data` at `address`.
    ///
    /// # Errors
    ///
    /// Only fatal errors; an interrupt yields `Ok(Aborted)`.
    pub async fn write(
        &self,
        address: Address,
        data: Data,
    ) -> Result<OperationOutcome<()>, SimError> {
        let payload = Payload::write(self.next_transaction(), address, data);
        let outcome = self.execute(payload).await?;
        Ok(match outcome {
            OperationOutcome::Completed(_) => OperationOutcome::Completed(()),
            OperationOutcome::Aborted => OperationOutcome::Aborted,
        })
    }

    /// Read `address`. Completes with `None` if it was never written.
    ///
    /// # Errors
    ///
    /// Only fatal errors; an interrupt yields `Ok(Aborted)`.
    pub async fn read(&self, address: Address) -> Result<OperationOutcome<Option<Data>>, SimError> {
        let payload = Payload::read(self.next_transaction(), address);
        let outcome = self.execute(payload).await?;
        Ok(match outcome {
            OperationOutcome::Completed(completion) => {
                OperationOutcome::Completed(completion.into_data())
            }
            OperationOutcome::Aborted => OperationOutcome::Aborted,
        })
    }

    fn next_transaction(&self) -> TransactionId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        TransactionId::new(id)
    }

    async fn execute(&self, payload: Payload) -> Result<OperationOutcome<Completion>, SimError> {
        let id = payload.id;
        let address = payload.address;
        let issued_at = self.ctx.now();
        self.stats.borrow_mut().issued += 1;

        match self.transact(payload).await {
            Ok(completion) => {
                self.record_completion(issued_at);
                Ok(OperationOutcome::Completed(completion))
            }
            Err(SimError::Interrupted) => {
                self.stats.borrow_mut().aborted += 1;
                tracing::info!(host = %self.name, %id, address, now = %self.ctx.now(), "operation aborted");
                Ok(OperationOutcome::Aborted)
            }
            Err(e) => Err(e),
        }
    }

    async fn transact(&self, payload: Payload) -> Result<Completion, SimError> {
        let id = payload.id;
        self.link.start_transaction(payload).await?;
        loop {
            let completion = self.link.next_for_host().await?;
            if completion.id == id {
                // An interrupt that arrived while the completion was being
                // handed over still aborts the operation.
                self.ctx.checkpoint()?;
                return Ok(completion);
            }
            self.stats.borrow_mut().stale_discarded += 1;
            tracing::debug!(host = %self.name, stale = %completion.id, awaiting = %id, "discarding stale completion");
        }
    }

    fn record_completion(&self, issued_at: VirtualTime) {
        let latency = self.ctx.now().since(issued_at);
        let mut stats = self.stats.borrow_mut();
        stats.completed += 1;
        stats.total_latency += latency;
        stats.max_latency = stats.max_latency.max(latency);
    }
}
